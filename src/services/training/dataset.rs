// Labeled Dataset
// Loads (text1, text2, is_plagiarism) rows from CSV / JSON / JSONL and splits them

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const REQUIRED_COLUMNS: [&str; 3] = ["text1", "text2", "is_plagiarism"];

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported dataset format: {0} (expected .csv, .json or .jsonl)")]
    UnsupportedFormat(PathBuf),
    #[error("Dataset must contain the columns text1, text2, is_plagiarism; missing {0:?}")]
    MissingColumns(Vec<String>),
    #[error("Invalid label {value:?} in row {row}")]
    InvalidLabel { row: usize, value: String },
    #[error("Malformed dataset: {0}")]
    Malformed(String),
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Dataset contains no rows")]
    Empty,
    #[error("Test fraction must be strictly between 0 and 1, got {0}")]
    InvalidTestFraction(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub text1: String,
    pub text2: String,
    pub is_plagiarism: bool,
}

impl DatasetRow {
    pub fn new(text1: impl Into<String>, text2: impl Into<String>, is_plagiarism: bool) -> Self {
        Self {
            text1: text1.into(),
            text2: text2.into(),
            is_plagiarism,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    rows: Vec<DatasetRow>,
}

/// Accepts booleans spelled as 0/1, true/false or yes/no.
pub fn parse_label(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" => Some(true),
        "0" | "0.0" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl Dataset {
    pub fn new(rows: Vec<DatasetRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.rows.iter().filter(|r| r.is_plagiarism).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }

    /// Load by extension: `.csv`, `.json` (array of objects) or `.jsonl`.
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let content = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let dataset = match extension.as_str() {
            "csv" => Self::from_csv_str(&content)?,
            "json" => Self::from_json_str(&content)?,
            "jsonl" | "ndjson" => Self::from_jsonl_str(&content)?,
            _ => return Err(DatasetError::UnsupportedFormat(path.to_path_buf())),
        };

        info!(
            "[DATASET] Loaded {} pairs from {} (plagiarism: {}, original: {})",
            dataset.len(),
            path.display(),
            dataset.positives(),
            dataset.negatives()
        );
        Ok(dataset)
    }

    /// Header row required; columns are located by name, extras ignored.
    pub fn from_csv_str(content: &str) -> Result<Self, DatasetError> {
        let mut records = parse_csv(content)?.into_iter();
        let Some(header) = records.next() else {
            return Err(DatasetError::MissingColumns(
                REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            ));
        };

        let position = |name: &str| header.iter().position(|h| h.trim().trim_start_matches('\u{feff}') == name);
        let (Some(i1), Some(i2), Some(il)) = (position("text1"), position("text2"), position("is_plagiarism")) else {
            let missing = REQUIRED_COLUMNS
                .iter()
                .filter(|c| position(**c).is_none())
                .map(|c| c.to_string())
                .collect();
            return Err(DatasetError::MissingColumns(missing));
        };

        let mut rows = Vec::new();
        for (idx, record) in records.enumerate() {
            let row_number = idx + 1;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let field = |i: usize| record.get(i).cloned().unwrap_or_default();
            let raw_label = field(il);
            let is_plagiarism = parse_label(&raw_label).ok_or(DatasetError::InvalidLabel {
                row: row_number,
                value: raw_label.clone(),
            })?;
            rows.push(DatasetRow::new(field(i1), field(i2), is_plagiarism));
        }

        Ok(Self::new(rows))
    }

    pub fn from_json_str(content: &str) -> Result<Self, DatasetError> {
        let values: Vec<Value> = serde_json::from_str(content)?;
        values
            .iter()
            .enumerate()
            .map(|(idx, v)| row_from_value(v, idx + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn from_jsonl_str(content: &str) -> Result<Self, DatasetError> {
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(idx, line)| {
                let value: Value = serde_json::from_str(line)?;
                row_from_value(&value, idx + 1)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Per-label shuffle with a seeded generator; `round(class_len * test_fraction)`
    /// rows of each class go to the test split. Both splits keep dataset order.
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> Result<(Dataset, Dataset), DatasetError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(DatasetError::InvalidTestFraction(test_fraction));
        }
        if self.rows.is_empty() {
            return Err(DatasetError::Empty);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut in_test = vec![false; self.rows.len()];

        for label in [false, true] {
            let mut indices: Vec<usize> = self
                .rows
                .iter()
                .enumerate()
                .filter(|(_, r)| r.is_plagiarism == label)
                .map(|(i, _)| i)
                .collect();
            indices.shuffle(&mut rng);

            let n_test = ((indices.len() as f64 * test_fraction).round() as usize).min(indices.len());
            for idx in &indices[..n_test] {
                in_test[*idx] = true;
            }
        }

        let (test, train): (Vec<_>, Vec<_>) = self
            .rows
            .iter()
            .cloned()
            .zip(in_test)
            .partition(|(_, is_test)| *is_test);

        Ok((
            Dataset::new(train.into_iter().map(|(r, _)| r).collect()),
            Dataset::new(test.into_iter().map(|(r, _)| r).collect()),
        ))
    }
}

fn row_from_value(value: &Value, row: usize) -> Result<DatasetRow, DatasetError> {
    let Some(object) = value.as_object() else {
        return Err(DatasetError::Malformed(format!("row {} is not an object", row)));
    };

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !object.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DatasetError::MissingColumns(missing));
    }

    let text = |key: &str| match &object[key] {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };

    let label = match &object["is_plagiarism"] {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().and_then(|f| {
            if f == 1.0 {
                Some(true)
            } else if f == 0.0 {
                Some(false)
            } else {
                None
            }
        }),
        Value::String(s) => parse_label(s),
        _ => None,
    };
    let is_plagiarism = label.ok_or_else(|| DatasetError::InvalidLabel {
        row,
        value: object["is_plagiarism"].to_string(),
    })?;

    Ok(DatasetRow::new(text("text1"), text("text2"), is_plagiarism))
}

/// RFC 4180 records: quoted fields may hold commas, newlines and `""` escapes.
fn parse_csv(content: &str) -> Result<Vec<Vec<String>>, DatasetError> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if !field_started => {
                in_quotes = true;
                field_started = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                field_started = false;
            }
            _ => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err(DatasetError::Malformed("unterminated quoted field".to_string()));
    }
    if field_started || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(n_pos: usize, n_neg: usize) -> Dataset {
        let rows = (0..n_pos)
            .map(|i| DatasetRow::new(format!("pos a {}", i), format!("pos b {}", i), true))
            .chain((0..n_neg).map(|i| DatasetRow::new(format!("neg a {}", i), format!("neg b {}", i), false)))
            .collect();
        Dataset::new(rows)
    }

    #[test]
    fn test_csv_with_quotes_and_extra_columns() {
        let csv = "id,text1,text2,is_plagiarism,source\r\n\
                   1,\"Hola, mundo\",\"Dijo \"\"hola\"\"\",1,web\r\n\
                   2,\"línea uno\nlínea dos\",otro texto,False,libro\r\n\
                   \r\n\
                   3,a,b,yes,x";
        let dataset = Dataset::from_csv_str(csv).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.rows()[0].text1, "Hola, mundo");
        assert_eq!(dataset.rows()[0].text2, "Dijo \"hola\"");
        assert!(dataset.rows()[0].is_plagiarism);
        assert_eq!(dataset.rows()[1].text1, "línea uno\nlínea dos");
        assert!(!dataset.rows()[1].is_plagiarism);
        assert!(dataset.rows()[2].is_plagiarism);
        assert_eq!(dataset.positives(), 2);
    }

    #[test]
    fn test_csv_missing_columns_are_listed() {
        let err = Dataset::from_csv_str("text1,label\nuno,1\n").unwrap_err();
        match err {
            DatasetError::MissingColumns(cols) => assert_eq!(cols, vec!["text2", "is_plagiarism"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_csv_invalid_label_reports_row() {
        let err = Dataset::from_csv_str("text1,text2,is_plagiarism\na,b,1\nc,d,maybe\n").unwrap_err();
        assert!(matches!(err, DatasetError::InvalidLabel { row: 2, ref value } if value == "maybe"));
    }

    #[test]
    fn test_csv_unterminated_quote() {
        let err = Dataset::from_csv_str("text1,text2,is_plagiarism\n\"abierto,b,1\n").unwrap_err();
        assert!(matches!(err, DatasetError::Malformed(_)));
    }

    #[test]
    fn test_json_and_jsonl() {
        let json = r#"[{"text1":"a","text2":"b","is_plagiarism":true},
                       {"text1":"c","text2":"d","is_plagiarism":0},
                       {"text1":"e","text2":null,"is_plagiarism":"no"}]"#;
        let dataset = Dataset::from_json_str(json).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.positives(), 1);
        assert_eq!(dataset.rows()[2].text2, "");

        let jsonl = "{\"text1\":\"a\",\"text2\":\"b\",\"is_plagiarism\":1}\n\n{\"text1\":\"c\",\"text2\":\"d\",\"is_plagiarism\":false}\n";
        let dataset = Dataset::from_jsonl_str(jsonl).unwrap();
        assert_eq!(dataset.len(), 2);

        let err = Dataset::from_json_str(r#"[{"text1":"a","is_plagiarism":2}]"#).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumns(ref c) if c == &vec!["text2".to_string()]));
    }

    #[test]
    fn test_from_path_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("pares.csv");
        fs::write(&csv, "text1,text2,is_plagiarism\nuno,dos,1\n").unwrap();
        assert_eq!(Dataset::from_path(&csv).unwrap().len(), 1);

        let txt = dir.path().join("pares.txt");
        fs::write(&txt, "nada").unwrap();
        assert!(matches!(Dataset::from_path(&txt), Err(DatasetError::UnsupportedFormat(_))));

        let missing = dir.path().join("no_existe.csv");
        assert!(matches!(Dataset::from_path(&missing), Err(DatasetError::Io { .. })));
    }

    #[test]
    fn test_stratified_split_keeps_class_ratio_and_order() {
        let dataset = labelled(10, 20);
        let (train, test) = dataset.stratified_split(0.2, 42).unwrap();
        assert_eq!(test.len(), 6);
        assert_eq!(test.positives(), 2);
        assert_eq!(test.negatives(), 4);
        assert_eq!(train.len(), 24);

        let position = |row: &DatasetRow| dataset.rows().iter().position(|r| r == row).unwrap();
        for split in [&train, &test] {
            let positions: Vec<usize> = split.rows().iter().map(position).collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_stratified_split_is_reproducible() {
        let dataset = labelled(7, 9);
        let (_, a) = dataset.stratified_split(0.25, 42).unwrap();
        let (_, b) = dataset.stratified_split(0.25, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stratified_split_rejects_bad_input() {
        assert!(matches!(
            labelled(2, 2).stratified_split(1.0, 42),
            Err(DatasetError::InvalidTestFraction(_))
        ));
        assert!(matches!(Dataset::default().stratified_split(0.2, 42), Err(DatasetError::Empty)));
    }

    #[test]
    fn test_split_seed_changes_test_rows() {
        let dataset = labelled(20, 20);
        let (_, a) = dataset.stratified_split(0.5, 42).unwrap();
        let (_, b) = dataset.stratified_split(0.5, 43).unwrap();
        assert_eq!(a.len(), b.len());
        assert_ne!(a.rows(), b.rows());
    }
}
