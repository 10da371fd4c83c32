// Text Processing Service
// Cleaning, tokenization and feature extraction feeding the metrics engine

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use crate::models::FeatureSet;

/// Turns raw text into the tokens, sentences and features the scoring core consumes.
pub trait FeatureExtractor: Send + Sync {
    fn normalize(&self, text: &str) -> String;
    fn tokenize_words(&self, text: &str) -> Vec<String>;
    fn tokenize_sentences(&self, text: &str) -> Vec<String>;
    fn extract_features(&self, text: &str) -> FeatureSet;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Spanish,
    English,
}

impl Language {
    /// Unknown names fall back to Spanish.
    pub fn from_name(val: &str) -> Self {
        match val.trim().to_lowercase().as_str() {
            "english" | "en" | "inglés" | "ingles" => Self::English,
            _ => Self::Spanish,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spanish => "spanish",
            Self::English => "english",
        }
    }

    fn stopwords(&self) -> &'static [&'static str] {
        match self {
            Self::Spanish => SPANISH_STOPWORDS,
            Self::English => ENGLISH_STOPWORDS,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum CleanLevel {
    Light,
    #[default]
    Medium,
    Aggressive,
}

const SPANISH_STOPWORDS: &[&str] = &[
    "de", "la", "que", "el", "en", "los", "del", "se", "las", "por", "un", "para", "con", "no",
    "una", "su", "al", "lo", "como", "más", "pero", "sus", "le", "ya", "este", "sí", "porque",
    "esta", "entre", "cuando", "muy", "sin", "sobre", "también", "me", "hasta", "hay", "donde",
    "quien", "desde", "todo", "nos", "durante", "todos", "uno", "les", "ni", "contra", "otros",
    "ese", "eso", "ante", "ellos", "esto", "antes", "algunos", "qué", "unos", "yo", "otro",
    "otras", "otra", "él", "tanto", "esa", "estos", "mucho", "quienes", "nada", "muchos", "cual",
    "poco", "ella", "estar", "estas", "algunas", "algo", "nosotros", "es", "son", "fue", "ha",
];

const ENGLISH_STOPWORDS: &[&str] = &[
    "the", "of", "and", "to", "in", "is", "it", "that", "for", "on", "was", "with", "as", "be",
    "by", "at", "this", "are", "from", "or", "an", "but", "not", "have", "has", "had", "they",
    "he", "she", "we", "you", "his", "her", "their", "its", "which", "were", "been", "will",
    "would", "can", "could", "there", "what", "all", "if", "so", "about", "into", "than",
    "them", "these", "those", "then", "also", "such", "do", "does", "did", "our", "my", "me",
];

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("url regex"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").expect("phone regex"))
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("digits regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("punctuation regex"))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("word regex"))
}

/// Normalize typographic punctuation and whitespace
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    text.replace(['\u{201c}', '\u{201d}', '\u{00ab}', '\u{00bb}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{2014}', '\u{2013}'], "-")
        .replace(['\u{3000}', '\u{00A0}'], " ")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

fn strip_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' => 'a',
            'Á' | 'À' | 'Ä' | 'Â' | 'Ã' | 'Å' => 'A',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' => 'O',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            other => other,
        })
        .collect()
}

fn is_sentence_terminal(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '…' | '。' | '！' | '？')
}

/// Split text into sentences on terminal punctuation.
/// Terminals inside double quotes or not followed by whitespace (decimals, URLs) do not split.
pub fn split_sentences(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut buffer = String::new();
    let mut in_quote = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        buffer.push(ch);

        match ch {
            '"' => in_quote = !in_quote,
            '\u{201c}' | '\u{00ab}' => in_quote = true,
            '\u{201d}' | '\u{00bb}' => in_quote = false,
            _ => {}
        }

        if is_sentence_terminal(ch) && !in_quote {
            // "?!", "..." and closing brackets stay with the sentence
            while i + 1 < chars.len() && (is_sentence_terminal(chars[i + 1]) || chars[i + 1] == ')') {
                i += 1;
                buffer.push(chars[i]);
            }

            let at_boundary = i + 1 >= chars.len() || chars[i + 1].is_whitespace();
            if at_boundary {
                let sentence = buffer.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                buffer.clear();
            }
        }

        i += 1;
    }

    let remaining = buffer.trim();
    if !remaining.is_empty() {
        sentences.push(remaining.to_string());
    }

    sentences
}

/// Contiguous n-length token windows
pub fn get_ngrams(tokens: &[String], n: usize) -> Vec<&[String]> {
    if n == 0 || tokens.len() < n {
        return vec![];
    }
    tokens.windows(n).collect()
}

/// Default feature extractor with configurable cleaning and stopword removal.
#[derive(Debug, Clone)]
pub struct TextPreprocessor {
    language: Language,
    remove_stopwords: bool,
    stopwords: HashSet<&'static str>,
}

impl Default for TextPreprocessor {
    fn default() -> Self {
        Self::new(Language::default(), false)
    }
}

impl TextPreprocessor {
    pub fn new(language: Language, remove_stopwords: bool) -> Self {
        Self {
            language,
            remove_stopwords,
            stopwords: language.stopwords().iter().copied().collect(),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn clean_text(&self, text: &str, level: CleanLevel) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut s = normalize_punctuation(text);

        if matches!(level, CleanLevel::Medium | CleanLevel::Aggressive) {
            s = url_re().replace_all(&s, "").into_owned();
            s = email_re().replace_all(&s, "").into_owned();
            s = phone_re().replace_all(&s, "").into_owned();
        }

        if level == CleanLevel::Aggressive {
            s = digits_re().replace_all(&s, "").into_owned();
            s = strip_diacritics(&s);
        }

        whitespace_re().replace_all(&s, " ").trim().to_string()
    }
}

impl FeatureExtractor for TextPreprocessor {
    fn normalize(&self, text: &str) -> String {
        let cleaned = self.clean_text(text, CleanLevel::Medium).to_lowercase();
        let no_punct = punctuation_re().replace_all(&cleaned, " ");
        whitespace_re().replace_all(&no_punct, " ").trim().to_string()
    }

    fn tokenize_words(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        word_re()
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|t| t.chars().count() > 1)
            .filter(|t| !self.remove_stopwords || !self.stopwords.contains(t))
            .map(str::to_string)
            .collect()
    }

    fn tokenize_sentences(&self, text: &str) -> Vec<String> {
        split_sentences(text)
    }

    fn extract_features(&self, text: &str) -> FeatureSet {
        let sentences = self.tokenize_sentences(text);
        let tokens = self.tokenize_words(text);
        let vocabulary: BTreeSet<String> = tokens.iter().cloned().collect();

        let word_count = tokens.len();
        let sentence_count = sentences.len();
        let avg_word_length = if word_count > 0 {
            tokens.iter().map(|t| t.chars().count()).sum::<usize>() as f64 / word_count as f64
        } else {
            0.0
        };
        let avg_sentence_length = if sentence_count > 0 {
            word_count as f64 / sentence_count as f64
        } else {
            0.0
        };
        let lexical_diversity = if word_count > 0 {
            vocabulary.len() as f64 / word_count as f64
        } else {
            0.0
        };

        FeatureSet {
            char_count: text.chars().count(),
            word_count,
            sentence_count,
            avg_word_length,
            avg_sentence_length,
            unique_words: vocabulary.len(),
            lexical_diversity,
            vocabulary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation() {
        let input = "Hello\u{201c}World\u{201d}";
        let output = normalize_punctuation(input);
        assert_eq!(output, "Hello\"World\"");
    }

    #[test]
    fn test_clean_text_levels() {
        let p = TextPreprocessor::default();
        let text = "Visita https://example.com o escribe a ana@correo.es, tel 555-123-4567. Año 2024";
        let medium = p.clean_text(text, CleanLevel::Medium);
        assert!(!medium.contains("https"));
        assert!(!medium.contains('@'));
        assert!(!medium.contains("555"));
        assert!(medium.contains("2024"));

        let aggressive = p.clean_text(text, CleanLevel::Aggressive);
        assert!(!aggressive.contains("2024"));
        assert!(aggressive.contains("Ano"));

        let light = p.clean_text("  a   b\n\nc ", CleanLevel::Light);
        assert_eq!(light, "a b c");
    }

    #[test]
    fn test_normalize_lowercases_and_strips_punctuation() {
        let p = TextPreprocessor::default();
        assert_eq!(p.normalize("¡Hola, Mundo!  ¿Qué tal?"), "hola mundo qué tal");
    }

    #[test]
    fn test_tokenize_words_drops_single_chars_and_optional_stopwords() {
        let p = TextPreprocessor::default();
        assert_eq!(p.tokenize_words("El gato y la casa"), vec!["el", "gato", "la", "casa"]);

        let filtered = TextPreprocessor::new(Language::Spanish, true);
        assert_eq!(filtered.tokenize_words("El gato y la casa"), vec!["gato", "casa"]);
    }

    #[test]
    fn test_split_sentences() {
        let text = "Primera oración. ¿Segunda pregunta? ¡Tercera!";
        assert_eq!(split_sentences(text).len(), 3);

        let decimals = "El valor es 3.14 exactamente. Fin.";
        assert_eq!(split_sentences(decimals), vec!["El valor es 3.14 exactamente.", "Fin."]);

        let quoted = "Dijo \"basta. ya\" y se fue. Luego volvió.";
        assert_eq!(split_sentences(quoted).len(), 2);

        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_get_ngrams() {
        let tokens: Vec<String> = ["a1", "b2", "c3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(get_ngrams(&tokens, 2).len(), 2);
        assert!(get_ngrams(&tokens, 4).is_empty());
        assert!(get_ngrams(&tokens, 0).is_empty());
    }

    #[test]
    fn test_extract_features() {
        let p = TextPreprocessor::default();
        let f = p.extract_features("Hola mundo. Hola otra vez.");
        assert_eq!(f.word_count, 5);
        assert_eq!(f.sentence_count, 2);
        assert_eq!(f.unique_words, 4);
        assert!((f.avg_sentence_length - 2.5).abs() < 1e-12);
        assert!((f.lexical_diversity - 0.8).abs() < 1e-12);
        assert!(f.vocabulary.contains("mundo"));
    }

    #[test]
    fn test_extract_features_empty_text() {
        let f = TextPreprocessor::default().extract_features("");
        assert_eq!(f.word_count, 0);
        assert_eq!(f.avg_word_length, 0.0);
        assert_eq!(f.lexical_diversity, 0.0);
    }

    #[test]
    fn test_language_from_name() {
        assert_eq!(Language::from_name("en"), Language::English);
        assert_eq!(Language::from_name("español"), Language::Spanish);
        assert_eq!(Language::from_name("klingon"), Language::Spanish);
    }
}
