use anyhow::{anyhow, bail, Context};
use plagiscope_lib::models::Comparison;
use plagiscope_lib::services::{
    get_api_key, AppConfig, ConfigStore, Dataset, EmbeddingProvider, HashingEmbedder, HttpEmbeddingProvider,
    Language, PlagiarismDetector, PlagiarismModelTrainer, TrainOptions,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const USAGE: &str = "Usage:
  plagiscope compare <file1> <file2> [--model <config.json>] [--json <out.json>]
  plagiscope train <dataset.csv|json|jsonl> [--no-weights] [--no-threshold] [--test-size <f>] [--out <config.json>]

Notes:
  - Settings are read from the plagiscope config.json in the user config directory.
  - The HTTP embedding provider reads PLAGISCOPE_EMBEDDING_API_KEY or OPENAI_API_KEY.";

const DEFAULT_MODEL_OUT: &str = "models/optimized_config.json";

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn load_app_config() -> anyhow::Result<AppConfig> {
    let Some(dir) = ConfigStore::default_config_dir() else {
        return Ok(AppConfig::default());
    };
    let store = ConfigStore::new(dir);
    store
        .load()
        .with_context(|| format!("failed to load {}", store.config_file().display()))
}

fn build_embedder(config: &AppConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let embedding = &config.embedding;
    match embedding.provider.trim().to_lowercase().as_str() {
        "http" | "openai" => {
            let key = get_api_key("openai").ok_or_else(|| anyhow!("embedding API key not configured"))?;
            let provider = match config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
                Some(proxy) => HttpEmbeddingProvider::with_proxy(
                    embedding.base_url.as_deref(),
                    embedding.model.as_deref(),
                    &key,
                    proxy,
                )?,
                None => HttpEmbeddingProvider::new(embedding.base_url.as_deref(), embedding.model.as_deref(), &key)?,
            };
            info!("[CLI] Using HTTP embeddings at {}", provider.url());
            Ok(Arc::new(provider))
        }
        _ => {
            let embedder = HashingEmbedder::new(embedding.dimensions);
            info!("[CLI] Using local hashing embeddings ({} dims)", embedder.dimensions());
            Ok(Arc::new(embedder))
        }
    }
}

fn build_detector(config: &AppConfig) -> anyhow::Result<PlagiarismDetector> {
    let embedder = build_embedder(config)?;
    let weights = config.detection.weights.renormalized().unwrap_or_default();
    Ok(PlagiarismDetector::new(Language::from_name(&config.language), embedder)
        .with_weights(weights)
        .with_thresholds(config.detection.thresholds))
}

fn run_compare(args: &[String], config: &AppConfig) -> anyhow::Result<bool> {
    let (Some(file1), Some(file2)) = (args.get(2), args.get(3)) else {
        bail!("compare needs two file paths\n\n{}", USAGE);
    };

    let mut detector = build_detector(config)?;
    if let Some(model) = parse_arg_value(args, "--model") {
        let mut trainer = PlagiarismModelTrainer::new(detector);
        trainer
            .load_model_config(Path::new(&model))
            .with_context(|| format!("failed to load model config {}", model))?;
        detector = trainer.into_detector();
    }

    let comparison = detector.compare_files(Path::new(file1), Path::new(file2))?;

    if let Some(out) = parse_arg_value(args, "--json") {
        let content = serde_json::to_string_pretty(&comparison)?;
        std::fs::write(&out, content).with_context(|| format!("failed to write {}", out))?;
        println!("Result written to {}", out);
    }

    match &comparison {
        Comparison::Completed(result) => {
            if let Some(files) = &result.files {
                println!("Files: {} <-> {}", files.file1, files.file2);
            }
            println!("Similarity: {:.2}%", result.similarity_percentage);
            println!("Verdict: {}", result.verdict);
            for (category, label) in result.breakdown_labels() {
                println!("  {:<10} {}", category.as_str(), label);
            }
            println!(
                "Sentences matched: {} ({:.1}%)",
                result.details.semantic.matched_sentences,
                result.details.semantic.match_ratio * 100.0
            );
            Ok(true)
        }
        Comparison::Failed(err) => {
            eprintln!("Error: {}", err.error);
            Ok(false)
        }
    }
}

fn run_train(args: &[String], config: &AppConfig) -> anyhow::Result<bool> {
    let Some(dataset_path) = args.get(2) else {
        bail!("train needs a dataset path\n\n{}", USAGE);
    };

    let test_fraction = match parse_arg_value(args, "--test-size") {
        Some(raw) => raw
            .parse::<f64>()
            .with_context(|| format!("invalid --test-size {}", raw))?,
        None => TrainOptions::default().test_fraction,
    };
    let options = TrainOptions {
        optimize_weights: !has_flag(args, "--no-weights"),
        optimize_threshold: !has_flag(args, "--no-threshold"),
        test_fraction,
    };
    let out = PathBuf::from(parse_arg_value(args, "--out").unwrap_or_else(|| DEFAULT_MODEL_OUT.to_string()));

    let dataset = Dataset::from_path(Path::new(dataset_path))?;
    let mut trainer = PlagiarismModelTrainer::new(build_detector(config)?);
    let run = trainer.train(&dataset, options)?;

    let w = &run.optimized_weights;
    let m = &run.test_metrics;
    println!("Run: {} ({})", run.run_id, run.completed_at);
    println!("Train: {}  Test: {}", run.train_size, run.test_size);
    println!(
        "Weights: semantic {:.3}, lexical {:.3}, structural {:.3}, sequence {:.3}",
        w.semantic, w.lexical, w.structural, w.sequence
    );
    println!("Threshold: {:.2}", run.optimized_threshold);
    println!(
        "Test: accuracy {:.4}, precision {:.4}, recall {:.4}, F1 {:.4}",
        m.accuracy, m.precision, m.recall, m.f1_score
    );
    println!("Confusion matrix: {:?}", m.confusion_matrix.0);

    trainer.save_model_config(&out, &run)?;
    println!("Configuration saved to {}", out.display());
    Ok(true)
}

fn main() -> anyhow::Result<()> {
    plagiscope_lib::init_logging();

    let args: Vec<String> = std::env::args().collect();
    let config = load_app_config()?;

    let ok = match args.get(1).map(String::as_str) {
        Some("compare") => run_compare(&args, &config)?,
        Some("train") => run_train(&args, &config)?,
        _ => {
            eprintln!("{}", USAGE);
            return Ok(());
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
