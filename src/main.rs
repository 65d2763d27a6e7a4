//! medical-ingest - medical document ingestion CLI
//!
//! Usage:
//!   medical-ingest ingest --type prescription scan1.png scan2.jpg
//!   medical-ingest extract --type lab_report results.txt
//!   medical-ingest init-vocabulary [--path medical_terms.json] [--force]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medical_ingest::config::AppConfig;
use medical_ingest::extraction::{DocumentType, EntityExtractor, EntityRecognizer, LexiconRecognizer};
use medical_ingest::observability;
use medical_ingest::ocr::RecognitionEngine;
use medical_ingest::pipeline::{Pipeline, RawImage};
use medical_ingest::preprocessing::ImageConditioner;
use medical_ingest::vocabulary::{self, MedicalVocabulary};
use serde_json::json;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "medical-ingest", version, about = "Extract structured facts from medical document images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// OCR and extract one or more document images
    Ingest {
        /// Document type: prescription, lab_report, medical_note or anything else
        #[arg(long = "type", default_value = "other")]
        document_type: String,
        /// Image files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Run entity extraction over an already recognized text file
    Extract {
        #[arg(long = "type", default_value = "other")]
        document_type: String,
        file: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
    /// Write the built-in medical vocabulary file
    InitVocabulary {
        /// Destination, defaults to MEDICAL_TERMS_PATH
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}

fn build_extractor(config: &AppConfig) -> Result<EntityExtractor> {
    let vocabulary = vocabulary::load_or_init(&config.extraction.vocabulary_path)
        .context("Failed to load medical vocabulary")?;

    let recognizer = match &config.extraction.lexicon_path {
        Some(path) => {
            let lexicon = LexiconRecognizer::from_file(path).context("Failed to load entity lexicon")?;
            Some(Arc::new(lexicon) as Arc<dyn EntityRecognizer>)
        }
        None => None,
    };

    Ok(EntityExtractor::new(vocabulary, recognizer)?)
}

async fn run_ingest(config: &AppConfig, document_type: DocumentType, files: Vec<PathBuf>, pretty: bool) -> Result<()> {
    let pipeline = Pipeline::new(
        ImageConditioner::new(config.preprocessing.clone()),
        RecognitionEngine::tesseract(config.ocr.clone()),
        build_extractor(config)?,
    );
    info!(
        documents = files.len(),
        document_type = %document_type,
        backend = pipeline.engine().backend_name(),
        "Starting ingestion"
    );

    let tasks: Vec<_> = files
        .into_iter()
        .map(|path| {
            let pipeline = pipeline.clone();
            let task = tokio::task::spawn_blocking({
                let path = path.clone();
                move || -> Result<_> {
                    let raw = RawImage::from_path(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    Ok(pipeline.ingest(raw, document_type)?)
                }
            });
            (path, task)
        })
        .collect();

    let mut failures = 0usize;
    for (path, task) in tasks {
        let outcome = task
            .await
            .with_context(|| format!("Ingest task for {} did not complete", path.display()))?;
        let report = match outcome {
            Ok(result) => json!({
                "file": path.display().to_string(),
                "ingested_at": chrono::Utc::now().to_rfc3339(),
                "result": result,
            }),
            Err(e) => {
                failures += 1;
                error!(file = %path.display(), error = %e, "Document ingestion failed");
                json!({
                    "file": path.display().to_string(),
                    "ingested_at": chrono::Utc::now().to_rfc3339(),
                    "error": format!("{:#}", e),
                })
            }
        };
        print_json(&report, pretty)?;
    }

    if failures > 0 {
        anyhow::bail!("{} document(s) failed to ingest", failures);
    }
    Ok(())
}

fn run_extract(config: &AppConfig, document_type: DocumentType, file: PathBuf, pretty: bool) -> Result<()> {
    let text = std::fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let extractor = build_extractor(config)?;
    let entities = extractor.extract(&text, document_type);

    print_json(
        &json!({
            "file": file.display().to_string(),
            "document_type": document_type,
            "entities": entities,
        }),
        pretty,
    )
}

fn run_init_vocabulary(config: &AppConfig, path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(&config.extraction.vocabulary_path));
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    vocabulary::write_vocabulary(&path, &MedicalVocabulary::default())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Default medical vocabulary written");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    observability::init_tracing_with_config(&config.observability)?;
    info!("{}", config.summary());

    match cli.command {
        Commands::Ingest {
            document_type,
            files,
            pretty,
        } => run_ingest(&config, DocumentType::parse(&document_type), files, pretty).await,
        Commands::Extract {
            document_type,
            file,
            pretty,
        } => run_extract(&config, DocumentType::parse(&document_type), file, pretty),
        Commands::InitVocabulary { path, force } => run_init_vocabulary(&config, path, force),
    }
}
