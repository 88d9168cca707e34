use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::{error, info};

use cr_common::catalog::{CatalogError, ImportSummary};
use cr_common::config::RecommenderConfig;
use cr_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use cr_common::predictor::riasec::RiasecSource;
use cr_common::predictor::store::ModelStore;
use cr_common::predictor::synthetic::{JsonDatasetSource, SyntheticSource, TrainingSource};
use cr_common::predictor::{ModelKind, ModelTrainer};
use cr_common::{CareerCatalog, PredictorError};
use cr_metrics::TrainingOutcome;

#[derive(Debug, Error)]
enum TrainerError {
    #[error(transparent)]
    Predictor(#[from] PredictorError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("{0}")]
    Config(String),
}

#[derive(Debug, Parser)]
#[command(name = "cr-trainer", about = "Offline training and catalog maintenance")]
struct Cli {
    /// Directory holding persisted classifiers
    #[arg(long, global = true, env = "CR_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Career catalog JSON; the built-in careers are used when unset
    #[arg(long, global = true, env = "CR_CATALOG_PATH")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train a classifier and persist it to the model directory
    Train {
        #[arg(long)]
        kind: ModelKind,
        /// Synthetic samples to generate, or RIASEC rows to keep; ignored with --dataset
        #[arg(long)]
        samples: Option<usize>,
        /// JSON dataset of labelled profiles
        #[arg(long, conflicts_with = "riasec")]
        dataset: Option<PathBuf>,
        /// RIASEC questionnaire export (R1..C8, TIPI1..TIPI10 columns)
        #[arg(long)]
        riasec: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Measure a persisted classifier on fresh synthetic profiles
    Evaluate {
        #[arg(long)]
        kind: ModelKind,
        #[arg(long, default_value_t = 500)]
        samples: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Merge careers from a JSON file into the catalog file
    Import {
        #[arg(long = "from")]
        from: PathBuf,
    },
}

fn load_catalog(path: Option<&Path>) -> Result<CareerCatalog, TrainerError> {
    let catalog = match path {
        Some(path) => CareerCatalog::load_json(path)?,
        None => CareerCatalog::with_defaults(),
    };
    catalog.ensure_not_empty()?;
    Ok(catalog)
}

fn model_store(dir: Option<&Path>) -> Result<ModelStore, TrainerError> {
    dir.map(ModelStore::new).ok_or_else(|| {
        TrainerError::Config("no model directory; pass --model-dir or set CR_MODEL_DIR".into())
    })
}

fn train(
    config: &RecommenderConfig,
    kind: ModelKind,
    source: &dyn TrainingSource,
    seed: Option<u64>,
) -> Result<String, TrainerError> {
    let store = model_store(config.model_dir.as_deref())?;
    let catalog = load_catalog(config.catalog_path.as_deref())?;
    let trainer = ModelTrainer::new(catalog.into(), config.training.clone(), Some(store.clone()));

    let started = Instant::now();
    let model = match trainer.train(kind, source, seed) {
        Ok(model) => model,
        Err(err) => {
            cr_metrics::record_training(kind.name(), TrainingOutcome::Failed, started.elapsed());
            return Err(err.into());
        }
    };
    let path = store.save(&model)?;
    cr_metrics::record_training(kind.name(), TrainingOutcome::Trained, started.elapsed());
    if let Some(accuracy) = model.accuracy {
        cr_metrics::record_model_accuracy(kind.name(), accuracy);
    }

    Ok(format!(
        "trained {kind} run_id={} samples={} accuracy={} path={}",
        model.run_id,
        model.sample_count,
        model
            .accuracy
            .map(|a| format!("{a:.3}"))
            .unwrap_or_else(|| "n/a".into()),
        path.display()
    ))
}

fn evaluate(
    config: &RecommenderConfig,
    kind: ModelKind,
    samples: usize,
    seed: Option<u64>,
) -> Result<String, TrainerError> {
    if samples == 0 {
        return Err(TrainerError::Config("--samples must be positive".into()));
    }
    let store = model_store(config.model_dir.as_deref())?;
    let model = store
        .load(kind)?
        .ok_or_else(|| TrainerError::Predictor(PredictorError::ModelNotTrained(kind)))?;

    let mut rng = StdRng::seed_from_u64(seed.unwrap_or_else(rand::random));
    let held_out = SyntheticSource::new(samples).load(&model.labels, &mut rng)?;
    let accuracy = ModelTrainer::evaluate(&model, &held_out);
    cr_metrics::record_model_accuracy(kind.name(), accuracy);

    info!(%kind, run_id = %model.run_id, samples, accuracy, "evaluated model");
    Ok(format!(
        "evaluated {kind} run_id={} samples={samples} accuracy={accuracy:.3}",
        model.run_id
    ))
}

fn import(catalog_path: Option<&Path>, from: &Path) -> Result<ImportSummary, TrainerError> {
    let target = catalog_path.ok_or_else(|| {
        TrainerError::Config("no catalog file; pass --catalog or set CR_CATALOG_PATH".into())
    })?;

    let incoming = CareerCatalog::load_json(from)?;
    let mut catalog = if target.exists() {
        CareerCatalog::load_json(target)?
    } else {
        CareerCatalog::with_defaults()
    };

    let summary = catalog.import(incoming.records().to_vec());
    catalog.save_json(target)?;
    info!(
        path = %target.display(),
        added = summary.added,
        skipped = summary.skipped,
        careers = catalog.len(),
        "catalog updated"
    );
    Ok(summary)
}

fn run(cli: Cli) -> Result<String, TrainerError> {
    let mut config = RecommenderConfig::from_env();
    config.model_dir = cli.model_dir.or(config.model_dir);
    config.catalog_path = cli.catalog.or(config.catalog_path);

    match cli.command {
        Command::Train {
            kind,
            samples,
            dataset,
            riasec,
            seed,
        } => {
            if samples == Some(0) {
                return Err(TrainerError::Config("--samples must be positive".into()));
            }
            match (dataset, riasec) {
                (Some(path), _) => train(&config, kind, &JsonDatasetSource::new(path), seed),
                (None, Some(path)) => {
                    let source = RiasecSource::new(path).with_sample_size(samples);
                    train(&config, kind, &source, seed)
                }
                (None, None) => {
                    let samples = samples.unwrap_or(config.training.num_samples);
                    train(&config, kind, &SyntheticSource::new(samples), seed)
                }
            }
        }
        Command::Evaluate {
            kind,
            samples,
            seed,
        } => evaluate(&config, kind, samples, seed),
        Command::Import { from } => {
            let summary = import(config.catalog_path.as_deref(), &from)?;
            Ok(serde_json::json!(summary).to_string())
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing_subscriber(env!("CARGO_PKG_NAME"));
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));

    match run(Cli::parse()) {
        Ok(summary) => println!("{summary}"),
        Err(err) => {
            error!(error = %err, "cr-trainer failed");
            std::process::exit(1);
        }
    }
}
