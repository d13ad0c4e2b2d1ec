//! triad CLI: train, evaluate and query the Iris classifiers.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use triad_iris::cache::ModelCache;
use triad_iris::client::TriadClient;
use triad_iris::config::Settings;
use triad_iris::dataset::Dataset;
use triad_iris::error::ModelError;
use triad_iris::evaluation;
use triad_iris::model::{ModelChoice, ModelKind};
use triad_iris::paths::TriadPaths;
use triad_iris::predictor::Predictor;
use triad_iris::store::ArtifactStore;
use triad_iris::validate::RawFeature;

#[derive(Parser)]
#[command(name = "triad", version, about = "Iris classifier: train, evaluate, predict")]
struct Cli {
    /// Directory holding model artifacts (overrides config and TRIAD_MODEL_DIR).
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/triad-iris/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train models, persist them, and report holdout accuracy.
    Train {
        /// knn, forest or all.
        #[arg(long, default_value = "all")]
        model: String,

        /// Train on this CSV instead of the embedded dataset.
        #[arg(long)]
        data: Option<PathBuf>,

        #[arg(long, default_value_t = 0.2)]
        test_size: f64,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Classify one flower.
    Predict {
        /// auto, knn or forest.
        #[arg(long, default_value = "auto")]
        model: String,

        /// sepal_length sepal_width petal_length petal_width
        #[arg(num_args = 4, required = true, allow_negative_numbers = true)]
        features: Vec<String>,

        /// Query a running triad-irisd instead of predicting locally.
        #[arg(long)]
        server: Option<String>,

        /// Print the /ml/predict response shape.
        #[arg(long)]
        detailed: bool,
    },

    /// Holdout accuracy, confusion matrix and cross-validation.
    Evaluate {
        /// knn, forest or all.
        #[arg(long, default_value = "all")]
        model: String,

        #[arg(long)]
        data: Option<PathBuf>,

        #[arg(long, default_value_t = 0.2)]
        test_size: f64,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 5)]
        folds: usize,
    },

    /// Search n_neighbors for KNN by cross-validation on the training split.
    TuneK {
        #[arg(long, default_value_t = 20)]
        max_k: usize,

        #[arg(long, default_value_t = 5)]
        folds: usize,

        #[arg(long, default_value_t = 0.2)]
        test_size: f64,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Show paths, configuration and artifact status.
    Info,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Settings {
        config,
        config_file: config_path,
        model_dir,
    } = Settings::resolve(cli.config.as_deref(), cli.model_dir.as_deref())?;

    match cli.command {
        Commands::Train {
            model,
            data,
            test_size,
            seed,
        } => {
            let dataset = load_dataset(data.as_deref())?;
            let cache = ModelCache::with_dataset(
                ArtifactStore::new(&model_dir),
                config.model_params(),
                dataset.clone(),
            );
            for kind in select_kinds(&model)? {
                let trained = cache.retrain(kind)?;
                let report =
                    evaluation::evaluate(kind, cache.params(), &dataset, test_size, seed, None)?;
                println!("{}", trained.summary());
                println!(
                    "  saved to:         {}",
                    cache.store().path_for(kind).display()
                );
                println!(
                    "  holdout accuracy: {:.4} ({} test samples)",
                    report.accuracy, report.test_size
                );
            }
        }

        Commands::Predict {
            model,
            features,
            server,
            detailed,
        } => {
            let choice: ModelChoice = model.parse()?;
            let raw: Vec<RawFeature> = features
                .iter()
                .map(|f| RawFeature::from(f.as_str()))
                .collect();
            let client = match server {
                Some(url) => TriadClient::remote(&url),
                None => TriadClient::local(Predictor::from_config(&config, &model_dir)?),
            };
            let json = if detailed {
                serde_json::to_string_pretty(&client.predict_detailed(choice, raw)?)
            } else {
                serde_json::to_string_pretty(&client.predict(choice.resolve(), raw)?)
            }
            .into_diagnostic()?;
            println!("{json}");
        }

        Commands::Evaluate {
            model,
            data,
            test_size,
            seed,
            folds,
        } => {
            let dataset = load_dataset(data.as_deref())?;
            let params = config.model_params();
            for kind in select_kinds(&model)? {
                let report =
                    evaluation::evaluate(kind, &params, &dataset, test_size, seed, Some(folds))?;
                println!("{report}");
            }
        }

        Commands::TuneK {
            max_k,
            folds,
            test_size,
            seed,
            data,
        } => {
            let dataset = load_dataset(data.as_deref())?;
            let (train, _) = evaluation::train_test_split(&dataset, test_size, seed)?;
            let result = evaluation::tune_k(&train, 1..=max_k, folds)?;
            for (k, score) in &result.scores {
                let marker = if *k == result.best_k { " *" } else { "" };
                println!("k={k:<3} cv accuracy {score:.4}{marker}");
            }
            println!(
                "best k: {} (cv accuracy {:.4})",
                result.best_k, result.best_score
            );
        }

        Commands::Info => {
            let store = ArtifactStore::new(&model_dir);
            println!("config file: {}", config_path.display());
            match TriadPaths::resolve() {
                Ok(paths) => {
                    println!("data dir:    {}", paths.data_dir.display());
                    println!("state dir:   {}", paths.state_dir.display());
                }
                Err(e) => println!("data dir:    unavailable ({e})"),
            }
            println!("model dir:   {}", model_dir.display());
            println!("server:      {}", config.server.addr());
            for kind in ModelKind::ALL {
                let status = match store.load(kind) {
                    Ok(Some(m)) => {
                        format!("{} (trained {})", m.summary(), m.trained_at.to_rfc3339())
                    }
                    Ok(None) => "not trained".to_string(),
                    Err(e) => format!("unusable: {e}"),
                };
                println!("  {kind:<7} {status}");
            }
            println!("\n# effective configuration");
            print!("{}", toml::to_string_pretty(&config).into_diagnostic()?);
        }
    }

    Ok(())
}

fn load_dataset(path: Option<&Path>) -> Result<Dataset> {
    let dataset = match path {
        Some(p) => Dataset::from_csv_path(p)?,
        None => Dataset::iris()?,
    };
    Ok(dataset)
}

/// `all` expands to every kind; `auto` means the forest.
fn select_kinds(name: &str) -> Result<Vec<ModelKind>, ModelError> {
    if name.eq_ignore_ascii_case("all") {
        return Ok(ModelKind::ALL.to_vec());
    }
    let choice: ModelChoice = name.parse()?;
    Ok(vec![choice.resolve()])
}
