//! phish-rs command line
//!
//! # Usage
//!
//! ```bash
//! # Generate a synthetic training set
//! phish-rs generate --output emails.csv --count 5000
//!
//! # Train and write artifacts/{model,vocabulary,scaler}.json
//! phish-rs train --dataset emails.csv
//!
//! # Classify one message
//! phish-rs classify --text "Your account has been suspended"
//!
//! # Scan INBOX and SPAM, at most 200 messages
//! phish-rs scan --labels 1,6 --max 200
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use phish_rs::classifier::{Classifier, Label, TextClassifier, Trainer};
use phish_rs::config::{Config, LoggingConfig};
use phish_rs::dataset::{load_dataset, write_dataset, DatasetGenerator};
use phish_rs::provider::{CredentialProvider, CredentialState, FileCredentials, GmailClient};
use phish_rs::scan::{resolve_labels, ReportWriter, ScanRequest, ScanResult, Scanner};

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "phish.toml";

#[derive(Parser)]
#[command(name = "phish-rs")]
#[command(about = "Classify email as normal, spam or phishing", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic labeled dataset
    Generate {
        /// Output CSV (defaults to training.dataset_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of messages
        #[arg(short = 'n', long, default_value_t = 5000)]
        count: usize,
        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Train the classifier and save its artifacts
    Train {
        /// Labeled CSV (defaults to training.dataset_path)
        #[arg(short, long)]
        dataset: Option<PathBuf>,
    },
    /// Classify a single message body
    Classify {
        /// Message text
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,
        /// Read the message from a file ("-" for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Scan a Gmail mailbox
    Scan {
        /// Comma separated label ids or shortcuts: 1 INBOX, 2 PERSONAL,
        /// 3 SOCIAL, 4 PROMOTIONS, 5 UPDATES, 6 SPAM
        #[arg(short, long)]
        labels: Option<String>,
        /// Maximum number of messages to scan
        #[arg(short, long)]
        max: Option<usize>,
        /// Do not write scan_results.csv / scan_results.json
        #[arg(long)]
        no_report: bool,
    },
    /// Print the default configuration as TOML
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig = cli.command {
        print!("{}", Config::default().to_toml()?);
        return Ok(());
    }

    let config_path = cli.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });
    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;

    init_tracing(&config.logging)?;
    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    match cli.command {
        Commands::Generate {
            output,
            count,
            seed,
        } => generate(&config, output, count, seed),
        Commands::Train { dataset } => train(&config, dataset).await,
        Commands::Classify { text, file } => classify(&config, text, file),
        Commands::Scan {
            labels,
            max,
            no_report,
        } => scan(&config, labels, max, no_report).await,
        Commands::InitConfig => Ok(()),
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("invalid log level")?;
    let builder = FmtSubscriber::builder().with_env_filter(filter);

    let installed = match logging.format.as_str() {
        "json" => tracing::subscriber::set_global_default(builder.json().finish()),
        _ => tracing::subscriber::set_global_default(builder.pretty().finish()),
    };
    installed.context("failed to set tracing subscriber")
}

fn generate(config: &Config, output: Option<PathBuf>, count: usize, seed: u64) -> Result<()> {
    let path = output.unwrap_or_else(|| config.training.dataset_path.clone());
    let records = DatasetGenerator::new(seed).generate(count);
    write_dataset(&path, &records)?;

    let share = |label: Label| records.iter().filter(|r| r.label == label).count();
    println!(
        "✓ Wrote {} messages to {} ({} normal, {} spam, {} phishing)",
        records.len(),
        path.display(),
        share(Label::Normal),
        share(Label::Spam),
        share(Label::Phishing)
    );
    Ok(())
}

async fn train(config: &Config, dataset: Option<PathBuf>) -> Result<()> {
    let path = dataset.unwrap_or_else(|| config.training.dataset_path.clone());
    let records = load_dataset(&path)?;

    let trainer = Trainer::new(config.model.clone(), config.training.clone());
    let (artifacts, report) = tokio::task::spawn_blocking(move || trainer.train(&records))
        .await
        .context("training task failed")??;

    artifacts.save(&config.artifacts)?;

    if let Some(best) = report.best() {
        println!(
            "✓ Best epoch {}/{}: val_loss {} val_accuracy {}",
            best.epoch,
            report.epochs.len(),
            best.val_loss.map_or("n/a".to_string(), |v| format!("{:.4}", v)),
            best.val_accuracy.map_or("n/a".to_string(), |v| format!("{:.4}", v)),
        );
    }
    println!("✓ Model saved to {}", config.artifacts.model_path().display());
    println!("✓ Vocabulary saved to {}", config.artifacts.vocabulary_path().display());
    println!("✓ Scaler saved to {}", config.artifacts.scaler_path().display());
    Ok(())
}

fn classify(config: &Config, text: Option<String>, file: Option<PathBuf>) -> Result<()> {
    let body = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) if path == Path::new("-") => read_stdin()?,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?,
        (None, None) => read_stdin()?,
    };
    if body.trim().is_empty() {
        bail!("message text is empty");
    }

    let classifier = Classifier::load(config)?;
    let result = classifier.classify(&body)?;
    println!("Result   : {} (Prob: {})", colored_label(result.label), result.probabilities);
    Ok(())
}

async fn scan(config: &Config, labels: Option<String>, max: Option<usize>, no_report: bool) -> Result<()> {
    let labels = labels
        .map(|selection| resolve_labels(&selection))
        .unwrap_or_else(|| config.scan.labels.clone());
    let max_results = max.unwrap_or(config.scan.max_results);
    if max_results == 0 {
        bail!("--max must be a positive number");
    }

    let classifier = Arc::new(Classifier::load(config)?);

    let credentials = Arc::new(FileCredentials::open(&config.gmail.token_path, &config.gmail.token_url)?);
    if credentials.state().await == CredentialState::Absent {
        bail!(
            "no OAuth token at {}; complete the Gmail consent flow and save the token there",
            config.gmail.token_path.display()
        );
    }
    let provider = Arc::new(GmailClient::new(&config.gmail, credentials)?);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight messages");
            ctrl_c.cancel();
        }
    });

    println!("\nScanning label: {:?} ... (max {} email)", labels, max_results);
    let scanner = Scanner::new(provider, classifier, config.scan.clone());
    let outcome = scanner.scan(&ScanRequest::new(labels, max_results), cancel).await?;

    println!("\nTotal email listed: {}", outcome.summary.listed);
    for result in &outcome.results {
        print_result(result);
    }

    let summary = &outcome.summary;
    println!(
        "\n{} classified: {} normal, {} spam, {} phishing ({} skipped, {} failed)",
        summary.classified,
        summary.by_label.normal.to_string().green(),
        summary.by_label.spam.to_string().yellow(),
        summary.by_label.phishing.to_string().red(),
        summary.skipped,
        summary.failed
    );
    if summary.cancelled {
        println!("Scan was interrupted; results above are partial.");
    }

    if !no_report {
        if let Some(paths) = ReportWriter::new(&config.scan.report_dir).write(&outcome.results)? {
            println!(
                "\nResults saved to: {} & {}",
                paths.csv.display(),
                paths.json.display()
            );
        }
    }
    Ok(())
}

fn print_result(result: &ScanResult) {
    println!("\n===============================");
    println!("Email ID : {}", result.email_id);
    println!("From     : {}", result.from);
    println!("Subject  : {}", result.subject);
    println!("Snippet  : {}", result.snippet);
    println!(
        "Result   : {} (Prob: {})",
        colored_label(result.label),
        result.prediction_probs
    );
}

fn colored_label(label: Label) -> ColoredString {
    match label {
        Label::Normal => label.as_str().green(),
        Label::Spam => label.as_str().yellow(),
        Label::Phishing => label.as_str().red(),
    }
}

fn read_stdin() -> Result<String> {
    let mut body = String::new();
    std::io::stdin()
        .read_to_string(&mut body)
        .context("cannot read message from stdin")?;
    Ok(body)
}
