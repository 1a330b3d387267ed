//! phish-rs: email spam/phishing classifier
//!
//! Classifies messages as normal, spam or phishing with a two-branch model
//! (token sequence LSTM plus a handful of numeric text signals), and scans a
//! Gmail mailbox in batches.
//!
//! # Features
//!
//! - **Classification**: deterministic normalization and encoding shared by
//!   training and inference, with a priority threshold decision policy
//! - **Training**: vocabulary, scaler and model fitted from a labeled CSV
//! - **Scanning**: paginated listing, nested payload decoding, bounded
//!   concurrency, per-message fault tolerance
//! - **Reports**: CSV and JSON result files
//!
//! # Example
//!
//! ```no_run
//! use phish_rs::classifier::{Classifier, TextClassifier};
//! use phish_rs::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let classifier = Classifier::load(&config)?;
//!
//!     let result = classifier.classify("Your account has been suspended, verify now")?;
//!     println!("{} ({})", result.label, result.probabilities);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`classifier`]: text pipeline, scoring model, training
//! - [`config`]: configuration management
//! - [`dataset`]: training CSV and synthetic corpus
//! - [`error`]: error types and handling
//! - [`mime`]: provider payload decoding
//! - [`provider`]: mailbox access and credentials
//! - [`scan`]: batch scanning and reports

pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod mime;
pub mod provider;
pub mod scan;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, ScanError};
