use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides, e.g. `PHISH__POLICY__SPAM_THRESHOLD=0.8`
pub const ENV_PREFIX: &str = "PHISH";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub artifacts: ArtifactConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub policy: PolicyConfig,
    pub scan: ScanConfig,
    pub gmail: GmailConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub dir: PathBuf,
    pub model_file: String,
    pub vocabulary_file: String,
    pub scaler_file: String,
}

/// Shape of the scoring model and its text inputs
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Vocabulary cap; also the embedding table height
    pub max_words: usize,
    /// Fixed token sequence length
    pub max_len: usize,
    pub embedding_dim: usize,
    pub lstm_units: usize,
    pub numeric_units: usize,
    pub hidden_units: usize,
    pub dropout: f32,
    pub lstm_dropout: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub dataset_path: PathBuf,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Epochs without validation improvement before stopping
    pub patience: usize,
    pub validation_split: f32,
    pub seed: u64,
}

/// Priority thresholds turning a probability triple into a label
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub phishing_threshold: f32,
    pub spam_threshold: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    pub labels: Vec<String>,
    pub max_results: usize,
    pub page_size: usize,
    pub concurrency: usize,
    pub snippet_chars: usize,
    pub report_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GmailConfig {
    pub base_url: String,
    pub user_id: String,
    pub token_path: PathBuf,
    pub token_url: String,
    pub max_retries: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            model_file: "model.json".to_string(),
            vocabulary_file: "vocabulary.json".to_string(),
            scaler_file: "scaler.json".to_string(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_words: 10_000,
            max_len: 200,
            embedding_dim: 64,
            lstm_units: 64,
            numeric_units: 32,
            hidden_units: 64,
            dropout: 0.3,
            lstm_dropout: 0.2,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("emails.csv"),
            epochs: 15,
            batch_size: 32,
            learning_rate: 1e-3,
            patience: 3,
            validation_split: 0.2,
            seed: 42,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            phishing_threshold: 0.70,
            spam_threshold: 0.65,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            labels: vec!["INBOX".to_string()],
            max_results: 50,
            page_size: 100,
            concurrency: 4,
            snippet_chars: 80,
            report_dir: PathBuf::from("."),
        }
    }
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gmail.googleapis.com".to_string(),
            user_id: "me".to_string(),
            token_path: PathBuf::from("token.json"),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            max_retries: 3,
            timeout_seconds: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ArtifactConfig {
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    pub fn vocabulary_path(&self) -> PathBuf {
        self.dir.join(&self.vocabulary_file)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(&self.scaler_file)
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply `PHISH__*`
    /// environment overrides. Missing keys fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ScanError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("scan.labels"),
        );

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ScanError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Render as TOML, used to seed a config file
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ScanError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.policy;
        for (name, value) in [
            ("policy.phishing_threshold", p.phishing_threshold),
            ("policy.spam_threshold", p.spam_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScanError::Config(format!("{} must be within [0, 1], got {}", name, value)));
            }
        }

        if self.model.max_len == 0 || self.model.max_words < 2 {
            return Err(ScanError::Config(
                "model.max_len must be > 0 and model.max_words >= 2".to_string(),
            ));
        }

        if self.scan.page_size == 0 || self.scan.concurrency == 0 {
            return Err(ScanError::Config(
                "scan.page_size and scan.concurrency must be > 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.training.validation_split) {
            return Err(ScanError::Config(
                "training.validation_split must be within [0, 1)".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_trained_pipeline() {
        let config = Config::default();
        assert_eq!(config.model.max_words, 10_000);
        assert_eq!(config.model.max_len, 200);
        assert_eq!(config.policy.phishing_threshold, 0.70);
        assert_eq!(config.policy.spam_threshold, 0.65);
        assert_eq!(config.scan.page_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[policy]\nspam_threshold = 0.8\n\n[scan]\nlabels = [\"SPAM\"]").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.policy.spam_threshold, 0.8);
        assert_eq!(config.policy.phishing_threshold, 0.70);
        assert_eq!(config.scan.labels, vec!["SPAM".to_string()]);
        assert_eq!(config.model.max_len, 200);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = Config::load(Some(Path::new("/nonexistent/phish.toml"))).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = Config::default();
        config.policy.phishing_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_policy() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.policy, config.policy);
        assert_eq!(parsed.model, config.model);
    }
}
