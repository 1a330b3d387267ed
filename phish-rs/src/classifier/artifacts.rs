//! Persisted classifier state
//!
//! Three JSON files written together after training and read together at
//! startup: the vocabulary, the scaler statistics and the model weights.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use super::model::ScoringModel;
use super::scaler::Scaler;
use super::vocabulary::Vocabulary;
use crate::config::ArtifactConfig;
use crate::error::{Result, ScanError};

/// Everything inference needs, frozen at training time
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub vocabulary: Vocabulary,
    pub scaler: Scaler,
    pub model: ScoringModel,
}

impl Artifacts {
    /// Check the three parts agree with each other
    pub fn validate(&self) -> Result<()> {
        self.model.check_shapes()?;

        let max_words = self.model.config().max_words;
        if self.vocabulary.max_words() != max_words {
            return Err(ScanError::Artifact(format!(
                "vocabulary was built for {} words but the model embeds {}",
                self.vocabulary.max_words(),
                max_words
            )));
        }
        if self.vocabulary.len() >= max_words {
            return Err(ScanError::Artifact(format!(
                "vocabulary holds {} words, more than the embedding table allows",
                self.vocabulary.len()
            )));
        }

        if self
            .scaler
            .std
            .iter()
            .chain(self.scaler.mean.iter())
            .any(|v| !v.is_finite())
            || self.scaler.std.iter().any(|&s| s <= 0.0)
        {
            return Err(ScanError::Artifact(
                "scaler statistics are not usable".to_string(),
            ));
        }

        Ok(())
    }

    pub fn save(&self, config: &ArtifactConfig) -> Result<()> {
        self.validate()?;
        fs::create_dir_all(&config.dir)?;

        write_json(&config.vocabulary_path(), &self.vocabulary)?;
        write_json(&config.scaler_path(), &self.scaler)?;
        write_json(&config.model_path(), &self.model)?;

        info!("Saved classifier artifacts to {}", config.dir.display());
        Ok(())
    }

    /// Load and validate; any missing or inconsistent file is fatal
    pub fn load(config: &ArtifactConfig) -> Result<Self> {
        let artifacts = Self {
            vocabulary: read_json(&config.vocabulary_path())?,
            scaler: read_json(&config.scaler_path())?,
            model: read_json(&config.model_path())?,
        };
        artifacts.validate()?;

        info!(
            "Loaded classifier artifacts from {} ({} words, sequence length {})",
            config.dir.display(),
            artifacts.vocabulary.len(),
            artifacts.model.config().max_len
        );
        Ok(artifacts)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        ScanError::Artifact(format!("cannot open {}: {}", path.display(), e))
    })?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| ScanError::Artifact(format!("cannot parse {}: {}", path.display(), e)))
}
