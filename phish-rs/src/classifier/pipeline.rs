//! Inference pipeline: raw text → probability triple → label

use serde::Serialize;
use tracing::debug;

use super::artifacts::Artifacts;
use super::features::{extract, FeatureVector};
use super::labels::{Label, ProbabilityTriple};
use super::normalize::normalize;
use super::policy::DecisionPolicy;
use crate::config::Config;
use crate::error::{Result, ScanError};

/// Result of classifying one message body
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub probabilities: ProbabilityTriple,
    pub label: Label,
}

/// Anything that can turn message text into a classification
pub trait TextClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Classification>;
}

/// Loaded artifacts plus the decision policy. Read-only after construction,
/// so one instance can be shared across scan workers.
#[derive(Debug, Clone)]
pub struct Classifier {
    artifacts: Artifacts,
    policy: DecisionPolicy,
}

impl Classifier {
    pub fn new(artifacts: Artifacts, policy: DecisionPolicy) -> Result<Self> {
        artifacts.validate()?;
        Ok(Self { artifacts, policy })
    }

    /// Load artifacts from the configured directory
    pub fn load(config: &Config) -> Result<Self> {
        let artifacts = Artifacts::load(&config.artifacts)?;

        let trained_len = artifacts.model.config().max_len;
        if trained_len != config.model.max_len {
            return Err(ScanError::Config(format!(
                "model.max_len is {} but the artifacts were trained with {}",
                config.model.max_len, trained_len
            )));
        }

        Self::new(artifacts, DecisionPolicy::new(config.policy))
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Model inputs for raw text: padded token ids and scaled features
    pub fn prepare(&self, raw: &str) -> (Vec<u32>, FeatureVector) {
        let max_len = self.artifacts.model.config().max_len;
        let sequence = self.artifacts.vocabulary.encode(&normalize(raw), max_len);
        let numeric = self.artifacts.scaler.transform(&extract(raw));
        (sequence, numeric)
    }

    pub fn probabilities(&self, raw: &str) -> Result<ProbabilityTriple> {
        let (sequence, numeric) = self.prepare(raw);
        self.artifacts.model.predict(&sequence, &numeric)
    }
}

impl TextClassifier for Classifier {
    fn classify(&self, text: &str) -> Result<Classification> {
        let probabilities = self.probabilities(text)?;
        let label = self.policy.decide(&probabilities);
        debug!("Classified as {} ({})", label, probabilities);
        Ok(Classification {
            probabilities,
            label,
        })
    }
}
