//! Threshold decision policy
//!
//! Phishing is checked first, then spam, then the message falls through to
//! normal. This is intentionally not an argmax.

use super::labels::{Label, ProbabilityTriple};
use crate::config::PolicyConfig;

#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionPolicy {
    config: PolicyConfig,
}

impl DecisionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn decide(&self, probs: &ProbabilityTriple) -> Label {
        if probs.phishing() >= self.config.phishing_threshold {
            Label::Phishing
        } else if probs.spam() >= self.config.spam_threshold {
            Label::Spam
        } else {
            Label::Normal
        }
    }
}
