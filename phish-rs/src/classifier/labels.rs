//! Label enumeration and probability triple
//!
//! The label ↔ index mapping is fixed here and shared by the dataset loader,
//! the model output layer and the decision policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScanError;

/// Message class. Discriminants are the model output indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Normal = 0,
    Spam = 1,
    Phishing = 2,
}

impl Label {
    pub const COUNT: usize = 3;

    /// All labels in output-index order
    pub const ALL: [Label; Label::COUNT] = [Label::Normal, Label::Spam, Label::Phishing];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Label> {
        Label::ALL.get(index).copied()
    }

    /// Report spelling (`NORMAL`, `SPAM`, `PHISHING`)
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Normal => "NORMAL",
            Label::Spam => "SPAM",
            Label::Phishing => "PHISHING",
        }
    }

    /// Dataset spelling (`normal`, `spam`, `phishing`)
    pub fn dataset_name(self) -> &'static str {
        match self {
            Label::Normal => "normal",
            Label::Spam => "spam",
            Label::Phishing => "phishing",
        }
    }

    /// One-hot target row for training
    pub fn one_hot(self) -> [f32; Label::COUNT] {
        let mut row = [0.0; Label::COUNT];
        row[self.index()] = 1.0;
        row
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Label::Normal),
            "spam" => Ok(Label::Spam),
            "phishing" => Ok(Label::Phishing),
            other => Err(ScanError::Dataset(format!("unrecognized label: {:?}", other))),
        }
    }
}

/// Model output `(P_normal, P_spam, P_phishing)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbabilityTriple([f32; Label::COUNT]);

impl ProbabilityTriple {
    pub fn new(normal: f32, spam: f32, phishing: f32) -> Self {
        Self([normal, spam, phishing])
    }

    pub fn get(&self, label: Label) -> f32 {
        self.0[label.index()]
    }

    pub fn normal(&self) -> f32 {
        self.get(Label::Normal)
    }

    pub fn spam(&self) -> f32 {
        self.get(Label::Spam)
    }

    pub fn phishing(&self) -> f32 {
        self.get(Label::Phishing)
    }

    pub fn as_array(&self) -> [f32; Label::COUNT] {
        self.0
    }

    /// Highest-probability label, ties going to the lower index. Training
    /// accuracy uses this; scan decisions go through the policy instead.
    pub fn argmax(&self) -> Label {
        let mut best = Label::Normal;
        for label in Label::ALL {
            if self.get(label) > self.get(best) {
                best = label;
            }
        }
        best
    }
}

impl From<[f32; Label::COUNT]> for ProbabilityTriple {
    fn from(values: [f32; Label::COUNT]) -> Self {
        Self(values)
    }
}

impl fmt::Display for ProbabilityTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NORMAL={:.2}, SPAM={:.2}, PHISHING={:.2}",
            self.normal(),
            self.spam(),
            self.phishing()
        )
    }
}
