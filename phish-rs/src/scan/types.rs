use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::{Label, ProbabilityTriple};

/// Shortcut keys accepted wherever labels are selected
pub const LABEL_SHORTCUTS: [(&str, &str); 6] = [
    ("1", "INBOX"),
    ("2", "CATEGORY_PERSONAL"),
    ("3", "CATEGORY_SOCIAL"),
    ("4", "CATEGORY_PROMOTIONS"),
    ("5", "CATEGORY_UPDATES"),
    ("6", "SPAM"),
];

pub const DEFAULT_LABEL: &str = "INBOX";

/// Resolve a comma separated selection such as `"1,4"` or `"INBOX,SPAM"`.
///
/// Digits map through [`LABEL_SHORTCUTS`]; unknown digits are ignored; other
/// tokens are taken as label ids. An empty selection means `INBOX`.
pub fn resolve_labels(selection: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();

    for token in selection.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let label = if token.chars().all(|c| c.is_ascii_digit()) {
            match LABEL_SHORTCUTS.iter().find(|(key, _)| *key == token) {
                Some((_, label)) => label.to_string(),
                None => continue,
            }
        } else {
            token.to_string()
        };
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    if labels.is_empty() {
        labels.push(DEFAULT_LABEL.to_string());
    }
    labels
}

/// What to scan
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub labels: Vec<String>,
    /// Upper bound on messages listed
    pub max_results: usize,
}

impl ScanRequest {
    pub fn new(labels: Vec<String>, max_results: usize) -> Self {
        Self {
            labels,
            max_results,
        }
    }
}

/// One classified message, in report layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub email_id: String,
    pub from: String,
    pub subject: String,
    pub snippet: String,
    pub prediction_probs: ProbabilityTriple,
    pub label: Label,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelCounts {
    pub normal: usize,
    pub spam: usize,
    pub phishing: usize,
}

impl LabelCounts {
    pub fn add(&mut self, label: Label) {
        match label {
            Label::Normal => self.normal += 1,
            Label::Spam => self.spam += 1,
            Label::Phishing => self.phishing += 1,
        }
    }

    pub fn get(&self, label: Label) -> usize {
        match label {
            Label::Normal => self.normal,
            Label::Spam => self.spam,
            Label::Phishing => self.phishing,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub session_id: Uuid,
    pub labels: Vec<String>,
    pub requested: usize,
    pub listed: usize,
    pub classified: usize,
    /// Messages without a readable body
    pub skipped: usize,
    /// Messages that could not be fetched, decoded or classified
    pub failed: usize,
    pub cancelled: bool,
    pub by_label: LabelCounts,
}

impl ScanSummary {
    pub fn new(session_id: Uuid, request: &ScanRequest) -> Self {
        Self {
            session_id,
            labels: request.labels.clone(),
            requested: request.max_results,
            listed: 0,
            classified: 0,
            skipped: 0,
            failed: 0,
            cancelled: false,
            by_label: LabelCounts::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Classified messages in listing order
    pub results: Vec<ScanResult>,
    pub summary: ScanSummary,
}
