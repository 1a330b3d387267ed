use phish_rs::classifier::{Artifacts, Classifier, DecisionPolicy, Scaler, ScoringModel, Vocabulary};
use phish_rs::config::{GmailConfig, ModelConfig};
use phish_rs::provider::StoredToken;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Print a test banner the same way in every scenario
pub fn banner(name: &str) {
    println!("\n🚀 Starting: {}", name);
    println!("{}", "=".repeat(80));
}

pub fn step(n: usize, message: &str) {
    println!("\n📋 Step {}: {}", n, message);
}

/// Client settings pointing at a mock server
pub fn gmail_config(base_url: &str, token_path: &Path) -> GmailConfig {
    GmailConfig {
        base_url: base_url.to_string(),
        token_url: format!("{}/token", base_url),
        token_path: token_path.to_path_buf(),
        max_retries: 3,
        timeout_seconds: 5,
        ..GmailConfig::default()
    }
}

/// Write a refreshable `token.json`
pub fn write_token(dir: &Path, access_token: &str) -> PathBuf {
    let token = StoredToken {
        access_token: access_token.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: None,
        client_id: Some("client".to_string()),
        client_secret: Some("secret".to_string()),
    };
    let path = dir.join("token.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&token).unwrap()).unwrap();
    path
}

pub fn read_token(path: &Path) -> StoredToken {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// Untrained but valid classifier; scans only need a deterministic scorer
pub fn tiny_classifier() -> Arc<Classifier> {
    let model = ModelConfig {
        max_words: 64,
        max_len: 16,
        embedding_dim: 4,
        lstm_units: 4,
        numeric_units: 4,
        hidden_units: 4,
        ..ModelConfig::default()
    };
    let artifacts = Artifacts {
        vocabulary: Vocabulary::fit(["verify your account", "lunch tomorrow", "claim prize"], 64),
        scaler: Scaler::fit(&[[20.0, 0.0, 1.0, 0.0], [90.0, 4.0, 12.0, 1.0]]).unwrap(),
        model: ScoringModel::new(model, 3),
    };
    Arc::new(Classifier::new(artifacts, DecisionPolicy::default()).unwrap())
}

pub const FAST_BACKOFF: Duration = Duration::from_millis(5);
