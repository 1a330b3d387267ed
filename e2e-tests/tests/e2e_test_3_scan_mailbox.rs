// E2E Test 3: Full mailbox scan
// Gmail mock → GmailClient → Scanner → classifier → report files

mod e2e;

use e2e::gmail_server::MockGmail;
use e2e::helpers::{banner, gmail_config, step, tiny_classifier, write_token, FAST_BACKOFF};
use phish_rs::config::ScanConfig;
use phish_rs::provider::mock::text_message;
use phish_rs::provider::{FileCredentials, GmailClient, ProviderMessage, StoredToken};
use phish_rs::scan::{resolve_labels, ReportWriter, ScanRequest, Scanner};
use phish_rs::ScanError;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

fn spam_folder(id: &str) -> ProviderMessage {
    let mut message = text_message(id, "promo@deals.xyz", "WIN!!!", "CONGRATULATIONS claim prize now http://reward.claim");
    message.label_ids = vec!["SPAM".to_string()];
    message
}

fn no_body(id: &str) -> ProviderMessage {
    let mut message = text_message(id, "a@b.c", "empty", "");
    message.payload.body = None;
    message
}

async fn scanner(gmail: Arc<MockGmail>, dir: &std::path::Path, config: ScanConfig) -> Scanner {
    let base_url = gmail.spawn().await;
    let token_path = write_token(dir, "live");
    let gmail_config = gmail_config(&base_url, &token_path);
    let credentials = Arc::new(FileCredentials::open(&token_path, &gmail_config.token_url).unwrap());
    let client = GmailClient::new(&gmail_config, credentials)
        .unwrap()
        .with_initial_backoff(FAST_BACKOFF);
    Scanner::new(Arc::new(client), tiny_classifier(), config)
}

#[tokio::test]
async fn test_e2e_3_scan_inbox_and_spam() {
    let start = Instant::now();
    banner("E2E Test 3: Scan INBOX and SPAM");
    let dir = tempfile::tempdir().unwrap();

    let gmail = Arc::new(
        MockGmail::new("live")
            .with_message(text_message("i1", "boss@corp.com", "Agenda", "Lunch tomorrow at noon"))
            .with_message(no_body("i2"))
            .with_message(text_message("i3", "it@corp.com", "Password", "Please verify your account"))
            .with_message(spam_folder("s1"))
            .with_message(text_message("i4", "x@y.z", "Broken", "never served"))
            .with_broken_message("i4"),
    );

    step(1, "Resolving label shortcuts 1,6");
    let labels = resolve_labels("1,6");
    assert_eq!(labels, vec!["INBOX".to_string(), "SPAM".to_string()]);

    step(2, "Scanning");
    let config = ScanConfig {
        concurrency: 2,
        report_dir: dir.path().join("reports"),
        ..ScanConfig::default()
    };
    let report_dir = config.report_dir.clone();
    let scanner = scanner(gmail.clone(), dir.path(), config).await;
    let outcome = scanner
        .scan(&ScanRequest::new(labels, 50), CancellationToken::new())
        .await
        .unwrap();

    let summary = &outcome.summary;
    assert_eq!(summary.listed, 5);
    assert_eq!(summary.classified, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 1);
    assert!(!summary.cancelled);
    assert_eq!(
        summary.by_label.normal + summary.by_label.spam + summary.by_label.phishing,
        3
    );

    let ids: Vec<&str> = outcome.results.iter().map(|r| r.email_id.as_str()).collect();
    assert_eq!(ids, vec!["i1", "i3", "s1"]);
    assert_eq!(outcome.results[0].from, "boss@corp.com");
    assert_eq!(outcome.results[2].subject, "WIN!!!");
    for result in &outcome.results {
        let sum: f32 = result.prediction_probs.as_array().iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    step(3, "Writing reports");
    let paths = ReportWriter::new(&report_dir)
        .write(&outcome.results)
        .unwrap()
        .unwrap();
    assert!(paths.csv.exists());
    assert!(paths.json.exists());

    println!("✅ Scan finished in {:?}", start.elapsed());
}

#[tokio::test]
async fn test_e2e_3_max_results_bounds_fetches() {
    banner("E2E Test 3: max_results");
    let dir = tempfile::tempdir().unwrap();
    let gmail = Arc::new((0..40).fold(MockGmail::new("live"), |g, i| {
        g.with_message(text_message(&format!("m{:02}", i), "a@b.c", "s", "status update"))
    }));

    let config = ScanConfig {
        page_size: 15,
        ..ScanConfig::default()
    };
    let scanner = scanner(gmail.clone(), dir.path(), config).await;
    let outcome = scanner
        .scan(&ScanRequest::new(vec!["INBOX".to_string()], 25), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 25);
    assert_eq!(gmail.list_sizes(), vec![15, 10]);
    assert_eq!(gmail.get_calls(), 25);
}

#[tokio::test]
async fn test_e2e_3_recoverable_rotation_refreshes_once() {
    banner("E2E Test 3: Token rotated before scan");
    let dir = tempfile::tempdir().unwrap();
    let gmail = Arc::new(
        MockGmail::new("live").with_message(text_message("m1", "a@b.c", "s", "hello there")),
    );
    let scanner = scanner(gmail.clone(), dir.path(), ScanConfig::default()).await;

    gmail.rotate_token("rotated-elsewhere");
    let outcome = scanner
        .scan(&ScanRequest::new(vec!["INBOX".to_string()], 5), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(gmail.refresh_calls(), 1);
}

#[tokio::test]
async fn test_e2e_3_unrefreshable_token_aborts_scan() {
    banner("E2E Test 3: Unrecoverable credentials");
    let dir = tempfile::tempdir().unwrap();
    let gmail = Arc::new(
        MockGmail::new("live").with_message(text_message("m1", "a@b.c", "s", "hello there")),
    );
    let base_url = gmail.clone().spawn().await;

    let token_path = dir.path().join("token.json");
    let token = StoredToken {
        access_token: "stale".to_string(),
        refresh_token: None,
        expires_at: None,
        client_id: None,
        client_secret: None,
    };
    std::fs::write(&token_path, serde_json::to_vec(&token).unwrap()).unwrap();

    let config = gmail_config(&base_url, &token_path);
    let credentials = Arc::new(FileCredentials::open(&token_path, &config.token_url).unwrap());
    let client = GmailClient::new(&config, credentials).unwrap();

    let result = Scanner::new(Arc::new(client), tiny_classifier(), ScanConfig::default())
        .scan(&ScanRequest::new(vec!["INBOX".to_string()], 5), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(ScanError::Credential(_))));
    assert_eq!(gmail.get_calls(), 0);
}
