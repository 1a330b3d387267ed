//! Batch scan: list ids, then fetch, decode and classify with bounded
//! concurrency. A single bad message is logged and skipped; credential
//! failures end the scan.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::paginator::Paginator;
use super::types::{ScanOutcome, ScanRequest, ScanResult, ScanSummary};
use crate::classifier::TextClassifier;
use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::mime::{Payload, PayloadDecoder};
use crate::provider::{MailProvider, MessageRef};

/// Per-message result before aggregation
enum MessageOutcome {
    Classified(ScanResult),
    EmptyBody,
}

pub struct Scanner {
    provider: Arc<dyn MailProvider>,
    classifier: Arc<dyn TextClassifier>,
    decoder: PayloadDecoder,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(
        provider: Arc<dyn MailProvider>,
        classifier: Arc<dyn TextClassifier>,
        config: ScanConfig,
    ) -> Self {
        Self {
            provider,
            classifier,
            decoder: PayloadDecoder::default(),
            config,
        }
    }

    pub fn with_decoder(mut self, decoder: PayloadDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Run one scan session.
    ///
    /// Cancelling `cancel` stops new fetches; messages already in flight are
    /// finished and returned with `summary.cancelled` set.
    pub async fn scan(&self, request: &ScanRequest, cancel: CancellationToken) -> Result<ScanOutcome> {
        let session_id = Uuid::new_v4();
        let span = info_span!("scan", session = %session_id);
        self.run(session_id, request, cancel).instrument(span).await
    }

    async fn run(
        &self,
        session_id: Uuid,
        request: &ScanRequest,
        cancel: CancellationToken,
    ) -> Result<ScanOutcome> {
        let mut summary = ScanSummary::new(session_id, request);
        info!(
            "Scanning labels {:?} (max {} messages)",
            request.labels, request.max_results
        );

        let refs = Paginator::new(self.config.page_size)
            .collect(self.provider.as_ref(), &request.labels, request.max_results, &cancel)
            .await?;
        summary.listed = refs.len();
        info!("Listed {} messages", refs.len());

        let stop = cancel.clone();
        let mut pending = stream::iter(refs.into_iter().enumerate())
            .take_while(move |_| futures::future::ready(!stop.is_cancelled()))
            .map(|(index, message)| async move {
                let outcome = self.process(&message).await;
                (index, message, outcome)
            })
            .buffer_unordered(self.config.concurrency.max(1));

        let mut results: Vec<(usize, ScanResult)> = Vec::new();
        while let Some((index, message, outcome)) = pending.next().await {
            match outcome {
                Ok(MessageOutcome::Classified(result)) => {
                    summary.classified += 1;
                    summary.by_label.add(result.label);
                    results.push((index, result));
                }
                Ok(MessageOutcome::EmptyBody) => {
                    debug!("Message {} has no readable body, skipping", message.id);
                    summary.skipped += 1;
                }
                Err(e) if e.is_session_fatal() => {
                    error!("Aborting scan at message {}: {}", message.id, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Skipping message {}: {}", message.id, e);
                    summary.failed += 1;
                }
            }
        }

        if cancel.is_cancelled() {
            summary.cancelled = true;
            info!("Scan cancelled after {} of {} messages", results.len(), summary.listed);
        }

        results.sort_by_key(|(index, _)| *index);
        let results: Vec<ScanResult> = results.into_iter().map(|(_, r)| r).collect();

        info!(
            "Scan finished: {} classified ({} normal, {} spam, {} phishing), {} skipped, {} failed",
            summary.classified,
            summary.by_label.normal,
            summary.by_label.spam,
            summary.by_label.phishing,
            summary.skipped,
            summary.failed
        );

        Ok(ScanOutcome { results, summary })
    }

    async fn process(&self, message: &MessageRef) -> Result<MessageOutcome> {
        let fetched = self.provider.get_message(&message.id).await?;

        let payload = Payload::from(&fetched.payload);
        let body = self.decoder.decode(&payload);
        if body.trim().is_empty() {
            return Ok(MessageOutcome::EmptyBody);
        }

        let classification = self.classifier.classify(&body).map_err(|e| match e {
            ScanError::Credential(_) | ScanError::Cancelled => e,
            other => ScanError::Decode(format!("classification failed: {}", other)),
        })?;

        Ok(MessageOutcome::Classified(ScanResult {
            email_id: message.id.clone(),
            from: self.decoder.header(&payload, "From").to_string(),
            subject: self.decoder.header(&payload, "Subject").to_string(),
            snippet: fetched.snippet.chars().take(self.config.snippet_chars).collect(),
            prediction_probs: classification.probabilities,
            label: classification.label,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classification, Label, ProbabilityTriple};
    use crate::mime::MessagePart;
    use crate::provider::{InMemoryProvider, InjectedFailure, ProviderMessage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Labels by keyword so expectations stay readable
    struct KeywordClassifier {
        calls: AtomicUsize,
    }

    impl KeywordClassifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl TextClassifier for KeywordClassifier {
        fn classify(&self, text: &str) -> Result<Classification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (probs, label) = if text.contains("verify") {
                (ProbabilityTriple::new(0.05, 0.05, 0.9), Label::Phishing)
            } else if text.contains("WIN") {
                (ProbabilityTriple::new(0.1, 0.8, 0.1), Label::Spam)
            } else {
                (ProbabilityTriple::new(0.9, 0.05, 0.05), Label::Normal)
            };
            Ok(Classification {
                probabilities: probs,
                label,
            })
        }
    }

    fn request(max: usize) -> ScanRequest {
        ScanRequest::new(vec!["INBOX".to_string()], max)
    }

    fn scanner(provider: InMemoryProvider, classifier: Arc<KeywordClassifier>) -> Scanner {
        Scanner::new(Arc::new(provider), classifier, ScanConfig::default())
    }

    fn undecodable(id: &str) -> ProviderMessage {
        ProviderMessage {
            id: id.to_string(),
            label_ids: vec!["INBOX".to_string()],
            payload: MessagePart {
                mime_type: "multipart/mixed".to_string(),
                parts: vec![MessagePart::default()],
                ..MessagePart::default()
            },
            ..ProviderMessage::default()
        }
    }

    #[tokio::test]
    async fn test_undecodable_message_skipped() {
        let provider = InMemoryProvider::new()
            .with_text_message("a", "boss@corp.com", "Agenda", "Meeting at 10")
            .with_message(undecodable("b"))
            .with_text_message("c", "security@x.cc", "Alert", "Please verify your account");
        let classifier = KeywordClassifier::new();

        let outcome = scanner(provider, classifier.clone())
            .scan(&request(10), CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = outcome.results.iter().map(|r| r.email_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(outcome.results[0].from, "boss@corp.com");
        assert_eq!(outcome.results[1].label, Label::Phishing);
        assert_eq!(outcome.summary.listed, 3);
        assert_eq!(outcome.summary.skipped, 1);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_skipped() {
        let provider = InMemoryProvider::new()
            .with_text_message("a", "x@y.z", "1", "hello")
            .with_text_message("b", "x@y.z", "2", "WIN NOW")
            .with_failure("a", InjectedFailure::Provider);

        let outcome = scanner(provider, KeywordClassifier::new())
            .scan(&request(10), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].label, Label::Spam);
        assert_eq!(outcome.summary.failed, 1);
        assert_eq!(outcome.summary.by_label.get(Label::Spam), 1);
    }

    #[tokio::test]
    async fn test_credential_failure_aborts() {
        let provider = InMemoryProvider::new()
            .with_text_message("a", "x@y.z", "1", "hello")
            .with_failure("a", InjectedFailure::Credential);

        let result = scanner(provider, KeywordClassifier::new())
            .scan(&request(10), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ScanError::Credential(_))));
    }

    #[tokio::test]
    async fn test_snippet_truncated_to_80_chars() {
        let body = "x".repeat(200);
        let provider = InMemoryProvider::new().with_text_message("a", "x@y.z", "s", &body);

        let outcome = scanner(provider, KeywordClassifier::new())
            .scan(&request(1), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.results[0].snippet.chars().count(), 80);
    }

    #[tokio::test]
    async fn test_results_keep_listing_order() {
        let provider = (0..20).fold(InMemoryProvider::new(), |p, i| {
            p.with_text_message(&format!("m{:02}", i), "x@y.z", "s", "hello")
        });

        let outcome = scanner(provider, KeywordClassifier::new())
            .scan(&request(20), CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<String> = outcome.results.iter().map(|r| r.email_id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    /// Requests cancellation the first time it runs
    struct CancellingClassifier {
        cancel: CancellationToken,
    }

    impl TextClassifier for CancellingClassifier {
        fn classify(&self, _text: &str) -> Result<Classification> {
            self.cancel.cancel();
            Ok(Classification {
                probabilities: ProbabilityTriple::new(1.0, 0.0, 0.0),
                label: Label::Normal,
            })
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_scan_keeps_finished_results() {
        let provider = Arc::new((0..5).fold(InMemoryProvider::new(), |p, i| {
            p.with_text_message(&format!("m{}", i), "x@y.z", "s", "hello")
        }));
        let cancel = CancellationToken::new();
        let classifier = Arc::new(CancellingClassifier {
            cancel: cancel.clone(),
        });
        let config = ScanConfig {
            concurrency: 1,
            ..ScanConfig::default()
        };

        let outcome = Scanner::new(provider.clone(), classifier, config)
            .scan(&request(5), cancel)
            .await
            .unwrap();

        assert!(outcome.summary.cancelled);
        assert_eq!(outcome.summary.listed, 5);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(provider.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_scan_fetches_nothing_new() {
        let provider = Arc::new(
            InMemoryProvider::new()
                .with_text_message("a", "x@y.z", "1", "hello")
                .with_text_message("b", "x@y.z", "2", "hello"),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let scanner = Scanner::new(provider.clone(), KeywordClassifier::new(), ScanConfig::default());
        let result = scanner.scan(&request(10), cancel).await;

        assert!(matches!(result, Err(ScanError::Cancelled)));
        assert_eq!(provider.get_calls(), 0);
    }
}
