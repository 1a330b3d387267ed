//! In-memory mailbox for testing
//!
//! Page tokens are plain offsets into the message list. Individual messages
//! can be made to fail on fetch.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

use super::{MailProvider, MessagePage, MessageRef, ProviderMessage};
use crate::error::{Result, ScanError};
use crate::mime::{Header, MessagePart, MessagePartBody};

/// Failure returned by `get_message` for a given id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Terminal provider error; the scanner skips the message
    Provider,
    /// Credential error; the scanner aborts
    Credential,
}

#[derive(Default)]
pub struct InMemoryProvider {
    messages: Vec<ProviderMessage>,
    failures: HashMap<String, InjectedFailure>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
    requested_sizes: Mutex<Vec<usize>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: ProviderMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Add a single-part plain text message in `INBOX`
    pub fn with_text_message(self, id: &str, from: &str, subject: &str, body: &str) -> Self {
        self.with_message(text_message(id, from, subject, body))
    }

    pub fn with_failure(mut self, id: &str, failure: InjectedFailure) -> Self {
        self.failures.insert(id.to_string(), failure);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// `max_results` of every listing call so far
    pub fn requested_sizes(&self) -> Vec<usize> {
        self.requested_sizes
            .lock()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }
}

/// Build a provider message whose payload is one base64url text leaf
pub fn text_message(id: &str, from: &str, subject: &str, body: &str) -> ProviderMessage {
    ProviderMessage {
        id: id.to_string(),
        thread_id: Some(id.to_string()),
        label_ids: vec!["INBOX".to_string()],
        snippet: body.chars().take(120).collect(),
        payload: MessagePart {
            mime_type: "text/plain".to_string(),
            headers: vec![Header::new("From", from), Header::new("Subject", subject)],
            body: Some(MessagePartBody {
                size: body.len() as u64,
                data: Some(URL_SAFE_NO_PAD.encode(body)),
                attachment_id: None,
            }),
            ..MessagePart::default()
        },
    }
}

#[async_trait]
impl MailProvider for InMemoryProvider {
    async fn list_messages(
        &self,
        labels: &[String],
        max_results: usize,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sizes) = self.requested_sizes.lock() {
            sizes.push(max_results);
        }

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ScanError::provider(format!("bad page token {:?}", token)))?,
            None => 0,
        };

        let matching: Vec<&ProviderMessage> = self
            .messages
            .iter()
            .filter(|m| labels.is_empty() || m.label_ids.iter().any(|l| labels.contains(l)))
            .collect();

        let end = (offset + max_results).min(matching.len());
        let messages = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect();
        let next_page_token = (end < matching.len()).then(|| end.to_string());

        debug!("Listed offset {} size {} of {}", offset, max_results, matching.len());
        Ok(MessagePage {
            messages,
            next_page_token,
            result_size_estimate: Some(matching.len() as u64),
        })
    }

    async fn get_message(&self, id: &str) -> Result<ProviderMessage> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        match self.failures.get(id) {
            Some(InjectedFailure::Provider) => {
                return Err(ScanError::provider(format!("message {} unavailable", id)))
            }
            Some(InjectedFailure::Credential) => {
                return Err(ScanError::Credential("token revoked".to_string()))
            }
            None => {}
        }

        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| ScanError::provider(format!("message {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailbox(n: usize) -> InMemoryProvider {
        (0..n).fold(InMemoryProvider::new(), |p, i| {
            p.with_text_message(&format!("m{}", i), "a@b.c", "s", "body")
        })
    }

    #[tokio::test]
    async fn test_pages_follow_offsets() {
        let provider = mailbox(5);
        let inbox = vec!["INBOX".to_string()];

        let first = provider.list_messages(&inbox, 2, None).await.unwrap();
        assert_eq!(first.messages.len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let last = provider.list_messages(&inbox, 10, Some("4".to_string())).await.unwrap();
        assert_eq!(last.messages, vec![MessageRef { id: "m4".into(), thread_id: Some("m4".into()) }]);
        assert!(last.next_page_token.is_none());
        assert_eq!(provider.requested_sizes(), vec![2, 10]);
    }

    #[tokio::test]
    async fn test_label_filter() {
        let provider = mailbox(3);
        let page = provider.list_messages(&["SPAM".to_string()], 10, None).await.unwrap();
        assert!(page.messages.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let provider = mailbox(2)
            .with_failure("m0", InjectedFailure::Provider)
            .with_failure("m1", InjectedFailure::Credential);

        assert!(matches!(provider.get_message("m0").await, Err(ScanError::Provider { .. })));
        assert!(provider.get_message("m1").await.unwrap_err().is_session_fatal());
        assert_eq!(provider.get_calls(), 2);
    }
}
