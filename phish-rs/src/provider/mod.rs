//! Remote mailbox access
//!
//! The scanner only sees [`MailProvider`]. [`GmailClient`] talks to the Gmail
//! REST API; [`InMemoryProvider`] serves canned messages for tests and demos.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mime::MessagePart;

pub mod credentials;
pub mod gmail;
pub mod mock;

pub use credentials::{CredentialProvider, CredentialState, FileCredentials, StaticCredentials, StoredToken};
pub use gmail::GmailClient;
pub use mock::{InMemoryProvider, InjectedFailure};

/// Message id as returned by a listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
        }
    }
}

/// One page of a message listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    /// Absent in the provider response when the page is empty
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_size_estimate: Option<u64>,
}

/// Full message as fetched for classification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub payload: MessagePart,
}

/// Mailbox listing and retrieval
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// List up to `max_results` message ids carrying any of `labels`
    async fn list_messages(
        &self,
        labels: &[String],
        max_results: usize,
        page_token: Option<String>,
    ) -> Result<MessagePage>;

    /// Fetch one message with its full payload tree
    async fn get_message(&self, id: &str) -> Result<ProviderMessage>;
}
