use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, ScanError};
use crate::provider::{MailProvider, MessageRef};

/// Largest page the provider accepts
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Collects message ids across listing pages up to a total bound
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    page_size: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Stops at `max_total`, on an empty page or on a missing continuation
    /// token. Cancellation before the listing completes is an error since
    /// there is nothing to process yet.
    pub async fn collect(
        &self,
        provider: &dyn MailProvider,
        labels: &[String],
        max_total: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<MessageRef>> {
        let mut refs: Vec<MessageRef> = Vec::new();
        let mut page_token: Option<String> = None;

        while refs.len() < max_total {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let request = self.page_size.min(max_total - refs.len());
            let page = provider
                .list_messages(labels, request, page_token.take())
                .await?;

            if page.messages.is_empty() {
                debug!("Empty page, listing exhausted");
                break;
            }

            let remaining = max_total - refs.len();
            refs.extend(page.messages.into_iter().take(remaining));
            debug!("Listed {} of at most {} ids", refs.len(), max_total);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(refs)
    }
}
