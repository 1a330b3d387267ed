//! Gmail REST client
//!
//! `GET /gmail/v1/users/{user}/messages` for listing and
//! `GET /gmail/v1/users/{user}/messages/{id}?format=full` for retrieval.
//! Rate limiting, server errors and timeouts are retried with exponential
//! backoff; a 401 triggers one refresh, then one re-authentication.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::credentials::CredentialProvider;
use super::{MailProvider, MessagePage, ProviderMessage};
use crate::config::GmailConfig;
use crate::error::{Result, ScanError};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(32);

/// Longest body excerpt kept in error messages
const ERROR_BODY_CHARS: usize = 200;

pub struct GmailClient {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
    credentials: Arc<dyn CredentialProvider>,
    max_retries: u32,
    initial_backoff: Duration,
}

/// How far 401 recovery has gone for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthRecovery {
    None,
    Refreshed,
    Reauthenticated,
}

impl GmailClient {
    pub fn new(config: &GmailConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ScanError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
            credentials,
            max_retries: config.max_retries,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// Override the first retry delay (tests use a few milliseconds)
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/gmail/v1/users/{}/messages", self.base_url, self.user_id)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut attempt = 0u32;
        let mut backoff = self.initial_backoff;
        let mut auth = AuthRecovery::None;

        loop {
            let token = self.credentials.access_token().await?;
            let sent = self
                .client
                .get(url)
                .query(query)
                .bearer_auth(&token)
                .header("accept", "application/json")
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    let err = ScanError::from(e);
                    if err.is_retryable() && attempt < self.max_retries {
                        attempt += 1;
                        warn!("GET {} failed ({}), retry {}/{}", url, err, attempt, self.max_retries);
                        sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                auth = self.recover_auth(auth).await?;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if attempt < self.max_retries {
                    attempt += 1;
                    let wait = retry_after(&response).unwrap_or(backoff);
                    warn!(
                        "GET {} returned {}, retry {}/{} in {:?}",
                        url, status, attempt, self.max_retries, wait
                    );
                    sleep(wait).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
                let body = excerpt(response).await;
                return Err(ScanError::transient(format!(
                    "GET {} still failing after {} retries: {} {}",
                    url, attempt, status, body
                )));
            }

            if !status.is_success() {
                let body = excerpt(response).await;
                return Err(ScanError::provider(format!("GET {} failed: {} {}", url, status, body)));
            }

            debug!("GET {} -> {}", url, status);
            return response
                .json::<T>()
                .await
                .map_err(|e| ScanError::provider(format!("invalid response from {}: {}", url, e)));
        }
    }

    /// Refresh once, then re-authenticate once, then give up
    async fn recover_auth(&self, stage: AuthRecovery) -> Result<AuthRecovery> {
        match stage {
            AuthRecovery::None => {
                warn!("Provider rejected the access token, refreshing");
                match self.credentials.refresh().await {
                    Ok(()) => Ok(AuthRecovery::Refreshed),
                    Err(e) => {
                        warn!("Refresh failed ({}), re-authenticating", e);
                        self.credentials.reauthenticate().await?;
                        Ok(AuthRecovery::Reauthenticated)
                    }
                }
            }
            AuthRecovery::Refreshed => {
                warn!("Refreshed token rejected, re-authenticating");
                self.credentials.reauthenticate().await?;
                Ok(AuthRecovery::Reauthenticated)
            }
            AuthRecovery::Reauthenticated => Err(ScanError::Credential(
                "provider rejected credentials after refresh and re-authentication".to_string(),
            )),
        }
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// `Retry-After` in delta-seconds form, capped at the longest backoff
fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_BACKOFF))
}

async fn excerpt(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    body.chars().take(ERROR_BODY_CHARS).collect()
}

#[async_trait]
impl MailProvider for GmailClient {
    async fn list_messages(
        &self,
        labels: &[String],
        max_results: usize,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        let mut query: Vec<(&str, String)> = labels
            .iter()
            .map(|label| ("labelIds", label.clone()))
            .collect();
        query.push(("maxResults", max_results.to_string()));
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        self.get_json(&self.messages_url(), &query).await
    }

    async fn get_message(&self, id: &str) -> Result<ProviderMessage> {
        if id.is_empty() || id.contains('/') {
            return Err(ScanError::provider(format!("invalid message id {:?}", id)));
        }
        let url = format!("{}/{}", self.messages_url(), id);
        self.get_json(&url, &[("format", "full".to_string())]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticCredentials;

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("3"), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("3600"), Some(MAX_BACKOFF));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_messages_url() {
        let config = GmailConfig {
            base_url: "http://127.0.0.1:9000/".to_string(),
            ..GmailConfig::default()
        };
        let client = GmailClient::new(&config, Arc::new(StaticCredentials::new("t"))).unwrap();
        assert_eq!(client.messages_url(), "http://127.0.0.1:9000/gmail/v1/users/me/messages");
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let client =
            GmailClient::new(&GmailConfig::default(), Arc::new(StaticCredentials::new("t"))).unwrap();
        assert!(client.get_message("../labels").await.is_err());
    }
}
