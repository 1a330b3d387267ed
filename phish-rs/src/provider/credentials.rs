//! OAuth credential lifecycle
//!
//! States: `Absent → Valid ⇄ Expired`, and `Invalid` once the token endpoint
//! rejects a refresh. Re-authentication re-reads the token file, which the
//! interactive consent flow (outside this crate) rewrites.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, ScanError};

/// Seconds before expiry at which a token is already treated as expired
const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    Absent,
    Valid,
    Expired,
    Invalid,
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn state(&self) -> CredentialState;

    /// Current bearer token, refreshing first if it has expired
    async fn access_token(&self) -> Result<String>;

    async fn refresh(&self) -> Result<()>;

    async fn reauthenticate(&self) -> Result<()>;
}

/// Fixed bearer token that can be neither refreshed nor re-issued
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn state(&self) -> CredentialState {
        if self.token.is_empty() {
            CredentialState::Absent
        } else {
            CredentialState::Valid
        }
    }

    async fn access_token(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(ScanError::Credential("no access token configured".to_string()));
        }
        Ok(self.token.clone())
    }

    async fn refresh(&self) -> Result<()> {
        Err(ScanError::Credential("static token cannot be refreshed".to_string()))
    }

    async fn reauthenticate(&self) -> Result<()> {
        Err(ScanError::Credential("static token cannot be re-issued".to_string()))
    }
}

/// Contents of `token.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl StoredToken {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= Utc::now() + Duration::seconds(EXPIRY_SKEW_SECONDS),
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

struct TokenSlot {
    token: Option<StoredToken>,
    invalid: bool,
}

/// Token persisted in a JSON file and refreshed against an OAuth endpoint
pub struct FileCredentials {
    path: PathBuf,
    token_url: String,
    client: reqwest::Client,
    slot: RwLock<TokenSlot>,
}

impl FileCredentials {
    /// Open the token file. A missing file yields [`CredentialState::Absent`].
    pub fn open<P: AsRef<Path>>(path: P, token_url: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let token = read_token(&path)?;
        if token.is_none() {
            warn!("No token file at {}", path.display());
        }

        Ok(Self {
            path,
            token_url: token_url.into(),
            client: reqwest::Client::new(),
            slot: RwLock::new(TokenSlot {
                token,
                invalid: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, token: &StoredToken) -> Result<()> {
        let json = serde_json::to_vec_pretty(token)?;
        tokio::fs::write(&self.path, json).await?;
        debug!("Persisted refreshed token to {}", self.path.display());
        Ok(())
    }
}

fn read_token(path: &Path) -> Result<Option<StoredToken>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read(path)?;
    let token = serde_json::from_slice(&raw).map_err(|e| {
        ScanError::Credential(format!("cannot parse {}: {}", path.display(), e))
    })?;
    Ok(Some(token))
}

#[async_trait]
impl CredentialProvider for FileCredentials {
    async fn state(&self) -> CredentialState {
        let slot = self.slot.read().await;
        match &slot.token {
            None => CredentialState::Absent,
            Some(_) if slot.invalid => CredentialState::Invalid,
            Some(token) if token.is_expired() => CredentialState::Expired,
            Some(_) => CredentialState::Valid,
        }
    }

    async fn access_token(&self) -> Result<String> {
        match self.state().await {
            CredentialState::Absent => {
                return Err(ScanError::Credential(format!(
                    "no token at {}; complete the consent flow first",
                    self.path.display()
                )))
            }
            CredentialState::Invalid => {
                return Err(ScanError::Credential("token was rejected by the provider".to_string()))
            }
            CredentialState::Expired => {
                if let Err(e) = self.refresh().await {
                    warn!("Refresh of expired token failed ({}), re-authenticating", e);
                    self.reauthenticate().await?;
                }
            }
            CredentialState::Valid => {}
        }

        let slot = self.slot.read().await;
        slot.token
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| ScanError::Credential("token disappeared during refresh".to_string()))
    }

    async fn refresh(&self) -> Result<()> {
        let mut slot = self.slot.write().await;
        let current = slot
            .token
            .clone()
            .ok_or_else(|| ScanError::Credential("nothing to refresh".to_string()))?;

        let (refresh_token, client_id, client_secret) =
            match (&current.refresh_token, &current.client_id, &current.client_secret) {
                (Some(r), Some(id), Some(secret)) => (r.clone(), id.clone(), secret.clone()),
                _ => {
                    slot.invalid = true;
                    return Err(ScanError::Credential(
                        "token has no refresh_token/client_id/client_secret".to_string(),
                    ));
                }
            };

        info!("Refreshing access token");
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ScanError::Credential(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            slot.invalid = true;
            return Err(ScanError::Credential(format!(
                "token refresh failed: {} {}",
                status, body
            )));
        }

        let fresh: TokenResponse = response
            .json()
            .await
            .map_err(|e| ScanError::Credential(format!("invalid token response: {}", e)))?;

        let refreshed = StoredToken {
            access_token: fresh.access_token,
            refresh_token: fresh.refresh_token.or(Some(refresh_token)),
            expires_at: fresh.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
            client_id: Some(client_id),
            client_secret: Some(client_secret),
        };
        self.persist(&refreshed).await?;

        slot.token = Some(refreshed);
        slot.invalid = false;
        Ok(())
    }

    async fn reauthenticate(&self) -> Result<()> {
        let reloaded = read_token(&self.path)?;
        let mut slot = self.slot.write().await;

        match reloaded {
            Some(token) if Some(&token) != slot.token.as_ref() => {
                info!("Reloaded token from {}", self.path.display());
                slot.token = Some(token);
                slot.invalid = false;
                Ok(())
            }
            _ => {
                slot.invalid = true;
                Err(ScanError::Credential(format!(
                    "re-authentication needed: replace {} with a freshly consented token",
                    self.path.display()
                )))
            }
        }
    }
}
