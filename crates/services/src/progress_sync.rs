use std::env;

use async_trait::async_trait;
use reqwest::Client;

use quiz_core::model::Attempt;
use storage::repository::{AttemptSink, StorageError};

use crate::error::ProgressSyncError;

#[derive(Clone, Debug)]
pub struct ProgressSyncConfig {
    pub endpoint: String,
    pub token: Option<String>,
}

impl ProgressSyncConfig {
    /// Read `QUIZ_PROGRESS_URL` and the optional `QUIZ_PROGRESS_TOKEN`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let endpoint = env::var("QUIZ_PROGRESS_URL").ok()?;
        Self::new(endpoint, env::var("QUIZ_PROGRESS_TOKEN").ok())
    }

    /// Blank endpoints disable sync; blank tokens are dropped.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Option<Self> {
        let endpoint = endpoint.into().trim().to_string();
        if endpoint.is_empty() {
            return None;
        }
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Some(Self { endpoint, token })
    }
}

/// Attempt sink that posts completed attempts to a remote progress endpoint
/// as camelCase JSON.
#[derive(Clone)]
pub struct HttpAttemptSink {
    client: Client,
    config: Option<ProgressSyncConfig>,
}

impl HttpAttemptSink {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ProgressSyncConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<ProgressSyncConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Post one attempt.
    ///
    /// # Errors
    ///
    /// Returns `ProgressSyncError` when sync is disabled, the request fails,
    /// or the endpoint answers with a non-success status.
    pub async fn post(&self, attempt: &Attempt) -> Result<(), ProgressSyncError> {
        let config = self.config.as_ref().ok_or(ProgressSyncError::Disabled)?;

        let mut request = self.client.post(&config.endpoint).json(attempt);
        if let Some(token) = &config.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProgressSyncError::HttpStatus(status));
        }
        tracing::debug!(attempt_id = %attempt.id(), "attempt synced");
        Ok(())
    }
}

#[async_trait]
impl AttemptSink for HttpAttemptSink {
    async fn record_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        match self.post(attempt).await {
            Ok(()) => Ok(()),
            // The endpoint already holds this attempt id.
            Err(ProgressSyncError::HttpStatus(reqwest::StatusCode::CONFLICT)) => {
                Err(StorageError::Conflict)
            }
            Err(err) => Err(StorageError::Connection(err.to_string())),
        }
    }
}
