//! Provider configuration

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://mdb.api.cloud.yandex.net";
pub const DEFAULT_OPERATION_ENDPOINT: &str = "https://operation.api.cloud.yandex.net";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("IAM token is not set")]
    MissingToken,

    #[error("invalid {name} '{value}': must be an http(s) URL")]
    InvalidEndpoint { name: &'static str, value: String },

    #[error("poll interval must be shorter than the operation timeout")]
    PollInterval,
}

/// Connection settings for the Managed Greenplum API
#[derive(Clone)]
pub struct ProviderConfig {
    pub token: String,
    /// Folder used when a cluster does not set `folder_id`
    pub folder_id: Option<String>,
    pub endpoint: String,
    pub operation_endpoint: String,
    pub poll_interval: Duration,
    pub operation_timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("token", &"<redacted>")
            .field("folder_id", &self.folder_id)
            .field("endpoint", &self.endpoint)
            .field("operation_endpoint", &self.operation_endpoint)
            .field("poll_interval", &self.poll_interval)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            folder_id: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            operation_endpoint: DEFAULT_OPERATION_ENDPOINT.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_folder_id(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_operation_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.operation_endpoint = endpoint.into();
        self
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.operation_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        for (name, value) in [
            ("endpoint", &self.endpoint),
            ("operation endpoint", &self.operation_endpoint),
        ] {
            if !(value.starts_with("https://") || value.starts_with("http://")) {
                return Err(ConfigError::InvalidEndpoint {
                    name,
                    value: value.clone(),
                });
            }
        }
        if self.poll_interval >= self.operation_timeout {
            return Err(ConfigError::PollInterval);
        }
        Ok(())
    }
}
