use std::time::Duration;

use super::error::{RestDaoError, RestResult};

/// Runtime configuration describing how to reach the REST backend.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the PostgREST endpoint, e.g. `https://project.supabase.co/rest/v1`.
    pub base_url: String,
    /// Key sent as `apikey` and bearer token.
    pub api_key: Option<String>,
    /// Interval between remote head checks for subscribed matches.
    pub poll_interval: Duration,
}

impl RestConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            poll_interval,
        }
    }

    /// Attach the API key to the configuration.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env(poll_interval: Duration) -> RestResult<Self> {
        let base_url = std::env::var("STORE_REST_URL").map_err(|_| {
            RestDaoError::MissingEnvVar {
                var: "STORE_REST_URL",
            }
        })?;

        let mut config = Self::new(base_url, poll_interval);
        if let Some(api_key) = std::env::var("STORE_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
        {
            config = config.with_api_key(api_key);
        }

        Ok(config)
    }
}
