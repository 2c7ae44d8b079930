//! Configuration for the gateway connection and task polling

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use log::debug;

/// Environment variable overriding `base_url`
pub const BASE_URL_ENV: &str = "PLAYGROUND_BASE_URL";
/// Environment variable holding a fallback API key
pub const API_KEY_ENV: &str = "PLAYGROUND_API_KEY";

/// Task polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig
{   /// Fixed delay between status queries in milliseconds
    pub interval_ms: u64
}

impl PollConfig
{   pub fn interval(&self) -> Duration
    {   Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollConfig
{   fn default() -> Self
    {   PollConfig
        {   interval_ms: 3000
        }
    }
}

/// Playground configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaygroundConfig
{   /// Gateway origin that relative endpoints are joined to
    #[serde(default)]
    pub base_url: Option<String>
  , /// Per-request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>
  , /// Key used when no token is selected and none is typed
    #[serde(default)]
    pub api_key: Option<String>
  , #[serde(default)]
    pub poll: PollConfig
}

impl Default for PlaygroundConfig
{   fn default() -> Self
    {   PlaygroundConfig
        {   base_url: None
          , request_timeout_secs: None
          , api_key: None
          , poll: PollConfig::default()
        }
    }
}

impl PlaygroundConfig
{   /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>)
      -> Result<Self, crate::error::Error>
    {   let path = path.as_ref();
        debug!("Loading config from {}", path.display());
        let config_str = std::fs::read_to_string(path)
          .map_err(|e| {
            crate::error::Error::InvalidConfiguration(
              format!("{}: {}", path.display(), e)
            )
          })?;
        let config: PlaygroundConfig
          = serde_json::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides
    pub fn with_env(mut self) -> Self
    {   if let Ok(url) = std::env::var(BASE_URL_ENV)
        {   debug!("Base URL taken from {}", BASE_URL_ENV);
            self.base_url = Some(url);
        }
        if let Ok(key) = std::env::var(API_KEY_ENV)
        {   if !key.is_empty()
            {   self.api_key = Some(key);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   if self.poll.interval_ms == 0
        {   return Err(crate::error::Error::InvalidConfiguration(
              "poll.interval_ms must be positive".to_string()
            ));
        }
        if let Some(url) = &self.base_url
        {   if !url.starts_with("http://")
              && !url.starts_with("https://")
            {   return Err(crate::error::Error::InvalidConfiguration(
                  format!("base_url is not an http(s) URL: {}", url)
                ));
            }
        }
        Ok(())
    }

    /// Resolve an endpoint path against `base_url`
    pub fn resolve_endpoint(&self, endpoint: &str) -> String
    {   match &self.base_url
        {   Some(base) if endpoint.starts_with('/') => {
              format!("{}{}", base.trim_end_matches('/'), endpoint)
            }
          , _ => endpoint.to_string()
        }
    }

    pub fn request_timeout(&self) -> Option<Duration>
    {   self.request_timeout_secs.map(Duration::from_secs)
    }
}
