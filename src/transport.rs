//! HTTP transport to the gateway

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use log::{debug, error, trace};

/// Response body, decoded according to its content type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody
{   Json(Value)
  , Text(String)
}

impl ResponseBody
{   pub fn as_json(&self) -> Option<&Value>
    {   match self
        {   ResponseBody::Json(v) => Some(v)
          , ResponseBody::Text(_) => None
        }
    }

    /// JSON value, parsing text bodies that were served with another
    /// content type
    pub fn to_json(&self) -> Result<Value, crate::error::Error>
    {   match self
        {   ResponseBody::Json(v) => Ok(v.clone())
          , ResponseBody::Text(t) => Ok(serde_json::from_str(t)?)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse
{   pub status: u16
  , pub status_text: String
  , pub body: ResponseBody
}

impl RawResponse
{   pub fn is_success(&self) -> bool
    {   (200..300).contains(&self.status)
    }
}

/// The two gateway calls the playground makes
#[async_trait]
pub trait Transport: Send + Sync
{   /// POST a JSON body with bearer authorization
    async fn post_json(
      &self
    , url: &str
    , api_key: &str
    , body: &Value
    ) -> Result<RawResponse, crate::error::Error>;

    /// GET a resource with bearer authorization
    async fn get(
      &self
    , url: &str
    , api_key: &str
    ) -> Result<RawResponse, crate::error::Error>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport
{   http_client: reqwest::Client
}

impl HttpTransport
{   pub fn new(timeout: Option<Duration>)
      -> Result<Self, crate::error::Error>
    {   let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout
        {   builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(|e| {
          error!("Failed to build HTTP client: {}", e);
          crate::error::Error::InvalidConfiguration(e.to_string())
        })?;
        Ok(HttpTransport { http_client })
    }

    pub fn from_config(config: &crate::config::PlaygroundConfig)
      -> Result<Self, crate::error::Error>
    {   HttpTransport::new(config.request_timeout())
    }

    async fn read_response(response: reqwest::Response)
      -> Result<RawResponse, crate::error::Error>
    {   let status = response.status();
        trace!("Gateway response status: {}", status);
        let is_json = response.headers()
          .get(reqwest::header::CONTENT_TYPE)
          .and_then(|v| v.to_str().ok())
          .map_or(false, |ct| ct.contains("application/json"));

        let body = if is_json
        {   ResponseBody::Json(response.json().await.map_err(|e| {
              error!("Parse error: {}", e);
              crate::error::Error::ParseError(e.to_string())
            })?)
        } else
        {   ResponseBody::Text(response.text().await?)
        };

        Ok(RawResponse
        {   status: status.as_u16()
          , status_text: status.canonical_reason()
              .unwrap_or_default()
              .to_string()
          , body
        })
    }
}

#[async_trait]
impl Transport for HttpTransport
{   async fn post_json(
      &self
    , url: &str
    , api_key: &str
    , body: &Value
    ) -> Result<RawResponse, crate::error::Error>
    {   debug!("POST {}", url);
        let response = self.http_client
          .post(url)
          .header("Authorization", format!("Bearer {}", api_key))
          .header("Content-Type", "application/json")
          .json(body)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            crate::error::Error::from(e)
          })?;
        HttpTransport::read_response(response).await
    }

    async fn get(
      &self
    , url: &str
    , api_key: &str
    ) -> Result<RawResponse, crate::error::Error>
    {   trace!("GET {}", url);
        let response = self.http_client
          .get(url)
          .header("Authorization", format!("Bearer {}", api_key))
          .send()
          .await
          .map_err(crate::error::Error::from)?;
        HttpTransport::read_response(response).await
    }
}
