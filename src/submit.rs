//! One-shot request submission

use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use log::{debug, info, warn};

use crate::request::GenerationRequest;
use crate::transport::{ResponseBody, Transport};

/// Outcome of one submission as shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitResponse
{   /// HTTP status, or 0 when the request never completed
    pub status: u16
  , pub status_text: String
  , /// Wall-clock time from send to fully read body
    pub elapsed: Duration
  , pub body: Option<ResponseBody>
  , /// Transport error message when `status == 0`
    pub error: Option<String>
  , pub request: GenerationRequest
}

impl SubmitResponse
{   pub fn is_success(&self) -> bool
    {   (200..300).contains(&self.status)
    }

    /// Async job id carried by a successful JSON response
    pub fn task_id(&self) -> Option<String>
    {   if !self.is_success()
        {   return None;
        }
        self.body.as_ref()
          .and_then(ResponseBody::as_json)
          .and_then(extract_task_id)
    }
}

/// `task_id`, else `id`, of `body.data` (or `body` when unwrapped)
pub fn extract_task_id(body: &Value) -> Option<String>
{   let payload = crate::status::unwrap_payload(body)?;
    ["task_id", "id"].iter().find_map(|key| {
      match payload.get(*key)?
      {   Value::String(s) if !s.is_empty() => Some(s.clone())
        , Value::Number(n) => Some(n.to_string())
        , _ => None
      }
    })
}

/// POST the body and record the response. Transport failures become
/// a response with status 0 rather than an error.
pub async fn submit(
  transport: &dyn Transport
, url: &str
, api_key: &str
, request: GenerationRequest
) -> SubmitResponse
{   debug!("Submitting {:?} to {}", request.model(), url);
    let started = Instant::now();
    let result = transport
      .post_json(url, api_key, &request.to_value())
      .await;
    let elapsed = started.elapsed();

    match result
    {   Ok(raw) => {
          info!(
            "{} responded {} in {} ms",
            url, raw.status, elapsed.as_millis()
          );
          SubmitResponse
          {   status: raw.status
            , status_text: raw.status_text
            , elapsed
            , body: Some(raw.body)
            , error: None
            , request
          }
        }
      , Err(e) => {
          warn!("Submit to {} failed: {}", url, e);
          SubmitResponse
          {   status: 0
            , status_text: "Error".to_string()
            , elapsed
            , body: None
            , error: Some(e.to_string())
            , request
          }
        }
    }
}
