//! Task status payloads and their display state

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Status strings after which polling stops. Matched exactly.
pub const TERMINAL_STATUSES: &[&str] = &[
  "SUCCESS", "FAILED", "ERROR", "failure", "failed"
];

/// Normalised task state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState
{   Pending
  , Processing
  , Success
  , Failed
  , Error
  , Unknown(String)
}

impl TaskState
{   pub fn parse(raw: &str) -> Self
    {   match raw
        {   "PENDING" | "queued" => TaskState::Pending
          , "PROCESSING" => TaskState::Processing
          , "SUCCESS" => TaskState::Success
          , "FAILED" | "failure" | "failed" => TaskState::Failed
          , "ERROR" => TaskState::Error
          , other => TaskState::Unknown(other.to_string())
        }
    }

    pub fn is_failure(&self) -> bool
    {   matches!(self, TaskState::Failed | TaskState::Error)
    }
}

/// True when `raw` is one of [`TERMINAL_STATUSES`]
pub fn is_terminal_status(raw: &str) -> bool
{   TERMINAL_STATUSES.contains(&raw)
}

/// Latest observed state of an async generation task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus
{   pub task_id: Option<String>
  , /// Status string exactly as the gateway sent it
    pub raw_status: Option<String>
  , pub state: Option<TaskState>
  , pub progress: Option<String>
  , pub video_url: Option<String>
  , pub audio_url: Option<String>
  , pub error_message: Option<String>
  , pub message: Option<String>
  , /// Unwrapped payload the fields were read from
    pub payload: Value
}

impl TaskStatus
{   /// Read a status from a gateway response body. The task object is
    /// `body.data` when present, otherwise the body itself.
    pub fn from_body(body: &Value) -> Option<Self>
    {   let payload = unwrap_payload(body)?;
        Some(TaskStatus::from_payload(payload))
    }

    pub fn from_payload(payload: &Value) -> Self
    {   let raw_status = first_string(payload, &[
            &["status"]
          , &["data", "status"]
          ]);
        let state = raw_status.as_deref().map(TaskState::parse);
        let is_failure = state.as_ref().map_or(false, TaskState::is_failure);

        TaskStatus
        {   task_id: first_string(payload, &[&["task_id"], &["id"]])
          , progress: first_string(payload, &[
                &["progress"]
              , &["data", "progress"]
              ])
          , video_url: first_string(payload, &[
                &["video_url"]
              , &["url"]
              , &["data", "video_url"]
              , &["data", "url"]
              , &["data", "content", "video_url"]
              ])
          , audio_url: first_string(payload, &[
                &["audio_url"]
              , &["data", "audio_url"]
              ])
          , error_message: if is_failure
            {   first_string(payload, &[
                  &["fail_reason"]
                , &["data", "error", "message"]
                ])
            } else
            {   None
            }
          , message: first_string(payload, &[&["message"]])
          , raw_status
          , state
          , payload: payload.clone()
        }
    }

    pub fn is_terminal(&self) -> bool
    {   self.raw_status.as_deref().map_or(false, is_terminal_status)
    }

    pub fn is_success(&self) -> bool
    {   self.state == Some(TaskState::Success)
    }

    pub fn view(&self) -> StatusView
    {   StatusView::from(self)
    }
}

/// `body.data` when it is present and truthy, otherwise `body`
pub(crate) fn unwrap_payload(body: &Value) -> Option<&Value>
{   let payload = match body.get("data")
    {   Some(data) if is_present(data) => data
      , _ => body
    };
    if is_present(payload)
    {   Some(payload)
    } else
    {   None
    }
}

fn is_present(value: &Value) -> bool
{   match value
    {   Value::Null => false
      , Value::Bool(b) => *b
      , Value::String(s) => !s.is_empty()
      , Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0)
      , _ => true
    }
}

/// First non-empty value along the given paths, stringified
fn first_string(payload: &Value, paths: &[&[&str]]) -> Option<String>
{   paths.iter().find_map(|path| {
      let value = path.iter()
        .try_fold(payload, |v, key| v.get(*key))?;
      match value
      {   Value::String(s) if !s.is_empty() => Some(s.clone())
        , Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string())
        , _ => None
      }
    })
}

/// Colour family for a status badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone
{   Green
  , Red
  , Orange
  , Grey
}

/// Display state derived from a [`TaskStatus`]
#[derive(Debug, Clone, PartialEq)]
pub struct StatusView
{   pub label: String
  , pub tone: Tone
  , pub task_id: Option<String>
  , pub progress: Option<String>
  , /// CSS-style width for a progress bar, always ending in `%`
    pub progress_width: Option<String>
  , pub video_url: Option<String>
  , pub audio_url: Option<String>
  , pub error_message: Option<String>
  , pub message: Option<String>
}

impl From<&TaskStatus> for StatusView
{   fn from(status: &TaskStatus) -> Self
    {   let raw = status.raw_status.clone().unwrap_or_default();
        let (label, tone) = match &status.state
        {   Some(TaskState::Success) => ("Completed".to_string(), Tone::Green)
          , Some(state) if state.is_failure() => ("Failed".to_string(), Tone::Red)
          , Some(TaskState::Processing) => ("Processing".to_string(), Tone::Orange)
          , Some(TaskState::Pending) => ("Waiting".to_string(), Tone::Orange)
          , _ => (raw, Tone::Grey)
        };
        let success = status.is_success();
        let progress_width = status.progress.as_ref().map(|p| {
          if p.contains('%')
          {   p.clone()
          } else
          {   format!("{}%", p)
          }
        });

        StatusView
        {   label
          , tone
          , task_id: status.task_id.clone()
          , progress: status.progress.clone()
          , progress_width
          , video_url: status.video_url.clone().filter(|_| success)
          , audio_url: status.audio_url.clone().filter(|_| success)
          , error_message: status.error_message.clone()
          , message: status.message.clone()
        }
    }
}

impl fmt::Display for StatusView
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   write!(f, "[{}]", self.label)?;
        if let Some(id) = &self.task_id
        {   write!(f, " task {}", id)?;
        }
        if let Some(width) = &self.progress_width
        {   write!(f, " {}", width)?;
        }
        if let Some(url) = &self.video_url
        {   write!(f, " video: {}", url)?;
        }
        if let Some(url) = &self.audio_url
        {   write!(f, " audio: {}", url)?;
        }
        if let Some(err) = &self.error_message
        {   write!(f, " error: {}", err)?;
        }
        Ok(())
    }
}
