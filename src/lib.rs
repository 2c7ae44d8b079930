pub mod error;
pub mod config;
pub mod catalog;
pub mod request;
pub mod status;
pub mod transport;
pub mod submit;
pub mod poller;
pub mod client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use client::PlaygroundBackend;
pub use poller::{PollSnapshot, TaskPoller};
pub use request::{GenerationRequest, RequestContext};
pub use status::{StatusView, TaskState, TaskStatus};
pub use submit::SubmitResponse;

/*

gateway-playground: async client for exercising an AI-model gateway
the way its browser playground does. Build a request from form values
and model metadata, submit it with a bearer token, and follow async
generation tasks until they finish.

src/
├── lib.rs          # Command/reply types, endpoint types
├── error.rs        # Error enum (Clone, travels over channels)
├── config.rs       # Base URL, timeouts, poll interval
├── catalog.rs      # Endpoint/model catalog shapes
├── request.rs      # RequestContext, defaults, body builder
├── transport.rs    # Transport trait + reqwest implementation
├── submit.rs       # One-shot POST, latency, task id extraction
├── status.rs       # TaskStatus parsing and display state
├── poller.rs       # TaskPoller: immediate check + fixed interval
├── client.rs       # PlaygroundBackend actor owning one session
└── bin/playground.rs

*/

/// PLAYGROUND API INTERFACE:

// ===== Submit =====

pub type SubmitReply = Result<SubmitOutcome, crate::error::Error>;
pub type SubmitReplySender
  = tokio::sync::mpsc::UnboundedSender<SubmitReply>;

pub struct SubmitArgs
{   pub context: RequestContext
  , pub reply: SubmitReplySender
}

/// Response of a submission, plus a status feed when an async task
/// was started
#[derive(Debug, Clone)]
pub struct SubmitOutcome
{   pub response: SubmitResponse
  , pub task: Option<tokio::sync::watch::Receiver<PollSnapshot>>
}

// ===== CancelPolling =====

pub type CancelPollingReply = Result<bool, crate::error::Error>;
pub type CancelPollingReplySender
  = tokio::sync::mpsc::UnboundedSender<CancelPollingReply>;

pub struct CancelPollingArgs
{   pub reply: CancelPollingReplySender
}

// ===== GetSnapshot =====

/// Everything the owning view currently displays
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot
{   pub response: Option<SubmitResponse>
  , pub task: Option<PollSnapshot>
}

pub type GetSnapshotReply = Result<SessionSnapshot, crate::error::Error>;
pub type GetSnapshotReplySender
  = tokio::sync::mpsc::UnboundedSender<GetSnapshotReply>;

pub struct GetSnapshotArgs
{   pub reply: GetSnapshotReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = Result<(), crate::error::Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== PlaygroundHand (sender side) =====

pub struct PlaygroundHand
{   pub submit_tx
      : tokio::sync::mpsc::UnboundedSender<SubmitArgs>
  , pub cancel_polling_tx
      : tokio::sync::mpsc::UnboundedSender<CancelPollingArgs>
  , pub get_snapshot_tx
      : tokio::sync::mpsc::UnboundedSender<GetSnapshotArgs>
  , pub kill_process_tx
      : tokio::sync::mpsc::UnboundedSender<KillProcessArgs>
}

// ===== PlaygroundFoot (receiver side) =====

pub struct PlaygroundFoot
{   pub submit_rx
      : tokio::sync::mpsc::UnboundedReceiver<SubmitArgs>
  , pub cancel_polling_rx
      : tokio::sync::mpsc::UnboundedReceiver<CancelPollingArgs>
  , pub get_snapshot_rx
      : tokio::sync::mpsc::UnboundedReceiver<GetSnapshotArgs>
  , pub kill_process_rx
      : tokio::sync::mpsc::UnboundedReceiver<KillProcessArgs>
}

/// PLAYGROUND STRUCTURES:

/// Kind of gateway endpoint, as named in the docs catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointType
{   /// Chat completions
    Chat
  , /// Image generation
    Image
  , /// Video generation (async task)
    Video
  , /// Speech synthesis
    Audio
  , /// Text embeddings
    Embedding
  , /// Reranking
    Rerank
}

impl EndpointType
{   pub fn as_str(&self) -> &'static str
    {   match self
        {   EndpointType::Chat => "chat"
          , EndpointType::Image => "image"
          , EndpointType::Video => "video"
          , EndpointType::Audio => "audio"
          , EndpointType::Embedding => "embedding"
          , EndpointType::Rerank => "rerank"
        }
    }

    /// Whether a successful response is a task to poll
    pub fn is_async_task(&self) -> bool
    {   matches!(self, EndpointType::Video)
    }
}

impl fmt::Display for EndpointType
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   f.write_str(self.as_str())
    }
}

impl FromStr for EndpointType
{   type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {   match s.to_ascii_lowercase().as_str()
        {   "chat" => Ok(EndpointType::Chat)
          , "image" => Ok(EndpointType::Image)
          , "video" => Ok(EndpointType::Video)
          , "audio" => Ok(EndpointType::Audio)
          , "embedding" => Ok(EndpointType::Embedding)
          , "rerank" => Ok(EndpointType::Rerank)
          , other => Err(crate::error::Error::UnsupportedEndpoint(
              other.to_string()
            ))
        }
    }
}
