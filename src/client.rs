use std::sync::Arc;
use tokio::sync::mpsc;
use log::{debug, error, info};
use crate::PlaygroundFoot;
use crate::poller::TaskPoller;
use crate::transport::{HttpTransport, Transport};

/// State owned by one playground session: the last response and at
/// most one live poller
pub struct PlaygroundState
{   pub config: crate::config::PlaygroundConfig
  , pub transport: Arc<dyn Transport>
  , pub last_response: Option<crate::SubmitResponse>
  , pub poller: Option<TaskPoller>
}

impl PlaygroundState
{   pub fn new(
      config: crate::config::PlaygroundConfig
    , transport: Arc<dyn Transport>
    ) -> Self
    {   debug!("Initializing PlaygroundState");
        PlaygroundState
        {   config
          , transport
          , last_response: None
          , poller: None
        }
    }

    /// Cancel and drop the current poller, if any
    pub fn cancel_polling(&mut self) -> bool
    {   match self.poller.take()
        {   Some(poller) => {
              poller.cancel();
              true
            }
          , None => false
        }
    }

    /// Run one submission. Fails before any network call when no key
    /// is available; otherwise replaces the previous response and task.
    pub async fn submit(
      &mut self
    , context: crate::RequestContext
    ) -> crate::SubmitReply
    {   let api_key = match context.api_key()
        {   Ok(key) => key
          , Err(e) => match &self.config.api_key
            {   Some(key) if !key.is_empty() => key.clone()
              , _ => {
                  error!("No API key for {}", context.endpoint);
                  return Err(e);
                }
            }
        };

        self.last_response = None;
        if self.cancel_polling()
        {   debug!("Previous poller cancelled by new submission");
        }

        let url = self.config.resolve_endpoint(&context.endpoint);
        let body = context.build_body();
        let response = crate::submit::submit(
            self.transport.as_ref()
          , &url
          , &api_key
          , body
          ).await;

        let mut task = None;
        if context.kind.is_async_task() && response.is_success()
        {   if let Some(task_id) = response.task_id()
            {   info!("Task {} submitted, polling status", task_id);
                let initial = response.body.as_ref()
                  .and_then(crate::transport::ResponseBody::as_json)
                  .and_then(crate::TaskStatus::from_body);
                let status_url = format!(
                  "{}/{}", url.trim_end_matches('/'), task_id
                );
                let poller = TaskPoller::start(
                    self.transport.clone()
                  , task_id
                  , status_url
                  , api_key
                  , self.config.poll.interval()
                  , initial
                  );
                task = Some(poller.subscribe());
                self.poller = Some(poller);
            }
        }

        self.last_response = Some(response.clone());
        Ok(crate::SubmitOutcome
        {   response
          , task
        })
    }

    pub fn snapshot(&self) -> crate::SessionSnapshot
    {   crate::SessionSnapshot
        {   response: self.last_response.clone()
          , task: self.poller.as_ref().map(TaskPoller::snapshot)
        }
    }
}

/// Public API for a playground session - owns the task
pub struct PlaygroundBackend
{   hand: crate::PlaygroundHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl PlaygroundBackend
{   /// Create and spawn a backend talking HTTP to the gateway
    pub fn new(
      config: crate::config::PlaygroundConfig
    ) -> Result<Self, crate::error::Error>
    {   config.validate()?;
        let transport = HttpTransport::from_config(&config)?;
        Ok(PlaygroundBackend::with_transport(config, Arc::new(transport)))
    }

    /// Create and spawn a backend over any transport
    /// Returns immediately - spawns background task
    pub fn with_transport(
      config: crate::config::PlaygroundConfig
    , transport: Arc<dyn Transport>
    ) -> Self
    {   debug!("Creating PlaygroundBackend with task ownership");

        let (submit_tx, submit_rx)
          = mpsc::unbounded_channel();
        let (cancel_polling_tx, cancel_polling_rx)
          = mpsc::unbounded_channel();
        let (get_snapshot_tx, get_snapshot_rx)
          = mpsc::unbounded_channel();
        let (kill_process_tx, kill_process_rx)
          = mpsc::unbounded_channel();

        let hand = crate::PlaygroundHand
        {   submit_tx
          , cancel_polling_tx
          , get_snapshot_tx
          , kill_process_tx
        };

        let foot = crate::PlaygroundFoot
        {   submit_rx
          , cancel_polling_rx
          , get_snapshot_rx
          , kill_process_rx
        };

        let state = PlaygroundState::new(config, transport);
        let _task_handle = tokio::spawn(async move {
          run_backend_loop(foot, state).await
        });

        PlaygroundBackend
        {   hand
          , _task_handle
        }
    }

    /// Submit a request - returns almost immediately
    pub async fn submit(
      &self
    , context: crate::RequestContext
    ) -> Result<
        mpsc::UnboundedReceiver<crate::SubmitReply>,
        crate::error::Error
      >
    {   debug!("submit queuing command for model: {}", context.model.id);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::SubmitArgs
        {   context
          , reply: reply_tx
        };

        self.hand.submit_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Stop the current poller - returns almost immediately
    pub async fn cancel_polling(
      &self
    ) -> Result<
        mpsc::UnboundedReceiver<crate::CancelPollingReply>,
        crate::error::Error
      >
    {   debug!("cancel_polling queuing command");
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.hand.cancel_polling_tx
          .send(crate::CancelPollingArgs { reply: reply_tx })
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Read the session state - returns almost immediately
    pub async fn get_snapshot(
      &self
    ) -> Result<
        mpsc::UnboundedReceiver<crate::GetSnapshotReply>,
        crate::error::Error
      >
    {   debug!("get_snapshot queuing command");
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.hand.get_snapshot_tx
          .send(crate::GetSnapshotArgs { reply: reply_tx })
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Gracefully shutdown the backend, cancelling any poller
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down PlaygroundBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        self.hand.kill_process_tx
          .send(crate::KillProcessArgs { reply: reply_tx })
          .map_err(|_| {
            error!("Backend channel already closed");
            crate::error::Error::Other(
              "Backend already shutdown".to_string()
            )
          })?;

        if let Some(result) = reply_rx.recv().await
        {   debug!("Backend shutdown confirmed");
            result
        } else
        {   error!("Backend shutdown timeout");
            Err(crate::error::Error::Timeout)
        }
    }
}

fn disconnected() -> crate::error::Error
{   error!("Backend channel closed");
    crate::error::Error::Other(
      "Backend disconnected".to_string()
    )
}

/// Main backend event loop. The state, and with it any poller, is
/// dropped when the loop ends.
async fn run_backend_loop(
  foot: crate::PlaygroundFoot
, mut state: PlaygroundState
)
{   debug!("Starting PlaygroundBackend event loop");
    let PlaygroundFoot
    {   mut submit_rx
      , mut cancel_polling_rx
      , mut get_snapshot_rx
      , mut kill_process_rx
    } = foot;

    loop
    { tokio::select!
      { Some(cmd) = submit_rx.recv() => {
          debug!("Received Submit for {}", cmd.context.endpoint);
          let result = state.submit(cmd.context).await;
          let _ = cmd.reply.send(result);
        }
      , Some(cmd) = cancel_polling_rx.recv() => {
          debug!("Received CancelPolling");
          let _ = cmd.reply.send(Ok(state.cancel_polling()));
        }
      , Some(cmd) = get_snapshot_rx.recv() => {
          debug!("Received GetSnapshot");
          let _ = cmd.reply.send(Ok(state.snapshot()));
        }
      , Some(cmd) = kill_process_rx.recv() => {
          debug!("Received KillProcess");
          state.cancel_polling();
          let _ = cmd.reply.send(Ok(()));
          info!("PlaygroundBackend shutting down");
          break;
        }
      , else => {
          debug!("All command channels closed");
          break;
        }
      }
    }
}
