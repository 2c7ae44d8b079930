//! Fixed-interval polling of an async task's status resource

use std::sync::Arc;
use std::time::Duration;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use log::{debug, info, trace, warn};

use crate::status::TaskStatus;
use crate::transport::Transport;

/// What the owner of a poller can observe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollSnapshot
{   /// Latest applied status
    pub status: Option<TaskStatus>
  , /// False once the task is terminal or polling was cancelled
    pub polling: bool
  , /// Status fetches issued so far
    pub fetches: u64
  , /// Fetches that failed and were ignored
    pub failures: u64
  , /// Sequence number of the fetch behind `status`
    pub applied_seq: u64
}

impl PollSnapshot
{   pub fn is_terminal(&self) -> bool
    {   self.status.as_ref().map_or(false, TaskStatus::is_terminal)
    }
}

type FetchResult = (u64, Result<TaskStatus, crate::error::Error>);

/// Ticks are skipped while this many status fetches are outstanding
pub const MAX_IN_FLIGHT: usize = 4;

/// Owned handle to one polling session. Cancelling it, or dropping it,
/// stops the timer.
pub struct TaskPoller
{   task_id: String
  , cancel: CancellationToken
  , status_rx: watch::Receiver<PollSnapshot>
  , _task: tokio::task::JoinHandle<()>
}

impl TaskPoller
{   /// Spawn a poller that queries `status_url` right away and then
    /// every `interval` until a terminal status or cancellation
    pub fn start(
      transport: Arc<dyn Transport>
    , task_id: String
    , status_url: String
    , api_key: String
    , interval: Duration
    , initial: Option<TaskStatus>
    ) -> Self
    {   debug!("Starting poller for task {} at {}", task_id, status_url);
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(PollSnapshot
        {   status: initial
          , polling: true
          , ..PollSnapshot::default()
        });

        let loop_cancel = cancel.clone();
        let loop_task_id = task_id.clone();
        let _task = tokio::spawn(async move {
          run_poll_loop(
            transport
          , loop_task_id
          , status_url
          , api_key
          , interval
          , loop_cancel
          , status_tx
          ).await
        });

        TaskPoller
        {   task_id
          , cancel
          , status_rx
          , _task
        }
    }

    pub fn task_id(&self) -> &str
    {   &self.task_id
    }

    /// Stop polling; in-flight fetches are abandoned
    pub fn cancel(&self)
    {   if !self.cancel.is_cancelled()
        {   debug!("Cancelling poller for task {}", self.task_id);
            self.cancel.cancel();
        }
    }

    pub fn is_active(&self) -> bool
    {   !self.cancel.is_cancelled() && self.status_rx.borrow().polling
    }

    pub fn snapshot(&self) -> PollSnapshot
    {   self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot>
    {   self.status_rx.clone()
    }

    /// Wait until polling stops and return the final snapshot
    pub async fn finished(&self) -> PollSnapshot
    {   let mut rx = self.status_rx.clone();
        let done = rx.wait_for(|s| !s.polling).await
          .map(|s| s.clone());
        match done
        {   Ok(snapshot) => snapshot
          , Err(_) => rx.borrow().clone()
        }
    }
}

impl Drop for TaskPoller
{   fn drop(&mut self)
    {   self.cancel();
    }
}

/// One status query, abandoned as `Error::Timeout` after `deadline`
async fn fetch_status(
  transport: Arc<dyn Transport>
, url: Arc<str>
, api_key: Arc<str>
, seq: u64
, deadline: Duration
) -> FetchResult
{   let query = async {
      let raw = transport.get(&url, &api_key).await?;
      if !raw.is_success()
      {   return Err(crate::error::Error::HttpError(
            format!("status query returned {}", raw.status)
          ));
      }
      let body = raw.body.to_json()?;
      TaskStatus::from_body(&body).ok_or_else(|| {
        crate::error::Error::ParseError("empty status payload".to_string())
      })
    };
    let result = tokio::time::timeout(deadline, query).await
      .unwrap_or(Err(crate::error::Error::Timeout));
    (seq, result)
}

/// Poll loop. Every tick issues a fetch tagged with the next sequence
/// number; a result older than the last applied one is dropped. At most
/// [`MAX_IN_FLIGHT`] fetches are outstanding, each bounded by
/// `MAX_IN_FLIGHT` intervals. Counters are updated without waking
/// subscribers; only a changed status or polling flag notifies.
async fn run_poll_loop(
  transport: Arc<dyn Transport>
, task_id: String
, status_url: String
, api_key: String
, interval: Duration
, cancel: CancellationToken
, status_tx: watch::Sender<PollSnapshot>
)
{   let url: Arc<str> = Arc::from(status_url);
    let api_key: Arc<str> = Arc::from(api_key);
    let mut in_flight: FuturesUnordered<BoxFuture<'static, FetchResult>>
      = FuturesUnordered::new();
    let mut next_seq: u64 = 0;
    let mut applied_seq: u64 = 0;
    let deadline = interval * MAX_IN_FLIGHT as u32;

    // First tick completes immediately: that is the up-front check.
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop
    { tokio::select!
      { biased;
        _ = cancel.cancelled() => {
          debug!("Poller for task {} cancelled", task_id);
          break;
        }
      , Some((seq, result)) = in_flight.next(), if !in_flight.is_empty() => {
          match result
          {   Ok(status) if seq > applied_seq => {
                applied_seq = seq;
                let terminal = status.is_terminal();
                trace!("Task {} status #{}: {:?}", task_id, seq, status.raw_status);
                status_tx.send_if_modified(|s| {
                  let changed = s.status.as_ref() != Some(&status)
                    || s.polling == terminal;
                  s.status = Some(status);
                  s.applied_seq = seq;
                  s.polling = !terminal;
                  changed
                });
                if terminal
                {   info!("Task {} reached a terminal status", task_id);
                    break;
                }
              }
            , Ok(_) => {
                debug!(
                  "Discarding stale status #{} (applied #{})",
                  seq, applied_seq
                );
              }
            , Err(e) => {
                warn!("Failed to poll task status: {}", e);
                status_tx.send_if_modified(|s| {
                  s.failures += 1;
                  false
                });
              }
          }
        }
      , _ = ticker.tick() => {
          if in_flight.len() >= MAX_IN_FLIGHT
          {   debug!(
                "Task {} has {} status queries pending, skipping tick",
                task_id, in_flight.len()
              );
              continue;
          }
          next_seq += 1;
          trace!("Polling task {} (#{})", task_id, next_seq);
          in_flight.push(
            fetch_status(
              transport.clone()
            , url.clone()
            , api_key.clone()
            , next_seq
            , deadline
            ).boxed()
          );
          status_tx.send_if_modified(|s| {
            s.fetches += 1;
            false
          });
        }
      }
    }

    cancel.cancel();
    status_tx.send_modify(|s| s.polling = false);
}
