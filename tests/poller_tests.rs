mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use common::{Scripted, ScriptedTransport};
use playground::poller::MAX_IN_FLIGHT;
use playground::{TaskPoller, TaskState, TaskStatus};

const STATUS_URL: &str = "https://gw.example.com/v1/video/generations/t-1";

fn start(transport: &Arc<ScriptedTransport>, initial: Option<TaskStatus>) -> TaskPoller
{   TaskPoller::start(
      transport.clone()
    , "t-1".to_string()
    , STATUS_URL.to_string()
    , "sk-test".to_string()
    , Duration::from_millis(3000)
    , initial
    )
}

async fn advance(ms: u64)
{   tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_initial_status_is_visible_before_first_fetch()
{   let transport = Arc::new(ScriptedTransport::new(
      vec![]
    , vec![Scripted::task("PROCESSING")]
    ));
    let initial = TaskStatus::from_body(&json!({
      "data": { "task_id": "t-1", "status": "queued" }
    }));
    let poller = start(&transport, initial);

    let snapshot = poller.snapshot();
    assert!(snapshot.polling);
    assert_eq!(snapshot.applied_seq, 0);
    assert_eq!(
      snapshot.status.unwrap().state,
      Some(TaskState::Pending)
    );
    assert_eq!(poller.task_id(), "t-1");

    advance(10).await;
    assert_eq!(poller.snapshot().applied_seq, 1);
    assert_eq!(poller.snapshot().fetches, 1);
    assert_eq!(transport.keys_seen(), vec!["sk-test".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_stale_response_is_discarded()
{   // #1 is slow and lands after #2 has been applied
    let transport = Arc::new(ScriptedTransport::new(
      vec![]
    , vec![
        Scripted::task("PENDING").after(Duration::from_millis(4000))
      , Scripted::task("PROCESSING")
      , Scripted::ok(json!({ "data": {
          "task_id": "t-1", "status": "SUCCESS", "video_url": "https://cdn/v.mp4"
        } }))
      ]
    ));
    let poller = start(&transport, None);

    advance(3_500).await;
    assert_eq!(transport.get_count(), 2);
    let snapshot = poller.snapshot();
    assert_eq!(snapshot.applied_seq, 2);
    assert_eq!(
      snapshot.status.unwrap().raw_status.as_deref(),
      Some("PROCESSING")
    );

    advance(1_000).await;
    let snapshot = poller.snapshot();
    assert_eq!(snapshot.applied_seq, 2);
    assert_eq!(
      snapshot.status.unwrap().raw_status.as_deref(),
      Some("PROCESSING")
    );

    let done = poller.finished().await;
    assert!(!done.polling);
    assert_eq!(done.applied_seq, 3);
    assert!(done.status.unwrap().is_success());
    assert_eq!(transport.get_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_lowercase_success_does_not_stop_polling()
{   let transport = Arc::new(ScriptedTransport::new(
      vec![]
    , vec![
        Scripted::task("success")
      , Scripted::task("ERROR")
      ]
    ));
    let poller = start(&transport, None);

    advance(10).await;
    assert!(poller.is_active());

    advance(3_000).await;
    assert!(!poller.is_active());
    assert_eq!(
      poller.snapshot().status.unwrap().state,
      Some(TaskState::Error)
    );

    advance(30_000).await;
    assert_eq!(transport.get_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_stops_timer()
{   let transport = Arc::new(ScriptedTransport::new(
      vec![]
    , vec![Scripted::task("PENDING")]
    ));
    let poller = start(&transport, None);
    let rx = poller.subscribe();

    advance(10).await;
    assert_eq!(transport.get_count(), 1);
    drop(poller);

    advance(30_000).await;
    assert_eq!(transport.get_count(), 1);
    assert!(!rx.borrow().polling);
}

#[tokio::test(start_paused = true)]
async fn test_polling_is_open_ended()
{   let transport = Arc::new(ScriptedTransport::new(
      vec![]
    , vec![Scripted::fail("timeout")]
    ));
    let poller = start(&transport, None);

    advance(10 * 60 * 1000 + 10).await;
    let snapshot = poller.snapshot();
    assert!(snapshot.polling);
    assert_eq!(snapshot.fetches, 201);
    assert_eq!(snapshot.failures, 201);
    assert!(snapshot.status.is_none());

    poller.cancel();
    let done = poller.finished().await;
    assert!(!done.polling);
}

#[tokio::test(start_paused = true)]
async fn test_hung_status_queries_stay_bounded()
{   let transport = Arc::new(ScriptedTransport::new(
      vec![]
    , vec![Scripted::task("PENDING").after(Duration::from_secs(24 * 60 * 60))]
    ));
    let poller = start(&transport, None);

    advance(10_000).await;
    assert_eq!(poller.snapshot().fetches, MAX_IN_FLIGHT as u64);
    assert_eq!(poller.snapshot().failures, 0);

    advance(600_000).await;
    let snapshot = poller.snapshot();
    assert!(snapshot.polling);
    assert!(snapshot.failures > 0);
    assert!(snapshot.fetches < 201);
    assert!(snapshot.fetches - snapshot.failures <= MAX_IN_FLIGHT as u64);
    assert_eq!(transport.get_count() as u64, snapshot.fetches);
    assert!(snapshot.status.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_status_does_not_notify()
{   let transport = Arc::new(ScriptedTransport::new(
      vec![]
    , vec![
        Scripted::task("PENDING")
      , Scripted::task("PENDING")
      , Scripted::task("PROCESSING")
      ]
    ));
    let poller = start(&transport, None);
    let mut rx = poller.subscribe();

    advance(10).await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().applied_seq, 1);

    advance(3_000).await;
    assert!(!rx.has_changed().unwrap());
    assert_eq!(poller.snapshot().fetches, 2);
    assert_eq!(poller.snapshot().applied_seq, 2);

    advance(3_000).await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(
      rx.borrow_and_update().status.as_ref().unwrap().state,
      Some(TaskState::Processing)
    );
}
