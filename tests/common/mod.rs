#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use playground::error::Error;
use playground::transport::{RawResponse, ResponseBody, Transport};

/// One canned reply, optionally delayed
#[derive(Clone)]
pub struct Scripted
{   pub delay: Duration
  , pub result: Result<RawResponse, Error>
}

impl Scripted
{   pub fn ok(body: Value) -> Self
    {   Scripted
        {   delay: Duration::ZERO
          , result: Ok(json_response(200, body))
        }
    }

    pub fn status(code: u16, body: Value) -> Self
    {   Scripted
        {   delay: Duration::ZERO
          , result: Ok(json_response(code, body))
        }
    }

    pub fn fail(msg: &str) -> Self
    {   Scripted
        {   delay: Duration::ZERO
          , result: Err(Error::HttpError(msg.to_string()))
        }
    }

    pub fn task(status: &str) -> Self
    {   Scripted::ok(json!({ "data": { "task_id": "t-1", "status": status } }))
    }

    pub fn after(mut self, delay: Duration) -> Self
    {   self.delay = delay;
        self
    }
}

pub fn json_response(status: u16, body: Value) -> RawResponse
{   RawResponse
    {   status
      , status_text: String::new()
      , body: ResponseBody::Json(body)
    }
}

/// Transport replaying scripted replies. The last reply of each queue
/// repeats once the queue is drained.
#[derive(Default)]
pub struct ScriptedTransport
{   submits: Mutex<VecDeque<Scripted>>
  , statuses: Mutex<VecDeque<Scripted>>
  , last_status: Mutex<Option<Scripted>>
  , last_submit: Mutex<Option<Scripted>>
  , pub posts: AtomicUsize
  , pub gets: AtomicUsize
  , get_urls: Mutex<HashMap<String, usize>>
  , auth: Mutex<Vec<String>>
}

impl ScriptedTransport
{   pub fn new(submits: Vec<Scripted>, statuses: Vec<Scripted>) -> Self
    {   ScriptedTransport
        {   submits: Mutex::new(submits.into())
          , statuses: Mutex::new(statuses.into())
          , ..ScriptedTransport::default()
        }
    }

    pub fn post_count(&self) -> usize
    {   self.posts.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize
    {   self.gets.load(Ordering::SeqCst)
    }

    pub fn gets_for(&self, url: &str) -> usize
    {   self.get_urls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn keys_seen(&self) -> Vec<String>
    {   self.auth.lock().unwrap().clone()
    }

    fn next(
      queue: &Mutex<VecDeque<Scripted>>
    , last: &Mutex<Option<Scripted>>
    ) -> Scripted
    {   let mut queue = queue.lock().unwrap();
        let mut last = last.lock().unwrap();
        match queue.pop_front()
        {   Some(s) => {
              *last = Some(s.clone());
              s
            }
          , None => last.clone()
              .unwrap_or_else(|| Scripted::fail("no scripted reply"))
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport
{   async fn post_json(
      &self
    , _url: &str
    , api_key: &str
    , _body: &Value
    ) -> Result<RawResponse, Error>
    {   self.posts.fetch_add(1, Ordering::SeqCst);
        self.auth.lock().unwrap().push(api_key.to_string());
        let reply = Self::next(&self.submits, &self.last_submit);
        if !reply.delay.is_zero()
        {   tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }

    async fn get(
      &self
    , url: &str
    , api_key: &str
    ) -> Result<RawResponse, Error>
    {   self.gets.fetch_add(1, Ordering::SeqCst);
        *self.get_urls.lock().unwrap()
          .entry(url.to_string())
          .or_insert(0) += 1;
        self.auth.lock().unwrap().push(api_key.to_string());
        let reply = Self::next(&self.statuses, &self.last_status);
        if !reply.delay.is_zero()
        {   tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}
