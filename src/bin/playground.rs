use clap::Parser;
use log::{debug, warn};
use serde_json::Value;
use std::error::Error;

use playground::catalog::{ApiDocsConfig, ModelDocConfig};
use playground::config::PlaygroundConfig;
use playground::transport::ResponseBody;
use playground::{EndpointType, PlaygroundBackend, RequestContext};

/// Submit a request to an AI gateway endpoint and follow async tasks
#[derive(Parser)]
#[command(
  name = "playground"
, about = "Try gateway endpoints from the command line"
)]
struct CliArgs
{   /// Model id to request
    #[arg(long)]
    model: String
  , /// Endpoint URL or gateway path (e.g. /v1/video/generations)
    #[arg(long)]
    endpoint: Option<String>
  , /// Endpoint type: chat, image, video, audio, embedding, rerank
    #[arg(long = "type")]
    kind: Option<EndpointType>
  , /// Parameter override as name=value; value is parsed as JSON when possible
    #[arg(long = "set", value_name = "NAME=VALUE")]
    params: Vec<String>
  , /// API key (stored token)
    #[arg(long, env = "PLAYGROUND_API_KEY")]
    token: Option<String>
  , /// JSON config file
    #[arg(long)]
    config: Option<String>
  , /// Docs catalog JSON used to look up endpoint and model metadata
    #[arg(long)]
    catalog: Option<String>
  , /// Gateway origin for relative endpoints
    #[arg(long, env = "PLAYGROUND_BASE_URL")]
    base_url: Option<String>
  , /// Print the response and exit without following the task
    #[arg(long)]
    no_follow: bool
}

fn parse_param(raw: &str) -> Result<(String, Value), playground::error::Error>
{   let (name, value) = raw.split_once('=').ok_or_else(|| {
      playground::error::Error::InvalidRequest(
        format!("expected NAME=VALUE, got '{}'", raw)
      )
    })?;
    let value = serde_json::from_str(value)
      .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn build_context(args: &CliArgs) -> Result<RequestContext, Box<dyn Error>>
{   if let Some(path) = &args.catalog
    {   let catalog = ApiDocsConfig::from_json(&std::fs::read_to_string(path)?)?;
        let (endpoint, model) = catalog
          .find_model(&args.model, args.kind)
          .ok_or_else(|| {
            playground::error::Error::NotFound(format!("model {}", args.model))
          })?;
        let mut ctx = RequestContext::from_catalog(endpoint, model);
        if let Some(url) = &args.endpoint
        {   ctx.endpoint = url.clone();
        }
        return Ok(ctx);
    }

    let endpoint = args.endpoint.clone()
      .ok_or("--endpoint is required without --catalog")?;
    let kind = args.kind.ok_or("--type is required without --catalog")?;
    Ok(RequestContext::new(endpoint, kind, ModelDocConfig::named(&args.model)))
}

fn print_body(body: &ResponseBody)
{   match body
    {   ResponseBody::Json(v) => println!(
          "{}",
          serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
        )
      , ResponseBody::Text(t) => println!("{}", t)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>>
{   env_logger::init();
    let args = CliArgs::parse();

    let mut config = match &args.config
    {   Some(path) => PlaygroundConfig::from_file(path)?
      , None => PlaygroundConfig::default()
    }.with_env();
    if let Some(url) = &args.base_url
    {   config.base_url = Some(url.clone());
    }

    let mut ctx = build_context(&args)?;
    for raw in &args.params
    {   let (name, value) = parse_param(raw)?;
        debug!("Override {} = {}", name, value);
        ctx.set(name, value);
    }
    ctx.select_token(args.token.clone());

    let backend = PlaygroundBackend::new(config)?;
    let mut reply_rx = backend.submit(ctx).await?;
    let outcome = match reply_rx.recv().await
    {   Some(result) => result?
      , None => return Err("backend stopped before replying".into())
    };

    let response = &outcome.response;
    println!(
      "{} {} ({} ms)"
    , response.status
    , response.status_text
    , response.elapsed.as_millis()
    );
    if let Some(err) = &response.error
    {   eprintln!("{}", err);
    }
    if let Some(body) = &response.body
    {   print_body(body);
    }

    // The watch only wakes on a new status or when polling stops.
    if let (Some(mut task_rx), false) = (outcome.task, args.no_follow)
    {   loop
        {   let snapshot = task_rx.borrow_and_update().clone();
            if let Some(status) = &snapshot.status
            {   println!("{}", status.view());
            }
            if !snapshot.polling
            {   break;
            }
            tokio::select!
            { changed = task_rx.changed() => {
                if changed.is_err()
                {   break;
                }
              }
            , _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling task polling");
                break;
              }
            }
        }
    }

    backend.shutdown().await?;
    Ok(())
}
