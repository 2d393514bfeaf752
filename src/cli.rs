use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::queue::RequestSpec;

#[derive(Parser, Debug)]
#[command(name = "schoolsync")]
#[command(about = "Offline-tolerant client for the school-management API")]
#[command(version)]
pub struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/schoolsync/config.yaml)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  /// Keep cache and queue in memory for this run only
  #[arg(long, global = true)]
  pub ephemeral: bool,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Read an endpoint, using the cache when it is fresh
  Get {
    endpoint: String,
    /// Query parameter as key=value (value may be JSON)
    #[arg(short, long = "param")]
    params: Vec<String>,
  },
  /// Send a mutation, queueing it if the server is unreachable
  Send {
    method: String,
    endpoint: String,
    /// JSON request body
    #[arg(short, long)]
    body: Option<String>,
    /// Extra header as "Name: value"
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,
  },
  /// Replay queued mutations
  Sync,
  /// Inspect or empty the offline queue
  Queue {
    #[command(subcommand)]
    action: QueueAction,
  },
  /// Manage the response cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
pub enum QueueAction {
  /// Show queued requests in replay order
  List,
  /// Drop every queued request
  Clear,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
  /// Remove every cached response
  Clear,
}

/// Turn `key=value` arguments into a params object.
pub fn parse_params(raw: &[String]) -> Result<Option<Value>> {
  if raw.is_empty() {
    return Ok(None);
  }

  let mut map = Map::new();
  for pair in raw {
    let (key, value) = pair
      .split_once('=')
      .ok_or_else(|| eyre!("Parameter must be key=value: {}", pair))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    map.insert(key.to_string(), value);
  }
  Ok(Some(Value::Object(map)))
}

/// Assemble the mutation described by `send` arguments.
pub fn build_request(
  method: &str,
  endpoint: &str,
  body: Option<&str>,
  headers: &[String],
) -> Result<RequestSpec> {
  let mut request = RequestSpec::new(method.to_ascii_uppercase(), endpoint);

  if let Some(body) = body {
    let body: Value =
      serde_json::from_str(body).map_err(|e| eyre!("Request body is not valid JSON: {}", e))?;
    request = request.with_body(body);
  }

  for header in headers {
    let (name, value) = header
      .split_once(':')
      .ok_or_else(|| eyre!("Header must be \"Name: value\": {}", header))?;
    request = request.with_header(name.trim(), value.trim());
  }

  request.validate()?;
  Ok(request)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_params() {
    let params = parse_params(&["class=7B".into(), "week=12".into(), "ids=[1,2]".into()])
      .unwrap()
      .unwrap();
    assert_eq!(params, json!({"class": "7B", "week": 12, "ids": [1, 2]}));
  }

  #[test]
  fn test_parse_params_empty_and_invalid() {
    assert_eq!(parse_params(&[]).unwrap(), None);
    assert!(parse_params(&["novalue".into()]).is_err());
  }

  #[test]
  fn test_build_request() {
    let request = build_request(
      "post",
      "/messages",
      Some(r#"{"to": 3, "text": "hello"}"#),
      &["X-Role: teacher".into()],
    )
    .unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.body, Some(json!({"to": 3, "text": "hello"})));
    assert_eq!(request.headers["X-Role"], "teacher");
  }

  #[test]
  fn test_build_request_rejects_bad_input() {
    assert!(build_request("POST", "/x", Some("{oops"), &[]).is_err());
    assert!(build_request("POST", "/x", None, &["no-colon".into()]).is_err());
    assert!(build_request("POST", "", None, &[]).is_err());
  }

  #[test]
  fn test_args_parse() {
    let args = Args::parse_from(["schoolsync", "get", "/students", "-p", "class=7B"]);
    assert!(matches!(args.command, Command::Get { ref params, .. } if params.len() == 1));

    let args = Args::parse_from(["schoolsync", "--ephemeral", "queue", "list"]);
    assert!(args.ephemeral);
    assert!(matches!(
      args.command,
      Command::Queue {
        action: QueueAction::List
      }
    ));
  }
}
