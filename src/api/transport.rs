//! Network transport for live requests and offline replay.

use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::queue::RequestSpec;

/// Why a request did not succeed.
#[derive(Debug)]
pub enum TransportError {
  /// The server could not be reached (refused, DNS, timeout)
  Connectivity(String),
  /// The server answered with a non-2xx status
  Status { status: u16, url: String },
  /// The request could not be built or the response not decoded
  Invalid(String),
}

impl TransportError {
  /// Whether the failure is worth queueing for a later replay.
  pub fn is_connectivity(&self) -> bool {
    matches!(self, Self::Connectivity(_))
  }
}

impl fmt::Display for TransportError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Connectivity(e) => write!(f, "network unavailable: {e}"),
      Self::Status { status, url } => write!(f, "{url} returned HTTP {status}"),
      Self::Invalid(e) => write!(f, "invalid request: {e}"),
    }
  }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
  fn from(e: reqwest::Error) -> Self {
    if let Some(status) = e.status() {
      Self::Status {
        status: status.as_u16(),
        url: e.url().map(|u| u.to_string()).unwrap_or_default(),
      }
    } else if e.is_connect() || e.is_timeout() {
      Self::Connectivity(e.to_string())
    } else if e.is_builder() || e.is_decode() {
      Self::Invalid(e.to_string())
    } else {
      // Remaining request errors are I/O level failures
      Self::Connectivity(e.to_string())
    }
  }
}

/// Executes a mutating request. Anything but a 2xx answer is a failure.
pub trait Transport: Send + Sync {
  fn send(
    &self,
    request: &RequestSpec,
  ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Executes a JSON read against an endpoint.
pub trait ReadTransport: Send + Sync {
  fn get_json(
    &self,
    endpoint: &str,
    params: Option<&Value>,
  ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

/// HTTP transport backed by reqwest.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl HttpTransport {
  pub fn new(config: &ApiConfig, token: Option<String>) -> Result<Self> {
    // Without a trailing slash `join` would replace the last path segment
    let mut base = config.base_url.trim_end_matches('/').to_string();
    base.push('/');
    let base_url =
      Url::parse(&base).map_err(|e| eyre!("Invalid API base url {}: {}", config.base_url, e))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      token,
    })
  }

  /// Resolve an absolute url or an endpoint relative to the base url.
  fn resolve(&self, url: &str) -> Result<Url, TransportError> {
    if let Ok(absolute) = Url::parse(url) {
      return Ok(absolute);
    }
    self
      .base_url
      .join(url.trim_start_matches('/'))
      .map_err(|e| TransportError::Invalid(format!("{url}: {e}")))
  }

  fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
    let builder = self.client.request(method, url);
    match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    }
  }

  /// Build the HTTP request for a queued or live mutation.
  pub fn build(&self, spec: &RequestSpec) -> Result<reqwest::Request, TransportError> {
    let method = Method::from_bytes(spec.method.to_ascii_uppercase().as_bytes())
      .map_err(|e| TransportError::Invalid(format!("{}: {e}", spec.method)))?;
    let mut builder = self.request(method, self.resolve(&spec.url)?);

    for (name, value) in &spec.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &spec.body {
      builder = builder.json(body);
    }

    builder.build().map_err(TransportError::from)
  }

  /// Build a GET request with `params` encoded as the query string.
  pub fn build_get(
    &self,
    endpoint: &str,
    params: Option<&Value>,
  ) -> Result<reqwest::Request, TransportError> {
    self
      .request(Method::GET, self.resolve(endpoint)?)
      .query(&query_pairs(params))
      .build()
      .map_err(TransportError::from)
  }

  async fn execute(
    &self,
    request: reqwest::Request,
  ) -> Result<reqwest::Response, TransportError> {
    debug!(method = %request.method(), url = %request.url(), "sending request");
    let response = self.client.execute(request).await?;
    Ok(response.error_for_status()?)
  }
}

impl Transport for HttpTransport {
  async fn send(&self, request: &RequestSpec) -> Result<(), TransportError> {
    let built = self.build(request)?;
    self.execute(built).await?;
    Ok(())
  }
}

impl ReadTransport for HttpTransport {
  async fn get_json(
    &self,
    endpoint: &str,
    params: Option<&Value>,
  ) -> Result<Value, TransportError> {
    let built = self.build_get(endpoint, params)?;
    let response = self.execute(built).await?;
    Ok(response.json().await?)
  }
}

/// Flatten an object of parameters into query pairs. Scalars are written
/// bare, everything else as JSON.
fn query_pairs(params: Option<&Value>) -> Vec<(String, String)> {
  match params {
    Some(Value::Object(map)) => map
      .iter()
      .filter(|(_, v)| !v.is_null())
      .map(|(k, v)| {
        let value = match v {
          Value::String(s) => s.clone(),
          other => other.to_string(),
        };
        (k.clone(), value)
      })
      .collect(),
    _ => Vec::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn transport(token: Option<&str>) -> HttpTransport {
    let config = ApiConfig {
      base_url: "https://school.example/api".to_string(),
      timeout_secs: 5,
    };
    HttpTransport::new(&config, token.map(String::from)).unwrap()
  }

  #[test]
  fn test_relative_urls_join_base() {
    let t = transport(None);
    let request = t.build(&RequestSpec::new("post", "/messages")).unwrap();
    assert_eq!(request.method(), &Method::POST);
    assert_eq!(request.url().as_str(), "https://school.example/api/messages");
  }

  #[test]
  fn test_absolute_url_is_kept() {
    let t = transport(None);
    let request = t
      .build(&RequestSpec::new("PUT", "https://files.example/upload/7"))
      .unwrap();
    assert_eq!(request.url().as_str(), "https://files.example/upload/7");
  }

  #[test]
  fn test_headers_body_and_token() {
    let t = transport(Some("abc"));
    let spec = RequestSpec::new("PATCH", "students/3")
      .with_body(json!({"grade": "8A"}))
      .with_header("X-Role", "admin");
    let request = t.build(&spec).unwrap();

    let headers = request.headers();
    assert_eq!(headers["authorization"], "Bearer abc");
    assert_eq!(headers["x-role"], "admin");
    assert_eq!(headers["content-type"], "application/json");

    let body = request.body().and_then(|b| b.as_bytes()).unwrap();
    let sent: Value = serde_json::from_slice(body).unwrap();
    assert_eq!(sent, json!({"grade": "8A"}));
  }

  #[test]
  fn test_invalid_method_is_rejected() {
    let t = transport(None);
    let err = t.build(&RequestSpec::new("BAD METHOD", "/x")).unwrap_err();
    assert!(!err.is_connectivity());
  }

  #[test]
  fn test_get_params_become_query() {
    let t = transport(None);
    let request = t
      .build_get("/timetable", Some(&json!({"class": "7B", "week": 12, "room": null})))
      .unwrap();
    assert_eq!(
      request.url().as_str(),
      "https://school.example/api/timetable?class=7B&week=12"
    );
  }

  #[tokio::test]
  async fn test_unreachable_server_is_connectivity_failure() {
    let config = ApiConfig {
      base_url: "http://127.0.0.1:1".to_string(),
      timeout_secs: 2,
    };
    let t = HttpTransport::new(&config, None).unwrap();
    let err = t.send(&RequestSpec::new("POST", "/messages")).await.unwrap_err();
    assert!(err.is_connectivity(), "unexpected error: {err}");
  }
}
