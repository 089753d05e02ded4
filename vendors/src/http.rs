//! JSON-over-HTTP invoker

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use loadgen_core::Invoker;
use loadgen_storage::CsvRecord;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Invoker configuration errors
#[derive(Debug, Error)]
pub enum VendorError {
    /// The target URL could not be parsed
    #[error("invalid target url {url:?}: {reason}")]
    InvalidUrl {
        /// Configured URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// The HTTP method is not a valid token
    #[error("invalid http method: {0}")]
    InvalidMethod(String),

    /// A header name or value is malformed
    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    /// A timeout value is out of acceptable range
    #[error("invalid timeout: {0:?}")]
    InvalidTimeout(Duration),

    /// The HTTP client could not be built
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Where and how requests are sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Endpoint URL
    pub url: String,

    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,

    /// Per-request timeout
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Connection timeout
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Extra request headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

impl TargetConfig {
    /// Create a config for `url` with default method and timeouts
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            headers: BTreeMap::new(),
        }
    }

    /// Set the HTTP method
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    fn parse_url(&self) -> Result<Url, VendorError> {
        Url::parse(&self.url).map_err(|e| VendorError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })
    }

    fn parse_method(&self) -> Result<Method, VendorError> {
        Method::from_str(&self.method.to_uppercase())
            .map_err(|_| VendorError::InvalidMethod(self.method.clone()))
    }

    fn parse_headers(&self) -> Result<HeaderMap, VendorError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| VendorError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| VendorError::InvalidHeader(name.as_str().to_string()))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), VendorError> {
        self.parse_url()?;
        self.parse_method()?;
        self.parse_headers()?;
        if self.timeout.is_zero() {
            return Err(VendorError::InvalidTimeout(self.timeout));
        }
        if self.connect_timeout.is_zero() {
            return Err(VendorError::InvalidTimeout(self.connect_timeout));
        }
        Ok(())
    }
}

/// Outcome of one HTTP call
///
/// Transport failures, timeouts and cancellation are reported in `error`;
/// non-2xx responses keep their status and leave `error` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpOutcome {
    /// When the call started
    pub timestamp: DateTime<Utc>,

    /// Time until the full response body arrived, or until failure
    #[serde(with = "humantime_serde")]
    pub latency: Duration,

    /// HTTP status, if a response arrived
    pub status: Option<u16>,

    /// Response body size
    pub bytes: u64,

    /// Failure description
    pub error: Option<String>,
}

impl HttpOutcome {
    fn response(timestamp: DateTime<Utc>, latency: Duration, status: u16, bytes: u64) -> Self {
        Self {
            timestamp,
            latency,
            status: Some(status),
            bytes,
            error: None,
        }
    }

    fn failed(timestamp: DateTime<Utc>, latency: Duration, error: impl Into<String>) -> Self {
        Self {
            timestamp,
            latency,
            status: None,
            bytes: 0,
            error: Some(error.into()),
        }
    }

    /// Whether the call got a 2xx response
    pub fn is_success(&self) -> bool {
        self.error.is_none() && matches!(self.status, Some(200..=299))
    }
}

impl CsvRecord for HttpOutcome {
    fn headers() -> &'static [&'static str] {
        &["timestamp", "latency_ms", "status", "bytes", "error"]
    }

    fn record(&self) -> Vec<String> {
        vec![
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            format!("{:.3}", self.latency.as_secs_f64() * 1000.0),
            self.status.map(|s| s.to_string()).unwrap_or_default(),
            self.bytes.to_string(),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// Sends each request body as JSON to one fixed endpoint
///
/// A `null` body is sent without a payload. The call is abandoned when the
/// cancellation token fires.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: Client,
    url: Url,
    method: Method,
    headers: HeaderMap,
}

impl HttpInvoker {
    /// Build an invoker with a pooled client
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the client
    /// cannot be built.
    pub fn new(config: &TargetConfig) -> Result<Self, VendorError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(64)
            .user_agent(format!("loadgen/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: config.parse_url()?,
            method: config.parse_method()?,
            headers: config.parse_headers()?,
        })
    }

    /// Target URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn send(&self, body: Value) -> Result<(u16, u64), reqwest::Error> {
        let mut request = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        if !body.is_null() {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?.len() as u64;
        Ok((status, bytes))
    }
}

#[async_trait]
impl Invoker<Value, HttpOutcome> for HttpInvoker {
    async fn call(&self, request: Value, cancel: CancellationToken) -> HttpOutcome {
        let timestamp = Utc::now();
        let start = Instant::now();

        tokio::select! {
            result = self.send(request) => match result {
                Ok((status, bytes)) => {
                    HttpOutcome::response(timestamp, start.elapsed(), status, bytes)
                }
                Err(e) => {
                    tracing::trace!(error = %e, url = %self.url, "Request failed");
                    HttpOutcome::failed(timestamp, start.elapsed(), e.to_string())
                }
            },
            _ = cancel.cancelled() => HttpOutcome::failed(timestamp, start.elapsed(), "cancelled"),
        }
    }
}
