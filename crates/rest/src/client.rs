//! Request executor for PASOE REST services.
//!
//! [`RestClient::execute`] never returns an error: every failure mode
//! (missing configuration, transport error, timeout, non-2xx status) is
//! folded into a [`RestOutcome`] value. The client holds no per-call state
//! and is safe to share across concurrent tool calls.

use crate::config::PasoeConfig;
use base64::Engine as _;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
pub use reqwest::Method;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RestError {
    #[error("config error: {0}")]
    Config(String),
    #[error("unsupported HTTP method '{0}' (expected GET, POST, PUT, or DELETE)")]
    Method(String),
}

pub type Result<T> = std::result::Result<T, RestError>;

/// One outbound call, described relative to the configured web application.
#[derive(Debug, Clone)]
pub struct RestRequest {
    /// Service path, e.g. `/rest/CustomerService/Customer`.
    pub path: String,
    pub method: Method,
    /// Raw body text; sent as `application/json` when present.
    pub body: Option<String>,
    /// Extra headers. Caller values win over the client defaults, except
    /// the content type, which follows the body's presence.
    pub headers: HashMap<String, String>,
}

impl RestRequest {
    #[must_use]
    pub fn new(path: impl Into<String>, method: Method) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            headers: HashMap::new(),
        }
    }
}

/// Normalized result of one outbound exchange.
///
/// Exactly one of the two legs holds: `success` with a 2xx status and no
/// error message, or failure with a non-empty error message. A status code
/// of 0 means no response was received at all.
#[derive(Debug, Clone)]
pub struct RestOutcome {
    pub success: bool,
    pub status_code: u16,
    pub body: Option<String>,
    pub error_message: Option<String>,
    pub headers: HashMap<String, String>,
}

impl RestOutcome {
    fn ok(status: u16, body: String, headers: HashMap<String, String>) -> Self {
        Self {
            success: true,
            status_code: status,
            body: Some(body),
            error_message: None,
            headers,
        }
    }

    fn http_error(status: StatusCode, body: String, headers: HashMap<String, String>) -> Self {
        let reason = status.canonical_reason().unwrap_or("Unknown");
        Self {
            success: false,
            status_code: status.as_u16(),
            body: Some(body),
            error_message: Some(format!("HTTP {}: {reason}", status.as_u16())),
            headers,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: 0,
            body: None,
            error_message: Some(message.into()),
            headers: HashMap::new(),
        }
    }
}

/// Parse a caller-supplied HTTP method.
///
/// Case-insensitive; an empty string defaults to POST. Methods outside
/// GET/POST/PUT/DELETE are rejected.
///
/// # Errors
///
/// Returns [`RestError::Method`] for any other method token.
pub fn parse_method(raw: &str) -> Result<Method> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Method::POST);
    }
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        other => Err(RestError::Method(other.to_string())),
    }
}

/// Executor for REST calls against one PASOE instance.
///
/// Cheap to clone; the underlying `reqwest::Client` shares its connection
/// pool across clones.
#[derive(Debug, Clone)]
pub struct RestClient {
    config: PasoeConfig,
    http: Client,
}

impl RestClient {
    /// Build a client from a static configuration.
    ///
    /// The basic auth credential and the `Accept` header are computed once
    /// here and attached to every request; they are not re-derived per call.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot form a valid header value
    /// or the underlying HTTP client cannot be built.
    pub fn new(config: PasoeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let (Some(username), Some(password)) =
            (config.username.as_deref(), config.password.as_deref())
            && !username.is_empty()
            && !password.is_empty()
        {
            let credentials =
                base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
            let mut value = HeaderValue::from_str(&format!("Basic {credentials}"))
                .map_err(|e| RestError::Config(format!("invalid basic auth credentials: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds));
        if config.accept_invalid_certificates {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder
            .build()
            .map_err(|e| RestError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    #[must_use]
    pub fn config(&self) -> &PasoeConfig {
        &self.config
    }

    /// Execute one described request and fold the result into an outcome.
    pub async fn execute(&self, request: RestRequest) -> RestOutcome {
        let url = match build_service_url(
            &self.config.base_url,
            &self.config.web_app,
            &request.path,
        ) {
            Ok(url) => url,
            Err(e) => {
                warn!(path = %request.path, error = %e, "request rejected before dispatch");
                return RestOutcome::failed(e.to_string());
            }
        };
        debug!(url = %url, "built service URL");
        info!(method = %request.method, path = %request.path, "sending request to PASOE");

        let mut builder = self.http.request(request.method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "PASOE request did not complete");
                return RestOutcome::failed(describe_transport_error(&e));
            }
        };

        let status = response.status();
        let headers = collect_headers(response.headers());
        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to read PASOE response body");
                return RestOutcome::failed(describe_transport_error(&e));
            }
        };

        if status.is_success() {
            info!(status = status.as_u16(), "PASOE request completed");
            RestOutcome::ok(status.as_u16(), body, headers)
        } else {
            warn!(status = status.as_u16(), "PASOE request returned an error status");
            RestOutcome::http_error(status, body, headers)
        }
    }

    /// Probe reachability of the configured web application root.
    ///
    /// The instance counts as reachable unless the root answers 404 or 503;
    /// auth challenges (401/403) still prove something is listening. Any
    /// transport failure reads as unreachable.
    pub async fn probe(&self) -> bool {
        info!(base_url = %self.config.base_url, "testing connection to PASOE");
        let outcome = self.execute(RestRequest::new("", Method::GET)).await;
        if outcome.status_code == 0 {
            warn!(
                error = outcome.error_message.as_deref().unwrap_or_default(),
                "connection test failed"
            );
            return false;
        }

        let connected = outcome.status_code != StatusCode::NOT_FOUND.as_u16()
            && outcome.status_code != StatusCode::SERVICE_UNAVAILABLE.as_u16();
        info!(connected, status = outcome.status_code, "connection test result");
        connected
    }
}

/// Join base URL, web application, and service path, tolerating slash
/// variations in all three parts.
///
/// # Errors
///
/// Returns a config error when the base URL is empty.
fn build_service_url(base_url: &str, web_app: &str, path: &str) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    if base.is_empty() {
        return Err(RestError::Config(
            "PASOE base URL is not configured; set the baseUrl setting".to_string(),
        ));
    }

    let app = web_app.trim_matches('/');
    let mut url = String::with_capacity(base.len() + app.len() + path.len() + 2);
    url.push_str(base);
    url.push('/');
    url.push_str(app);
    if !path.is_empty() && !path.starts_with('/') {
        url.push('/');
    }
    url.push_str(path);
    Ok(url)
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timed out".to_string()
    } else if e.is_connect() || e.is_request() {
        format!("HTTP request failed: {e}")
    } else {
        format!("Unexpected error: {e}")
    }
}

fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}
