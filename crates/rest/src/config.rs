//! Transport configuration for a PASOE instance.

use serde::{Deserialize, Serialize};

/// Connection settings for one PASOE instance.
///
/// Built once at startup and owned by the [`crate::client::RestClient`];
/// immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasoeConfig {
    /// Base URL of the PASOE instance (e.g. `https://localhost:8810`).
    pub base_url: String,

    /// Web application name appended between the base URL and every
    /// service path.
    pub web_app: String,

    /// Username for basic authentication.
    pub username: Option<String>,

    /// Password for basic authentication.
    pub password: Option<String>,

    /// Request timeout in seconds.
    pub timeout_seconds: u64,

    /// Skip TLS certificate validation for every connection.
    ///
    /// This disables chain, hostname, and validity checks. It exists for
    /// development instances with self-signed certificates and must never be
    /// enabled implicitly.
    pub accept_invalid_certificates: bool,
}

impl Default for PasoeConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            web_app: "web".to_string(),
            username: None,
            password: None,
            timeout_seconds: 30,
            accept_invalid_certificates: false,
        }
    }
}
