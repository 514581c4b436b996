//! Settings-file loading for the bridge binary.
//!
//! Settings live in a JSON file with a single `pasoe` section. A missing
//! file is not an error (everything has a default and can be supplied via
//! CLI flags or environment variables); a malformed file is fatal at
//! startup.

use crate::error::Result;
use pasoe_rest::config::PasoeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// Connection settings for the target PASOE instance.
    pub pasoe: PasoeConfig,
}

pub fn load_settings(path: &Path) -> Result<BridgeSettings> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "settings file not found; using defaults");
            return Ok(BridgeSettings::default());
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&dir.path().join("nope.json")).expect("defaults");
        assert!(settings.pasoe.base_url.is_empty());
        assert_eq!(settings.pasoe.web_app, "web");
    }

    #[test]
    fn reads_pasoe_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "pasoe": {
                    "baseUrl": "https://localhost:8810",
                    "username": "agent",
                    "password": "s3cret",
                    "timeoutSeconds": 10
                }
            }"#,
        )
        .expect("write settings");

        let settings = load_settings(&path).expect("settings load");
        assert_eq!(settings.pasoe.base_url, "https://localhost:8810");
        assert_eq!(settings.pasoe.username.as_deref(), Some("agent"));
        assert_eq!(settings.pasoe.timeout_seconds, 10);
        assert!(!settings.pasoe.accept_invalid_certificates);
    }

    #[test]
    fn malformed_file_is_a_startup_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").expect("write settings");

        let err = load_settings(&path).expect_err("must fail");
        assert!(err.to_string().contains("parse"));
    }
}
