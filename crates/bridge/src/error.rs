//! Error types for the bridge binary.

use thiserror::Error;

/// Startup-time errors. Tool-call failures never use this type; they are
/// folded into the JSON envelopes returned to the MCP client.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Settings file could not be read.
    #[error("settings error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not valid JSON.
    #[error("settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
