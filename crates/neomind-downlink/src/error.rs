//! Error types for downlink command handling.

use thiserror::Error;

/// Result type for request construction and observation management.
pub type DownlinkResult<T> = Result<T, DownlinkError>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised before a request reaches the network.
#[derive(Debug, Error)]
pub enum DownlinkError {
    /// The command does not apply to the target (wrong path depth, missing model, ...).
    #[error("{0}")]
    Validation(String),

    /// A cancellation covers part of a broader existing observation.
    #[error(
        "Unexpected error: There is registration with Endpoint {endpoint} for observation path [{observed}], that includes this observation path [{requested}]"
    )]
    Conflict {
        endpoint: String,
        observed: String,
        requested: String,
    },

    /// The device supports none of the content formats the request needs.
    #[error("{0}")]
    UnsupportedContentFormat(String),
}

impl DownlinkError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Errors reported by the transport once a request was submitted.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response before the exchange timeout.
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// The transport knows the client is sleeping and refused to send.
    #[error("Client is sleeping: {0}")]
    ClientSleeping(String),

    /// The request was rejected by the codec before sending.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The request could not be sent.
    #[error("Send failed: {0}")]
    Send(String),

    /// The callback pool no longer accepts work.
    #[error("Callback executor is shut down")]
    Rejected,

    /// Other error
    #[error("Transport error: {0}")]
    Other(#[from] anyhow::Error),
}

impl TransportError {
    /// Timeouts and sleeping-client failures imply the device went to sleep.
    pub fn is_sleep_indicator(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ClientSleeping(_))
    }

    /// Short name of the failure kind, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "Timeout",
            Self::ClientSleeping(_) => "ClientSleeping",
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::Send(_) => "Send",
            Self::Rejected => "Rejected",
            Self::Other(_) => "Other",
        }
    }
}

/// Malformed path or versioned id text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Path must not be empty")]
    Empty,

    #[error("Invalid path {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// A raw value that cannot be converted to the resource type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("Value {value} cannot be converted to {expected}")]
    Conversion { value: String, expected: String },

    #[error("Not supported type: {0}")]
    UnsupportedType(String),

    #[error("Value of Multi-Instance Resource must be in Json format: {0}")]
    NotAMap(String),
}

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}
