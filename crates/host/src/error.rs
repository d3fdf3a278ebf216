//! Host platform errors

use sos_beacon::BeaconError;
use thiserror::Error;

/// Result type alias for host operations
pub type Result<T> = std::result::Result<T, HostError>;

/// Errors from the host platform services
#[derive(Debug, Error)]
pub enum HostError {
    /// Talking to gpsd failed
    #[error("gpsd at {addr}: {source}")]
    Gpsd {
        /// `host:port`
        addr: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// A gpsd report was not valid JSON
    #[error("Malformed gpsd report: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Platform services were used outside the async runtime
    #[error("No tokio runtime is running")]
    NoRuntime,
}

impl From<HostError> for BeaconError {
    fn from(err: HostError) -> Self {
        BeaconError::Location(err.to_string())
    }
}
