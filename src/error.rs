//! Error types
//!
//! Defines the errors that can stop the relay server before it is serving.
//! Per-connection I/O failures never surface here; they end the affected
//! session where they occur.

use std::fmt;
use std::io;

/// Startup and listener errors.
#[derive(Debug)]
pub enum RelayError {
    Config(config::ConfigError),
    BadBindAddress(String),
    Io(io::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Config(e) => write!(f, "Configuration error: {}", e),
            RelayError::BadBindAddress(addr) => write!(f, "Invalid bind address: {}", addr),
            RelayError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<config::ConfigError> for RelayError {
    fn from(error: config::ConfigError) -> Self {
        RelayError::Config(error)
    }
}

impl From<io::Error> for RelayError {
    fn from(error: io::Error) -> Self {
        RelayError::Io(error)
    }
}
