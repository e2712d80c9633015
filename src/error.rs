use std::fmt;
use std::io;

use crate::arena::Geometry;

/// Errors reported by configuration and lifecycle operations.
///
/// Conditions the log cannot recover from (a failed cross-domain copy, a
/// record that disagrees with its own layout, use of the default log before
/// `init`) are not represented here: they panic with a descriptive message.
#[derive(Debug)]
#[non_exhaustive]
pub enum LogError {
    /// A configuration value could not be interpreted.
    Config { key: String, reason: String },
    /// The configured writer name is not one of the known sinks.
    UnknownWriter(String),
    /// `init` was called on a default log that is already running.
    AlreadyInitialized,
    /// The sink failed to open or write its output.
    Io(io::Error),
}

impl LogError {
    pub(crate) fn config(key: &str, reason: impl Into<String>) -> Self {
        LogError::Config {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::Config { key, reason } => {
                write!(f, "invalid log configuration for `{}`: {}", key, reason)
            }
            LogError::UnknownWriter(name) => write!(f, "unknown log writer `{}`", name),
            LogError::AlreadyInitialized => write!(f, "the default event log is already initialized"),
            LogError::Io(err) => write!(f, "log writer I/O error: {}", err),
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LogError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for LogError {
    fn from(err: io::Error) -> Self {
        LogError::Io(err)
    }
}

/// A copy between the device arena and the host mirror could not be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferError {
    pub device: Geometry,
    pub host: Geometry,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slab geometry mismatch: device holds {} events / {} bodies, host holds {} events / {} bodies",
            self.device.event_capacity,
            self.device.body_capacity,
            self.host.event_capacity,
            self.host.body_capacity
        )
    }
}

impl std::error::Error for TransferError {}
