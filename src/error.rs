//! Error handling for domain-sweep

use std::path::Path;

use thiserror::Error;

/// Main error type for domain-sweep
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SweepError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Connectivity error: {message}")]
    Connectivity { message: String },

    #[error("Persistence error ({path}): {message}")]
    Persistence { path: String, message: String },

    #[error("Resolver setup error: {message}")]
    Resolver { message: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        url: Option<String>,
    },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SweepError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a connectivity error (local network or DNS path is unusable)
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
        }
    }

    /// Create a persistence error for a result sink destination
    pub fn persistence(path: &Path, message: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.to_string_lossy().to_string(),
            message: message.into(),
        }
    }

    /// Create a resolver setup error
    pub fn resolver(message: impl Into<String>) -> Self {
        Self::Resolver {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>, url: Option<String>) -> Self {
        Self::Network {
            message: message.into(),
            url,
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an IO error
    pub fn io(message: impl Into<String>, path: Option<String>) -> Self {
        Self::Io {
            message: message.into(),
            path,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error ends the whole run rather than a single candidate
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::Connectivity { .. }
                | Self::Resolver { .. }
                | Self::Internal { .. }
        )
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message } => {
                format!("❌ Configuration problem: {}\n💡 Check the length range, output path and limits", message)
            }
            Self::Connectivity { message } => {
                format!("❌ Connectivity check failed: {}\n💡 Check your internet connection and DNS servers", message)
            }
            Self::Persistence { path, message } => {
                format!("⚠️  Could not write to '{}': {}\n💡 Check file permissions and free space", path, message)
            }
            Self::Resolver { message } => {
                format!("❌ DNS resolver could not be set up: {}\n💡 Pass explicit --nameserver addresses", message)
            }
            Self::Network { message, .. } => {
                format!("❌ Network error: {}\n💡 Check your internet connection", message)
            }
            Self::Parse { message } => {
                format!("❌ Parse error: {}\n💡 Check the configuration file format", message)
            }
            Self::Io { message, path } => {
                let path_info = path.as_ref().map_or(String::new(), |p| format!(" ({})", p));
                format!("❌ File error{}: {}\n💡 Check file permissions and paths", path_info, message)
            }
            Self::Cancelled => "⏹️  Scan stopped by request".to_string(),
            Self::Internal { message } => {
                format!("❌ Internal error: {}\n💡 This is a bug, please report it", message)
            }
        }
    }
}

impl From<reqwest::Error> for SweepError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string());

        if err.is_builder() {
            Self::config(format!("HTTP client setup failed: {}", err))
        } else {
            Self::network(err.to_string(), url)
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SweepError>;

/// Build a configuration error from a message or format string
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::SweepError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::SweepError::config(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SweepError::config("bad bounds").is_fatal());
        assert!(SweepError::connectivity("canary down").is_fatal());
        assert!(SweepError::resolver("no resolv.conf").is_fatal());
        assert!(!SweepError::persistence(Path::new("sites.txt"), "disk full").is_fatal());
        assert!(!SweepError::Cancelled.is_fatal());
    }

    #[test]
    fn test_config_macro() {
        let err = config_error!("min length {} exceeds max length {}", 4, 3);
        assert_eq!(
            err.to_string(),
            "Configuration error: min length 4 exceeds max length 3"
        );
    }

    #[test]
    fn test_user_message_mentions_path() {
        let err = SweepError::persistence(Path::new("/tmp/out.txt"), "denied");
        assert!(err.user_message().contains("/tmp/out.txt"));
    }
}
