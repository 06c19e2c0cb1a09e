use thiserror::Error;

#[derive(Error, Debug)]
pub enum TesterError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{kind} '{path}' not found")]
    MissingFileError { kind: String, path: String },

    #[error("Server '{binary}' failed to start: {reason}")]
    ServerStartError { binary: String, reason: String },

    #[error("Process '{command}' failed: {message}")]
    ProcessError { command: String, message: String },

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Malformed response: {message}")]
    ProtocolError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Process,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl TesterError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TesterError::ConfigError { .. }
            | TesterError::InvalidConfigValueError { .. }
            | TesterError::MissingFileError { .. } => ErrorCategory::Configuration,
            TesterError::HttpError(_)
            | TesterError::Timeout { .. }
            | TesterError::ProtocolError { .. } => ErrorCategory::Network,
            TesterError::ServerStartError { .. } | TesterError::ProcessError { .. } => ErrorCategory::Process,
            TesterError::IoError(_) | TesterError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TesterError::HttpError(_)
            | TesterError::Timeout { .. }
            | TesterError::ProtocolError { .. } => ErrorSeverity::Medium,
            TesterError::ConfigError { .. }
            | TesterError::InvalidConfigValueError { .. }
            | TesterError::MissingFileError { .. }
            | TesterError::ServerStartError { .. }
            | TesterError::ProcessError { .. } => ErrorSeverity::High,
            TesterError::IoError(_) | TesterError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TesterError::MissingFileError { kind, path } => {
                format!("{} '{}' not found", kind, path)
            }
            TesterError::ServerStartError { binary, reason } => {
                format!("Could not start '{}': {}", binary, reason)
            }
            TesterError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            TesterError::HttpError(e) if e.is_connect() => {
                "Could not connect to the server under test".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TesterError::MissingFileError { .. } => {
                "Usage: <tool> [webserv_binary] [config_file]. Make sure to compile the project first with 'make'"
            }
            TesterError::ServerStartError { .. } => {
                "Run the binary by hand with the same config file and check its error output"
            }
            TesterError::ConfigError { .. } | TesterError::InvalidConfigValueError { .. } => {
                "Check the settings file against the documented [server], [ports] and [stress] tables"
            }
            TesterError::HttpError(_) | TesterError::Timeout { .. } => {
                "Check that the server listens on the configured host and port"
            }
            TesterError::ProtocolError { .. } => "Check the status line the server sends back",
            TesterError::ProcessError { .. } => "Check that the command runs from this shell",
            TesterError::IoError(_) | TesterError::SerializationError(_) => {
                "Check file permissions and free disk space"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TesterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = TesterError::MissingFileError {
            kind: "Binary".to_string(),
            path: "./webserv".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.user_friendly_message(), "Binary './webserv' not found");
        assert!(err.recovery_suggestion().contains("make"));
    }

    #[test]
    fn test_server_start_is_process_error() {
        let err = TesterError::ServerStartError {
            binary: "./webserv".to_string(),
            reason: "exited during startup".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Process);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.user_friendly_message(), "Could not start './webserv': exited during startup");
    }

    #[test]
    fn test_timeout_message() {
        let err = TesterError::Timeout {
            operation: "GET /".to_string(),
            after_ms: 5000,
        };
        assert_eq!(err.to_string(), "GET / timed out after 5000ms");
        assert_eq!(err.category(), ErrorCategory::Network);
    }
}
