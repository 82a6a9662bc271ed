//! Error types for swarmkit.

use thiserror::Error;

/// Primary error type for every swarmkit operation.
#[derive(Error, Debug)]
pub enum SwarmError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Duplicate tool '{tool_name}' registered on agent '{agent}'")]
    DuplicateTool { agent: String, tool_name: String },

    #[error("Instructions for agent '{agent}' failed: {message}")]
    Instructions { agent: String, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Run canceled")]
    Canceled,

    #[error("Deadline exceeded after {after_ms}ms")]
    DeadlineExceeded { after_ms: u64 },

    #[error("Run task failed: {0}")]
    Join(String),
}

/// Broad error category used to route recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The completion service rejected or failed the request.
    Gateway,
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Configuration,
    Serialization,
    ToolExecution,
    Cancellation,
    Unknown,
}

impl SwarmError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::DuplicateTool { .. } | Self::Instructions { .. } => {
                ErrorCategory::Configuration
            }
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                _ => ErrorCategory::Gateway,
            },
            Self::Stream(_) => ErrorCategory::Gateway,
            Self::ToolExecution { .. } | Self::InvalidArgument(_) => ErrorCategory::ToolExecution,
            Self::Canceled | Self::DeadlineExceeded { .. } => ErrorCategory::Cancellation,
            Self::Io(_) | Self::Join(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether a gateway may retry the request that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => matches!(
                self.category(),
                ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Timeout
            ),
        }
    }

    /// Whether the run stopped because its cancellation signal fired.
    pub fn is_cancellation(&self) -> bool {
        self.category() == ErrorCategory::Cancellation
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SwarmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_variants_share_a_category() {
        let duplicate = SwarmError::DuplicateTool {
            agent: "triage".to_string(),
            tool_name: "lookup".to_string(),
        };
        let instructions = SwarmError::Instructions {
            agent: "triage".to_string(),
            message: "missing user_name".to_string(),
        };
        assert_eq!(duplicate.category(), ErrorCategory::Configuration);
        assert_eq!(instructions.category(), ErrorCategory::Configuration);
        assert!(!duplicate.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable_but_client_errors_are_not() {
        assert!(SwarmError::api(503, "overloaded").is_retryable());
        assert!(SwarmError::api(429, "slow down").is_retryable());
        assert!(!SwarmError::api(400, "bad request").is_retryable());
        assert_eq!(
            SwarmError::api(401, "nope").category(),
            ErrorCategory::Authentication
        );
    }

    #[test]
    fn cancellation_kinds_are_distinct_from_gateway_faults() {
        assert!(SwarmError::Canceled.is_cancellation());
        assert!(SwarmError::DeadlineExceeded { after_ms: 50 }.is_cancellation());
        assert!(!SwarmError::Stream("eof".into()).is_cancellation());
        assert!(!SwarmError::Canceled.is_retryable());
    }

    #[test]
    fn duplicate_tool_display_names_agent_and_tool() {
        let err = SwarmError::DuplicateTool {
            agent: "sales".to_string(),
            tool_name: "refund".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sales"), "expected agent in message: {msg}");
        assert!(msg.contains("refund"), "expected tool in message: {msg}");
    }
}
