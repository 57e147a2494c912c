//! # Error Types for the Agent Execution Core
//!
//! This module defines all error types used throughout the crate, providing
//! comprehensive error handling with detailed context for different failure
//! scenarios.
//!
//! ## Design Philosophy
//!
//! - **Explicit Error Handling**: Uses Rust's `Result<T>` type for all fallible operations
//! - **No Silent Failures**: All errors are propagated explicitly to the caller
//! - **Rich Context**: Each error variant provides specific information about what went wrong
//! - **Easy Conversion**: Automatic conversion from common error types (reqwest, serde_json)

use thiserror::Error;

/// Type alias for `Result<T, Error>` used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type covering all failure modes in the crate.
///
/// ## Error Categories
///
/// - **HTTP / JSON**: transport and (de)serialization failures.
/// - **Config**: invalid configuration parameters.
/// - **Api**: error responses from the model server.
/// - **Stream**: failures during provider response parsing.
/// - **Tool**: tool execution or registration failures.
/// - **InvalidInput**: user-provided input validation failures.
/// - **Timeout**: request timeout exceeded.
/// - **Context-window / model-switch / event-log / output-shape**: the
///   agent-loop-specific error classes raised by the conversation driver
///   and LLM adapter.
/// - **Other**: catch-all for miscellaneous errors.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed due to network issues, connection problems, or HTTP errors.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration provided when building an `LlmConfig`.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error response received from the model server's API.
    #[error("API error: {0}")]
    Api(String),

    /// Error occurred while parsing a provider response (completions or responses path).
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Tool execution or registration failed.
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Invalid input provided by the user.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request exceeded the configured timeout duration.
    #[error("Request timeout")]
    Timeout,

    /// The provider returned neither a tool call nor message content; retryable.
    #[error("No response produced by the provider")]
    NoResponse,

    /// The provider reported the request exceeded its context window.
    ///
    /// Bubbles from the LLM adapter to the Agent, which asks the condenser to
    /// shrink the view and retries the step exactly once.
    #[error("Context window exceeded")]
    ContextWindowExceeded,

    /// A continuation handle is active but the configured model no longer
    /// supports the responses path; raised before any provider call.
    #[error("Model switch not allowed while a responses-path continuation is active")]
    ModelSwitchNotAllowed,

    /// Deserializing the event log encountered a `kind` tag that is not part
    /// of the closed event-kind set. No event is ever silently dropped.
    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    /// Appending an event whose id already exists in the log.
    #[error("Duplicate event id: {0}")]
    DuplicateEventId(uuid::Uuid),

    /// The LLM produced output that could not be interpreted as either a
    /// terminal message or a well-formed batch of tool calls.
    #[error("Malformed LLM output: {0}")]
    MalformedOutput(String),

    /// The conversation driver hit its `max_iteration_per_run` cap.
    #[error("Iteration cap reached")]
    IterationCap,

    /// Stuck-loop detection fired: the same failing action repeated.
    #[error("Agent appears stuck repeating the same failing action")]
    Stuck,

    /// An MCP-bridged tool's transport failed (the remote server is
    /// unreachable, disconnected, or returned a transport-level error).
    #[error("Tool transport error: {0}")]
    ToolTransport(String),

    /// Miscellaneous error that doesn't fit other categories.
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new configuration error with a descriptive message.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error with the server's error message.
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api(msg.into())
    }

    /// Create a new streaming/parsing error.
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new tool execution error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new invalid input error for user input validation failures.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new miscellaneous error for cases that don't fit other categories.
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error indicating the operation exceeded the time limit.
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Create a malformed-output error.
    pub fn malformed_output(msg: impl Into<String>) -> Self {
        Error::MalformedOutput(msg.into())
    }

    /// Create a tool-transport error (MCP bridge failures).
    pub fn tool_transport(msg: impl Into<String>) -> Self {
        Error::ToolTransport(msg.into())
    }

    /// Whether this error belongs to the adapter's transient-retry class
    /// (connection error, rate limit, 5xx, timeout, or empty response).
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            Error::Timeout | Error::NoResponse => true,
            Error::Api(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("rate limit") || lower.contains("overloaded") || lower.contains("5")
            }
            _ => false,
        }
    }
}
