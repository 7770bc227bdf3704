//! Error types for the chain access layer.
//!
//! [`ClientError`] is the error type for all [`ChainClient`](crate::ChainClient)
//! operations. The [`Rpc`](ClientError::Rpc) variant preserves the JSON-RPC
//! error code, message, and data verbatim so that the range-splitting layer in
//! [`crate::split`] can classify provider-specific failure messages.

use thiserror::Error;

/// Result type alias using [`ClientError`].
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to an EVM node.
///
/// # Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Network | `Transport`, `Timeout` | Network issues, server down |
/// | Protocol | `Rpc` | Server rejected the request |
/// | Data | `InvalidResponse` | Well-formed RPC, unusable payload |
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Transport-level failure (connection refused, TLS, DNS, 5xx).
    #[error("transport error: {0}")]
    Transport(String),

    /// Request timed out waiting for a response.
    #[error("request timed out")]
    Timeout,

    /// JSON-RPC error returned by the node.
    ///
    /// Contains the error code, message, and optional data from the RPC
    /// response. Range-limit errors from providers arrive through this
    /// variant and are classified by [`crate::split::classify_range_error`].
    #[error("RPC error ({code}): {message}")]
    Rpc {
        /// JSON-RPC error code (e.g. -32602 for invalid params).
        code: i64,
        /// Human-readable error message from the node.
        message: String,
        /// Optional additional data from the error response, as raw JSON text.
        data: Option<String>,
    },

    /// The response decoded but is missing fields the engine requires
    /// (e.g. a log without a block number).
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Construct an RPC error from its parts.
    #[must_use]
    pub fn rpc(code: i64, message: impl Into<String>, data: Option<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data,
        }
    }

    /// Whether this error is worth retrying as-is (network flakiness).
    ///
    /// RPC errors are not retryable at this layer: either the splitting
    /// logic can act on them, or they are permanent for the given request.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
