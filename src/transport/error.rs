use std::fmt::{Display, Formatter};

/// Why a transport operation failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportErrorCode {
    /// Rejected before any I/O: a malformed endpoint, a zero tunable, or a message missing its
    /// identity or event name.
    InvalidArgument,
    /// The flush thread could not start, panicked, or went away.
    Internal,
    /// A batch could not be delivered after every attempt. Only reported through
    /// [`Callback::failure`](crate::transport::Callback::failure).
    Network,
    /// `enqueue` or `close` was called after the transport was closed.
    Closed,
    /// The pending-message queue was at capacity. The message was dropped and also reported
    /// through the callback.
    QueueFull,
}

impl TransportErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorCode::InvalidArgument => "transport/invalid-argument",
            TransportErrorCode::Internal => "transport/internal",
            TransportErrorCode::Network => "transport/network",
            TransportErrorCode::Closed => "transport/closed",
            TransportErrorCode::QueueFull => "transport/queue-full",
        }
    }
}

/// Error returned by [`CoreClient`](crate::transport::CoreClient) operations and handed to
/// delivery callbacks. Displays as `<message> (<code>)`.
#[derive(Clone, Debug)]
pub struct TransportError {
    pub code: TransportErrorCode,
    message: String,
}

impl TransportError {
    pub fn new(code: TransportErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for TransportError {}

pub type TransportResult<T> = Result<T, TransportError>;

pub fn invalid_argument(message: impl Into<String>) -> TransportError {
    TransportError::new(TransportErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> TransportError {
    TransportError::new(TransportErrorCode::Internal, message)
}

pub fn network_error(message: impl Into<String>) -> TransportError {
    TransportError::new(TransportErrorCode::Network, message)
}

/// Returned by a second `close` and by any `enqueue` after `close`.
pub fn client_closed() -> TransportError {
    TransportError::new(TransportErrorCode::Closed, "the client was already closed")
}

pub fn queue_full() -> TransportError {
    TransportError::new(
        TransportErrorCode::QueueFull,
        "the analytics queue is full; message dropped",
    )
}
