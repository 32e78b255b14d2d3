use crate::transport::error::TransportResult;
use crate::transport::message::Message;

/// Capabilities every analytics transport provides to the client façade.
pub trait CoreClient: Send + Sync {
    /// Queues a message for delivery. Returns once the message is accepted, not delivered.
    fn enqueue(&self, message: Message) -> TransportResult<()>;

    /// Endpoint the transport delivers to, for diagnostics.
    fn endpoint_url(&self) -> &str;

    /// Flushes pending messages and releases the transport. Blocks until the flush completes.
    fn close(&self) -> TransportResult<()>;
}

/// Transport that accepts every call and performs no I/O.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopClient;

impl CoreClient for NoopClient {
    fn enqueue(&self, _message: Message) -> TransportResult<()> {
        Ok(())
    }

    fn endpoint_url(&self) -> &str {
        ""
    }

    fn close(&self) -> TransportResult<()> {
        Ok(())
    }
}
