use crate::transport::error::TransportError;
use crate::transport::message::Message;

/// Receives the delivery outcome of every message handed to a transport.
///
/// Implementations are invoked from the transport's worker thread and must return quickly.
pub trait Callback: Send + Sync {
    fn success(&self, message: &Message);

    fn failure(&self, message: &Message, error: &TransportError);
}
