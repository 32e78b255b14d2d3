//! Batching delivery engine used by the analytics client.
//!
//! The engine is deliberately independent of the client façade: it accepts [`Message`]s,
//! buffers them, and reports every delivery outcome through a [`Callback`].

mod batching;
mod callback;
mod client;
pub mod constants;
pub mod error;
mod message;

pub use batching::{BatchingClient, CoreConfig};
pub use callback::Callback;
pub use client::{CoreClient, NoopClient};
pub use message::{FieldMap, Group, Identify, Message, Properties, Track, Traits};
