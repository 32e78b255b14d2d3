mod api;
mod callback;
mod config;
pub mod constants;
mod deployment;

pub use api::Client;
pub use config::{debug_enabled, debug_from_lookup, endpoint_or_default, Config};
pub use deployment::Deployment;
