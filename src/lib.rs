//! Analytics reporting client.
//!
//! [`analytics::Client`] resolves its configuration from explicit settings or the
//! `CF_ANALYTICS_*` environment variables, attributes events to the running deployment, and
//! hands them to a batching HTTP transport. Analytics never fail the host application: when
//! disabled or misconfigured the client silently drops events, and delivery problems are only
//! visible through `log` output under the `cf-analytics` target when `CF_ANALYTICS_DEBUG=true`.
//!
//! ```no_run
//! use cf_analytics::analytics::{Client, Deployment};
//! use cf_analytics::transport::Properties;
//!
//! let client = Client::from_env();
//! client.set_deployment_id("dep-123");
//! client.set_deployment(Some(Deployment::new("dep-123", "1.4.0", "prod")));
//! client.identify_deployment();
//! client.track("server_started", Properties::new().set("region", "us-east-1"));
//! client.close();
//! ```

pub mod analytics;
pub mod transport;
pub mod util;

#[cfg(test)]
pub mod test_support;
