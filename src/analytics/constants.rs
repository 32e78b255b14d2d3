use std::time::Duration;

/// Production ingestion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://t.commonfate.io";
/// Non-production ingestion endpoint used by [`Config::DEVELOPMENT`](crate::analytics::Config::DEVELOPMENT).
pub const DEV_ENDPOINT: &str = "https://t-dev.commonfate.io";

pub const ENV_ANALYTICS_URL: &str = "CF_ANALYTICS_URL";
pub const ENV_ANALYTICS_DISABLED: &str = "CF_ANALYTICS_DISABLED";
pub const ENV_ANALYTICS_DEBUG: &str = "CF_ANALYTICS_DEBUG";

// Telemetry is low volume; favor latency over throughput.
pub(crate) const FLUSH_INTERVAL: Duration = Duration::from_millis(50);
pub(crate) const BATCH_SIZE: usize = 3;

pub(crate) const ANONYMOUS_ID_PREFIX: &str = "anon_";
pub(crate) const DEPLOYMENT_GROUP_TYPE: &str = "deployment";
pub(crate) const DEPLOYMENT_ID_PROPERTY: &str = "deploymentId";
