use std::borrow::Cow;
use std::env;

use serde::{Deserialize, Serialize};

use crate::analytics::constants::{
    DEFAULT_ENDPOINT, DEV_ENDPOINT, ENV_ANALYTICS_DEBUG, ENV_ANALYTICS_DISABLED,
    ENV_ANALYTICS_URL,
};

/// Configuration for the analytics client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub endpoint: Cow<'static, str>,
    pub enabled: bool,
    pub verbose: bool,
}

impl Config {
    /// Disables analytics altogether.
    pub const DISABLED: Config = Config {
        endpoint: Cow::Borrowed(""),
        enabled: false,
        verbose: false,
    };

    /// Sends to the development endpoint with verbose transport logging.
    pub const DEVELOPMENT: Config = Config {
        endpoint: Cow::Borrowed(DEV_ENDPOINT),
        enabled: true,
        verbose: true,
    };

    /// Sends to the production endpoint.
    pub const DEFAULT: Config = Config {
        endpoint: Cow::Borrowed(DEFAULT_ENDPOINT),
        enabled: true,
        verbose: false,
    };

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Cow::Owned(endpoint.into());
        self
    }

    /// Resolves the configuration from the process environment:
    ///
    /// - `CF_ANALYTICS_URL` overrides the endpoint, falling back to the default when unset or empty
    /// - `CF_ANALYTICS_DISABLED=true` disables the client
    /// - `CF_ANALYTICS_DEBUG=true` turns on verbose transport logging
    ///
    /// Flag values are compared case-insensitively. Resolution never fails.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENV_ANALYTICS_URL).unwrap_or_default();
        Self {
            endpoint: endpoint_or_default(endpoint),
            enabled: !is_true(lookup(ENV_ANALYTICS_DISABLED).as_deref()),
            verbose: is_true(lookup(ENV_ANALYTICS_DEBUG).as_deref()),
        }
    }

    /// Endpoint the transport should use. An enabled configuration never resolves to an empty
    /// endpoint.
    pub fn resolved_endpoint(&self) -> &str {
        if self.enabled && self.endpoint.is_empty() {
            return DEFAULT_ENDPOINT;
        }
        &self.endpoint
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Returns `endpoint`, or the production endpoint when it is empty.
pub fn endpoint_or_default(endpoint: impl Into<String>) -> Cow<'static, str> {
    let endpoint = endpoint.into();
    if endpoint.is_empty() {
        Cow::Borrowed(DEFAULT_ENDPOINT)
    } else {
        Cow::Owned(endpoint)
    }
}

/// Whether `CF_ANALYTICS_DEBUG` asks for debug logging in the current process.
pub fn debug_enabled() -> bool {
    debug_from_lookup(|key| env::var(key).ok())
}

pub fn debug_from_lookup<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    is_true(lookup(ENV_ANALYTICS_DEBUG).as_deref())
}

fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|value| value.to_lowercase() == "true")
}
