//! Client configuration.
//!
//! Client-wide query defaults can be built in code or loaded from JSON:
//!
//! ```json
//! {
//!   "defaultOptions": {
//!     "queries": {
//!       "staleTime": 5000,
//!       "retry": 1,
//!       "suspense": false,
//!       "notifyOnChangeProps": ["data", "error"]
//!     }
//!   }
//! }
//! ```
//!
//! Durations are given in milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::query::{NotifyOnChangeProps, Retry};

/// Defaults applied to every query of a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultQueryOptions {
    #[serde(with = "millis", skip_serializing_if = "Option::is_none")]
    pub stale_time: Option<Duration>,

    #[serde(with = "millis", skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<Retry>,

    #[serde(with = "millis", skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspense: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_error_boundary: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_on_change_props: Option<NotifyOnChangeProps>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_on_mount: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refetch_on_mount: Option<bool>,
}

/// Per-kind defaults of a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultOptions {
    pub queries: DefaultQueryOptions,
}

/// Configuration of a query client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryClientConfig {
    pub default_options: DefaultOptions,
}

impl QueryClientConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Defaults for queries.
    pub fn query_defaults(&self) -> &DefaultQueryOptions {
        &self.default_options.queries
    }
}

/// `Option<Duration>` as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_u64(duration.as_millis() as u64),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
