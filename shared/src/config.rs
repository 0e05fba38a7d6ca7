use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::escalation::EscalationPolicy;
use crate::query::{Query, ResourceKind};
use crate::{DEFAULT_EXTEND_BY, DEFAULT_WARN_AFTER, USGS_EVENT_QUERY_URL, USGS_RECENT_FEED_URL};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid endpoint URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Where one resource kind's data comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Default recent-window feed.
    pub recent_url: String,
    /// Time-range query service; the range is appended as query parameters.
    pub range_url: String,
}

impl Endpoint {
    #[must_use]
    pub fn usgs_seismicity() -> Self {
        Self {
            recent_url: USGS_RECENT_FEED_URL.to_string(),
            range_url: USGS_EVENT_QUERY_URL.to_string(),
        }
    }

    pub fn url_for(&self, query: &Query) -> Result<Url, ConfigError> {
        let Some(range) = query.time_range() else {
            return parse_http_url(&self.recent_url);
        };

        let mut url = parse_http_url(&self.range_url)?;
        url.query_pairs_mut()
            .append_pair("format", "geojson")
            .append_pair(
                "starttime",
                &range.start().to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .append_pair(
                "endtime",
                &range.end().to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        Ok(url)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        parse_http_url(&self.recent_url)?;
        parse_http_url(&self.range_url)?;
        Ok(())
    }
}

fn parse_http_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: "URL must have a host".to_string(),
        });
    }
    Ok(url)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Silence before the "taking longer than expected" notice.
    pub warn_after_ms: u64,
    /// Extra patience granted when the user keeps waiting.
    pub extend_by_ms: u64,
    pub endpoints: BTreeMap<ResourceKind, Endpoint>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(ResourceKind::seismicity(), Endpoint::usgs_seismicity());
        Self {
            warn_after_ms: millis(DEFAULT_WARN_AFTER),
            extend_by_ms: millis(DEFAULT_EXTEND_BY),
            endpoints,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl OrchestratorConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.warn_after_ms == 0 {
            return Err(ConfigError::Invalid("warn_after_ms must be > 0".into()));
        }
        if self.extend_by_ms == 0 {
            return Err(ConfigError::Invalid("extend_by_ms must be > 0".into()));
        }
        if self.endpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one resource endpoint is required".into(),
            ));
        }
        for endpoint in self.endpoints.values() {
            endpoint.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn endpoint(&self, resource_kind: &ResourceKind) -> Option<&Endpoint> {
        self.endpoints.get(resource_kind)
    }

    #[must_use]
    pub fn escalation_policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            warn_after: Duration::from_millis(self.warn_after_ms),
            extend_by: Duration::from_millis(self.extend_by_ms),
        }
    }
}
