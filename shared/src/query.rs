use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid resource kind: {0}")]
    InvalidResourceKind(String),

    #[error("start {start} must be before end {end}")]
    EmptyRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("end {end} is in the future (now {now})")]
    EndInFuture { end: DateTime<Utc>, now: DateTime<Utc> },

    #[error("a trailing window needs at least one day")]
    ZeroDays,
}

/// Logical dataset category; at most one query per kind is live.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKind(String);

impl ResourceKind {
    const MAX_LENGTH: usize = 64;
    pub const SEISMICITY: &'static str = "seismicity";

    pub fn new(id: impl Into<String>) -> Result<Self, QueryError> {
        let id = id.into().trim().to_string();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    #[must_use]
    pub fn seismicity() -> Self {
        Self(Self::SEISMICITY.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), QueryError> {
        if id.is_empty() {
            return Err(QueryError::InvalidResourceKind(
                "resource kind cannot be empty".into(),
            ));
        }
        if id.len() > Self::MAX_LENGTH {
            return Err(QueryError::InvalidResourceKind(format!(
                "resource kind exceeds {} characters",
                Self::MAX_LENGTH
            )));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(QueryError::InvalidResourceKind(format!(
                "'{id}' contains invalid characters (allowed: a-z, 0-9, -, _)"
            )));
        }
        Ok(())
    }
}

impl TryFrom<String> for ResourceKind {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.0
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonic per-kind counter distinguishing successive queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Absolute custom interval chosen by the user.
///
/// Construction through [`TimeRange::new`] enforces `start < end <= now`.
/// That check belongs to the UI layer; the controller submits whatever
/// range it is handed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, QueryError> {
        if start >= end {
            return Err(QueryError::EmptyRange { start, end });
        }
        if end > now {
            return Err(QueryError::EndInFuture { end, now });
        }
        Ok(Self { start, end })
    }

    /// The window ending at `now` and reaching `days` back.
    pub fn trailing_days(days: u32, now: DateTime<Utc>) -> Result<Self, QueryError> {
        if days == 0 {
            return Err(QueryError::ZeroDays);
        }
        let start = now - ChronoDuration::days(i64::from(days));
        Ok(Self { start, end: now })
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub fn span(&self) -> ChronoDuration {
        self.end - self.start
    }
}

/// Immutable request description handed to the controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    resource_kind: ResourceKind,
    time_range: Option<TimeRange>,
}

impl Query {
    /// The default recent window; never escalated.
    #[must_use]
    pub fn recent(resource_kind: ResourceKind) -> Self {
        Self {
            resource_kind,
            time_range: None,
        }
    }

    #[must_use]
    pub fn custom(resource_kind: ResourceKind, time_range: TimeRange) -> Self {
        Self {
            resource_kind,
            time_range: Some(time_range),
        }
    }

    #[must_use]
    pub fn resource_kind(&self) -> &ResourceKind {
        &self.resource_kind
    }

    #[must_use]
    pub fn time_range(&self) -> Option<&TimeRange> {
        self.time_range.as_ref()
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.time_range.is_some()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "range", rename_all = "snake_case")]
pub enum SeismicityMode {
    #[default]
    None,
    Recent,
    Custom(TimeRange),
}

impl SeismicityMode {
    /// The query this mode stands for; `None` shows nothing and has no query.
    #[must_use]
    pub fn query_for(&self, resource_kind: &ResourceKind) -> Option<Query> {
        match self {
            SeismicityMode::None => None,
            SeismicityMode::Recent => Some(Query::recent(resource_kind.clone())),
            SeismicityMode::Custom(range) => Some(Query::custom(resource_kind.clone(), *range)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_resource_kind_validation() {
        assert!(ResourceKind::new("seismicity").is_ok());
        assert!(ResourceKind::new("fault_traces-2").is_ok());
        assert!(ResourceKind::new("").is_err());
        assert!(ResourceKind::new("   ").is_err());
        assert!(ResourceKind::new("Seismicity").is_err());
        assert!(ResourceKind::new("a b").is_err());
        assert!(ResourceKind::new("a".repeat(65)).is_err());
    }

    #[test]
    fn test_resource_kind_trims_whitespace() {
        let kind = ResourceKind::new("  seismicity ").unwrap();
        assert_eq!(kind, ResourceKind::seismicity());
    }

    #[test]
    fn test_resource_kind_serde_validates() {
        let kind: ResourceKind = serde_json::from_str("\"seismicity\"").unwrap();
        assert_eq!(kind.as_str(), "seismicity");
        assert!(serde_json::from_str::<ResourceKind>("\"NOT OK\"").is_err());
    }

    #[test]
    fn test_time_range_rejects_inverted_and_empty() {
        let now = at(20);
        assert!(matches!(
            TimeRange::new(at(10), at(5), now),
            Err(QueryError::EmptyRange { .. })
        ));
        assert!(matches!(
            TimeRange::new(at(10), at(10), now),
            Err(QueryError::EmptyRange { .. })
        ));
    }

    #[test]
    fn test_time_range_rejects_future_end() {
        let err = TimeRange::new(at(1), at(21), at(20)).unwrap_err();
        assert_eq!(err, QueryError::EndInFuture { end: at(21), now: at(20) });
    }

    #[test]
    fn test_time_range_end_may_equal_now() {
        let range = TimeRange::new(at(1), at(20), at(20)).unwrap();
        assert_eq!(range.span(), ChronoDuration::days(19));
    }

    #[test]
    fn test_trailing_days() {
        let range = TimeRange::trailing_days(30, at(31)).unwrap();
        assert_eq!(range.start(), at(1));
        assert_eq!(range.end(), at(31));
        assert_eq!(TimeRange::trailing_days(0, at(31)), Err(QueryError::ZeroDays));
    }

    #[test]
    fn test_mode_to_query() {
        let kind = ResourceKind::seismicity();
        let range = TimeRange::new(at(1), at(2), at(3)).unwrap();

        assert_eq!(SeismicityMode::None.query_for(&kind), None);

        let recent = SeismicityMode::Recent.query_for(&kind).unwrap();
        assert!(!recent.is_custom());

        let custom = SeismicityMode::Custom(range).query_for(&kind).unwrap();
        assert_eq!(custom.time_range(), Some(&range));
        assert_eq!(custom, Query::custom(kind, range));
    }

    #[test]
    fn test_mode_serde_shape() {
        let json = serde_json::to_value(SeismicityMode::Recent).unwrap();
        assert_eq!(json, serde_json::json!({ "mode": "recent" }));
    }

    #[test]
    fn test_generation_display_and_next() {
        assert_eq!(Generation(4).next(), Generation(5));
        assert_eq!(Generation(u64::MAX).next(), Generation(u64::MAX));
        assert_eq!(Generation(7).to_string(), "#7");
    }

    proptest! {
        #[test]
        fn prop_ordered_past_ranges_are_accepted(
            start in 0i64..1_000_000,
            width in 1i64..1_000_000,
            slack in 0i64..1_000_000,
        ) {
            let base = at(1);
            let start = base + ChronoDuration::seconds(start);
            let end = start + ChronoDuration::seconds(width);
            let now = end + ChronoDuration::seconds(slack);
            let range = TimeRange::new(start, end, now).unwrap();
            prop_assert!(range.start() < range.end());
        }

        #[test]
        fn prop_future_end_is_rejected(ahead in 1i64..1_000_000) {
            let now = at(10);
            let end = now + ChronoDuration::seconds(ahead);
            let is_future = matches!(
                TimeRange::new(at(1), end, now),
                Err(QueryError::EndInFuture { .. })
            );
            prop_assert!(is_future);
        }
    }
}
