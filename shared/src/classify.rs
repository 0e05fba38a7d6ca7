use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::FetchError;
use crate::cancel::CancellationReason;

/// Closed set of user-facing failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// 4xx: the service refused the query as malformed.
    ClientRequestInvalid,
    /// 503-class: the service is shedding load.
    ServerOverloaded,
    /// Any other 5xx, or a success status with an unreadable body.
    ServerError,
    /// No HTTP status at all: DNS, refused or reset connection.
    TransportFailure,
    /// Only produced when the extended wait runs out.
    Cancelled,
}

impl ErrorCategory {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ClientRequestInvalid => "CLIENT_REQUEST_INVALID",
            Self::ServerOverloaded => "SERVER_OVERLOADED",
            Self::ServerError => "SERVER_ERROR",
            Self::TransportFailure => "TRANSPORT_FAILURE",
            Self::Cancelled => "CANCELLED",
        }
    }

    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::ClientRequestInvalid => {
                "The earthquake service rejected this query. Please check the start and end dates and try again."
            }
            Self::ServerOverloaded => {
                "The earthquake service is busy. Try a smaller date range or try again in a few minutes."
            }
            Self::ServerError => {
                "The earthquake service reported an error. Please try again later."
            }
            Self::TransportFailure => {
                "Unable to reach the earthquake service. Please check your connection and try again."
            }
            Self::Cancelled => {
                "The request took too long and was cancelled. Try a smaller date range."
            }
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Maps an HTTP status to its failure category; `None` for 2xx.
///
/// Only the status is consulted. Error bodies are never decoded.
#[must_use]
pub const fn classify_status(status: u16) -> Option<ErrorCategory> {
    match status {
        200..=299 => None,
        429 | 503 | 504 => Some(ErrorCategory::ServerOverloaded),
        400..=499 => Some(ErrorCategory::ClientRequestInvalid),
        _ => Some(ErrorCategory::ServerError),
    }
}

/// Transport errors have no status and always share one category.
#[must_use]
pub const fn classify_transport(_error: &FetchError) -> ErrorCategory {
    ErrorCategory::TransportFailure
}

/// Only a timeout is worth a message; superseded and user cancellations are
/// expected orchestration and stay silent.
#[must_use]
pub const fn classify_cancellation(reason: CancellationReason) -> Option<ErrorCategory> {
    match reason {
        CancellationReason::Timeout => Some(ErrorCategory::Cancelled),
        CancellationReason::User | CancellationReason::Superseded => None,
    }
}

/// A classified failure ready to be surfaced once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    pub category: ErrorCategory,
    pub message: String,
    pub status: Option<u16>,
    pub internal_message: Option<String>,
}

impl LoadFailure {
    #[must_use]
    pub fn new(category: ErrorCategory) -> Self {
        Self {
            category,
            message: category.user_message().to_string(),
            status: None,
            internal_message: None,
        }
    }

    /// `None` when the status is a success.
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        classify_status(status).map(|category| Self {
            status: Some(status),
            internal_message: Some(format!("HTTP status {status}")),
            ..Self::new(category)
        })
    }

    #[must_use]
    pub fn from_transport(error: &FetchError) -> Self {
        Self::new(classify_transport(error)).with_internal(error.to_string())
    }

    /// A 2xx response whose body is not a feature collection.
    #[must_use]
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self {
            message: "The earthquake service returned data that could not be read. Please try again later."
                .to_string(),
            ..Self::new(ErrorCategory::ServerError)
        }
        .with_internal(detail)
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classification_table() {
        assert_eq!(classify_status(503), Some(ErrorCategory::ServerOverloaded));
        assert_eq!(classify_status(400), Some(ErrorCategory::ClientRequestInvalid));
        assert_eq!(classify_status(500), Some(ErrorCategory::ServerError));
        assert_eq!(classify_status(200), None);
        assert_eq!(classify_status(204), None);
    }

    #[test]
    fn test_overload_class_statuses() {
        assert_eq!(classify_status(429), Some(ErrorCategory::ServerOverloaded));
        assert_eq!(classify_status(504), Some(ErrorCategory::ServerOverloaded));
    }

    #[test]
    fn test_unexpected_statuses_are_server_errors() {
        assert_eq!(classify_status(302), Some(ErrorCategory::ServerError));
        assert_eq!(classify_status(102), Some(ErrorCategory::ServerError));
    }

    #[test]
    fn test_transport_failure_has_no_status() {
        let error = FetchError::Connection {
            host: "earthquake.usgs.gov".into(),
            message: "connection reset".into(),
        };
        let failure = LoadFailure::from_transport(&error);
        assert_eq!(failure.category, ErrorCategory::TransportFailure);
        assert_eq!(failure.status, None);
        assert_eq!(failure.message, ErrorCategory::TransportFailure.user_message());
        assert!(failure.internal_message.unwrap().contains("connection reset"));
    }

    #[test]
    fn test_failure_from_status_uses_category_message() {
        let failure = LoadFailure::from_status(503).unwrap();
        assert_eq!(failure.category, ErrorCategory::ServerOverloaded);
        assert_eq!(failure.status, Some(503));
        assert!(failure.message.contains("smaller date range"));
        assert!(LoadFailure::from_status(200).is_none());
    }

    #[test]
    fn test_only_timeout_cancellation_is_surfaced() {
        assert_eq!(
            classify_cancellation(CancellationReason::Timeout),
            Some(ErrorCategory::Cancelled)
        );
        assert_eq!(classify_cancellation(CancellationReason::User), None);
        assert_eq!(classify_cancellation(CancellationReason::Superseded), None);
    }

    #[test]
    fn test_malformed_is_server_error() {
        let failure = LoadFailure::malformed("expected FeatureCollection");
        assert_eq!(failure.category, ErrorCategory::ServerError);
        assert_ne!(failure.message, ErrorCategory::ServerError.user_message());
        assert_eq!(
            failure.to_string(),
            format!(
                "[SERVER_ERROR] {} (internal: expected FeatureCollection)",
                failure.message
            )
        );
    }

    proptest! {
        #[test]
        fn prop_success_statuses_never_fail(status in 200u16..300) {
            prop_assert_eq!(classify_status(status), None);
        }

        #[test]
        fn prop_other_5xx_are_server_errors(status in 500u16..600) {
            prop_assume!(status != 503 && status != 504);
            prop_assert_eq!(classify_status(status), Some(ErrorCategory::ServerError));
        }

        #[test]
        fn prop_4xx_are_client_errors_except_rate_limit(status in 400u16..500) {
            prop_assume!(status != 429);
            prop_assert_eq!(classify_status(status), Some(ErrorCategory::ClientRequestInvalid));
        }
    }
}
