use thiserror::Error;

use crate::config::ConfigError;
use crate::query::{Generation, QueryError, ResourceKind};

/// Errors raised by the orchestration API itself.
///
/// Network and server failures are never reported here. Those reach the UI
/// as a classified [`crate::LoadFailure`] inside the request outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("no endpoint configured for resource kind '{0}'")]
    UnknownResource(ResourceKind),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("outcome of {resource_kind} request {generation} was dropped")]
    OutcomeLost {
        resource_kind: ResourceKind,
        generation: Generation,
    },
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = OrchestratorError::UnknownResource(ResourceKind::new("faults").unwrap());
        assert_eq!(
            err.to_string(),
            "no endpoint configured for resource kind 'faults'"
        );

        let err = OrchestratorError::OutcomeLost {
            resource_kind: ResourceKind::seismicity(),
            generation: Generation(3),
        };
        assert_eq!(err.to_string(), "outcome of seismicity request #3 was dropped");
    }

    #[test]
    fn test_conversions() {
        let err: OrchestratorError = QueryError::ZeroDays.into();
        assert!(matches!(err, OrchestratorError::Query(QueryError::ZeroDays)));

        let err: OrchestratorError = ConfigError::Invalid("x".into()).into();
        assert_eq!(err.to_string(), "invalid configuration: x");
    }
}
