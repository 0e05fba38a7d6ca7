use serde::{Deserialize, Serialize};

use crate::classify::ErrorCategory;
use crate::model::StaticLayer;
use crate::query::{Generation, ResourceKind, SeismicityMode};

// --- Inbound: actions the map shell forwards from its widgets ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum UiEvent {
    /// Radio group "none / past 7 days / custom range" changed.
    SeismicityModeChanged(SeismicityMode),
    RefreshRequested,
    /// "Cancel" on the slow-request notice.
    CancelRequested,
    /// "Keep waiting" on the slow-request notice.
    ContinueWaitingRequested,
    StaticLayerToggled {
        layer: StaticLayer,
        visible: bool,
    },
}

// --- Outbound: what the controller reports back ---

/// One observable step of a request.
///
/// Superseded and user-cancelled requests publish nothing at all.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ControllerEvent {
    Warned {
        resource_kind: ResourceKind,
        generation: Generation,
    },
    WarningCleared {
        resource_kind: ResourceKind,
        generation: Generation,
    },
    TimedOut {
        resource_kind: ResourceKind,
        generation: Generation,
        message: String,
    },
    Loaded {
        resource_kind: ResourceKind,
        generation: Generation,
        feature_count: usize,
    },
    Empty {
        resource_kind: ResourceKind,
        generation: Generation,
    },
    Failed {
        resource_kind: ResourceKind,
        generation: Generation,
        category: ErrorCategory,
        message: String,
    },
}

impl ControllerEvent {
    #[must_use]
    pub fn resource_kind(&self) -> &ResourceKind {
        match self {
            Self::Warned { resource_kind, .. }
            | Self::WarningCleared { resource_kind, .. }
            | Self::TimedOut { resource_kind, .. }
            | Self::Loaded { resource_kind, .. }
            | Self::Empty { resource_kind, .. }
            | Self::Failed { resource_kind, .. } => resource_kind,
        }
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        match self {
            Self::Warned { generation, .. }
            | Self::WarningCleared { generation, .. }
            | Self::TimedOut { generation, .. }
            | Self::Loaded { generation, .. }
            | Self::Empty { generation, .. }
            | Self::Failed { generation, .. } => *generation,
        }
    }

    /// Terminal events end a request; at most one is published per generation.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Warned { .. } | Self::WarningCleared { .. })
    }

    /// The single human-readable message to surface, if any.
    #[must_use]
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::TimedOut { message, .. } | Self::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}
