//! Asynchronous data-loading core for the fault and earthquake map.
//!
//! The map shell owns rendering and widgets. This crate owns the part that
//! talks to the network: a single-flight [`RequestController`] per resource
//! kind, the slow-request [`Escalation`] machine, the failure classifier and
//! the view snapshot/restore used by a full refresh.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod capabilities;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod controller;
pub mod error;
pub mod escalation;
pub mod event;
pub mod model;
pub mod properties;
pub mod query;
mod registry;
pub mod session;
pub mod snapshot;

use std::time::Duration;

pub use capabilities::{DatasetPresenter, FetchError, FetchResponse, Fetcher};
#[cfg(feature = "http-client")]
pub use capabilities::HttpFetcher;
pub use cancel::{CancelToken, CancellationReason};
pub use classify::{classify_status, ErrorCategory, LoadFailure};
pub use config::{ConfigError, Endpoint, OrchestratorConfig};
pub use controller::{LoadResult, MetricsSnapshot, RequestController, RequestHandle};
pub use error::{OrchestratorError, OrchestratorResult};
pub use escalation::{Escalation, EscalationPolicy, EscalationState, EscalationStep};
pub use event::{ControllerEvent, UiEvent};
pub use model::{InMemoryView, StaticLayer, ViewSelection, ViewState};
pub use properties::{feature_property_rows, PropertyRow};
pub use query::{Generation, Query, QueryError, ResourceKind, SeismicityMode, TimeRange};
pub use session::MapSession;
pub use snapshot::{restore, snapshot};

pub const USGS_RECENT_FEED_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_week.geojson";
pub const USGS_EVENT_QUERY_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";

pub const DEFAULT_WARN_AFTER: Duration = Duration::from_secs(60);
pub const DEFAULT_EXTEND_BY: Duration = Duration::from_secs(120);
/// Width of the window pre-filled when the user switches to a custom range.
pub const DEFAULT_CUSTOM_RANGE_DAYS: u32 = 30;
