#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use geojson::FeatureCollection;
use quakeview_core::{
    CancelToken, ControllerEvent, DatasetPresenter, FetchError, FetchResponse, Fetcher,
    OrchestratorConfig, Query, RequestController, ResourceKind, TimeRange,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;

// --- Scripted network ---

/// What the fake network does for one fetch, in call order.
#[derive(Debug, Clone)]
pub enum Script {
    /// Answers after `after`, even if the token was cancelled meanwhile.
    Respond {
        after: Duration,
        status: u16,
        body: String,
    },
    Fail {
        after: Duration,
        error: FetchError,
    },
    /// Never answers; aborts only when cancelled.
    Hang,
}

impl Script {
    pub fn ok(after_secs: u64, body: impl Into<String>) -> Self {
        Self::Respond {
            after: Duration::from_secs(after_secs),
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(after_secs: u64, status: u16, body: impl Into<String>) -> Self {
        Self::Respond {
            after: Duration::from_secs(after_secs),
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<(Url, CancelToken)>>,
}

impl ScriptedFetcher {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(Url, CancelToken)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, cancel: &CancelToken) -> Result<FetchResponse, FetchError> {
        self.calls.lock().unwrap().push((url.clone(), cancel.clone()));
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::Hang);

        match script {
            Script::Respond {
                after,
                status,
                body,
            } => {
                tokio::time::sleep(after).await;
                Ok(FetchResponse::new(status, body))
            }
            Script::Fail { after, error } => {
                tokio::time::sleep(after).await;
                Err(error)
            }
            Script::Hang => {
                cancel.cancelled().await;
                Err(FetchError::Aborted)
            }
        }
    }
}

// --- Recording map ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presented {
    Present {
        resource_kind: ResourceKind,
        feature_count: usize,
    },
    Hide(ResourceKind),
    Empty(ResourceKind),
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    calls: Mutex<Vec<Presented>>,
}

impl RecordingPresenter {
    pub fn calls(&self) -> Vec<Presented> {
        self.calls.lock().unwrap().clone()
    }

    pub fn presented_counts(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Presented::Present { feature_count, .. } => Some(feature_count),
                _ => None,
            })
            .collect()
    }
}

impl DatasetPresenter for RecordingPresenter {
    fn present(&self, resource_kind: &ResourceKind, features: &FeatureCollection) {
        self.calls.lock().unwrap().push(Presented::Present {
            resource_kind: resource_kind.clone(),
            feature_count: features.features.len(),
        });
    }

    fn hide(&self, resource_kind: &ResourceKind) {
        self.calls
            .lock()
            .unwrap()
            .push(Presented::Hide(resource_kind.clone()));
    }

    fn show_empty(&self, resource_kind: &ResourceKind) {
        self.calls
            .lock()
            .unwrap()
            .push(Presented::Empty(resource_kind.clone()));
    }
}

// --- Fixtures ---

pub struct Harness {
    pub controller: RequestController<Arc<ScriptedFetcher>>,
    pub events: UnboundedReceiver<ControllerEvent>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub presenter: Arc<RecordingPresenter>,
}

impl Harness {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        let fetcher = ScriptedFetcher::new(scripts);
        let presenter = Arc::new(RecordingPresenter::default());
        let (controller, events) = RequestController::new(
            Arc::clone(&fetcher),
            presenter.clone(),
            OrchestratorConfig::default(),
        )
        .unwrap();
        Self {
            controller,
            events,
            fetcher,
            presenter,
        }
    }

    /// Everything published so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub fn seismicity() -> ResourceKind {
    ResourceKind::seismicity()
}

/// January 2024, validated against the first of February.
pub fn january_2024() -> TimeRange {
    TimeRange::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

pub fn custom_query() -> Query {
    Query::custom(seismicity(), january_2024())
}

pub fn recent_query() -> Query {
    Query::recent(seismicity())
}

/// A USGS-shaped collection with `count` point events.
pub fn quakes_json(count: usize) -> String {
    let features: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "type": "Feature",
                "id": format!("us7000{i:04}"),
                "geometry": { "type": "Point", "coordinates": [-120.0 - i as f64, 36.0, 10.0] },
                "properties": {
                    "mag": 2.5 + i as f64 / 10.0,
                    "place": format!("{i} km NE of Parkfield, CA"),
                    "time": 1_705_330_245_000_i64,
                    "tsunami": 0
                }
            })
        })
        .collect();
    serde_json::json!({ "type": "FeatureCollection", "features": features }).to_string()
}

/// Paused-clock timers fire on millisecond ticks.
pub fn assert_elapsed(since: tokio::time::Instant, secs: u64) {
    let elapsed = since.elapsed();
    let expected = Duration::from_secs(secs);
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(5),
        "expected ~{secs}s, got {elapsed:?}"
    );
}
