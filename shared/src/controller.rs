//! Single-flight request controller.
//!
//! Every [`RequestController::submit`] bumps the resource kind's generation
//! and signals the previous request's token before the new fetch starts.
//! Each request then runs as its own task racing the fetch against its
//! cancellation token and, for custom ranges, the escalation deadline.
//! Outcomes are settled under the registry lock: only the request that is
//! still current may reach the presenter or publish an event.

use geojson::FeatureCollection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn, Instrument};
use url::Url;
use uuid::Uuid;

use crate::capabilities::{DatasetPresenter, FetchError, FetchResponse, Fetcher};
use crate::cancel::{CancelToken, CancellationReason};
use crate::classify::{classify_cancellation, LoadFailure};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::escalation::{Escalation, EscalationPolicy, EscalationState, EscalationStep};
use crate::event::ControllerEvent;
use crate::query::{Generation, Query, ResourceKind};
use crate::registry::{self, LiveRequest, ResourceRegistry, SharedRegistry};

// ============================================================================
// Outcomes
// ============================================================================

/// Terminal outcome of one request generation.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    Success(FeatureCollection),
    EmptyResult,
    Failure(LoadFailure),
    /// A newer request for the same resource kind replaced this one.
    Superseded,
    /// Stopped by the user or by the escalation timeout.
    Cancelled(CancellationReason),
}

impl LoadResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn feature_count(&self) -> usize {
        match self {
            Self::Success(collection) => collection.features.len(),
            _ => 0,
        }
    }
}

/// Caller's view of one submitted request.
///
/// Dropping the handle does not cancel the request; the controller keeps
/// driving it to a terminal outcome.
#[derive(Debug)]
pub struct RequestHandle {
    resource_kind: ResourceKind,
    generation: Generation,
    request_id: Uuid,
    query: Query,
    token: CancelToken,
    registry: SharedRegistry,
    outcome: oneshot::Receiver<LoadResult>,
}

impl RequestHandle {
    #[must_use]
    pub fn resource_kind(&self) -> &ResourceKind {
        &self.resource_kind
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.token
    }

    /// Cancels this request while it is still the live one for its kind,
    /// exactly like [`RequestController::cancel_current`]. Returns `false`
    /// once it has been cancelled, superseded or settled.
    pub fn cancel(&self, reason: CancellationReason) -> bool {
        registry::lock(&self.registry)
            .cancel(&self.resource_kind, Some(self.generation), reason)
            .is_some()
    }

    pub async fn outcome(self) -> OrchestratorResult<LoadResult> {
        self.outcome
            .await
            .map_err(|_| OrchestratorError::OutcomeLost {
                resource_kind: self.resource_kind,
                generation: self.generation,
            })
    }
}

// ============================================================================
// Metrics
// ============================================================================

#[derive(Debug, Default)]
pub struct ControllerMetrics {
    pub submitted: AtomicU64,
    pub superseded: AtomicU64,
    pub loaded: AtomicU64,
    pub empty: AtomicU64,
    pub failed: AtomicU64,
    pub user_cancelled: AtomicU64,
    pub timed_out: AtomicU64,
    pub warnings: AtomicU64,
}

impl ControllerMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            loaded: self.loaded.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            user_cancelled: self.user_cancelled.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub superseded: u64,
    pub loaded: u64,
    pub empty: u64,
    pub failed: u64,
    pub user_cancelled: u64,
    pub timed_out: u64,
    pub warnings: u64,
}

// ============================================================================
// Controller
// ============================================================================

pub struct RequestController<F: Fetcher + 'static> {
    inner: Arc<Inner<F>>,
}

impl<F: Fetcher + 'static> Clone for RequestController<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<F> {
    fetcher: F,
    presenter: Arc<dyn DatasetPresenter>,
    config: OrchestratorConfig,
    policy: EscalationPolicy,
    registry: SharedRegistry,
    events: mpsc::UnboundedSender<ControllerEvent>,
    metrics: ControllerMetrics,
}

/// Immutable facts about one running request.
struct Flight {
    kind: ResourceKind,
    generation: Generation,
    request_id: Uuid,
    url: Url,
    token: CancelToken,
}

enum Fetched {
    Done(Result<FetchResponse, FetchError>),
    Cancelled(CancellationReason),
}

impl<F: Fetcher + 'static> RequestController<F> {
    /// Builds a controller and the receiving end of its event stream.
    pub fn new(
        fetcher: F,
        presenter: Arc<dyn DatasetPresenter>,
        config: OrchestratorConfig,
    ) -> OrchestratorResult<(Self, mpsc::UnboundedReceiver<ControllerEvent>)> {
        config.validate()?;
        let (events, receiver) = mpsc::unbounded_channel();
        let policy = config.escalation_policy();

        info!(
            resource_kinds = config.endpoints.len(),
            warn_after_ms = config.warn_after_ms,
            extend_by_ms = config.extend_by_ms,
            "request controller initialized"
        );

        let controller = Self {
            inner: Arc::new(Inner {
                fetcher,
                presenter,
                config,
                policy,
                registry: Arc::new(Mutex::new(ResourceRegistry::new())),
                events,
                metrics: ControllerMetrics::default(),
            }),
        };
        Ok((controller, receiver))
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Starts `query`, superseding whatever was in flight for its kind.
    ///
    /// Returns as soon as the request is registered. Must be called from
    /// within a Tokio runtime.
    #[instrument(skip(self, query), fields(resource_kind = %query.resource_kind(), custom = query.is_custom()))]
    pub fn submit(&self, query: Query) -> OrchestratorResult<RequestHandle> {
        let kind = query.resource_kind().clone();
        let endpoint = self
            .inner
            .config
            .endpoint(&kind)
            .ok_or_else(|| OrchestratorError::UnknownResource(kind.clone()))?;
        let url = endpoint.url_for(&query)?;

        let token = CancelToken::new();
        let request_id = Uuid::new_v4();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let wake = query.is_custom().then(|| Arc::new(Notify::new()));

        let generation = {
            let mut registry = self.inner.lock_registry();
            let (generation, previous) = registry.advance(&kind);
            if let Some(previous) = previous {
                previous.token.cancel(CancellationReason::Superseded);
                debug!(
                    previous_generation = %previous.generation,
                    previous_request_id = %previous.request_id,
                    "superseded in-flight request"
                );
            }
            registry.install(
                &kind,
                LiveRequest {
                    generation,
                    request_id,
                    token: token.clone(),
                    escalation: query
                        .is_custom()
                        .then(|| Escalation::start(self.inner.policy, Instant::now())),
                    wake: wake.clone(),
                },
            );
            generation
        };
        ControllerMetrics::bump(&self.inner.metrics.submitted);
        info!(
            %generation,
            %request_id,
            %url,
            span_days = query.time_range().map(|range| range.span().num_days()),
            "request submitted"
        );

        let flight = Flight {
            kind: kind.clone(),
            generation,
            request_id,
            url,
            token: token.clone(),
        };
        let inner = Arc::clone(&self.inner);
        tokio::spawn(
            async move {
                let fetched = inner.run(&flight, wake.as_deref()).await;
                let result = inner.settle(&flight, fetched);
                // The caller may have dropped its handle.
                let _ = outcome_tx.send(result);
            }
            .in_current_span(),
        );

        Ok(RequestHandle {
            resource_kind: kind,
            generation,
            request_id,
            query,
            token,
            registry: Arc::clone(&self.inner.registry),
            outcome: outcome_rx,
        })
    }

    /// Signals the live request of `kind`; `false` when nothing was live or
    /// it had already been cancelled.
    #[instrument(skip(self, kind), fields(resource_kind = %kind))]
    pub fn cancel_current(&self, kind: &ResourceKind, reason: CancellationReason) -> bool {
        match self.inner.lock_registry().cancel(kind, None, reason) {
            Some(generation) => {
                info!(%generation, ?reason, "cancellation requested");
                true
            }
            None => {
                debug!("nothing live left to cancel");
                false
            }
        }
    }

    /// Grants the warned request of `kind` its extended wait.
    #[instrument(skip(self, kind), fields(resource_kind = %kind))]
    pub fn continue_waiting(&self, kind: &ResourceKind) -> bool {
        let mut registry = self.inner.lock_registry();
        let Some(live) = registry.live_mut(kind) else {
            debug!("no live request to extend");
            return false;
        };
        let generation = live.generation;
        let Some(escalation) = live.escalation.as_mut() else {
            debug!(%generation, "request is not escalated");
            return false;
        };
        if !escalation.continue_waiting() {
            debug!(state = ?escalation.state(), "continue ignored outside the warned state");
            return false;
        }
        if let Some(wake) = &live.wake {
            wake.notify_one();
        }

        info!(%generation, "user chose to keep waiting");
        self.inner.emit(ControllerEvent::WarningCleared {
            resource_kind: kind.clone(),
            generation,
        });
        true
    }

    /// Supersedes anything in flight for `kind` and hides its layer.
    pub fn hide(&self, kind: &ResourceKind) {
        let mut registry = self.inner.lock_registry();
        let (generation, previous) = registry.advance(kind);
        if let Some(previous) = previous {
            previous.token.cancel(CancellationReason::Superseded);
            debug!(previous_generation = %previous.generation, "hide superseded in-flight request");
        }
        self.inner.presenter.hide(kind);
        debug!(resource_kind = %kind, %generation, "layer hidden");
    }

    /// `None` when nothing is live or the live query is not escalated.
    #[must_use]
    pub fn escalation_state(&self, kind: &ResourceKind) -> Option<EscalationState> {
        self.inner
            .lock_registry()
            .live(kind)
            .and_then(|live| live.escalation.as_ref())
            .map(Escalation::state)
    }

    #[must_use]
    pub fn current_generation(&self, kind: &ResourceKind) -> Generation {
        self.inner.lock_registry().generation(kind)
    }

    #[must_use]
    pub fn is_live(&self, kind: &ResourceKind) -> bool {
        self.inner.lock_registry().live(kind).is_some()
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl<F: Fetcher + 'static> Inner<F> {
    fn lock_registry(&self) -> MutexGuard<'_, ResourceRegistry> {
        registry::lock(&self.registry)
    }

    fn emit(&self, event: ControllerEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }

    async fn run(&self, flight: &Flight, wake: Option<&Notify>) -> Fetched {
        let fetch = self.fetcher.fetch(&flight.url, &flight.token);
        tokio::pin!(fetch);

        loop {
            let deadline = self.escalation_deadline(flight);
            tokio::select! {
                biased;
                reason = flight.token.cancelled() => return Fetched::Cancelled(reason),
                result = &mut fetch => return Fetched::Done(result),
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_deadline(flight);
                }
                () = woken(wake), if wake.is_some() => {}
            }
        }
    }

    fn escalation_deadline(&self, flight: &Flight) -> Option<Instant> {
        self.lock_registry()
            .current(&flight.kind, flight.generation)
            .and_then(|live| live.escalation.as_ref())
            .and_then(Escalation::deadline)
    }

    fn on_deadline(&self, flight: &Flight) {
        let mut registry = self.lock_registry();
        let Some(live) = registry.current_mut(&flight.kind, flight.generation) else {
            return;
        };
        // Whoever cancelled first already decided the outcome.
        if live.token.is_cancelled() {
            return;
        }
        let Some(escalation) = live.escalation.as_mut() else {
            return;
        };

        match escalation.on_deadline(Instant::now()) {
            Some(EscalationStep::Warn) => {
                ControllerMetrics::bump(&self.metrics.warnings);
                warn!(
                    resource_kind = %flight.kind,
                    generation = %flight.generation,
                    "request is taking longer than expected"
                );
                self.emit(ControllerEvent::Warned {
                    resource_kind: flight.kind.clone(),
                    generation: flight.generation,
                });
            }
            Some(EscalationStep::TimeOut) => {
                live.token.cancel(CancellationReason::Timeout);
            }
            None => {}
        }
    }

    /// Decides what, if anything, the presenter and the UI get to see.
    fn settle(&self, flight: &Flight, fetched: Fetched) -> LoadResult {
        let mut registry = self.lock_registry();
        if registry.finish(&flight.kind, flight.generation).is_none() {
            ControllerMetrics::bump(&self.metrics.superseded);
            debug!(
                resource_kind = %flight.kind,
                generation = %flight.generation,
                "dropping outcome of superseded request"
            );
            return LoadResult::Superseded;
        }

        // A cancellation that lands after the fetch finished still wins, and
        // only a request that is still current gets its body decoded.
        let result = match flight.token.reason() {
            Some(CancellationReason::Superseded) => LoadResult::Superseded,
            Some(reason) => LoadResult::Cancelled(reason),
            None => interpret(fetched),
        };

        let kind = flight.kind.clone();
        let generation = flight.generation;
        match &result {
            LoadResult::Success(collection) => {
                ControllerMetrics::bump(&self.metrics.loaded);
                self.presenter.present(&kind, collection);
                let feature_count = collection.features.len();
                info!(resource_kind = %kind, %generation, feature_count, "dataset loaded");
                self.emit(ControllerEvent::Loaded {
                    resource_kind: kind,
                    generation,
                    feature_count,
                });
            }
            LoadResult::EmptyResult => {
                ControllerMetrics::bump(&self.metrics.empty);
                self.presenter.show_empty(&kind);
                info!(resource_kind = %kind, %generation, "query matched no features");
                self.emit(ControllerEvent::Empty {
                    resource_kind: kind,
                    generation,
                });
            }
            LoadResult::Failure(failure) => {
                ControllerMetrics::bump(&self.metrics.failed);
                warn!(
                    resource_kind = %kind,
                    %generation,
                    request_id = %flight.request_id,
                    "{failure}"
                );
                self.emit(ControllerEvent::Failed {
                    resource_kind: kind,
                    generation,
                    category: failure.category,
                    message: failure.message.clone(),
                });
            }
            LoadResult::Cancelled(reason) => match classify_cancellation(*reason) {
                Some(category) => {
                    ControllerMetrics::bump(&self.metrics.timed_out);
                    warn!(resource_kind = %kind, %generation, "request timed out after extended wait");
                    self.emit(ControllerEvent::TimedOut {
                        resource_kind: kind,
                        generation,
                        message: category.user_message().to_string(),
                    });
                }
                None => {
                    ControllerMetrics::bump(&self.metrics.user_cancelled);
                    info!(resource_kind = %kind, %generation, "request cancelled by user");
                }
            },
            LoadResult::Superseded => {
                ControllerMetrics::bump(&self.metrics.superseded);
                debug!(resource_kind = %kind, %generation, "request superseded");
            }
        }
        result
    }
}

async fn woken(wake: Option<&Notify>) {
    match wake {
        Some(wake) => wake.notified().await,
        None => std::future::pending().await,
    }
}

/// Turns a raw fetch outcome into a result for a request that is still current.
fn interpret(fetched: Fetched) -> LoadResult {
    match fetched {
        Fetched::Cancelled(CancellationReason::Superseded) => LoadResult::Superseded,
        Fetched::Cancelled(reason) => LoadResult::Cancelled(reason),
        Fetched::Done(Err(error)) => LoadResult::Failure(LoadFailure::from_transport(&error)),
        Fetched::Done(Ok(response)) => interpret_response(&response),
    }
}

fn interpret_response(response: &FetchResponse) -> LoadResult {
    if let Some(failure) = LoadFailure::from_status(response.status()) {
        return LoadResult::Failure(failure);
    }
    // 204 is how the range service answers "no events in this window".
    if response.status() == 204 {
        return LoadResult::EmptyResult;
    }
    decode_collection(response.body())
}

fn decode_collection(body: &[u8]) -> LoadResult {
    match serde_json::from_slice::<FeatureCollection>(body) {
        Ok(collection) if collection.features.is_empty() => LoadResult::EmptyResult,
        Ok(collection) => LoadResult::Success(collection),
        Err(e) => LoadResult::Failure(LoadFailure::malformed(format!(
            "expected a GeoJSON FeatureCollection: {e}"
        ))),
    }
}
