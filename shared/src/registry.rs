use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::cancel::{CancelToken, CancellationReason};
use crate::escalation::Escalation;
use crate::query::{Generation, ResourceKind};

pub(crate) type SharedRegistry = Arc<Mutex<ResourceRegistry>>;

pub(crate) fn lock(registry: &Mutex<ResourceRegistry>) -> MutexGuard<'_, ResourceRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bookkeeping for the one request a resource kind may have in flight.
#[derive(Debug)]
pub(crate) struct LiveRequest {
    pub generation: Generation,
    pub request_id: Uuid,
    pub token: CancelToken,
    /// `None` for queries that are never escalated.
    pub escalation: Option<Escalation>,
    /// Wakes the request task after its deadline moved.
    pub wake: Option<Arc<Notify>>,
}

#[derive(Debug, Default)]
struct ResourceSlot {
    generation: Generation,
    live: Option<LiveRequest>,
}

/// `resource kind -> {generation, live request}`.
///
/// The only shared mutable state of the controller, escalation machines
/// included. Every method is a plain synchronous step; callers hold the
/// lock across each read-decide-write sequence.
#[derive(Debug, Default)]
pub(crate) struct ResourceRegistry {
    slots: HashMap<ResourceKind, ResourceSlot>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps the generation and detaches the previous live request, if any.
    pub fn advance(&mut self, kind: &ResourceKind) -> (Generation, Option<LiveRequest>) {
        let slot = self.slots.entry(kind.clone()).or_default();
        slot.generation = slot.generation.next();
        (slot.generation, slot.live.take())
    }

    /// Installs `live` if it still belongs to the newest generation.
    pub fn install(&mut self, kind: &ResourceKind, live: LiveRequest) -> bool {
        match self.slots.get_mut(kind) {
            Some(slot) if slot.generation == live.generation => {
                slot.live = Some(live);
                true
            }
            _ => false,
        }
    }

    pub fn generation(&self, kind: &ResourceKind) -> Generation {
        self.slots
            .get(kind)
            .map(|slot| slot.generation)
            .unwrap_or_default()
    }

    pub fn live(&self, kind: &ResourceKind) -> Option<&LiveRequest> {
        self.slots.get(kind).and_then(|slot| slot.live.as_ref())
    }

    pub fn live_mut(&mut self, kind: &ResourceKind) -> Option<&mut LiveRequest> {
        self.slots.get_mut(kind).and_then(|slot| slot.live.as_mut())
    }

    /// The live request of `kind` if it is `generation`.
    pub fn current(&self, kind: &ResourceKind, generation: Generation) -> Option<&LiveRequest> {
        self.live(kind).filter(|live| live.generation == generation)
    }

    pub fn current_mut(
        &mut self,
        kind: &ResourceKind,
        generation: Generation,
    ) -> Option<&mut LiveRequest> {
        self.live_mut(kind).filter(|live| live.generation == generation)
    }

    /// Signals the live request of `kind`, only if it is `generation` when
    /// one is given. Returns the generation that was cancelled; `None` when
    /// nothing matching was live or its token had already fired.
    pub fn cancel(
        &mut self,
        kind: &ResourceKind,
        generation: Option<Generation>,
        reason: CancellationReason,
    ) -> Option<Generation> {
        let live = self.live_mut(kind)?;
        if generation.is_some_and(|generation| generation != live.generation) {
            return None;
        }
        if !live.token.cancel(reason) {
            return None;
        }
        if let Some(escalation) = live.escalation.as_mut() {
            match reason {
                CancellationReason::User => {
                    escalation.user_cancelled();
                }
                CancellationReason::Timeout => {
                    escalation.timed_out();
                }
                CancellationReason::Superseded => {}
            }
        }
        Some(live.generation)
    }

    /// Clears and returns the live request when `generation` is still the
    /// current one; `None` means the request was superseded.
    pub fn finish(&mut self, kind: &ResourceKind, generation: Generation) -> Option<LiveRequest> {
        let slot = self.slots.get_mut(kind)?;
        if slot.generation != generation {
            return None;
        }
        match &slot.live {
            Some(live) if live.generation == generation => slot.live.take(),
            _ => None,
        }
    }
}
