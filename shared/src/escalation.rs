//! Slow-request escalation for custom-range queries.
//!
//! ```text
//! Normal --warn_after elapses--> Warned --continue--> Extended --extend_by elapses--> TimedOut
//!   |                              |                     |
//!   +------------------------------+---------------------+--user cancel--> UserCancelled
//! ```
//!
//! Both deadlines count from the request start. While `Warned` nothing
//! fires on its own; the user must choose. The machine is a plain value
//! driven by the caller's clock so it can be exercised without a runtime.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::{DEFAULT_EXTEND_BY, DEFAULT_WARN_AFTER};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationState {
    Normal,
    Warned,
    Extended,
    TimedOut,
    UserCancelled,
}

impl EscalationState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::TimedOut | Self::UserCancelled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub warn_after: Duration,
    pub extend_by: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            warn_after: DEFAULT_WARN_AFTER,
            extend_by: DEFAULT_EXTEND_BY,
        }
    }
}

/// What the owner must do after a deadline fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscalationStep {
    /// Show the slow-request notice.
    Warn,
    /// Abort the request and report the timeout.
    TimeOut,
}

#[derive(Clone, Debug)]
pub struct Escalation {
    policy: EscalationPolicy,
    started_at: Instant,
    state: EscalationState,
    deadline: Option<Instant>,
}

impl Escalation {
    /// Arms the warn deadline relative to `started_at`.
    #[must_use]
    pub fn start(policy: EscalationPolicy, started_at: Instant) -> Self {
        Self {
            policy,
            started_at,
            state: EscalationState::Normal,
            deadline: Some(started_at + policy.warn_after),
        }
    }

    #[must_use]
    pub fn state(&self) -> EscalationState {
        self.state
    }

    /// The next instant at which [`Escalation::on_deadline`] has work to do.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Advances the machine if its deadline has passed.
    pub fn on_deadline(&mut self, now: Instant) -> Option<EscalationStep> {
        match self.deadline {
            Some(deadline) if now >= deadline => {}
            _ => return None,
        }

        match self.state {
            EscalationState::Normal => {
                self.state = EscalationState::Warned;
                self.deadline = None;
                Some(EscalationStep::Warn)
            }
            EscalationState::Extended => {
                self.state = EscalationState::TimedOut;
                self.deadline = None;
                Some(EscalationStep::TimeOut)
            }
            EscalationState::Warned | EscalationState::TimedOut | EscalationState::UserCancelled => {
                self.deadline = None;
                None
            }
        }
    }

    /// Arms the final deadline at `warn_after + extend_by` past the start.
    /// Ignored unless currently warned.
    ///
    /// An answer given after that instant leaves a deadline that is already
    /// due, so the next [`Escalation::on_deadline`] times out at once.
    pub fn continue_waiting(&mut self) -> bool {
        if self.state != EscalationState::Warned {
            return false;
        }
        self.state = EscalationState::Extended;
        self.deadline = Some(self.started_at + self.policy.warn_after + self.policy.extend_by);
        true
    }

    pub fn user_cancelled(&mut self) -> bool {
        self.finish(EscalationState::UserCancelled)
    }

    /// The request was stopped for taking too long by someone other than
    /// this machine.
    pub fn timed_out(&mut self) -> bool {
        self.finish(EscalationState::TimedOut)
    }

    fn finish(&mut self, terminal: EscalationState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = terminal;
        self.deadline = None;
        true
    }
}
