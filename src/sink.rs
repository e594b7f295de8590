//! Action sink collaborator
//!
//! Terminal, best-effort delivery of health events to whatever executes or
//! displays them. The core never waits for a pause/stop to take effect.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collision::{CollisionRecord, Severity};
use crate::guardrail::GuardrailEvaluation;
use crate::recommendation::Recommendation;
use crate::srm::SrmReport;

/// Event emitted by the health core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HealthEvent {
    /// A guardrail fired; the runtime should execute `evaluation.action`.
    GuardrailTriggered {
        /// Guarded experiment.
        experiment_id: String,
        /// Rule display name.
        rule_name: String,
        /// The firing evaluation.
        evaluation: GuardrailEvaluation,
    },
    /// The traffic split deviates from the configured allocation.
    SrmMismatch {
        /// Affected experiment.
        experiment_id: String,
        /// Test outcome.
        report: SrmReport,
    },
    /// A recommendation was computed.
    Recommendation {
        /// Analyzed experiment.
        experiment_id: String,
        /// The call.
        recommendation: Recommendation,
    },
    /// Two scheduled experiments collide.
    Collision(CollisionRecord),
}

/// Receiver of health events. Dispatch is fire-and-forget.
pub trait ActionSink: Send + Sync {
    /// Deliver one event.
    fn dispatch(&self, event: HealthEvent);
}

impl<T: ActionSink + ?Sized> ActionSink for Arc<T> {
    fn dispatch(&self, event: HealthEvent) {
        (**self).dispatch(event);
    }
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ActionSink for TracingSink {
    fn dispatch(&self, event: HealthEvent) {
        match &event {
            HealthEvent::GuardrailTriggered {
                experiment_id,
                rule_name,
                evaluation,
            } => warn!(
                experiment_id = %experiment_id,
                rule = %rule_name,
                action = %evaluation.action,
                "guardrail action requested"
            ),
            HealthEvent::SrmMismatch {
                experiment_id,
                report,
            } => warn!(
                experiment_id = %experiment_id,
                p_value = report.p_value,
                "sample ratio mismatch"
            ),
            HealthEvent::Recommendation {
                experiment_id,
                recommendation,
            } => info!(
                experiment_id = %experiment_id,
                recommendation = %recommendation.kind,
                confidence = recommendation.confidence,
                "recommendation computed"
            ),
            HealthEvent::Collision(record) if record.severity == Severity::Error => warn!(
                experiments = ?record.experiment_ids,
                "{}", record.message
            ),
            HealthEvent::Collision(record) => info!(
                experiments = ?record.experiment_ids,
                "{}", record.message
            ),
        }
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, in dispatch order.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return recorded events.
    pub fn drain(&self) -> Vec<HealthEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ActionSink for RecordingSink {
    fn dispatch(&self, event: HealthEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Sink forwarding events into a tokio channel for an async executor.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: tokio::sync::mpsc::UnboundedSender<HealthEvent>,
}

#[cfg(feature = "tokio")]
impl ChannelSink {
    /// Create a sink and the receiver the executor drains.
    #[must_use]
    pub fn channel() -> (Self, tokio::sync::mpsc::UnboundedReceiver<HealthEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[cfg(feature = "tokio")]
impl ActionSink for ChannelSink {
    fn dispatch(&self, event: HealthEvent) {
        if self.sender.send(event).is_err() {
            warn!("action executor gone (receiver dropped), event discarded");
        }
    }
}
