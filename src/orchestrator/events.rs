//! Progress and result events and the sinks that receive them

use crate::error::{FailureReason, Result};
use crate::models::{Measurement, Sample, TestRun};
use crate::types::Phase;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Everything a consumer learns about a run, in emission order.
///
/// Serialized as JSON objects with a `type` discriminator, e.g.
/// `{"type":"phase-started","phase":"download"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SpeedTestEvent {
    PhaseStarted {
        phase: Phase,
    },
    Progress {
        phase: Phase,
        sample: Sample,
        speed_mbps: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress_percent: Option<f64>,
    },
    PhaseCompleted {
        phase: Phase,
        measurement: Measurement,
    },
    RunCompleted {
        test_run: TestRun,
    },
    RunFailed {
        reason: FailureReason,
        message: String,
    },
}

impl SpeedTestEvent {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            SpeedTestEvent::PhaseStarted { phase }
            | SpeedTestEvent::Progress { phase, .. }
            | SpeedTestEvent::PhaseCompleted { phase, .. } => Some(*phase),
            SpeedTestEvent::RunCompleted { .. } | SpeedTestEvent::RunFailed { .. } => None,
        }
    }

    /// `RunCompleted` and `RunFailed` end a run's stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SpeedTestEvent::RunCompleted { .. } | SpeedTestEvent::RunFailed { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SpeedTestEvent::PhaseStarted { .. } => "phase-started",
            SpeedTestEvent::Progress { .. } => "progress",
            SpeedTestEvent::PhaseCompleted { .. } => "phase-completed",
            SpeedTestEvent::RunCompleted { .. } => "run-completed",
            SpeedTestEvent::RunFailed { .. } => "run-failed",
        }
    }

    /// One line of the JSON event stream
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Receiver of run events. `emit` is called from inside the measurement
/// loop and must return without waiting.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SpeedTestEvent);
}

impl<F> EventSink for F
where
    F: Fn(SpeedTestEvent) + Send + Sync,
{
    fn emit(&self, event: SpeedTestEvent) {
        self(event)
    }
}

/// Forwards events into a tokio channel.
///
/// Only `Progress` events are bounded: once `capacity` of them are waiting
/// unread, further progress is dropped and counted. Phase boundaries and
/// the terminal event are always queued, so a slow consumer still sees the
/// complete outline of the run in order.
#[derive(Debug)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<SpeedTestEvent>,
    pending_progress: Arc<AtomicUsize>,
    capacity: usize,
    dropped: AtomicU64,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending_progress = Arc::new(AtomicUsize::new(0));
        (
            Self {
                sender,
                pending_progress: Arc::clone(&pending_progress),
                capacity: capacity.max(1),
                dropped: AtomicU64::new(0),
            },
            EventReceiver {
                receiver,
                pending_progress,
            },
        )
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn reserve_progress_slot(&self) -> bool {
        self.pending_progress
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                (pending < self.capacity).then_some(pending + 1)
            })
            .is_ok()
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SpeedTestEvent) {
        let is_progress = matches!(event, SpeedTestEvent::Progress { .. });
        if is_progress && !self.reserve_progress_slot() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if self.sender.send(event).is_err() {
            if is_progress {
                self.pending_progress.fetch_sub(1, Ordering::AcqRel);
            }
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Receiving half of a [`ChannelSink`]
#[derive(Debug)]
pub struct EventReceiver {
    receiver: mpsc::UnboundedReceiver<SpeedTestEvent>,
    pending_progress: Arc<AtomicUsize>,
}

impl EventReceiver {
    /// Next event, or `None` once the sink is dropped and the queue drained
    pub async fn recv(&mut self) -> Option<SpeedTestEvent> {
        let event = self.receiver.recv().await;
        self.release(event.as_ref());
        event
    }

    /// Next queued event without waiting
    pub fn try_recv(&mut self) -> Option<SpeedTestEvent> {
        let event = self.receiver.try_recv().ok();
        self.release(event.as_ref());
        event
    }

    fn release(&self, event: Option<&SpeedTestEvent>) {
        if matches!(event, Some(SpeedTestEvent::Progress { .. })) {
            self.pending_progress.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SpeedTestEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<SpeedTestEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SpeedTestEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
