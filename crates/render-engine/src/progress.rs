//! Shared progress, job state, and cooperative cancellation.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Latest encode progress, written by the worker and sampled by the
/// coordinator.
///
/// Stored as `f64` bits. Updates are monotonic: a lower value than the
/// current one is ignored.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    bits: AtomicU64,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `fraction`, clamped to `[0.0, 1.0]`. NaN is ignored.
    pub fn report(&self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        let next = fraction.clamp(0.0, 1.0);
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (next > f64::from_bits(current)).then_some(next.to_bits())
            });
    }

    /// Current fraction in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Lifecycle of one export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExportState {
    Idle = 0,
    Preparing = 1,
    Exporting = 2,
    Completed = 3,
    Failed = 4,
    Cancelled = 5,
}

impl ExportState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ExportState::Preparing,
            2 => ExportState::Exporting,
            3 => ExportState::Completed,
            4 => ExportState::Failed,
            5 => ExportState::Cancelled,
            _ => ExportState::Idle,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExportState::Completed | ExportState::Failed | ExportState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExportState::Idle => "idle",
            ExportState::Preparing => "preparing",
            ExportState::Exporting => "exporting",
            ExportState::Completed => "completed",
            ExportState::Failed => "failed",
            ExportState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ExportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic cell holding an [`ExportState`].
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn get(&self) -> ExportState {
        ExportState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next`. Terminal states are final.
    pub(crate) fn set(&self, next: ExportState) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (!ExportState::from_u8(current).is_terminal()).then_some(next as u8)
            });
    }
}

/// Requests cancellation of a running export. Cloneable; any clone cancels
/// the job.
#[derive(Debug, Clone)]
pub struct ExportCanceller {
    tx: Arc<watch::Sender<bool>>,
}

impl ExportCanceller {
    /// Ask the job to stop. Idempotent; a no-op once the job has finished.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of an [`ExportCanceller`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if every
    /// canceller is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// A connected canceller and signal.
pub fn cancel_pair() -> (ExportCanceller, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (ExportCanceller { tx: Arc::new(tx) }, CancelSignal { rx })
}
