//! Export engine: job lifecycle, progress sampling and cancellation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinError;
use tokio::time::MissedTickBehavior;
use tristack_common::config::ExportDefaults;
use tristack_common::error::ExportError;
use tristack_timeline_model::RenderSpec;

use crate::backend::{BackendError, TranscodeBackend};
use crate::output::{prepare_output, remove_partial_output};
use crate::progress::{
    cancel_pair, CancelSignal, ExportCanceller, ExportState, ProgressReporter, StateCell,
};

/// Shortest progress sampling period; `tokio::time::interval` rejects zero.
const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(1);

/// Terminal outcome of an export.
pub type ExportResult = Result<PathBuf, ExportError>;

/// Timing knobs for export jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSettings {
    /// How often the coordinator samples progress.
    pub progress_interval: Duration,

    /// How long a cancelled worker may run before it is aborted.
    pub cancel_grace: Duration,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_millis(100),
            cancel_grace: Duration::from_secs(2),
        }
    }
}

impl ExportSettings {
    /// These settings with the sampling period raised to at least 1 ms.
    pub fn clamped(self) -> Self {
        Self {
            progress_interval: self.progress_interval.max(MIN_PROGRESS_INTERVAL),
            ..self
        }
    }
}

impl From<&ExportDefaults> for ExportSettings {
    fn from(defaults: &ExportDefaults) -> Self {
        Self {
            progress_interval: Duration::from_millis(defaults.progress_interval_ms),
            cancel_grace: Duration::from_millis(defaults.cancel_grace_ms),
        }
        .clamped()
    }
}

/// Runs render specs through a [`TranscodeBackend`].
///
/// Both entry points spawn onto the current tokio runtime and return
/// immediately.
#[derive(Clone)]
pub struct ExportEngine {
    backend: Arc<dyn TranscodeBackend>,
    settings: ExportSettings,
}

impl ExportEngine {
    pub fn new(backend: Arc<dyn TranscodeBackend>) -> Self {
        Self {
            backend,
            settings: ExportSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings.clamped();
        self
    }

    pub fn backend(&self) -> &dyn TranscodeBackend {
        self.backend.as_ref()
    }

    pub fn settings(&self) -> ExportSettings {
        self.settings
    }

    /// Start exporting `spec` to `output`.
    ///
    /// `on_progress` receives non-decreasing fractions in `[0.0, 1.0]`;
    /// `on_complete` is called exactly once, after the last progress call.
    pub fn export<P, C>(
        &self,
        spec: RenderSpec,
        output: impl Into<PathBuf>,
        on_progress: P,
        on_complete: C,
    ) -> ExportCanceller
    where
        P: FnMut(f64) + Send + 'static,
        C: FnOnce(ExportResult) + Send + 'static,
    {
        self.launch(spec, output.into(), on_progress, on_complete).0
    }

    /// Channel form of [`export`](Self::export).
    pub fn start(&self, spec: RenderSpec, output: impl Into<PathBuf>) -> ExportHandle {
        let output = output.into();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();

        let (canceller, state) = self.launch(
            spec,
            output.clone(),
            move |fraction| {
                let _ = progress_tx.send(fraction);
            },
            move |result| {
                let _ = result_tx.send(result);
            },
        );

        ExportHandle {
            output,
            progress: progress_rx,
            result: result_rx,
            canceller,
            state,
        }
    }

    fn launch<P, C>(
        &self,
        spec: RenderSpec,
        output: PathBuf,
        on_progress: P,
        on_complete: C,
    ) -> (ExportCanceller, Arc<StateCell>)
    where
        P: FnMut(f64) + Send + 'static,
        C: FnOnce(ExportResult) + Send + 'static,
    {
        let (canceller, cancel) = cancel_pair();
        let state = Arc::new(StateCell::default());

        let job = ExportJob {
            spec: Arc::new(spec),
            output,
            backend: Arc::clone(&self.backend),
            settings: self.settings,
            progress: Arc::new(ProgressReporter::new()),
            cancel,
            state: Arc::clone(&state),
        };
        tokio::spawn(job.run(on_progress, on_complete));

        (canceller, state)
    }
}

/// Observer for a job started with [`ExportEngine::start`].
#[derive(Debug)]
pub struct ExportHandle {
    output: PathBuf,
    progress: mpsc::UnboundedReceiver<f64>,
    result: oneshot::Receiver<ExportResult>,
    canceller: ExportCanceller,
    state: Arc<StateCell>,
}

impl ExportHandle {
    /// Next progress value. `None` once the job has finished reporting.
    pub async fn next_progress(&mut self) -> Option<f64> {
        self.progress.recv().await
    }

    /// Wait for the terminal result.
    pub async fn wait(self) -> ExportResult {
        self.result
            .await
            .unwrap_or_else(|_| Err(ExportError::backend("export task ended without a result")))
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn canceller(&self) -> ExportCanceller {
        self.canceller.clone()
    }

    pub fn state(&self) -> ExportState {
        self.state.get()
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

/// One export run. Owns its render spec until the run ends.
struct ExportJob {
    spec: Arc<RenderSpec>,
    output: PathBuf,
    backend: Arc<dyn TranscodeBackend>,
    settings: ExportSettings,
    progress: Arc<ProgressReporter>,
    cancel: CancelSignal,
    state: Arc<StateCell>,
}

enum WorkerExit {
    Finished(Result<Result<(), BackendError>, JoinError>),
    CancelRequested,
}

impl ExportJob {
    async fn run<P, C>(self, mut on_progress: P, on_complete: C)
    where
        P: FnMut(f64) + Send + 'static,
        C: FnOnce(ExportResult) + Send + 'static,
    {
        let started = std::time::Instant::now();
        self.state.set(ExportState::Preparing);

        if self.cancel.is_cancelled() {
            self.finish(
                ExportState::Cancelled,
                Err(ExportError::Cancelled),
                on_progress,
                on_complete,
            );
            return;
        }

        if let Err(err) = prepare_output(&self.output) {
            tracing::warn!(error = %err, "Export output could not be prepared");
            self.finish(ExportState::Failed, Err(err), on_progress, on_complete);
            return;
        }

        self.state.set(ExportState::Exporting);
        tracing::info!(
            backend = self.backend.name(),
            output = %self.output.display(),
            duration_secs = self.spec.duration_secs(),
            frame = %self.spec.frame(),
            "Export started"
        );

        let mut worker = tokio::spawn({
            let backend = Arc::clone(&self.backend);
            let spec = Arc::clone(&self.spec);
            let output = self.output.clone();
            let progress = Arc::clone(&self.progress);
            let cancel = self.cancel.clone();
            async move { backend.transcode(&spec, &output, &progress, cancel).await }
        });

        let mut ticker = tokio::time::interval(self.settings.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut emitted = 0.0f64;

        let exit = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break WorkerExit::CancelRequested,
                joined = &mut worker => break WorkerExit::Finished(joined),
                _ = ticker.tick() => {
                    emit_increase(&self.progress, &mut emitted, &mut on_progress);
                }
            }
        };

        let outcome = match exit {
            WorkerExit::CancelRequested => {
                tracing::info!("Export cancellation requested");
                let stopped = tokio::time::timeout(self.settings.cancel_grace, &mut worker).await;
                if stopped.is_err() {
                    tracing::warn!(
                        grace_ms = self.settings.cancel_grace.as_millis() as u64,
                        "Transcode worker ignored cancellation, aborting"
                    );
                    worker.abort();
                    // Dropping the worker kills any encoder process it owns.
                    let _ = (&mut worker).await;
                }
                Err(ExportError::Cancelled)
            }
            // A late success still loses to a cancel request.
            WorkerExit::Finished(_) if self.cancel.is_cancelled() => Err(ExportError::Cancelled),
            WorkerExit::Finished(Ok(Ok(()))) => Ok(self.output.clone()),
            WorkerExit::Finished(Ok(Err(err))) => Err(ExportError::from(err)),
            WorkerExit::Finished(Err(join_err)) => Err(ExportError::backend(format!(
                "transcode worker panicked: {join_err}"
            ))),
        };

        match outcome {
            Ok(path) => {
                emit_increase(&self.progress, &mut emitted, &mut on_progress);
                if emitted < 1.0 {
                    on_progress(1.0);
                }
                tracing::info!(
                    output = %path.display(),
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "Export finished"
                );
                self.finish(ExportState::Completed, Ok(path), on_progress, on_complete);
            }
            Err(ExportError::Cancelled) => {
                remove_partial_output(&self.output);
                tracing::info!("Export cancelled");
                self.finish(
                    ExportState::Cancelled,
                    Err(ExportError::Cancelled),
                    on_progress,
                    on_complete,
                );
            }
            Err(err) => {
                remove_partial_output(&self.output);
                tracing::error!(error = %err, "Export failed");
                self.finish(ExportState::Failed, Err(err), on_progress, on_complete);
            }
        }
    }

    /// Record the terminal state and deliver the result. The progress
    /// callback is dropped first so channel observers see the stream end
    /// before the result arrives.
    fn finish<P, C>(
        &self,
        state: ExportState,
        result: ExportResult,
        on_progress: P,
        on_complete: C,
    ) where
        C: FnOnce(ExportResult),
    {
        drop(on_progress);
        self.state.set(state);
        on_complete(result);
    }
}

fn emit_increase<P: FnMut(f64)>(
    progress: &ProgressReporter,
    emitted: &mut f64,
    on_progress: &mut P,
) {
    let current = progress.fraction();
    if current > *emitted {
        *emitted = current;
        on_progress(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_defaults() {
        let settings = ExportSettings::from(&ExportDefaults::default());
        assert_eq!(settings, ExportSettings::default());

        let zero = ExportDefaults {
            progress_interval_ms: 0,
            ..ExportDefaults::default()
        };
        assert_eq!(
            ExportSettings::from(&zero).progress_interval,
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_engine_clamps_zero_interval() {
        struct Idle;

        #[async_trait::async_trait]
        impl TranscodeBackend for Idle {
            fn name(&self) -> &str {
                "idle"
            }

            fn is_available(&self) -> bool {
                true
            }

            async fn transcode(
                &self,
                _spec: &RenderSpec,
                _output: &Path,
                _progress: &ProgressReporter,
                _cancel: CancelSignal,
            ) -> Result<(), BackendError> {
                Ok(())
            }
        }

        let engine = ExportEngine::new(Arc::new(Idle)).with_settings(ExportSettings {
            progress_interval: Duration::ZERO,
            cancel_grace: Duration::ZERO,
        });
        assert_eq!(engine.settings().progress_interval, MIN_PROGRESS_INTERVAL);
        assert_eq!(engine.settings().cancel_grace, Duration::ZERO);
    }

    #[test]
    fn test_emit_increase_skips_repeats() {
        let progress = ProgressReporter::new();
        let mut emitted = 0.0;
        let mut seen = Vec::new();

        emit_increase(&progress, &mut emitted, &mut |f| seen.push(f));
        progress.report(0.3);
        emit_increase(&progress, &mut emitted, &mut |f| seen.push(f));
        emit_increase(&progress, &mut emitted, &mut |f| seen.push(f));
        progress.report(0.7);
        emit_increase(&progress, &mut emitted, &mut |f| seen.push(f));

        assert_eq!(seen, [0.3, 0.7]);
    }
}
