//! [`AudioPipeline`] owns the worker thread and the control operations.
//!
//! # Worker cycle
//!
//! ```text
//! loop until the stop flag is set:
//!   CaptureDevice::read(buffer)        (blocking; 0 bytes / transient → skip)
//!   codec::decode_lossy                (odd trailing byte dropped + counted)
//!   ActiveProfile::snapshot            (one whole profile per cycle)
//!   VoiceTransform::apply              (same length out; tail discards counted)
//!   codec::encode_into
//!   OutputDevice::write                (blocking)
//! on exit: close capture + output
//! on a device error or panic: also Running → Idle + PipelineEvent::Error
//! ```
//!
//! # Control
//!
//! `start` / `stop` / `toggle` serialize on an internal control mutex, so at
//! most one worker exists per pipeline.  `stop` sets the stop flag and joins
//! the worker; the worker closes both devices before it returns, so a handle
//! is never closed under an in-flight read or write.  `set_profile` only
//! touches [`ActiveProfile`] and never blocks on the worker.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use thiserror::Error;

use crate::audio::codec;
use crate::audio::{
    AudioBackend, CaptureDevice, DeviceError, OutputDevice, ScaleRemap, StreamSpec,
    VoiceTransform,
};
use crate::profile::{ProfileRegistry, VoiceProfile};

use super::events::{ErrorKind, EventSender, PipelineEvent};
use super::state::{ActiveProfile, Counters, PipelineState, PipelineStats};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors returned by the control operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A device could not be opened; the pipeline stayed `Idle`.
    #[error("{direction} device unavailable: {source}")]
    DeviceUnavailable {
        direction: &'static str,
        #[source]
        source: DeviceError,
    },

    /// No profile with this id exists; the active profile is unchanged.
    #[error("unknown voice profile: {0}")]
    NotFound(String),

    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    /// The OS refused to create the worker thread; devices were released.
    #[error("failed to spawn audio worker: {0}")]
    Spawn(#[source] std::io::Error),
}

// ---------------------------------------------------------------------------
// AudioPipeline
// ---------------------------------------------------------------------------

/// Handle on a running (or runnable) worker.
struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn join(self) {
        if self.handle.join().is_err() {
            log::error!("pipeline: worker thread panicked");
        }
    }
}

/// Real-time capture → transform → playback pipeline.
///
/// All methods take `&self`; share the pipeline between a control thread
/// and anything else with an `Arc`.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use voice_shifter::audio::{AudioBackend, CpalBackend, SAMPLE_RATE};
/// use voice_shifter::pipeline::AudioPipeline;
/// use voice_shifter::profile::ProfileRegistry;
///
/// let backend = Arc::new(CpalBackend::default());
/// let spec = voice_shifter::audio::StreamSpec::mono_16bit(
///     SAMPLE_RATE,
///     backend.min_buffer_size(SAMPLE_RATE),
/// );
/// let pipeline = AudioPipeline::new(backend, Arc::new(ProfileRegistry::builtin()), spec);
///
/// pipeline.set_profile("girl").unwrap();
/// pipeline.start().unwrap();
/// // ... later, from any thread
/// pipeline.stop().unwrap();
/// ```
pub struct AudioPipeline {
    backend: Arc<dyn AudioBackend>,
    registry: Arc<ProfileRegistry>,
    transform: Arc<dyn VoiceTransform>,
    spec: StreamSpec,
    active: ActiveProfile,
    state: Arc<Mutex<PipelineState>>,
    control: Mutex<Option<Worker>>,
    counters: Arc<Counters>,
    events: Option<EventSender>,
}

impl AudioPipeline {
    /// Create an idle pipeline with the registry's default profile selected
    /// and the [`ScaleRemap`] transform.
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        registry: Arc<ProfileRegistry>,
        spec: StreamSpec,
    ) -> Self {
        let active = ActiveProfile::new(registry.default_profile());
        Self {
            backend,
            registry,
            transform: Arc::new(ScaleRemap),
            spec,
            active,
            state: Arc::new(Mutex::new(PipelineState::Idle)),
            control: Mutex::new(None),
            counters: Arc::new(Counters::default()),
            events: None,
        }
    }

    /// Replace the transform strategy.
    pub fn with_transform(mut self, transform: Arc<dyn VoiceTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Deliver [`PipelineEvent`]s to `events`.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    // -----------------------------------------------------------------------
    // Control operations
    // -----------------------------------------------------------------------

    /// Open both devices and launch the worker.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidState`] unless the pipeline is `Idle`.
    /// - [`PipelineError::DeviceUnavailable`] if either device fails to open.
    /// - [`PipelineError::Spawn`] if the worker thread cannot be created.
    pub fn start(&self) -> Result<(), PipelineError> {
        let mut control = self.lock_control();

        let current = self.state();
        if current != PipelineState::Idle {
            return Err(PipelineError::InvalidState {
                operation: "start",
                state: current,
            });
        }

        // A worker that ended on a device failure is finished but not joined.
        if let Some(old) = control.take() {
            old.join();
        }

        let capture = self
            .backend
            .open_capture(&self.spec)
            .map_err(|e| self.unavailable("capture", e))?;

        let output = match self.backend.open_output(&self.spec) {
            Ok(output) => output,
            Err(e) => {
                let mut capture = capture;
                capture.close();
                return Err(self.unavailable("output", e));
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let worker = WorkerLoop {
            capture,
            output,
            transform: Arc::clone(&self.transform),
            active: self.active.clone(),
            stop: Arc::clone(&stop),
            state: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
            events: self.events.clone(),
            buffer_size: self.spec.buffer_size,
        };

        *self.lock_state() = PipelineState::Running;

        let spawned = std::thread::Builder::new()
            .name("voice-worker".into())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                *control = Some(Worker { stop, handle });
            }
            Err(e) => {
                // The unspawned closure was dropped, closing both devices.
                *self.lock_state() = PipelineState::Idle;
                log::error!("pipeline: failed to spawn worker: {e}");
                self.emit(PipelineEvent::Error {
                    kind: ErrorKind::Worker,
                    message: e.to_string(),
                });
                return Err(PipelineError::Spawn(e));
            }
        }

        log::info!(
            "pipeline: started ({} Hz, {} byte buffers, {} transform)",
            self.spec.sample_rate,
            self.spec.buffer_size,
            self.transform.name()
        );
        Ok(())
    }

    /// Signal the worker, wait for it to finish its cycle and release the
    /// devices, then return to `Idle`.
    ///
    /// Calling `stop` while `Idle` is a no-op returning `Ok(())`.
    pub fn stop(&self) -> Result<(), PipelineError> {
        let mut control = self.lock_control();

        {
            let mut st = self.lock_state();
            let current = *st;
            match current {
                PipelineState::Idle => {
                    drop(st);
                    if let Some(finished) = control.take() {
                        finished.join();
                    }
                    return Ok(());
                }
                PipelineState::Stopping => {
                    return Err(PipelineError::InvalidState {
                        operation: "stop",
                        state: PipelineState::Stopping,
                    });
                }
                PipelineState::Running => *st = PipelineState::Stopping,
            }
        }

        log::debug!("pipeline: Running → Stopping");
        if let Some(worker) = control.take() {
            worker.stop.store(true, Ordering::Release);
            worker.join();
        }

        *self.lock_state() = PipelineState::Idle;
        log::info!("pipeline: stopped ({:?})", self.stats());
        self.emit(PipelineEvent::Stopped);
        Ok(())
    }

    /// Start when `Idle`, stop otherwise.  Returns the resulting state.
    pub fn toggle(&self) -> Result<PipelineState, PipelineError> {
        match self.state() {
            PipelineState::Idle => self.start()?,
            PipelineState::Running | PipelineState::Stopping => self.stop()?,
        }
        Ok(self.state())
    }

    /// Select the profile named `id`; the worker picks it up on its next
    /// cycle.  Allowed in every state.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotFound`] when `id` is not in the registry.  The
    /// active profile is left unchanged.
    pub fn set_profile(&self, id: &str) -> Result<VoiceProfile, PipelineError> {
        let profile = self
            .registry
            .get(id)
            .map_err(|_| PipelineError::NotFound(id.to_string()))?;

        let previous = self.active.publish(profile);
        log::info!("pipeline: profile {} → {}", previous.id, profile.id);
        self.emit(PipelineEvent::ProfileChanged {
            id: profile.id,
            display_name: profile.display_name,
        });
        Ok(profile)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> PipelineState {
        *self.lock_state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    pub fn active_profile(&self) -> VoiceProfile {
        self.active.snapshot()
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn stream_spec(&self) -> StreamSpec {
        self.spec
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_control(&self) -> MutexGuard<'_, Option<Worker>> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unavailable(&self, direction: &'static str, source: DeviceError) -> PipelineError {
        log::error!("pipeline: cannot open {direction} device: {source}");
        self.emit(PipelineEvent::Error {
            kind: ErrorKind::DeviceUnavailable,
            message: format!("{direction}: {source}"),
        });
        PipelineError::DeviceUnavailable { direction, source }
    }

    fn emit(&self, event: PipelineEvent) {
        emit(&self.events, event);
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("pipeline: stop on drop failed: {e}");
        }
    }
}

fn emit(events: &Option<EventSender>, event: PipelineEvent) {
    if let Some(tx) = events {
        // The control surface may have gone away; nothing to report to.
        let _ = tx.send(event);
    }
}

// ---------------------------------------------------------------------------
// WorkerLoop
// ---------------------------------------------------------------------------

/// Everything the worker thread owns for one run.
struct WorkerLoop {
    capture: Box<dyn CaptureDevice>,
    output: Box<dyn OutputDevice>,
    transform: Arc<dyn VoiceTransform>,
    active: ActiveProfile,
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<PipelineState>>,
    counters: Arc<Counters>,
    events: Option<EventSender>,
    buffer_size: usize,
}

impl WorkerLoop {
    fn run(mut self) {
        // Sent from here so that it always precedes this run's Error.
        emit(
            &self.events,
            PipelineEvent::Started {
                profile: self.active.snapshot().display_name,
            },
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.cycle_until_stopped()));

        self.capture.close();
        self.output.close();

        let (kind, message) = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => {
                log::error!("pipeline: device failure, ending run: {e}");
                (ErrorKind::DeviceFailure, e.to_string())
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                log::error!("pipeline: worker panicked, ending run: {message}");
                (ErrorKind::Worker, message)
            }
        };

        {
            let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            // While Stopping, `stop()` owns the transition back to Idle.
            if *st == PipelineState::Running {
                *st = PipelineState::Idle;
            }
        }
        emit(&self.events, PipelineEvent::Error { kind, message });
    }

    fn cycle_until_stopped(&mut self) -> Result<(), DeviceError> {
        let mut raw = vec![0u8; self.buffer_size];
        let mut shifted: Vec<i16> = Vec::with_capacity(self.buffer_size / codec::BYTES_PER_SAMPLE);
        let mut encoded: Vec<u8> = Vec::with_capacity(self.buffer_size);

        while !self.stop.load(Ordering::Acquire) {
            let n = match self.capture.read(&mut raw) {
                Ok(0) => {
                    self.counters.skipped_read();
                    continue;
                }
                Ok(n) => n.min(raw.len()),
                Err(e) if e.is_transient() => {
                    log::debug!("pipeline: skipping cycle: {e}");
                    self.counters.skipped_read();
                    continue;
                }
                Err(e) => return Err(e),
            };

            let frame = codec::decode_lossy(&raw[..n]);
            if frame.dropped_trailing_byte {
                self.counters.malformed_buffer();
            }
            if frame.samples.is_empty() {
                self.counters.skipped_read();
                continue;
            }

            let profile = self.active.snapshot();
            let report = self.transform.apply(&frame.samples, &profile, &mut shifted);
            if report.discarded > 0 {
                log::trace!(
                    "pipeline: {} of {} samples past buffer end ({})",
                    report.discarded,
                    frame.samples.len(),
                    profile.id
                );
                self.counters.discarded(report.discarded);
            }

            codec::encode_into(&shifted, &mut encoded);
            self.output.write(&encoded)?;
            self.counters.cycle();
        }

        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Drop for WorkerLoop {
    fn drop(&mut self) {
        // Covers a worker that never got to run; close() is idempotent.
        self.capture.close();
        self.output.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
