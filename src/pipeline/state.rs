//! Pipeline state machine, the shared active-profile holder, and counters.
//!
//! [`PipelineState`] is owned by [`crate::pipeline::AudioPipeline`] and only
//! changes through its control operations (or when the worker dies on a
//! device failure).
//!
//! [`ActiveProfile`] is the one value the control thread and the worker
//! share.  Every access goes through [`ActiveProfile::snapshot`] or
//! [`ActiveProfile::publish`]; the profile is `Copy`, so a snapshot is always
//! a whole profile.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::profile::VoiceProfile;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// States of the capture → transform → playback pipeline.
///
/// ```text
/// Idle ──start()──▶ Running ──stop()──▶ Stopping ──worker joined──▶ Idle
///                   Running ──device failure──────────────────────▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// No worker, no open devices.
    #[default]
    Idle,
    /// The worker is cycling.
    Running,
    /// The stop flag is set; waiting for the worker to finish its cycle.
    Stopping,
}

impl PipelineState {
    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Running => "Running",
            PipelineState::Stopping => "Stopping",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// ActiveProfile
// ---------------------------------------------------------------------------

/// Thread-safe holder for the currently selected [`VoiceProfile`].
///
/// Cheap to clone (`Arc` clone); all clones see the same value.
#[derive(Debug, Clone)]
pub struct ActiveProfile {
    inner: Arc<Mutex<VoiceProfile>>,
}

impl ActiveProfile {
    pub fn new(profile: VoiceProfile) -> Self {
        Self {
            inner: Arc::new(Mutex::new(profile)),
        }
    }

    /// Copy of the current profile.
    pub fn snapshot(&self) -> VoiceProfile {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the current profile, returning the previous one.
    pub fn publish(&self, profile: VoiceProfile) -> VoiceProfile {
        let mut current = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, profile)
    }
}

// ---------------------------------------------------------------------------
// PipelineStats
// ---------------------------------------------------------------------------

/// Point-in-time copy of the worker's counters.
///
/// Counters accumulate over the lifetime of the pipeline, across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Buffers read, transformed and written.
    pub cycles: u64,
    /// Reads that returned no data or a transient error.
    pub skipped_reads: u64,
    /// Odd-length reads whose trailing byte was dropped.
    pub malformed_buffers: u64,
    /// Samples the transform remapped past the end of the buffer.
    pub discarded_samples: u64,
}

/// Live counters updated by the worker.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    cycles: AtomicU64,
    skipped_reads: AtomicU64,
    malformed_buffers: AtomicU64,
    discarded_samples: AtomicU64,
}

impl Counters {
    pub(crate) fn cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skipped_read(&self) {
        self.skipped_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn malformed_buffer(&self) {
        self.malformed_buffers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn discarded(&self, samples: usize) {
        self.discarded_samples
            .fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            skipped_reads: self.skipped_reads.load(Ordering::Relaxed),
            malformed_buffers: self.malformed_buffers.load(Ordering::Relaxed),
            discarded_samples: self.discarded_samples.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
