//! Real-time voice pipeline: worker thread, state machine and events.
//!
//! # Architecture
//!
//! ```text
//! control thread                         voice-worker thread
//! ──────────────                         ───────────────────
//! start()  ── open capture + output ──▶  loop {
//! set_profile(id) ─▶ ActiveProfile ───▶    read → decode → snapshot profile
//! stop()   ── stop flag, join ────────▶    → transform → encode → write
//!                                         }
//!                                         close capture + output
//!
//! PipelineEvent (tokio mpsc) ◀── Started / Stopped / ProfileChanged / Error
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_shifter::audio::CpalBackend;
//! use voice_shifter::config::AppConfig;
//! use voice_shifter::pipeline::{event_channel, AudioPipeline};
//! use voice_shifter::profile::ProfileRegistry;
//!
//! let config = AppConfig::default();
//! let backend = Arc::new(CpalBackend::from_config(&config.audio));
//! let spec = config.audio.stream_spec(backend.as_ref());
//! let (events_tx, mut events_rx) = event_channel();
//!
//! let pipeline = AudioPipeline::new(backend, Arc::new(ProfileRegistry::builtin()), spec)
//!     .with_events(events_tx);
//!
//! pipeline.start().unwrap();
//! pipeline.set_profile("manbo").unwrap();
//! while let Ok(event) = events_rx.try_recv() {
//!     println!("{event}");
//! }
//! pipeline.stop().unwrap();
//! ```

pub mod events;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use events::{event_channel, ErrorKind, EventReceiver, EventSender, PipelineEvent};
pub use runner::{AudioPipeline, PipelineError};
pub use state::{ActiveProfile, PipelineState, PipelineStats};
