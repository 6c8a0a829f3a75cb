//! Notifications from the pipeline to the control surface.
//!
//! Events are delivered over a `tokio::sync::mpsc` unbounded channel
//! registered with [`crate::pipeline::AudioPipeline::with_events`].  Sending
//! never blocks, so the worker thread can emit without an async runtime.
//! Their `Display` form is the status text a UI would show.

use tokio::sync::mpsc;

/// Sender half handed to the pipeline.
pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;

/// Receiver half kept by the control surface.
pub type EventReceiver = mpsc::UnboundedReceiver<PipelineEvent>;

/// Create a connected event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Category of a failure reported through [`PipelineEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A device could not be opened.
    DeviceUnavailable,
    /// A read or write failed while running; the run was ended.
    DeviceFailure,
    /// The worker thread could not be started.
    Worker,
}

/// State-change notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// The worker is running with `profile` selected.
    Started { profile: &'static str },
    /// The worker has exited and both devices are closed.
    Stopped,
    /// A new profile was published; it applies from the next cycle.
    ProfileChanged {
        id: &'static str,
        display_name: &'static str,
    },
    /// Something went wrong; `message` carries the cause.
    Error { kind: ErrorKind, message: String },
}

impl std::fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineEvent::Started { profile } => {
                write!(f, "Voice changer started - {profile}")
            }
            PipelineEvent::Stopped => write!(f, "Voice changer stopped"),
            PipelineEvent::ProfileChanged { display_name, .. } => {
                write!(f, "Selected: {display_name} effect")
            }
            PipelineEvent::Error { kind, message } => match kind {
                ErrorKind::DeviceUnavailable => write!(f, "Failed to start: {message}"),
                ErrorKind::DeviceFailure => write!(f, "Audio device failed: {message}"),
                ErrorKind::Worker => write!(f, "Internal error: {message}"),
            },
        }
    }
}
