//! Device I/O contract required by the pipeline.
//!
//! The pipeline never talks to a sound API directly.  It asks an
//! [`AudioBackend`] for a [`CaptureDevice`] and an [`OutputDevice`]
//! configured by a [`StreamSpec`], then drives them with blocking
//! `read` / `write` calls from its worker thread:
//!
//! ```text
//! AudioBackend::open_capture(spec) ──▶ CaptureDevice::read(&mut [u8])
//! AudioBackend::open_output(spec)  ──▶ OutputDevice::write(&[u8])
//!                                      close() on both when the run ends
//! ```
//!
//! The production backend is [`crate::audio::CpalBackend`].  A scripted
//! in-memory backend ([`mock::MockBackend`]) is available under
//! `#[cfg(test)]`.

use thiserror::Error;

use super::codec::BYTES_PER_SAMPLE;

// ---------------------------------------------------------------------------
// StreamSpec
// ---------------------------------------------------------------------------

/// Fixed sample rate for capture and playback (Hz).
pub const SAMPLE_RATE: u32 = 44_100;

/// Longest buffer a single `read` / `write` may carry, in seconds of audio.
pub const MAX_BUFFER_SECS: usize = 5;

/// Parameters passed to both `open_capture` and `open_output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Bytes moved per `read` / `write`.  Always even and non-zero.
    pub buffer_size: usize,
}

impl StreamSpec {
    /// 16-bit mono at `sample_rate`, with `buffer_size` rounded up to a whole
    /// number of samples and capped at [`StreamSpec::max_buffer_size`].
    pub fn mono_16bit(sample_rate: u32, buffer_size: usize) -> Self {
        let max = Self::max_buffer_size(sample_rate);
        let buffer_size = buffer_size.clamp(BYTES_PER_SAMPLE, max);
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
            // `max` is even, so rounding an odd size up stays within it.
            buffer_size: buffer_size + buffer_size % BYTES_PER_SAMPLE,
        }
    }

    /// Largest buffer, in bytes, accepted at `sample_rate`
    /// ([`MAX_BUFFER_SECS`] of 16-bit mono audio).  Never below one sample.
    pub fn max_buffer_size(sample_rate: u32) -> usize {
        (sample_rate as usize)
            .saturating_mul(BYTES_PER_SAMPLE * MAX_BUFFER_SECS)
            .max(BYTES_PER_SAMPLE)
    }

    /// Samples carried by one buffer.
    pub fn samples_per_buffer(&self) -> usize {
        self.buffer_size / BYTES_PER_SAMPLE
    }

    /// Duration of one buffer in milliseconds.
    pub fn buffer_millis(&self) -> f64 {
        self.samples_per_buffer() as f64 * 1000.0
            / (f64::from(self.sample_rate) * f64::from(self.channels.max(1)))
    }
}

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// No device matches the requested name (or no default exists).
    #[error("audio device not found: {0}")]
    NotFound(String),

    /// The device rejected the stream configuration.
    #[error("unsupported stream configuration: {0}")]
    Unsupported(String),

    /// The platform failed to open or start the stream.
    #[error("failed to open audio stream: {0}")]
    Open(String),

    /// A read or write failed; the stream is unusable.
    #[error("audio I/O failed: {0}")]
    Io(String),

    /// No data right now; retrying the call is expected to succeed.
    #[error("audio device temporarily unavailable: {0}")]
    Transient(String),

    /// The handle was already closed.
    #[error("audio device is closed")]
    Closed,
}

impl DeviceError {
    /// `true` when the worker should skip the cycle instead of stopping.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeviceError::Transient(_))
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Source of capture/output handles.
pub trait AudioBackend: Send + Sync {
    /// Smallest buffer (bytes) the platform accepts for 16-bit mono at
    /// `sample_rate`.
    fn min_buffer_size(&self, sample_rate: u32) -> usize;

    fn open_capture(&self, spec: &StreamSpec) -> Result<Box<dyn CaptureDevice>, DeviceError>;

    fn open_output(&self, spec: &StreamSpec) -> Result<Box<dyn OutputDevice>, DeviceError>;
}

/// A running capture stream.
pub trait CaptureDevice: Send {
    /// Fill `buf` with raw little-endian PCM and return the byte count.
    ///
    /// May block.  `Ok(0)` means nothing was available this time.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;

    /// Stop the stream and release the device.  Idempotent.
    fn close(&mut self);
}

/// A running playback stream.
pub trait OutputDevice: Send {
    /// Queue `buf` for playback and return the byte count accepted.
    ///
    /// May block until the device has room.
    fn write(&mut self, buf: &[u8]) -> Result<usize, DeviceError>;

    /// Stop the stream and release the device.  Idempotent.
    fn close(&mut self);
}

const _: fn() = || {
    fn _assert_object_safe(
        _: Box<dyn AudioBackend>,
        _: Box<dyn CaptureDevice>,
        _: Box<dyn OutputDevice>,
    ) {
    }
};

// ---------------------------------------------------------------------------
// MockBackend  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod mock {
    //! Scripted in-memory devices for pipeline tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct MockState {
        script: Mutex<VecDeque<Result<Vec<u8>, DeviceError>>>,
        written: Mutex<Vec<Vec<u8>>>,
        fail_capture_open: AtomicBool,
        fail_output_open: AtomicBool,
        fail_writes: AtomicBool,
        capture_open: AtomicBool,
        output_open: AtomicBool,
        capture_opens: AtomicUsize,
    }

    /// Backend whose capture replays a script of frames and whose output
    /// records every written buffer.
    ///
    /// Cloning shares the underlying state, so a test can keep a clone for
    /// inspection after handing one to the pipeline.
    #[derive(Clone, Default)]
    pub struct MockBackend {
        state: Arc<MockState>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue one capture frame.  An empty frame reads as `Ok(0)`.
        pub fn push_frame(&self, bytes: &[u8]) {
            self.state.script.lock().unwrap().push_back(Ok(bytes.to_vec()));
        }

        pub fn push_frames(&self, bytes: &[u8], count: usize) {
            let mut script = self.state.script.lock().unwrap();
            for _ in 0..count {
                script.push_back(Ok(bytes.to_vec()));
            }
        }

        /// Queue a read failure.
        pub fn push_error(&self, error: DeviceError) {
            self.state.script.lock().unwrap().push_back(Err(error));
        }

        pub fn fail_capture_open(&self) {
            self.state.fail_capture_open.store(true, Ordering::SeqCst);
        }

        pub fn fail_output_open(&self) {
            self.state.fail_output_open.store(true, Ordering::SeqCst);
        }

        pub fn fail_writes(&self) {
            self.state.fail_writes.store(true, Ordering::SeqCst);
        }

        pub fn written(&self) -> Vec<Vec<u8>> {
            self.state.written.lock().unwrap().clone()
        }

        pub fn capture_is_open(&self) -> bool {
            self.state.capture_open.load(Ordering::SeqCst)
        }

        pub fn output_is_open(&self) -> bool {
            self.state.output_open.load(Ordering::SeqCst)
        }

        pub fn capture_opens(&self) -> usize {
            self.state.capture_opens.load(Ordering::SeqCst)
        }
    }

    impl AudioBackend for MockBackend {
        fn min_buffer_size(&self, _sample_rate: u32) -> usize {
            8
        }

        fn open_capture(&self, _spec: &StreamSpec) -> Result<Box<dyn CaptureDevice>, DeviceError> {
            if self.state.fail_capture_open.load(Ordering::SeqCst) {
                return Err(DeviceError::Open("mock capture refused".into()));
            }
            self.state.capture_open.store(true, Ordering::SeqCst);
            self.state.capture_opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockCapture {
                state: Arc::clone(&self.state),
                closed: false,
            }))
        }

        fn open_output(&self, _spec: &StreamSpec) -> Result<Box<dyn OutputDevice>, DeviceError> {
            if self.state.fail_output_open.load(Ordering::SeqCst) {
                return Err(DeviceError::Open("mock output refused".into()));
            }
            self.state.output_open.store(true, Ordering::SeqCst);
            Ok(Box::new(MockOutput {
                state: Arc::clone(&self.state),
                closed: false,
            }))
        }
    }

    struct MockCapture {
        state: Arc<MockState>,
        closed: bool,
    }

    impl CaptureDevice for MockCapture {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
            if self.closed {
                return Err(DeviceError::Closed);
            }
            let next = self.state.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(frame)) => {
                    let n = frame.len().min(buf.len());
                    buf[..n].copy_from_slice(&frame[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => {
                    // Script exhausted: behave like a quiet device.
                    std::thread::sleep(Duration::from_millis(1));
                    Ok(0)
                }
            }
        }

        fn close(&mut self) {
            self.closed = true;
            self.state.capture_open.store(false, Ordering::SeqCst);
        }
    }

    struct MockOutput {
        state: Arc<MockState>,
        closed: bool,
    }

    impl OutputDevice for MockOutput {
        fn write(&mut self, buf: &[u8]) -> Result<usize, DeviceError> {
            if self.closed {
                return Err(DeviceError::Closed);
            }
            if self.state.fail_writes.load(Ordering::SeqCst) {
                return Err(DeviceError::Io("mock output unplugged".into()));
            }
            self.state.written.lock().unwrap().push(buf.to_vec());
            Ok(buf.len())
        }

        fn close(&mut self) {
            self.closed = true;
            self.state.output_open.store(false, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_rounds_buffer_up_to_whole_samples() {
        assert_eq!(StreamSpec::mono_16bit(SAMPLE_RATE, 3583).buffer_size, 3584);
        assert_eq!(StreamSpec::mono_16bit(SAMPLE_RATE, 3584).buffer_size, 3584);
        assert_eq!(StreamSpec::mono_16bit(SAMPLE_RATE, 0).buffer_size, 2);
    }

    #[test]
    fn spec_caps_oversized_buffers() {
        let max = StreamSpec::max_buffer_size(SAMPLE_RATE);
        assert_eq!(max, 441_000);
        assert_eq!(StreamSpec::mono_16bit(SAMPLE_RATE, usize::MAX).buffer_size, max);
        assert_eq!(StreamSpec::mono_16bit(SAMPLE_RATE, max - 1).buffer_size, max);
        assert_eq!(StreamSpec::mono_16bit(0, usize::MAX).buffer_size, 2);
    }

    #[test]
    fn spec_is_mono_16bit() {
        let spec = StreamSpec::mono_16bit(SAMPLE_RATE, 4410);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.samples_per_buffer(), 2205);
        assert!((spec.buffer_millis() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn only_transient_errors_are_transient() {
        assert!(DeviceError::Transient("busy".into()).is_transient());
        assert!(!DeviceError::Io("gone".into()).is_transient());
        assert!(!DeviceError::Closed.is_transient());
    }

    #[test]
    fn mock_replays_script_then_reads_empty() {
        let backend = mock::MockBackend::new();
        backend.push_frame(&[1, 2, 3, 4]);
        let spec = StreamSpec::mono_16bit(SAMPLE_RATE, 4);

        let mut capture = backend.open_capture(&spec).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(capture.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(capture.read(&mut buf).unwrap(), 0);

        capture.close();
        assert!(!backend.capture_is_open());
        assert_eq!(capture.read(&mut buf), Err(DeviceError::Closed));
    }
}
