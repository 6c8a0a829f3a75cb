//! Blocking capture/playback devices built on `cpal`.
//!
//! cpal is callback driven; the pipeline wants blocking `read` / `write`.
//! Each direction bridges the two with a [`RingBuffer`] behind a
//! `Mutex` + `Condvar`:
//!
//! ```text
//! mic ─▶ input callback (downmix) ─push─▶ SampleQueue ─pop (blocks)─▶ CpalCapture::read (resample)
//! CpalOutput::write (resample) ─push (blocks)─▶ SampleQueue ─pop─▶ output callback (upmix) ─▶ speaker
//! ```
//!
//! Each stream runs in whatever f32 configuration the device supports
//! closest to the pipeline's 44.1 kHz mono (see [`negotiate`]).  Queues hold
//! mono samples at the device rate; [`RateConverter`] bridges the rates on
//! the pipeline side so the callbacks stay cheap.
//!
//! A `cpal::Stream` is not `Send` on every platform, so every stream is
//! built, played and dropped on its own helper thread.  The handles the
//! pipeline holds only own the queue and a shutdown channel, which makes
//! them `Send`.

use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::buffer::RingBuffer;
use super::codec::BYTES_PER_SAMPLE;
use super::device::{AudioBackend, CaptureDevice, DeviceError, OutputDevice, StreamSpec};
use super::resample::{downmix_into, upmix, RateConverter};
use crate::config::AudioConfig;

/// Buffer size used when the host reports no usable minimum (bytes).
pub const FALLBACK_BUFFER_BYTES: usize = 3584;

/// Queue capacity, in device buffers.
const QUEUE_BUFFERS: usize = 4;

// ---------------------------------------------------------------------------
// Sample conversion
// ---------------------------------------------------------------------------

/// Full scale for both directions, so every `i16` survives a round trip.
const I16_SCALE: f32 = 32768.0;

fn f32_to_i16(sample: f32) -> i16 {
    (sample * I16_SCALE)
        .round()
        .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / I16_SCALE
}

// ---------------------------------------------------------------------------
// SampleQueue
// ---------------------------------------------------------------------------

struct QueueState {
    samples: RingBuffer<i16>,
    /// Set by the stream error callback; wakes and fails blocked callers.
    failure: Option<String>,
    closed: bool,
    overwritten: u64,
    underruns: u64,
}

struct SampleQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
    capacity: usize,
}

impl SampleQueue {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                samples: RingBuffer::new(capacity),
                failure: None,
                closed: false,
                overwritten: 0,
                underruns: 0,
            }),
            changed: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Capture side: never blocks, drops the oldest audio on overflow.
    fn push_overwrite(&self, samples: &[i16]) {
        let mut st = self.lock();
        let lost = st.samples.push_slice(samples);
        st.overwritten += lost as u64;
        drop(st);
        self.changed.notify_all();
    }

    /// Playback side: blocks until `samples` fit.
    fn push_blocking(&self, samples: &[i16]) -> Result<(), DeviceError> {
        let st = self.lock();
        let mut st = self
            .changed
            .wait_while(st, |s| {
                s.samples.free() < samples.len() && s.failure.is_none() && !s.closed
            })
            .unwrap_or_else(PoisonError::into_inner);
        Self::check(&st)?;
        st.samples.push_slice(samples);
        Ok(())
    }

    /// Capture side: blocks until `out` can be filled completely.
    fn pop_exact(&self, out: &mut [i16]) -> Result<usize, DeviceError> {
        let st = self.lock();
        let mut st = self
            .changed
            .wait_while(st, |s| {
                s.samples.len() < out.len() && s.failure.is_none() && !s.closed
            })
            .unwrap_or_else(PoisonError::into_inner);
        Self::check(&st)?;
        Ok(st.samples.pop_into(out))
    }

    /// Playback callback: never blocks, pads with silence on underrun.
    fn pop_or_silence(&self, out: &mut [i16]) {
        let mut st = self.lock();
        let n = st.samples.pop_into(out);
        if n < out.len() {
            out[n..].fill(0);
            st.underruns += 1;
        }
        drop(st);
        self.changed.notify_all();
    }

    fn fail(&self, message: String) {
        self.lock().failure.get_or_insert(message);
        self.changed.notify_all();
    }

    fn close(&self) -> (u64, u64) {
        let mut st = self.lock();
        st.closed = true;
        let counts = (st.overwritten, st.underruns);
        drop(st);
        self.changed.notify_all();
        counts
    }

    fn check(st: &QueueState) -> Result<(), DeviceError> {
        if let Some(message) = &st.failure {
            return Err(DeviceError::Io(message.clone()));
        }
        if st.closed {
            return Err(DeviceError::Closed);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StreamThread
// ---------------------------------------------------------------------------

/// Helper thread that owns one `cpal::Stream` until shut down.
struct StreamThread {
    shutdown: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StreamThread {
    /// Spawn `name`, build and play the stream there, and wait for the
    /// outcome.  `build` also returns whatever the caller needs to drive the
    /// stream from outside (queue, negotiated format).
    fn spawn<F, T>(name: &str, build: F) -> Result<(Self, T), DeviceError>
    where
        F: FnOnce() -> Result<(cpal::Stream, T), DeviceError> + Send + 'static,
        T: Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<T, DeviceError>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let (stream, opened) = match build() {
                    Ok(built) => built,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(DeviceError::Open(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(opened));

                // Returns once the handle drops the sender.
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| DeviceError::Open(format!("failed to spawn {name} thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(opened)) => Ok((
                Self {
                    shutdown: Some(shutdown_tx),
                    handle: Some(handle),
                },
                opened,
            )),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(DeviceError::Open(format!("{name} thread exited during setup")))
            }
        }
    }

    fn stop(&mut self) {
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("cpal stream thread panicked during shutdown");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Device lookup
// ---------------------------------------------------------------------------

fn find_input_device(name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| DeviceError::NotFound("default input device".into())),
        Some(wanted) => host
            .input_devices()
            .map_err(|e| DeviceError::NotFound(e.to_string()))?
            .find(|d| d.name().is_ok_and(|n| n == wanted))
            .ok_or_else(|| DeviceError::NotFound(wanted.to_string())),
    }
}

fn find_output_device(name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| DeviceError::NotFound("default output device".into())),
        Some(wanted) => host
            .output_devices()
            .map_err(|e| DeviceError::NotFound(e.to_string()))?
            .find(|d| d.name().is_ok_and(|n| n == wanted))
            .ok_or_else(|| DeviceError::NotFound(wanted.to_string())),
    }
}

/// Names of all input devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>, DeviceError> {
    let devices = cpal::default_host()
        .input_devices()
        .map_err(|e| DeviceError::NotFound(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Names of all output devices on the default host.
pub fn list_output_devices() -> Result<Vec<String>, DeviceError> {
    let devices = cpal::default_host()
        .output_devices()
        .map_err(|e| DeviceError::NotFound(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

fn build_error(e: cpal::BuildStreamError) -> DeviceError {
    match e {
        cpal::BuildStreamError::StreamConfigNotSupported => {
            DeviceError::Unsupported("negotiated stream configuration was rejected".into())
        }
        cpal::BuildStreamError::DeviceNotAvailable => {
            DeviceError::NotFound("device is no longer available".into())
        }
        other => DeviceError::Open(other.to_string()),
    }
}

fn configs_error(e: cpal::SupportedStreamConfigsError) -> DeviceError {
    DeviceError::Unsupported(format!("cannot query stream configurations: {e}"))
}

// ---------------------------------------------------------------------------
// Format negotiation
// ---------------------------------------------------------------------------

/// Pick the f32 stream configuration closest to `wanted_rate` mono.
///
/// Ranking: ranges containing `wanted_rate` first, then mono, then the
/// fewest channels.  The rate is `wanted_rate` clamped into the chosen
/// range, so a 48 kHz-only device runs at 48 kHz.
pub fn negotiate<I>(supported: I, wanted_rate: u32) -> Result<cpal::StreamConfig, DeviceError>
where
    I: IntoIterator<Item = cpal::SupportedStreamConfigRange>,
{
    let best = supported
        .into_iter()
        .filter(|range| range.sample_format() == cpal::SampleFormat::F32 && range.channels() > 0)
        .min_by_key(|range| {
            let has_rate = (range.min_sample_rate().0..=range.max_sample_rate().0)
                .contains(&wanted_rate);
            (!has_rate, range.channels() != 1, range.channels())
        })
        .ok_or_else(|| DeviceError::Unsupported("device offers no f32 stream format".into()))?;

    let rate = wanted_rate
        .max(best.min_sample_rate().0)
        .min(best.max_sample_rate().0);

    Ok(cpal::StreamConfig {
        channels: best.channels(),
        sample_rate: cpal::SampleRate(rate),
        buffer_size: cpal::BufferSize::Default,
    })
}

/// Queue capacity in device-rate mono samples: room for a few pipeline
/// buffers at the device rate plus one converter chunk.
fn queue_capacity(spec: &StreamSpec, device_rate: u32, chunk: usize) -> usize {
    let per_buffer = (spec.samples_per_buffer() as u64)
        .saturating_mul(u64::from(device_rate))
        / u64::from(spec.sample_rate.max(1));
    usize::try_from(per_buffer)
        .unwrap_or(usize::MAX)
        .saturating_add(1)
        .saturating_add(chunk)
        .saturating_mul(QUEUE_BUFFERS)
}

/// What the stream thread hands back once its stream is playing.
struct Opened {
    config: cpal::StreamConfig,
    queue: Arc<SampleQueue>,
    converter: RateConverter,
}

// ---------------------------------------------------------------------------
// CpalBackend
// ---------------------------------------------------------------------------

/// [`AudioBackend`] over the default cpal host.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    /// Input device name; `None` selects the system default.
    input_device: Option<String>,
    /// Output device name; `None` selects the system default.
    output_device: Option<String>,
}

impl CpalBackend {
    pub fn new(input_device: Option<String>, output_device: Option<String>) -> Self {
        Self {
            input_device,
            output_device,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.input_device.clone(), config.output_device.clone())
    }
}

impl AudioBackend for CpalBackend {
    fn min_buffer_size(&self, _sample_rate: u32) -> usize {
        let reported = find_input_device(self.input_device.as_deref())
            .ok()
            .and_then(|device| device.default_input_config().ok())
            .and_then(|config| match config.buffer_size() {
                cpal::SupportedBufferSize::Range { min, .. } => {
                    Some(*min as usize * BYTES_PER_SAMPLE)
                }
                cpal::SupportedBufferSize::Unknown => None,
            });

        reported.unwrap_or(0).max(FALLBACK_BUFFER_BYTES)
    }

    fn open_capture(&self, spec: &StreamSpec) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        let spec_copy = *spec;
        let device_name = self.input_device.clone();

        let (stream, opened) = StreamThread::spawn("cpal-capture", move || {
            let device = find_input_device(device_name.as_deref())?;
            let supported = device.supported_input_configs().map_err(configs_error)?;
            let config = negotiate(supported, spec_copy.sample_rate)?;
            let converter = RateConverter::new(config.sample_rate.0, spec_copy.sample_rate)?;
            let queue = Arc::new(SampleQueue::new(queue_capacity(
                &spec_copy,
                config.sample_rate.0,
                converter.input_frames_next(),
            )));
            log::info!(
                "capture: opening {:?} at {} Hz, {} ch",
                device.name().unwrap_or_default(),
                config.sample_rate.0,
                config.channels
            );

            let callback_queue = Arc::clone(&queue);
            let error_queue = Arc::clone(&queue);
            let channels = config.channels;
            let mut mono: Vec<f32> = Vec::new();
            let mut scratch: Vec<i16> = Vec::new();
            let stream = device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        downmix_into(data, channels, &mut mono);
                        scratch.clear();
                        scratch.extend(mono.iter().map(|&s| f32_to_i16(s)));
                        callback_queue.push_overwrite(&scratch);
                    },
                    move |err: cpal::StreamError| {
                        log::error!("cpal capture stream error: {err}");
                        error_queue.fail(err.to_string());
                    },
                    None,
                )
                .map_err(build_error)?;

            Ok((
                stream,
                Opened {
                    config,
                    queue,
                    converter,
                },
            ))
        })?;

        if !opened.converter.is_passthrough() {
            log::info!(
                "capture: converting {} Hz to {} Hz",
                opened.converter.from_rate(),
                opened.converter.to_rate()
            );
        }
        log::debug!("capture: negotiated {:?}", opened.config);

        Ok(Box::new(CpalCapture {
            queue: opened.queue,
            stream,
            converter: opened.converter,
            scratch: Vec::new(),
            native: Vec::new(),
            ready: Vec::with_capacity(spec.samples_per_buffer()),
        }))
    }

    fn open_output(&self, spec: &StreamSpec) -> Result<Box<dyn OutputDevice>, DeviceError> {
        let spec_copy = *spec;
        let device_name = self.output_device.clone();

        let (stream, opened) = StreamThread::spawn("cpal-output", move || {
            let device = find_output_device(device_name.as_deref())?;
            let supported = device.supported_output_configs().map_err(configs_error)?;
            let config = negotiate(supported, spec_copy.sample_rate)?;
            let converter = RateConverter::new(spec_copy.sample_rate, config.sample_rate.0)?;
            let queue = Arc::new(SampleQueue::new(queue_capacity(
                &spec_copy,
                config.sample_rate.0,
                converter.input_frames_next(),
            )));
            log::info!(
                "output: opening {:?} at {} Hz, {} ch",
                device.name().unwrap_or_default(),
                config.sample_rate.0,
                config.channels
            );

            let callback_queue = Arc::clone(&queue);
            let error_queue = Arc::clone(&queue);
            let channels = config.channels;
            let mut scratch: Vec<i16> = Vec::new();
            let mut mono: Vec<f32> = Vec::new();
            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let frames = data.len() / usize::from(channels.max(1));
                        scratch.resize(frames, 0);
                        callback_queue.pop_or_silence(&mut scratch);
                        mono.clear();
                        mono.extend(scratch.iter().map(|&s| i16_to_f32(s)));
                        upmix(&mono, channels, data);
                    },
                    move |err: cpal::StreamError| {
                        log::error!("cpal output stream error: {err}");
                        error_queue.fail(err.to_string());
                    },
                    None,
                )
                .map_err(build_error)?;

            Ok((
                stream,
                Opened {
                    config,
                    queue,
                    converter,
                },
            ))
        })?;

        if !opened.converter.is_passthrough() {
            log::info!(
                "output: converting {} Hz to {} Hz",
                opened.converter.from_rate(),
                opened.converter.to_rate()
            );
        }
        log::debug!("output: negotiated {:?}", opened.config);

        Ok(Box::new(CpalOutput {
            queue: opened.queue,
            stream,
            converter: opened.converter,
            pending: Vec::with_capacity(spec.samples_per_buffer()),
            converted: Vec::new(),
            scratch: Vec::new(),
        }))
    }
}

// ---------------------------------------------------------------------------
// CpalCapture / CpalOutput
// ---------------------------------------------------------------------------

struct CpalCapture {
    queue: Arc<SampleQueue>,
    stream: StreamThread,
    converter: RateConverter,
    /// Device-rate samples popped from the queue.
    scratch: Vec<i16>,
    native: Vec<f32>,
    /// Pipeline-rate samples not yet handed to `read`.
    ready: Vec<f32>,
}

impl CpalCapture {
    /// Convert queued audio until `ready` holds at least `wanted` samples.
    fn fill(&mut self, wanted: usize) -> Result<(), DeviceError> {
        while self.ready.len() < wanted {
            let chunk = if self.converter.is_passthrough() {
                wanted - self.ready.len()
            } else {
                self.converter.input_frames_next()
            };
            self.scratch.resize(chunk, 0);
            self.queue.pop_exact(&mut self.scratch)?;

            self.native.clear();
            self.native.extend(self.scratch.iter().map(|&s| i16_to_f32(s)));
            self.converter.process(&self.native, &mut self.ready)?;
        }
        Ok(())
    }
}

impl CaptureDevice for CpalCapture {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let wanted = buf.len() / BYTES_PER_SAMPLE;
        self.fill(wanted)?;
        for (dst, &sample) in buf.chunks_exact_mut(BYTES_PER_SAMPLE).zip(&self.ready) {
            dst.copy_from_slice(&f32_to_i16(sample).to_le_bytes());
        }
        self.ready.drain(..wanted);
        Ok(wanted * BYTES_PER_SAMPLE)
    }

    fn close(&mut self) {
        if self.stream.handle.is_none() {
            return;
        }
        let (overwritten, _) = self.queue.close();
        self.stream.stop();
        if overwritten > 0 {
            log::debug!("capture: {overwritten} samples overwritten while the reader lagged");
        }
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.close();
    }
}

struct CpalOutput {
    queue: Arc<SampleQueue>,
    stream: StreamThread,
    converter: RateConverter,
    /// Pipeline-rate samples waiting for a full converter chunk.
    pending: Vec<f32>,
    converted: Vec<f32>,
    scratch: Vec<i16>,
}

impl OutputDevice for CpalOutput {
    fn write(&mut self, buf: &[u8]) -> Result<usize, DeviceError> {
        self.pending.extend(
            buf.chunks_exact(BYTES_PER_SAMPLE)
                .map(|pair| i16_to_f32(i16::from_le_bytes([pair[0], pair[1]]))),
        );

        let mut consumed = 0;
        loop {
            let available = self.pending.len() - consumed;
            let chunk = if self.converter.is_passthrough() {
                available
            } else {
                self.converter.input_frames_next()
            };
            if chunk == 0 || available < chunk {
                break;
            }

            self.converted.clear();
            self.converter
                .process(&self.pending[consumed..consumed + chunk], &mut self.converted)?;
            consumed += chunk;

            self.scratch.clear();
            self.scratch
                .extend(self.converted.iter().map(|&s| f32_to_i16(s)));
            // A write larger than the whole queue would never fit in one push.
            for piece in self.scratch.chunks(self.queue.capacity) {
                self.queue.push_blocking(piece)?;
            }
        }
        self.pending.drain(..consumed);

        Ok(buf.len() / BYTES_PER_SAMPLE * BYTES_PER_SAMPLE)
    }

    fn close(&mut self) {
        if self.stream.handle.is_none() {
            return;
        }
        let (_, underruns) = self.queue.close();
        self.stream.stop();
        if underruns > 0 {
            log::debug!("output: {underruns} callbacks padded with silence");
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn range(
        channels: u16,
        min: u32,
        max: u32,
        format: cpal::SampleFormat,
    ) -> cpal::SupportedStreamConfigRange {
        cpal::SupportedStreamConfigRange::new(
            channels,
            cpal::SampleRate(min),
            cpal::SampleRate(max),
            cpal::SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn float_conversion_saturates() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(2.5), i16::MAX);
        assert_eq!(f32_to_i16(-1.0), i16::MIN);
        assert_eq!(f32_to_i16(-4.0), i16::MIN);
        assert!((i16_to_f32(i16::MIN) + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn every_i16_survives_float_round_trip() {
        for sample in i16::MIN..=i16::MAX {
            assert_eq!(f32_to_i16(i16_to_f32(sample)), sample);
        }
    }

    #[test]
    fn negotiate_prefers_mono_at_the_wanted_rate() {
        let supported = vec![
            range(2, 8_000, 96_000, cpal::SampleFormat::F32),
            range(1, 8_000, 96_000, cpal::SampleFormat::F32),
            range(1, 8_000, 96_000, cpal::SampleFormat::I16),
        ];
        let config = negotiate(supported, 44_100).unwrap();
        assert_eq!(config.channels, 1);
        assert_eq!(config.sample_rate.0, 44_100);
        assert_eq!(config.buffer_size, cpal::BufferSize::Default);
    }

    #[test]
    fn negotiate_accepts_stereo_48k_only_device() {
        let supported = vec![range(2, 48_000, 48_000, cpal::SampleFormat::F32)];
        let config = negotiate(supported, 44_100).unwrap();
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate.0, 48_000);
    }

    #[test]
    fn negotiate_prefers_a_range_containing_the_rate_over_mono() {
        let supported = vec![
            range(1, 48_000, 48_000, cpal::SampleFormat::F32),
            range(2, 44_100, 48_000, cpal::SampleFormat::F32),
        ];
        let config = negotiate(supported, 44_100).unwrap();
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate.0, 44_100);
    }

    #[test]
    fn negotiate_clamps_rate_into_range() {
        let low = negotiate(vec![range(1, 8_000, 16_000, cpal::SampleFormat::F32)], 44_100);
        assert_eq!(low.unwrap().sample_rate.0, 16_000);

        let high = negotiate(vec![range(1, 88_200, 192_000, cpal::SampleFormat::F32)], 44_100);
        assert_eq!(high.unwrap().sample_rate.0, 88_200);
    }

    #[test]
    fn negotiate_without_f32_is_unsupported() {
        let supported = vec![range(1, 44_100, 44_100, cpal::SampleFormat::I16)];
        assert!(matches!(
            negotiate(supported, 44_100),
            Err(DeviceError::Unsupported(_))
        ));
        assert!(matches!(
            negotiate(Vec::new(), 44_100),
            Err(DeviceError::Unsupported(_))
        ));
    }

    #[test]
    fn queue_holds_several_buffers_at_the_device_rate() {
        let spec = StreamSpec::mono_16bit(44_100, 4410);
        assert_eq!(spec.samples_per_buffer(), 2205);

        assert_eq!(queue_capacity(&spec, 44_100, 1024), (2205 + 1 + 1024) * QUEUE_BUFFERS);
        assert_eq!(queue_capacity(&spec, 88_200, 1024), (4410 + 1 + 1024) * QUEUE_BUFFERS);
    }

    #[test]
    fn pop_exact_waits_for_a_full_buffer() {
        let queue = Arc::new(SampleQueue::new(16));
        let producer = Arc::clone(&queue);

        let handle = std::thread::spawn(move || {
            producer.push_overwrite(&[1, 2]);
            std::thread::sleep(Duration::from_millis(20));
            producer.push_overwrite(&[3, 4]);
        });

        let mut out = [0i16; 4];
        assert_eq!(queue.pop_exact(&mut out).unwrap(), 4);
        assert_eq!(out, [1, 2, 3, 4]);
        handle.join().unwrap();
    }

    #[test]
    fn failure_wakes_blocked_reader() {
        let queue = Arc::new(SampleQueue::new(16));
        let failer = Arc::clone(&queue);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            failer.fail("device unplugged".into());
        });

        let mut out = [0i16; 4];
        assert_eq!(
            queue.pop_exact(&mut out),
            Err(DeviceError::Io("device unplugged".into()))
        );
        handle.join().unwrap();
    }

    #[test]
    fn playback_pop_pads_with_silence() {
        let queue = SampleQueue::new(8);
        queue.push_blocking(&[5, 6]).unwrap();

        let mut out = [9i16; 4];
        queue.pop_or_silence(&mut out);
        assert_eq!(out, [5, 6, 0, 0]);
        assert_eq!(queue.close(), (0, 1));
    }

    #[test]
    fn push_blocking_waits_for_room() {
        let queue = Arc::new(SampleQueue::new(4));
        queue.push_blocking(&[1, 2, 3, 4]).unwrap();

        let consumer = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            let mut out = [0i16; 2];
            consumer.pop_or_silence(&mut out);
            out
        });

        queue.push_blocking(&[5, 6]).unwrap();
        assert_eq!(handle.join().unwrap(), [1, 2]);

        let mut rest = [0i16; 4];
        queue.pop_or_silence(&mut rest);
        assert_eq!(rest, [3, 4, 5, 6]);
    }

    #[test]
    fn closed_queue_rejects_writes() {
        let queue = SampleQueue::new(4);
        queue.close();
        assert_eq!(queue.push_blocking(&[1]), Err(DeviceError::Closed));
    }
}
