//! Channel mixing and sample-rate conversion between a device's native
//! stream format and the pipeline's 44.1 kHz mono.
//!
//! ```text
//! capture:  device frames ─downmix─▶ mono @ device rate ─RateConverter─▶ mono @ 44.1 kHz
//! playback: mono @ 44.1 kHz ─RateConverter─▶ mono @ device rate ─upmix─▶ device frames
//! ```
//!
//! Mixing runs inside the cpal callbacks (no allocation once warmed up).
//! Rate conversion runs on the pipeline worker, inside the blocking
//! `read` / `write` calls.

use rubato::{FftFixedIn, Resampler};

use super::device::DeviceError;

/// Input frames per resampler chunk (rubato may round this up).
pub const CONVERT_CHUNK: usize = 1024;

// ---------------------------------------------------------------------------
// Channel mixing
// ---------------------------------------------------------------------------

/// Average interleaved `channels`-channel frames into mono, replacing the
/// contents of `out`.  An incomplete trailing frame is ignored.
pub fn downmix_into(interleaved: &[f32], channels: u16, out: &mut Vec<f32>) {
    out.clear();
    match channels {
        0 => {}
        1 => out.extend_from_slice(interleaved),
        n => {
            let n = usize::from(n);
            out.extend(
                interleaved
                    .chunks_exact(n)
                    .map(|frame| frame.iter().sum::<f32>() / n as f32),
            );
        }
    }
}

/// Copy each mono sample to every channel of the matching frame in
/// `interleaved`.  Frames past the end of `mono` are left untouched.
pub fn upmix(mono: &[f32], channels: u16, interleaved: &mut [f32]) {
    let n = usize::from(channels.max(1));
    for (frame, &sample) in interleaved.chunks_exact_mut(n).zip(mono) {
        frame.fill(sample);
    }
}

// ---------------------------------------------------------------------------
// RateConverter
// ---------------------------------------------------------------------------

/// Streaming mono sample-rate converter.
///
/// Equal rates pass samples through unchanged.  Otherwise input must be fed
/// in chunks of exactly [`RateConverter::input_frames_next`] samples; the
/// resampler keeps its filter state between chunks.
pub struct RateConverter {
    from_rate: u32,
    to_rate: u32,
    resampler: Option<FftFixedIn<f32>>,
}

impl RateConverter {
    pub fn new(from_rate: u32, to_rate: u32) -> Result<Self, DeviceError> {
        let resampler = if from_rate == to_rate {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                from_rate as usize,
                to_rate as usize,
                CONVERT_CHUNK,
                1,
                1,
            )
            .map_err(|e| {
                DeviceError::Unsupported(format!("cannot convert {from_rate} Hz to {to_rate} Hz: {e}"))
            })?;
            log::debug!("resample: {from_rate} Hz → {to_rate} Hz");
            Some(resampler)
        };

        Ok(Self {
            from_rate,
            to_rate,
            resampler,
        })
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    /// Samples [`RateConverter::process`] expects per call when converting.
    pub fn input_frames_next(&self) -> usize {
        self.resampler
            .as_ref()
            .map_or(CONVERT_CHUNK, |r| r.input_frames_next())
    }

    pub fn from_rate(&self) -> u32 {
        self.from_rate
    }

    pub fn to_rate(&self) -> u32 {
        self.to_rate
    }

    /// Convert one chunk and append the result to `out`.
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) -> Result<(), DeviceError> {
        let Some(resampler) = self.resampler.as_mut() else {
            out.extend_from_slice(input);
            return Ok(());
        };

        let waves = resampler
            .process(&[input], None)
            .map_err(|e| DeviceError::Io(format!("resampler: {e}")))?;
        if let Some(mono) = waves.first() {
            out.extend_from_slice(mono);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_frames() {
        let mut mono = vec![9.0];
        downmix_into(&[0.5, -0.5, 0.2, 0.4, 1.0], 2, &mut mono);
        assert_eq!(mono.len(), 2);
        assert!(mono[0].abs() < 1e-6);
        assert!((mono[1] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn downmix_mono_is_a_copy() {
        let mut mono = Vec::new();
        downmix_into(&[0.1, 0.2], 1, &mut mono);
        assert_eq!(mono, vec![0.1, 0.2]);
    }

    #[test]
    fn upmix_duplicates_each_sample() {
        let mut frames = [0.0f32; 6];
        upmix(&[0.25, -0.5, 1.0], 2, &mut frames);
        assert_eq!(frames, [0.25, 0.25, -0.5, -0.5, 1.0, 1.0]);
    }

    #[test]
    fn equal_rates_pass_through() {
        let mut converter = RateConverter::new(44_100, 44_100).unwrap();
        assert!(converter.is_passthrough());

        let mut out = Vec::new();
        converter.process(&[0.1, 0.2, 0.3], &mut out).unwrap();
        assert_eq!(out, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn converts_48k_to_44k1_at_the_right_ratio() {
        let mut converter = RateConverter::new(48_000, 44_100).unwrap();
        assert!(!converter.is_passthrough());

        let mut fed = 0;
        let mut out = Vec::new();
        for _ in 0..10 {
            let chunk = vec![0.25f32; converter.input_frames_next()];
            fed += chunk.len();
            converter.process(&chunk, &mut out).unwrap();
        }

        let expected = fed as f64 * 44_100.0 / 48_000.0;
        assert!(
            (out.len() as f64 - expected).abs() <= 2.0,
            "fed {fed}, got {}, expected ~{expected}",
            out.len()
        );
    }

    #[test]
    fn wrong_chunk_length_is_an_error() {
        let mut converter = RateConverter::new(48_000, 44_100).unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            converter.process(&[0.0; 3], &mut out),
            Err(DeviceError::Io(_))
        ));
    }
}
