//! Voice transformation applied to one buffer of samples per cycle.
//!
//! [`VoiceTransform`] is the strategy seam used by the pipeline; swap in a
//! different implementation (e.g. a phase vocoder) without touching the
//! worker loop.  [`ScaleRemap`] is the built-in strategy:
//!
//! ```text
//! for each input sample i:
//!     scaled = clamp(round(sample * gain), i16::MIN, i16::MAX)
//!     j      = floor(i * time_scale)
//!     if j < len: output[j] = scaled   else: discard
//! ```
//!
//! The output always has exactly as many samples as the input.  Positions
//! that no input maps to are silence (zero).

use crate::profile::VoiceProfile;

// ---------------------------------------------------------------------------
// TransformReport
// ---------------------------------------------------------------------------

/// Per-buffer bookkeeping returned by [`VoiceTransform::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformReport {
    /// Input samples whose remapped index fell outside the buffer.
    pub discarded: usize,
}

// ---------------------------------------------------------------------------
// VoiceTransform trait
// ---------------------------------------------------------------------------

/// Strategy that rewrites a buffer of samples according to a profile.
///
/// # Contract
///
/// - On return `output.len() == input.len()`.
/// - Implementations must not assume anything about `output`'s previous
///   contents; it is reused across cycles.
/// - Must be total: never panics on any input.
pub trait VoiceTransform: Send + Sync {
    fn apply(
        &self,
        input: &[i16],
        profile: &VoiceProfile,
        output: &mut Vec<i16>,
    ) -> TransformReport;

    /// Short name for log output.
    fn name(&self) -> &'static str;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn VoiceTransform>) {}
};

// ---------------------------------------------------------------------------
// ScaleRemap
// ---------------------------------------------------------------------------

/// Gain scaling with saturating clamp followed by index remapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleRemap;

impl VoiceTransform for ScaleRemap {
    fn apply(
        &self,
        input: &[i16],
        profile: &VoiceProfile,
        output: &mut Vec<i16>,
    ) -> TransformReport {
        output.clear();
        output.resize(input.len(), 0);

        let capacity = input.len();
        let mut report = TransformReport::default();

        for (i, &sample) in input.iter().enumerate() {
            let scaled = scale_sample(sample, profile.gain);
            match remap_index(i, profile.time_scale) {
                Some(j) if j < capacity => output[j] = scaled,
                _ => report.discarded += 1,
            }
        }

        report
    }

    fn name(&self) -> &'static str {
        "scale-remap"
    }
}

/// `round(sample * gain)` clamped to the `i16` range.
pub fn scale_sample(sample: i16, gain: f64) -> i16 {
    let scaled = (f64::from(sample) * gain).round();
    scaled.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// `floor(index * time_scale)`, or `None` if it does not fit a `usize`.
fn remap_index(index: usize, time_scale: f64) -> Option<usize> {
    let j = (index as f64 * time_scale).floor();
    if j.is_finite() && j >= 0.0 && j < usize::MAX as f64 {
        Some(j as usize)
    } else {
        None
    }
}

/// Apply [`ScaleRemap`] to `samples` and return a fresh output buffer.
///
/// # Example
///
/// ```rust
/// use voice_shifter::audio::transform::apply_profile;
/// use voice_shifter::profile::ProfileRegistry;
///
/// let normal = ProfileRegistry::builtin().get("normal").unwrap();
/// assert_eq!(apply_profile(&[1, -2, 3], &normal), vec![1, -2, 3]);
/// ```
pub fn apply_profile(samples: &[i16], profile: &VoiceProfile) -> Vec<i16> {
    let mut output = Vec::with_capacity(samples.len());
    ScaleRemap.apply(samples, profile, &mut output);
    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileRegistry;

    fn profile(gain: f64, time_scale: f64) -> VoiceProfile {
        VoiceProfile {
            id: "test",
            display_name: "Test",
            gain,
            time_scale,
        }
    }

    #[test]
    fn doubles_gain_in_place() {
        assert_eq!(apply_profile(&[100, -100], &profile(2.0, 1.0)), vec![200, -200]);
    }

    #[test]
    fn identity_profile_is_identity() {
        let input: Vec<i16> = vec![i16::MIN, -1234, -1, 0, 1, 4321, i16::MAX];
        assert_eq!(apply_profile(&input, &profile(1.0, 1.0)), input);
    }

    #[test]
    fn stretch_discards_tail_and_leaves_gaps_silent() {
        let mut output = Vec::new();
        let report = ScaleRemap.apply(&[10, 20, 30, 40], &profile(1.0, 2.0), &mut output);
        assert_eq!(output, vec![10, 0, 20, 0]);
        assert_eq!(report.discarded, 2);
    }

    #[test]
    fn compression_overwrites_earlier_samples() {
        // 0.5: indices 0,1 → 0 and 2,3 → 1; later samples win.
        let out = apply_profile(&[1, 2, 3, 4], &profile(1.0, 0.5));
        assert_eq!(out, vec![2, 4, 0, 0]);
    }

    #[test]
    fn gain_saturates_instead_of_wrapping() {
        let out = apply_profile(&[20_000, -20_000, i16::MAX, i16::MIN], &profile(1.8, 1.0));
        assert_eq!(out, vec![i16::MAX, i16::MIN, i16::MAX, i16::MIN]);
    }

    #[test]
    fn scaling_clamps_for_all_builtins() {
        let input: Vec<i16> = (i16::MIN..=i16::MAX).step_by(97).collect();
        for p in ProfileRegistry::builtin().list() {
            let out = apply_profile(&input, p);
            assert_eq!(out.len(), input.len());

            for &s in &input {
                let exact = (f64::from(s) * p.gain).round();
                let got = f64::from(scale_sample(s, p.gain));
                if exact > f64::from(i16::MAX) {
                    assert_eq!(got, f64::from(i16::MAX));
                } else if exact < f64::from(i16::MIN) {
                    assert_eq!(got, f64::from(i16::MIN));
                } else {
                    assert_eq!(got, exact);
                }
            }
        }
    }

    #[test]
    fn rounds_to_nearest() {
        assert_eq!(scale_sample(3, 1.5), 5); // 4.5 rounds away from zero
        assert_eq!(scale_sample(-3, 1.5), -5);
        assert_eq!(scale_sample(10, 0.8), 8);
        assert_eq!(scale_sample(7, 0.9), 6); // 6.3
    }

    #[test]
    fn reused_output_is_zeroed() {
        let mut output = vec![99; 8];
        ScaleRemap.apply(&[5, 6, 7, 8], &profile(1.0, 2.0), &mut output);
        assert_eq!(output, vec![5, 0, 6, 0]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let mut output = vec![1, 2, 3];
        let report = ScaleRemap.apply(&[], &profile(1.5, 1.2), &mut output);
        assert!(output.is_empty());
        assert_eq!(report.discarded, 0);
    }

    #[test]
    fn girl_profile_moves_samples_forward() {
        let girl = ProfileRegistry::builtin().get("girl").unwrap();
        // j = floor(i * 1.2): 0→0, 1→1, 2→2, 3→3, 4→4 (4.8), 5→6 (discarded)
        let out = apply_profile(&[100, 100, 100, 100, 100, 100], &girl);
        assert_eq!(out, vec![150, 150, 150, 150, 150, 0]);
    }
}
