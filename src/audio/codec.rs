//! Little-endian 16-bit PCM ⇄ `i16` sample conversion.
//!
//! Device buffers carry raw bytes; the transform works on signed samples.
//! Every byte pair `[lo, hi]` is one sample.
//!
//! # Example
//!
//! ```rust
//! use voice_shifter::audio::codec::{decode, encode};
//!
//! let bytes = [0x64, 0x00, 0x9C, 0xFF]; // 100, -100
//! let samples = decode(&bytes).unwrap();
//! assert_eq!(samples, vec![100, -100]);
//! assert_eq!(encode(&samples), bytes);
//! ```

use thiserror::Error;

/// Bytes per mono 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

// ---------------------------------------------------------------------------
// CodecError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The byte buffer does not hold a whole number of samples.
    #[error("malformed PCM buffer: {len} bytes is not a whole number of 16-bit samples")]
    MalformedBuffer { len: usize },
}

// ---------------------------------------------------------------------------
// decode / encode
// ---------------------------------------------------------------------------

/// Interpret `bytes` as little-endian signed 16-bit samples.
///
/// # Errors
///
/// [`CodecError::MalformedBuffer`] when `bytes.len()` is odd.
pub fn decode(bytes: &[u8]) -> Result<Vec<i16>, CodecError> {
    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        return Err(CodecError::MalformedBuffer { len: bytes.len() });
    }
    Ok(decode_pairs(bytes))
}

/// Result of [`decode_lossy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub samples: Vec<i16>,
    /// `true` when an odd trailing byte was discarded.
    pub dropped_trailing_byte: bool,
}

/// Decode `bytes`, recovering from an odd length by dropping the final byte.
///
/// This is the recovery path used by the pipeline: the drop is logged at
/// `warn` and reported in [`DecodedFrame::dropped_trailing_byte`] so it can
/// be counted.
pub fn decode_lossy(bytes: &[u8]) -> DecodedFrame {
    match decode(bytes) {
        Ok(samples) => DecodedFrame {
            samples,
            dropped_trailing_byte: false,
        },
        Err(e) => {
            log::warn!("codec: {e}; dropping trailing byte");
            DecodedFrame {
                samples: decode_pairs(&bytes[..bytes.len() - 1]),
                dropped_trailing_byte: true,
            }
        }
    }
}

fn decode_pairs(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode samples as little-endian bytes (low byte first).
pub fn encode(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    encode_into(samples, &mut out);
    out
}

/// Encode samples into `out`, replacing its previous contents.
///
/// Lets the worker loop reuse one allocation across cycles.
pub fn encode_into(samples: &[i16], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(samples.len() * BYTES_PER_SAMPLE);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reads_little_endian_pairs() {
        let bytes = [0x00, 0x80, 0xFF, 0x7F, 0x01, 0x00, 0xFF, 0xFF];
        assert_eq!(decode(&bytes).unwrap(), vec![i16::MIN, i16::MAX, 1, -1]);
    }

    #[test]
    fn encode_writes_low_byte_first() {
        assert_eq!(encode(&[0x1234, -2]), vec![0x34, 0x12, 0xFE, 0xFF]);
    }

    #[test]
    fn round_trip_preserves_every_byte_value() {
        // Every byte value appears in both low and high positions.
        let bytes: Vec<u8> = (0..=255u8).flat_map(|b| [b, b.wrapping_mul(7)]).collect();
        assert_eq!(encode(&decode(&bytes).unwrap()), bytes);
    }

    #[test]
    fn empty_buffer_decodes_to_no_samples() {
        assert!(decode(&[]).unwrap().is_empty());
        assert!(encode(&[]).is_empty());
    }

    #[test]
    fn odd_length_is_malformed() {
        assert_eq!(
            decode(&[1, 2, 3]),
            Err(CodecError::MalformedBuffer { len: 3 })
        );
    }

    #[test]
    fn lossy_decode_drops_trailing_byte() {
        let frame = decode_lossy(&[0x64, 0x00, 0x9C, 0xFF, 0x42]);
        assert_eq!(frame.samples, vec![100, -100]);
        assert!(frame.dropped_trailing_byte);

        let single = decode_lossy(&[0x42]);
        assert!(single.samples.is_empty());
        assert!(single.dropped_trailing_byte);
    }

    #[test]
    fn lossy_decode_of_even_buffer_is_exact() {
        let frame = decode_lossy(&[0x64, 0x00]);
        assert_eq!(frame.samples, vec![100]);
        assert!(!frame.dropped_trailing_byte);
    }

    #[test]
    fn encode_into_replaces_previous_contents() {
        let mut out = vec![9, 9, 9, 9, 9, 9];
        encode_into(&[1], &mut out);
        assert_eq!(out, vec![1, 0]);
    }
}
