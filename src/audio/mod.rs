//! Audio layer: PCM codec, voice transform, format conversion and device I/O.
//!
//! # Per-cycle data flow
//!
//! ```text
//! CaptureDevice::read → codec::decode_lossy → VoiceTransform::apply(profile)
//!                     → codec::encode_into → OutputDevice::write
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use voice_shifter::audio::{codec, transform};
//! use voice_shifter::profile::ProfileRegistry;
//!
//! let girl = ProfileRegistry::builtin().get("girl").unwrap();
//! let samples = codec::decode(&[0x64, 0x00, 0x9C, 0xFF]).unwrap();
//! let shifted = transform::apply_profile(&samples, &girl);
//! assert_eq!(codec::encode(&shifted).len(), 4);
//! ```

pub mod buffer;
pub mod codec;
pub mod cpal_io;
pub mod device;
pub mod resample;
pub mod transform;

pub use buffer::RingBuffer;
pub use codec::{CodecError, DecodedFrame};
pub use cpal_io::{list_input_devices, list_output_devices, CpalBackend};
pub use device::{AudioBackend, CaptureDevice, DeviceError, OutputDevice, StreamSpec, SAMPLE_RATE};
pub use resample::{downmix_into, upmix, RateConverter};
pub use transform::{apply_profile, ScaleRemap, TransformReport, VoiceTransform};
