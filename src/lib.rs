//! voice-shifter: a real-time microphone voice changer.
//!
//! Captures 16-bit mono PCM, applies the selected [`profile::VoiceProfile`]
//! (gain + time-index remap) buffer by buffer, and plays the result back.
//!
//! | module       | role                                                 |
//! |--------------|------------------------------------------------------|
//! | [`profile`]  | built-in voice profiles and lookup                   |
//! | [`audio`]    | PCM codec, transform, device traits, cpal backend    |
//! | [`pipeline`] | worker thread, state machine, events                 |
//! | [`config`]   | `settings.toml` persistence                          |
//! | [`control`]  | text commands for the binary                         |

pub mod audio;
pub mod config;
pub mod control;
pub mod pipeline;
pub mod profile;
