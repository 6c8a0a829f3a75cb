//! Voice-effect profiles and the read-only registry that names them.
//!
//! A [`VoiceProfile`] is a plain record of two factors consumed by the
//! transform stage:
//!
//! | Field        | Meaning                                              |
//! |--------------|------------------------------------------------------|
//! | `gain`       | Linear amplitude multiplier applied to every sample |
//! | `time_scale` | Factor remapping sample index `i` to `floor(i * k)` |
//!
//! [`ProfileRegistry::builtin`] returns the fixed table shipped with the
//! application; [`ProfileRegistry::new`] validates a custom table.
//!
//! # Example
//!
//! ```rust
//! use voice_shifter::profile::ProfileRegistry;
//!
//! let registry = ProfileRegistry::builtin();
//! let girl = registry.get("girl").unwrap();
//! assert_eq!(girl.display_name, "Girl");
//! assert!(registry.get("robot").is_err());
//! ```

use std::collections::HashSet;

use thiserror::Error;

// ---------------------------------------------------------------------------
// ProfileError
// ---------------------------------------------------------------------------

/// Errors raised while looking up or validating profiles.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProfileError {
    /// No profile with the requested id exists.
    #[error("unknown voice profile: {0}")]
    NotFound(String),

    /// A profile factor is zero, negative or not finite.
    #[error("profile {id}: {field} must be a positive finite number (got {value})")]
    InvalidProfile {
        id: String,
        field: &'static str,
        value: f64,
    },

    /// Two profiles share the same id.
    #[error("duplicate voice profile id: {0}")]
    DuplicateId(String),
}

// ---------------------------------------------------------------------------
// VoiceProfile
// ---------------------------------------------------------------------------

/// An immutable voice-effect profile.
///
/// `Copy` so that readers always take a whole value; a profile can never be
/// observed half-written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceProfile {
    /// Stable identifier used by the control surface (e.g. `"girl"`).
    pub id: &'static str,
    /// Human-readable name shown to the user.
    pub display_name: &'static str,
    /// Amplitude multiplier, always `> 0`.
    pub gain: f64,
    /// Index remapping factor, always `> 0`.
    pub time_scale: f64,
}

impl VoiceProfile {
    /// Returns `true` when this profile leaves samples untouched.
    pub fn is_identity(&self) -> bool {
        self.gain == 1.0 && self.time_scale == 1.0
    }

    fn validate(&self) -> Result<(), ProfileError> {
        for (field, value) in [("gain", self.gain), ("time_scale", self.time_scale)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ProfileError::InvalidProfile {
                    id: self.id.to_string(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// The profiles shipped with the application, in display order.
pub const BUILTIN_PROFILES: &[VoiceProfile] = &[
    VoiceProfile {
        id: "normal",
        display_name: "Original",
        gain: 1.0,
        time_scale: 1.0,
    },
    VoiceProfile {
        id: "girl",
        display_name: "Girl",
        gain: 1.5,
        time_scale: 1.2,
    },
    VoiceProfile {
        id: "mature",
        display_name: "Mature",
        gain: 0.8,
        time_scale: 0.9,
    },
    VoiceProfile {
        id: "loli",
        display_name: "Loli",
        gain: 1.8,
        time_scale: 1.3,
    },
    VoiceProfile {
        id: "manbo",
        display_name: "Manbo",
        gain: 1.2,
        time_scale: 0.7,
    },
];

// ---------------------------------------------------------------------------
// ProfileRegistry
// ---------------------------------------------------------------------------

/// Ordered, read-only table of [`VoiceProfile`]s keyed by id.
///
/// Never empty: the first entry is the default selection.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<VoiceProfile>,
}

impl ProfileRegistry {
    /// The built-in profile table.
    pub fn builtin() -> Self {
        Self {
            profiles: BUILTIN_PROFILES.to_vec(),
        }
    }

    /// Build a registry from a custom table.
    ///
    /// # Errors
    ///
    /// - [`ProfileError::InvalidProfile`] when a gain or time-scale is not a
    ///   positive finite number.
    /// - [`ProfileError::DuplicateId`] when two entries share an id.
    /// - [`ProfileError::NotFound`] when `profiles` is empty (there would be
    ///   no default to select).
    pub fn new(profiles: Vec<VoiceProfile>) -> Result<Self, ProfileError> {
        if profiles.is_empty() {
            return Err(ProfileError::NotFound("<empty registry>".into()));
        }

        let mut seen = HashSet::new();
        for profile in &profiles {
            profile.validate()?;
            if !seen.insert(profile.id) {
                return Err(ProfileError::DuplicateId(profile.id.to_string()));
            }
        }

        Ok(Self { profiles })
    }

    /// All profiles in display order.
    pub fn list(&self) -> &[VoiceProfile] {
        &self.profiles
    }

    /// Look up a profile by id.
    pub fn get(&self, id: &str) -> Result<VoiceProfile, ProfileError> {
        self.profiles
            .iter()
            .find(|p| p.id == id)
            .copied()
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))
    }

    /// The first profile in display order.
    pub fn default_profile(&self) -> VoiceProfile {
        self.profiles[0]
    }

    /// Profile ids in display order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.profiles.iter().map(|p| p.id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
