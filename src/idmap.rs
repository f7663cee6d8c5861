// src/idmap.rs

//! UID/GID band arithmetic
//!
//! An unprivileged container sees its ids shifted up by a fixed band on the
//! host (container root = host uid 100000 with the stock Proxmox mapping).
//! Converting a container means adding or subtracting that band from every
//! uid/gid on its storage.
//!
//! Range checks here are explicit preconditions. An id below the band when
//! shifting down, or above the maximum after shifting up, means the object is
//! already in the other representation and must not be touched.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default distance between container ids and host ids
pub const DEFAULT_ID_BAND: u32 = 100_000;

/// Highest id a shifted-up object may carry
pub const DEFAULT_MAX_ID: u32 = 200_000;

/// Id arithmetic failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShiftError {
    #[error("id {id} is below the {band} band (already privileged or not a container)")]
    BelowBand { id: u32, band: u32 },

    #[error("id {id} shifted by {band} exceeds {max_id} (already unprivileged)")]
    AboveLimit { id: u32, band: u32, max_id: u32 },
}

/// The representation a container is being converted into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionTarget {
    /// Host-matching ids (`unprivileged: 0`)
    Privileged,
    /// Band-shifted ids (`unprivileged: 1`)
    Unprivileged,
}

impl ConversionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Privileged => "privileged",
            Self::Unprivileged => "unprivileged",
        }
    }

    /// Value of the `unprivileged:` config flag for this target
    pub fn unprivileged_flag(&self) -> bool {
        matches!(self, Self::Unprivileged)
    }

    /// Target matching a parsed `unprivileged:` flag
    pub fn from_unprivileged_flag(flag: bool) -> Self {
        if flag {
            Self::Unprivileged
        } else {
            Self::Privileged
        }
    }
}

impl fmt::Display for ConversionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionTarget {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "privileged" => Ok(Self::Privileged),
            "unprivileged" => Ok(Self::Unprivileged),
            other => Err(crate::Error::InvalidTarget(other.to_string())),
        }
    }
}

/// A fixed, signed id offset for one conversion run
///
/// Positive offsets move privileged → unprivileged, negative offsets the
/// inverse. The magnitude never changes during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdShift {
    target: ConversionTarget,
    band: u32,
    max_id: u32,
}

impl IdShift {
    pub fn new(target: ConversionTarget, band: u32, max_id: u32) -> Self {
        Self {
            target,
            band,
            max_id,
        }
    }

    /// Shift using the stock Proxmox band
    pub fn with_defaults(target: ConversionTarget) -> Self {
        Self::new(target, DEFAULT_ID_BAND, DEFAULT_MAX_ID)
    }

    pub fn target(&self) -> ConversionTarget {
        self.target
    }

    pub fn band(&self) -> u32 {
        self.band
    }

    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    /// Signed offset applied to every id
    pub fn offset(&self) -> i64 {
        match self.target {
            ConversionTarget::Unprivileged => i64::from(self.band),
            ConversionTarget::Privileged => -i64::from(self.band),
        }
    }

    /// The shift that undoes this one
    pub fn inverse(&self) -> Self {
        let target = match self.target {
            ConversionTarget::Privileged => ConversionTarget::Unprivileged,
            ConversionTarget::Unprivileged => ConversionTarget::Privileged,
        };
        Self { target, ..*self }
    }

    /// Apply the offset to a single uid or gid
    pub fn apply(&self, id: u32) -> Result<u32, ShiftError> {
        match self.target {
            ConversionTarget::Privileged => {
                if id < self.band {
                    return Err(ShiftError::BelowBand {
                        id,
                        band: self.band,
                    });
                }
                Ok(id - self.band)
            }
            ConversionTarget::Unprivileged => match id.checked_add(self.band) {
                Some(shifted) if shifted <= self.max_id => Ok(shifted),
                _ => Err(ShiftError::AboveLimit {
                    id,
                    band: self.band,
                    max_id: self.max_id,
                }),
            },
        }
    }
}

impl fmt::Display for IdShift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.offset())
    }
}
