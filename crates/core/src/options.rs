//! Composite options supplied by clients and the limits that bound them.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Default limits
// ---------------------------------------------------------------------------

/// Default maximum upload size in bytes (5 MiB).
pub const DEFAULT_SIZE_MAX: i64 = 5 * 1024 * 1024;
pub const DEFAULT_WIDTH_MAX: i64 = 1024;
pub const DEFAULT_HEIGHT_MAX: i64 = 1024;
pub const DEFAULT_FRAME_COUNT_MIN: i64 = 2;
pub const DEFAULT_FRAME_COUNT_MAX: i64 = 120;
/// Frame delays are in milliseconds.
pub const DEFAULT_FRAME_DELAY_MIN: i64 = 5;
pub const DEFAULT_FRAME_DELAY_MAX: i64 = 1000;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parameters for one compositing run, as sent by the client.
///
/// Missing fields default to zero / `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositeOptions {
    pub width: i64,
    pub height: i64,
    pub frame_count: i64,
    pub frame_delay: i64,
    pub flag_crop: bool,
    pub flag_reverse: bool,
    pub flag_flatten: bool,
    /// Background colour packed as `0xRRGGBBAA`.
    pub background: i64,
}

/// Server-side bounds on [`CompositeOptions`] and upload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeLimits {
    pub size_max: i64,
    pub width_max: i64,
    pub height_max: i64,
    pub frame_count_min: i64,
    pub frame_count_max: i64,
    pub frame_delay_min: i64,
    pub frame_delay_max: i64,
}

impl Default for CompositeLimits {
    fn default() -> Self {
        Self {
            size_max: DEFAULT_SIZE_MAX,
            width_max: DEFAULT_WIDTH_MAX,
            height_max: DEFAULT_HEIGHT_MAX,
            frame_count_min: DEFAULT_FRAME_COUNT_MIN,
            frame_count_max: DEFAULT_FRAME_COUNT_MAX,
            frame_delay_min: DEFAULT_FRAME_DELAY_MIN,
            frame_delay_max: DEFAULT_FRAME_DELAY_MAX,
        }
    }
}

/// A single violated bound.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitError {
    #[error("{field} {value} is larger than maximum {max}")]
    AboveMaximum {
        field: &'static str,
        value: i64,
        max: i64,
    },

    #[error("{field} {value} is smaller than minimum {min}")]
    BelowMinimum {
        field: &'static str,
        value: i64,
        min: i64,
    },
}

impl LimitError {
    /// The client-facing name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::AboveMaximum { field, .. } | Self::BelowMinimum { field, .. } => field,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl CompositeOptions {
    /// Check these options against `limits`, returning the first violation.
    ///
    /// Order: width, height, frameCount (min, max), frameDelay (min, max).
    pub fn validate(&self, limits: &CompositeLimits) -> Result<(), LimitError> {
        at_most("width", self.width, limits.width_max)?;
        at_most("height", self.height, limits.height_max)?;
        at_least("frameCount", self.frame_count, limits.frame_count_min)?;
        at_most("frameCount", self.frame_count, limits.frame_count_max)?;
        at_least("frameDelay", self.frame_delay, limits.frame_delay_min)?;
        at_most("frameDelay", self.frame_delay, limits.frame_delay_max)?;
        Ok(())
    }
}

fn at_most(field: &'static str, value: i64, max: i64) -> Result<(), LimitError> {
    if value > max {
        return Err(LimitError::AboveMaximum { field, value, max });
    }
    Ok(())
}

fn at_least(field: &'static str, value: i64, min: i64) -> Result<(), LimitError> {
    if value < min {
        return Err(LimitError::BelowMinimum { field, value, min });
    }
    Ok(())
}
