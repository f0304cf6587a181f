//! Platform profiles and one-shot capability negotiation.
//!
//! A [`PlatformProfile`] carries every tunable that differs between
//! deployments. [`negotiate`] runs once before a session starts and turns
//! a profile plus the actual collaborators into a [`ResolvedProfile`];
//! the loops only ever see the resolved values.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FramecastError, Result};
use crate::source::{FrameEncoder, FrameSource};

// ── PlatformProfile ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    /// Frames wider than this are scaled down before encoding.
    pub max_width: u32,
    pub quality_step: u8,
    pub quality_min: u8,
    pub quality_max: u8,
    pub default_quality: u8,
    /// Floor for the capture loop's pacing sleep.
    pub min_sleep: Duration,
}

impl PlatformProfile {
    pub fn validate(&self) -> Result<()> {
        if self.max_width == 0 {
            return Err(FramecastError::InvalidConfig("max_width must be > 0".into()));
        }
        if self.quality_step == 0 {
            return Err(FramecastError::InvalidConfig("quality_step must be > 0".into()));
        }
        if self.quality_min == 0 || self.quality_min > self.quality_max || self.quality_max > 100 {
            return Err(FramecastError::InvalidConfig(format!(
                "quality range {}..={} must lie within 1..=100",
                self.quality_min, self.quality_max
            )));
        }
        if self.min_sleep.is_zero() {
            return Err(FramecastError::InvalidConfig("min_sleep must be positive".into()));
        }
        Ok(())
    }
}

impl Default for PlatformProfile {
    fn default() -> Self {
        ProfilePreset::Balanced.profile()
    }
}

// ── ProfilePreset ────────────────────────────────────────────────

/// Named profiles selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfilePreset {
    #[default]
    Balanced,
    LowBandwidth,
    HighFidelity,
}

impl ProfilePreset {
    pub fn profile(self) -> PlatformProfile {
        match self {
            Self::Balanced => PlatformProfile {
                max_width: 1280,
                quality_step: 5,
                quality_min: 30,
                quality_max: 90,
                default_quality: 75,
                min_sleep: Duration::from_millis(1),
            },
            Self::LowBandwidth => PlatformProfile {
                max_width: 960,
                quality_step: 8,
                quality_min: 20,
                quality_max: 70,
                default_quality: 50,
                min_sleep: Duration::from_millis(1),
            },
            Self::HighFidelity => PlatformProfile {
                max_width: 1920,
                quality_step: 3,
                quality_min: 50,
                quality_max: 95,
                default_quality: 85,
                min_sleep: Duration::from_millis(1),
            },
        }
    }
}

impl fmt::Display for ProfilePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Balanced => write!(f, "balanced"),
            Self::LowBandwidth => write!(f, "low-bandwidth"),
            Self::HighFidelity => write!(f, "high-fidelity"),
        }
    }
}

impl FromStr for ProfilePreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "balanced" => Ok(Self::Balanced),
            "low-bandwidth" => Ok(Self::LowBandwidth),
            "high-fidelity" => Ok(Self::HighFidelity),
            other => Err(format!(
                "unknown profile '{other}' (expected balanced, low-bandwidth or high-fidelity)"
            )),
        }
    }
}

// ── Negotiation ──────────────────────────────────────────────────

/// Profile after negotiation against the real source and encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    /// The profile with its quality range narrowed to what the encoder
    /// supports.
    pub profile: PlatformProfile,
    /// Starting quality, inside the resolved range.
    pub initial_quality: u8,
    /// `false` when the encoder has no quality knob.
    pub adaptive: bool,
    pub native_width: u32,
    pub native_height: u32,
    pub output_width: u32,
    pub output_height: u32,
}

impl ResolvedProfile {
    /// Resolve without probing, for callers that already know the
    /// geometry (tests, fakes).
    pub fn assume(profile: PlatformProfile, width: u32, height: u32) -> Self {
        let (output_width, output_height) = scaled_dimensions(width, height, profile.max_width);
        Self {
            initial_quality: profile.default_quality,
            adaptive: true,
            profile,
            native_width: width,
            native_height: height,
            output_width,
            output_height,
        }
    }
}

/// Output size for a `width × height` frame capped at `max_width`,
/// preserving aspect ratio.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if max_width == 0 || width <= max_width {
        return (width, height);
    }
    let scaled = (height as u64 * max_width as u64 / width as u64).max(1);
    (max_width, scaled as u32)
}

/// Probe once and resolve `profile`.
///
/// Takes a single capture to learn the native geometry (a failure here
/// is a startup error), intersects the quality range with the encoder's,
/// and clamps `initial_quality` (profile default when `None`).
pub fn negotiate<S, E>(
    profile: &PlatformProfile,
    source: &mut S,
    encoder: &E,
    initial_quality: Option<u8>,
) -> Result<ResolvedProfile>
where
    S: FrameSource + ?Sized,
    E: FrameEncoder + ?Sized,
{
    profile.validate()?;

    let probe = source.capture()?;
    probe.validate()?;

    let mut resolved = profile.clone();
    let adaptive = match encoder.quality_range() {
        Some(range) => {
            let min = resolved.quality_min.max(*range.start());
            let max = resolved.quality_max.min(*range.end());
            if min > max {
                return Err(FramecastError::InvalidConfig(format!(
                    "encoder quality range {}..={} does not overlap profile range {}..={}",
                    range.start(),
                    range.end(),
                    resolved.quality_min,
                    resolved.quality_max
                )));
            }
            resolved.quality_min = min;
            resolved.quality_max = max;
            true
        }
        None => false,
    };

    let initial_quality = initial_quality
        .unwrap_or(resolved.default_quality)
        .clamp(resolved.quality_min, resolved.quality_max);
    resolved.default_quality = initial_quality;

    let (output_width, output_height) =
        scaled_dimensions(probe.width, probe.height, resolved.max_width);

    tracing::info!(
        native = %format_args!("{}x{}", probe.width, probe.height),
        output = %format_args!("{}x{}", output_width, output_height),
        quality = initial_quality,
        range = %format_args!("{}..={}", resolved.quality_min, resolved.quality_max),
        adaptive,
        "capabilities negotiated"
    );

    Ok(ResolvedProfile {
        profile: resolved,
        initial_quality,
        adaptive,
        native_width: probe.width,
        native_height: probe.height,
        output_width,
        output_height,
    })
}

// ── Tests ────────────────────────────────────────────────────────
