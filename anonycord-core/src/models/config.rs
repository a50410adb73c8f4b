use std::fmt;

use serde::{Deserialize, Serialize};

use super::capabilities::{AudioFormat, VideoFormat};
use super::error::CaptureError;

/// Lowest and highest microphone sample rates the core accepts.
pub const MIN_SAMPLE_RATE_HZ: u32 = 8_000;
pub const MAX_SAMPLE_RATE_HZ: u32 = 192_000;

/// Physical camera selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Lens {
    Wide,
    Selfie,
    UltraWide,
}

impl Lens {
    pub const ALL: [Lens; 3] = [Lens::Wide, Lens::Selfie, Lens::UltraWide];
}

impl fmt::Display for Lens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Wide => "wide",
            Self::Selfie => "selfie",
            Self::UltraWide => "ultra-wide",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "4K")]
    Uhd4k,
}

impl Resolution {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Hd1080 => (1920, 1080),
            Self::Uhd4k => (3840, 2160),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hd1080 => f.write_str("1080p"),
            Self::Uhd4k => f.write_str("4K"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum FrameRate {
    Fps30,
    Fps60,
}

impl FrameRate {
    pub fn fps(&self) -> u32 {
        match self {
            Self::Fps30 => 30,
            Self::Fps60 => 60,
        }
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            30 => Ok(Self::Fps30),
            60 => Ok(Self::Fps60),
            other => Err(format!("unsupported frame rate: {}", other)),
        }
    }
}

impl From<FrameRate> for u32 {
    fn from(rate: FrameRate) -> Self {
        rate.fps()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioChannels {
    Mono,
    Stereo,
}

impl AudioChannels {
    pub fn count(&self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// Declarative description of the capture graph.
///
/// Passed explicitly to setup and reconfigure; the session keeps its own
/// copy, which stays frozen while a recording is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureConfiguration {
    pub lens: Lens,
    pub resolution: Resolution,
    pub frame_rate: FrameRate,
    pub audio_channels: AudioChannels,
    pub sample_rate_hz: u32,
}

impl CaptureConfiguration {
    /// Checks the constraints that hold regardless of hardware.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.frame_rate == FrameRate::Fps60 && self.resolution != Resolution::Uhd4k {
            return Err(CaptureError::ConfigurationConflict(format!(
                "{} fps requires 4K, got {}",
                self.frame_rate.fps(),
                self.resolution
            )));
        }
        if !(MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ).contains(&self.sample_rate_hz) {
            return Err(CaptureError::ConfigurationConflict(format!(
                "unsupported sample rate: {} Hz",
                self.sample_rate_hz
            )));
        }
        Ok(())
    }

    pub fn video_format(&self) -> VideoFormat {
        VideoFormat {
            resolution: self.resolution,
            frame_rate: self.frame_rate,
        }
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            channels: self.audio_channels,
            sample_rate_hz: self.sample_rate_hz,
        }
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            lens: Lens::Wide,
            resolution: Resolution::Uhd4k,
            frame_rate: FrameRate::Fps30,
            audio_channels: AudioChannels::Mono,
            sample_rate_hz: 44_100,
        }
    }
}
