use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::config::{AudioChannels, CaptureConfiguration, FrameRate, Lens, Resolution};
use super::error::CaptureError;

/// Active format of a camera input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VideoFormat {
    pub resolution: Resolution,
    pub frame_rate: FrameRate,
}

/// Format of the microphone input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AudioFormat {
    pub channels: AudioChannels,
    pub sample_rate_hz: u32,
}

/// What the capture hardware can do, as reported by the device.
///
/// Probing is a pure query; the controller snapshots it once and validates
/// every configuration against the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Video formats supported by each lens present on the device.
    pub lenses: BTreeMap<Lens, BTreeSet<VideoFormat>>,
    pub has_microphone: bool,
    pub supports_stereo: bool,
}

impl DeviceCapabilities {
    pub fn has_lens(&self, lens: Lens) -> bool {
        self.lenses.contains_key(&lens)
    }

    pub fn supports(&self, lens: Lens, format: VideoFormat) -> bool {
        self.lenses
            .get(&lens)
            .is_some_and(|formats| formats.contains(&format))
    }

    pub fn available_lenses(&self) -> Vec<Lens> {
        self.lenses.keys().copied().collect()
    }

    /// Validates `config` against the hardware.
    ///
    /// A missing lens is `DeviceUnavailable`; an unsupported format or
    /// channel layout is `ConfigurationConflict`.
    pub fn check(&self, config: &CaptureConfiguration) -> Result<(), CaptureError> {
        config.validate()?;

        let Some(formats) = self.lenses.get(&config.lens) else {
            return Err(CaptureError::DeviceUnavailable(format!(
                "no {} camera on this device",
                config.lens
            )));
        };

        let wanted = config.video_format();
        if !formats.contains(&wanted) {
            return Err(CaptureError::ConfigurationConflict(format!(
                "{} camera does not support {} at {} fps",
                config.lens,
                wanted.resolution,
                wanted.frame_rate.fps()
            )));
        }

        if config.audio_channels == AudioChannels::Stereo && self.has_microphone && !self.supports_stereo {
            return Err(CaptureError::ConfigurationConflict(
                "stereo recording not supported by the microphone".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(resolution: Resolution, frame_rate: FrameRate) -> VideoFormat {
        VideoFormat { resolution, frame_rate }
    }

    fn phone_without_4k60() -> DeviceCapabilities {
        let formats: BTreeSet<_> = [
            format(Resolution::Hd1080, FrameRate::Fps30),
            format(Resolution::Uhd4k, FrameRate::Fps30),
        ]
        .into_iter()
        .collect();
        DeviceCapabilities {
            lenses: BTreeMap::from([(Lens::Wide, formats.clone()), (Lens::Selfie, formats)]),
            has_microphone: true,
            supports_stereo: true,
        }
    }

    #[test]
    fn missing_lens_is_device_unavailable() {
        let caps = phone_without_4k60();
        assert!(!caps.has_lens(Lens::UltraWide));
        let config = CaptureConfiguration {
            lens: Lens::UltraWide,
            ..Default::default()
        };
        assert!(matches!(caps.check(&config), Err(CaptureError::DeviceUnavailable(_))));
    }

    #[test]
    fn unsupported_4k60_is_conflict() {
        let caps = phone_without_4k60();
        let config = CaptureConfiguration {
            lens: Lens::Wide,
            resolution: Resolution::Uhd4k,
            frame_rate: FrameRate::Fps60,
            audio_channels: AudioChannels::Stereo,
            sample_rate_hz: 44_100,
        };
        assert!(matches!(
            caps.check(&config),
            Err(CaptureError::ConfigurationConflict(_))
        ));
    }

    #[test]
    fn mono_only_microphone_rejects_stereo() {
        let caps = DeviceCapabilities {
            supports_stereo: false,
            ..phone_without_4k60()
        };
        let stereo = CaptureConfiguration {
            audio_channels: AudioChannels::Stereo,
            ..Default::default()
        };
        assert!(caps.check(&stereo).is_err());
        assert!(caps.check(&CaptureConfiguration::default()).is_ok());
    }
}
