//! RIFF/WAV helpers for audio artifacts.
//!
//! Audio recordings are written as 16-bit PCM WAV: a 44-byte header whose
//! size fields are patched once the output is finalized.

use crate::models::capabilities::AudioFormat;

/// Size of the canonical PCM WAV header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Sample layout of a PCM WAV stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl WavSpec {
    /// 16-bit PCM spec for a microphone format.
    pub fn pcm16(format: AudioFormat) -> Self {
        Self {
            sample_rate: format.sample_rate_hz,
            channels: format.channels.count(),
            bit_depth: 16,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bit_depth / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Playback length of `data_size` bytes of sample data.
    pub fn duration_secs(&self, data_size: u64) -> f64 {
        if self.byte_rate() == 0 {
            return 0.0;
        }
        data_size as f64 / self.byte_rate() as f64
    }

    /// Build the header for `data_size` bytes of sample data.
    ///
    /// ```text
    /// [0-3]   "RIFF"        [4-7]   36 + data_size
    /// [8-11]  "WAVE"        [12-15] "fmt "
    /// [16-19] 16            [20-21] 1 (PCM)
    /// [22-23] channels      [24-27] sample_rate
    /// [28-31] byte_rate     [32-33] block_align
    /// [34-35] bit_depth     [36-39] "data"
    /// [40-43] data_size
    /// ```
    pub fn header(&self, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
        let mut header = [0u8; WAV_HEADER_SIZE];
        header[0..4].copy_from_slice(b"RIFF");
        header[8..12].copy_from_slice(b"WAVE");
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes());
        header[20..22].copy_from_slice(&1u16.to_le_bytes());
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&self.bit_depth.to_le_bytes());
        header[36..40].copy_from_slice(b"data");
        patch_sizes(&mut header, data_size);
        header
    }
}

/// Largest data chunk whose RIFF chunk size (`36 + data_size`) still fits
/// the 32-bit field.
pub const MAX_DATA_SIZE: u32 = u32::MAX - 36;

/// Data size after appending `chunk` bytes, or `None` if it would pass
/// `limit` (itself capped at `MAX_DATA_SIZE`).
pub fn grow_data_size(current: u32, chunk: usize, limit: u32) -> Option<u32> {
    let chunk = u32::try_from(chunk).ok()?;
    current
        .checked_add(chunk)
        .filter(|&next| next <= limit.min(MAX_DATA_SIZE))
}

/// Rewrite the RIFF chunk size (offset 4) and data size (offset 40).
pub fn patch_sizes(header: &mut [u8], data_size: u32) {
    let data_size = data_size.min(MAX_DATA_SIZE);
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
}

/// Parse a canonical PCM header. Returns the spec and declared data size.
pub fn parse_header(bytes: &[u8]) -> Option<(WavSpec, u32)> {
    if bytes.len() < WAV_HEADER_SIZE || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }
    if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
        return None;
    }
    let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
    let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    if u16_at(20) != 1 {
        return None;
    }
    let spec = WavSpec {
        channels: u16_at(22),
        sample_rate: u32_at(24),
        bit_depth: u16_at(34),
    };
    Some((spec, u32_at(40)))
}

/// Convert f32 samples in `[-1.0, 1.0]` to little-endian 16-bit PCM.
/// Out-of-range samples are clamped.
pub fn pcm16_le(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::AudioChannels;
    use approx::assert_relative_eq;

    fn mono_44k() -> WavSpec {
        WavSpec::pcm16(AudioFormat {
            channels: AudioChannels::Mono,
            sample_rate_hz: 44_100,
        })
    }

    #[test]
    fn header_layout() {
        let header = mono_44k().header(0);
        assert_eq!(header.len(), WAV_HEADER_SIZE);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u16::from_le_bytes([header[20], header[21]]), 1);
    }

    #[test]
    fn stereo_derived_fields() {
        let spec = WavSpec::pcm16(AudioFormat {
            channels: AudioChannels::Stereo,
            sample_rate_hz: 48_000,
        });
        assert_eq!(spec.block_align(), 4);
        assert_eq!(spec.byte_rate(), 192_000);

        let header = spec.header(9_600);
        let (parsed, data_size) = parse_header(&header).unwrap();
        assert_eq!(parsed, spec);
        assert_eq!(data_size, 9_600);
        assert_eq!(u32::from_le_bytes([header[4], header[5], header[6], header[7]]), 36 + 9_600);
    }

    #[test]
    fn patch_updates_both_sizes() {
        let mut header = mono_44k().header(0);
        patch_sizes(&mut header, 88_200);
        let (_, data_size) = parse_header(&header).unwrap();
        assert_eq!(data_size, 88_200);
        assert_relative_eq!(mono_44k().duration_secs(88_200), 1.0);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_header(b"not a wav file").is_none());
        let mut header = mono_44k().header(0);
        header[20] = 3;
        assert!(parse_header(&header).is_none());
    }

    #[test]
    fn pcm16_clamps() {
        let pcm = pcm16_le(&[0.0, 1.0, -2.0]);
        assert_eq!(pcm.len(), 6);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 0);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), -i16::MAX);
    }

    #[test]
    fn data_size_stops_at_the_riff_limit() {
        assert_eq!(grow_data_size(0, 4410, MAX_DATA_SIZE), Some(4410));
        assert_eq!(grow_data_size(MAX_DATA_SIZE - 10, 10, MAX_DATA_SIZE), Some(MAX_DATA_SIZE));
        assert_eq!(grow_data_size(MAX_DATA_SIZE - 10, 11, MAX_DATA_SIZE), None);
        assert_eq!(grow_data_size(u32::MAX - 1, 4, u32::MAX), None);
        assert_eq!(grow_data_size(100, 50, 120), None);
    }

    #[test]
    fn oversized_data_is_clamped_in_the_header() {
        let header = mono_44k().header(u32::MAX);
        let (_, data_size) = parse_header(&header).unwrap();
        assert_eq!(data_size, MAX_DATA_SIZE);
        assert_eq!(u32::from_le_bytes([header[4], header[5], header[6], header[7]]), u32::MAX);
    }
}
