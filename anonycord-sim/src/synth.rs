//! Synthesized media: a sine tone for the microphone, flat YUV 4:2:0 frames
//! for the camera and a colour-bar test card for stills.

use std::f32::consts::TAU;

use image::{Rgb, RgbImage};

use anonycord_core::models::capabilities::AudioFormat;

/// Frequency of the simulated microphone tone.
pub const TONE_HZ: f32 = 440.0;

const TONE_AMPLITUDE: f32 = 0.5;

/// `frames` interleaved samples of a sine tone, continuing the phase from
/// `start_frame` so consecutive chunks join without clicks.
pub fn tone(format: AudioFormat, start_frame: u64, frames: usize, frequency: f32) -> Vec<f32> {
    let channels = format.channels.count() as usize;
    let rate = format.sample_rate_hz as f32;
    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let t = (start_frame + i as u64) as f32 / rate;
        let value = (TAU * frequency * t).sin() * TONE_AMPLITUDE;
        samples.extend(std::iter::repeat(value).take(channels));
    }
    samples
}

/// YUV4MPEG2 stream header for a progressive 4:2:0 stream.
pub fn y4m_header(width: u32, height: u32, fps: u32) -> String {
    format!("YUV4MPEG2 W{} H{} F{}:1 Ip A1:1 C420jpeg\n", width, height, fps)
}

/// Parse width, height and frame rate back out of a YUV4MPEG2 header.
pub fn parse_y4m_header(bytes: &[u8]) -> Option<(u32, u32, u32)> {
    let end = bytes.iter().position(|b| *b == b'\n')?;
    let line = std::str::from_utf8(&bytes[..end]).ok()?;
    let mut fields = line.split(' ');
    if fields.next()? != "YUV4MPEG2" {
        return None;
    }

    let (mut width, mut height, mut fps) = (None, None, None);
    for field in fields {
        let Some(value) = field.get(1..) else {
            continue;
        };
        match &field[..1] {
            "W" => width = value.parse().ok(),
            "H" => height = value.parse().ok(),
            "F" => fps = value.split(':').next().and_then(|n| n.parse().ok()),
            _ => {}
        }
    }
    Some((width?, height?, fps?))
}

/// One `FRAME` record of uniform `luma` with neutral chroma.
pub fn gray_frame(width: u32, height: u32, luma: u8) -> Vec<u8> {
    let luma_size = (width * height) as usize;
    let chroma_size = (width.div_ceil(2) * height.div_ceil(2)) as usize;
    let mut frame = Vec::with_capacity(6 + luma_size + 2 * chroma_size);
    frame.extend_from_slice(b"FRAME\n");
    frame.resize(6 + luma_size, luma);
    frame.resize(6 + luma_size + 2 * chroma_size, 128);
    frame
}

const BARS: [[u8; 3]; 7] = [
    [192, 192, 192],
    [192, 192, 0],
    [0, 192, 192],
    [0, 192, 0],
    [192, 0, 192],
    [192, 0, 0],
    [0, 0, 192],
];

/// Vertical colour bars.
pub fn test_card(width: u32, height: u32) -> RgbImage {
    let bar_width = (width / BARS.len() as u32).max(1);
    RgbImage::from_fn(width, height, |x, _| {
        let bar = ((x / bar_width) as usize).min(BARS.len() - 1);
        Rgb(BARS[bar])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anonycord_core::models::config::AudioChannels;
    use approx::assert_relative_eq;

    #[test]
    fn tone_is_interleaved_and_continuous() {
        let stereo = AudioFormat {
            channels: AudioChannels::Stereo,
            sample_rate_hz: 48_000,
        };
        let first = tone(stereo, 0, 480, TONE_HZ);
        let second = tone(stereo, 480, 480, TONE_HZ);
        assert_eq!(first.len(), 960);
        assert_eq!(first[0], first[1]);

        let whole = tone(stereo, 0, 960, TONE_HZ);
        assert_relative_eq!(whole[960], second[0], epsilon = 1e-6);
        assert!(whole.iter().all(|s| s.abs() <= TONE_AMPLITUDE));
    }

    #[test]
    fn y4m_header_round_trips_dimensions() {
        let header = y4m_header(1920, 1080, 30);
        assert_eq!(parse_y4m_header(header.as_bytes()), Some((1920, 1080, 30)));
        assert_eq!(parse_y4m_header(b"RIFF\n"), None);
    }

    #[test]
    fn gray_frame_has_420_layout() {
        let frame = gray_frame(4, 2, 16);
        assert_eq!(frame.len(), 6 + 8 + 2 * 2);
        assert_eq!(&frame[..6], b"FRAME\n");
        assert_eq!(frame[6], 16);
        assert_eq!(*frame.last().unwrap(), 128);
    }

    #[test]
    fn test_card_spans_all_bars() {
        let card = test_card(70, 4);
        assert_eq!(card.get_pixel(0, 0), &Rgb(BARS[0]));
        assert_eq!(card.get_pixel(69, 3), &Rgb(BARS[6]));
    }
}
