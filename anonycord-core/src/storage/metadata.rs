use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::artifact::{Artifact, ArtifactKind};
use crate::models::config::CaptureConfiguration;
use crate::models::error::LibraryError;
use crate::processing::wav_format::{parse_header, WAV_HEADER_SIZE};

/// Sidecar describing a saved asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub id: String,
    pub kind: ArtifactKind,
    pub file_path: String,
    pub checksum: String,
    pub byte_size: u64,
    pub duration_secs: Option<f64>,
    pub created_at: String,
    pub saved_at: String,
    pub configuration: CaptureConfiguration,
}

impl AssetMetadata {
    /// Audio durations come from the WAV header when it can be read; the
    /// wall-clock estimate is the fallback.
    pub fn new(artifact: &Artifact, location: &Path, checksum: &str, byte_size: u64) -> Self {
        let duration_secs = match artifact.kind {
            ArtifactKind::Audio => wav_duration(location).or(artifact.duration_secs),
            _ => artifact.duration_secs,
        };
        Self {
            id: artifact.id.to_string(),
            kind: artifact.kind,
            file_path: location.to_string_lossy().into_owned(),
            checksum: checksum.to_string(),
            byte_size,
            duration_secs,
            created_at: artifact.created_at.to_rfc3339(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            configuration: artifact.configuration,
        }
    }
}

/// Playback length declared by a WAV file's header.
pub fn wav_duration(path: &Path) -> Option<f64> {
    let mut header = [0u8; WAV_HEADER_SIZE];
    fs::File::open(path).ok()?.read_exact(&mut header).ok()?;
    let (spec, data_size) = parse_header(&header)?;
    Some(spec.duration_secs(data_size as u64))
}

/// `{asset}.metadata.json` next to the asset.
pub fn metadata_path(asset_path: &Path) -> PathBuf {
    let mut name = asset_path.as_os_str().to_owned();
    name.push(".metadata.json");
    PathBuf::from(name)
}

pub fn write_metadata(metadata: &AssetMetadata, asset_path: &Path) -> Result<(), LibraryError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| LibraryError::Permanent(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(asset_path), json)
        .map_err(|e| LibraryError::Permanent(format!("failed to write metadata: {}", e)))
}

pub fn read_metadata(asset_path: &Path) -> Result<AssetMetadata, LibraryError> {
    let json = fs::read_to_string(metadata_path(asset_path))
        .map_err(|e| LibraryError::Permanent(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json).map_err(|e| LibraryError::Permanent(format!("failed to parse metadata: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capabilities::AudioFormat;
    use crate::models::config::AudioChannels;
    use crate::processing::wav_format::{pcm16_le, WavSpec};

    #[test]
    fn wav_duration_reads_the_header() {
        let path = std::env::temp_dir().join(format!("anonycord_wav_{}.wav", uuid::Uuid::new_v4().simple()));
        let spec = WavSpec::pcm16(AudioFormat {
            channels: AudioChannels::Mono,
            sample_rate_hz: 8_000,
        });
        let data = pcm16_le(&vec![0.25; 4_000]);
        let mut bytes = spec.header(data.len() as u32).to_vec();
        bytes.extend_from_slice(&data);
        fs::write(&path, bytes).unwrap();

        approx::assert_relative_eq!(wav_duration(&path).unwrap(), 0.5);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn wav_duration_ignores_other_files() {
        let path = std::env::temp_dir().join(format!("anonycord_not_wav_{}.wav", uuid::Uuid::new_v4().simple()));
        fs::write(&path, b"not a wav file").unwrap();
        assert!(wav_duration(&path).is_none());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn sidecar_sits_next_to_the_asset() {
        assert_eq!(
            metadata_path(Path::new("/library/Audio/a.wav")),
            PathBuf::from("/library/Audio/a.wav.metadata.json")
        );
    }
}
