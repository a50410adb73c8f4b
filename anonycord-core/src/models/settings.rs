use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Controller-wide settings.
///
/// Capture parameters are not part of this; they travel with each setup or
/// reconfigure call as a `CaptureConfiguration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Directory holding artifacts until they are persisted.
    pub transient_directory: PathBuf,

    /// How long a permission request may hold the session queue.
    pub permission_timeout_ms: u64,

    /// Pause before the single automatic persist retry.
    pub persist_retry_delay_ms: u64,

    /// Hand every finalized video and audio recording to the persistence
    /// sink. Photos are always persisted.
    pub auto_persist: bool,

    /// Stop recordings automatically after this many seconds.
    pub max_duration_secs: Option<f64>,

    /// Log a diagnostic record after each saved video or photo.
    pub diagnostic_on_save: bool,
}

impl RecorderSettings {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.transient_directory.as_os_str().is_empty() {
            return Err(CaptureError::ConfigurationConflict(
                "transient directory must be set".into(),
            ));
        }
        if let Some(max) = self.max_duration_secs {
            if !max.is_finite() || max <= 0.0 {
                return Err(CaptureError::ConfigurationConflict(format!(
                    "max duration must be positive, got {}",
                    max
                )));
            }
        }
        Ok(())
    }

    pub fn permission_timeout(&self) -> Duration {
        Duration::from_millis(self.permission_timeout_ms)
    }

    pub fn persist_retry_delay(&self) -> Duration {
        Duration::from_millis(self.persist_retry_delay_ms)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs_f64)
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::SettingsStorage(format!("failed to read settings: {}", e))
        })?;
        let settings: Self = serde_json::from_str(&json).map_err(|e| {
            CaptureError::SettingsStorage(format!("failed to parse settings: {}", e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), CaptureError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            CaptureError::SettingsStorage(format!("failed to serialize settings: {}", e))
        })?;
        fs::write(path, json).map_err(|e| {
            CaptureError::SettingsStorage(format!("failed to write settings: {}", e))
        })
    }
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            transient_directory: std::env::temp_dir().join("anonycord"),
            permission_timeout_ms: 30_000,
            persist_retry_delay_ms: 250,
            auto_persist: true,
            max_duration_secs: None,
            diagnostic_on_save: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = RecorderSettings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.auto_persist);
        assert!(!settings.diagnostic_on_save);
        assert_eq!(settings.max_duration(), None);
    }

    #[test]
    fn rejects_non_positive_max_duration() {
        let settings = RecorderSettings {
            max_duration_secs: Some(0.0),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let path = std::env::temp_dir().join("anonycord_settings_partial.json");
        fs::write(&path, r#"{ "persist_retry_delay_ms": 5, "max_duration_secs": 1.5 }"#).unwrap();

        let settings = RecorderSettings::load(&path).unwrap();
        assert_eq!(settings.persist_retry_delay(), Duration::from_millis(5));
        assert_eq!(settings.max_duration(), Some(Duration::from_millis(1500)));
        assert!(settings.auto_persist);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let path = std::env::temp_dir().join("anonycord_settings_saved.json");
        let settings = RecorderSettings {
            diagnostic_on_save: true,
            auto_persist: false,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(RecorderSettings::load(&path).unwrap(), settings);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn unreadable_settings_are_a_storage_error() {
        let missing = std::env::temp_dir().join("anonycord_settings_missing.json");
        fs::remove_file(&missing).ok();
        assert!(matches!(
            RecorderSettings::load(&missing),
            Err(CaptureError::SettingsStorage(_))
        ));

        let garbled = std::env::temp_dir().join("anonycord_settings_garbled.json");
        fs::write(&garbled, "{ not json").unwrap();
        assert!(matches!(
            RecorderSettings::load(&garbled),
            Err(CaptureError::SettingsStorage(_))
        ));
        fs::remove_file(&garbled).ok();
    }

    #[test]
    fn invalid_loaded_settings_are_a_conflict() {
        let path = std::env::temp_dir().join("anonycord_settings_invalid.json");
        fs::write(&path, r#"{ "max_duration_secs": -1.0 }"#).unwrap();
        assert!(matches!(
            RecorderSettings::load(&path),
            Err(CaptureError::ConfigurationConflict(_))
        ));
        fs::remove_file(&path).ok();
    }
}
