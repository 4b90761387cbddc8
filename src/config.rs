/// Application configuration
///
/// Read once at start-up from `<config dir>/contact-photos/config.json`.
/// Every field has a default, so a missing or partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::photo::search::DEFAULT_SEARCH_BASE_URL;
use crate::photo::transform::{CROP_OUTPUT_SIZE, EDITOR_FRAME_SIZE, JPEG_QUALITY, MIN_CROP_OUTPUT_SIZE};
use crate::state::dialog::MIN_SETTLE_DELAY;

const APP_DIR: &str = "contact-photos";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite contact store
    pub database_path: PathBuf,
    /// Image search endpoint; the query is appended as `q`
    pub search_base_url: String,
    /// Capture command, e.g. `["fswebcam", "--no-banner", "{output}"]`.
    /// Empty disables the camera.
    pub camera_command: Vec<String>,
    /// Pause between a dialog closing and the next one opening
    pub settle_delay_ms: u64,
    /// Side of the saved photo in pixels; at most the editor frame
    pub crop_output_size: u32,
    /// JPEG quality for saved photos (1-100)
    pub jpeg_quality: u8,
    pub download_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: data_dir().join("contacts.db"),
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            camera_command: Vec::new(),
            settle_delay_ms: MIN_SETTLE_DELAY.as_millis() as u64,
            crop_output_size: CROP_OUTPUT_SIZE,
            jpeg_quality: JPEG_QUALITY,
            download_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load the user's config file, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Load from `path`; a missing or malformed file yields the defaults
    pub fn load_from(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cannot read config, using defaults");
                return Self::default();
            }
        };

        match Self::from_json(&text) {
            Ok(config) => config.normalized(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "malformed config, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Pull out-of-range values back into range
    fn normalized(mut self) -> Self {
        self.settle_delay_ms = self.settle_delay_ms.max(MIN_SETTLE_DELAY.as_millis() as u64);
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        // The crop circle is drawn at this size inside the editor frame
        self.crop_output_size = match self.crop_output_size {
            0 => CROP_OUTPUT_SIZE,
            size => size.clamp(MIN_CROP_OUTPUT_SIZE, EDITOR_FRAME_SIZE),
        };
        self
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs.max(1))
    }

    /// Where camera captures are written before being read back
    pub fn capture_dir(&self) -> PathBuf {
        std::env::temp_dir().join(APP_DIR)
    }
}

/// `<config dir>/contact-photos/config.json`
pub fn config_path() -> PathBuf {
    let mut path = dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push("config.json");
    path
}

/// Per-user data directory for the database and the log file:
/// - Linux: ~/.local/share/contact-photos
/// - macOS: ~/Library/Application Support/contact-photos
/// - Windows: %APPDATA%\contact-photos
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("nope.json"));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.crop_output_size, 240);
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.settle_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "camera_command": ["fswebcam", "{output}"], "settle_delay_ms": 5 }"#).unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.camera_command, vec!["fswebcam", "{output}"]);
        // Settle delay never drops below the minimum
        assert_eq!(config.settle_delay_ms, 100);
        assert_eq!(config.search_base_url, DEFAULT_SEARCH_BASE_URL);
    }

    #[test]
    fn test_output_size_fits_editor_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        for (configured, expected) in [(0, 240), (8, 64), (200, 200), (1024, EDITOR_FRAME_SIZE)] {
            std::fs::write(&path, format!(r#"{{ "crop_output_size": {configured} }}"#)).unwrap();
            assert_eq!(AppConfig::load_from(&path).crop_output_size, expected);
        }
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }

    #[test]
    fn test_serialization() {
        let mut config = AppConfig::default();
        config.jpeg_quality = 90;
        config.camera_command = vec!["snap".to_string()];

        let json = config.to_json().unwrap();
        let restored = AppConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }
}
