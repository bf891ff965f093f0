//! Host runtime configuration, loaded from a JSON file

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};

/// Configuration for the hosted control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// JSON file backing the NVRAM records
    pub nvram_path: PathBuf,
    /// Bytes per outgoing SCO frame
    pub mic_frame_len: usize,
    /// SCO frame cadence in microseconds
    pub mic_frame_interval_us: u64,
    /// Initial state of the pairing-allowed flag
    pub pairing_allowed: bool,
    /// Whether a fast-pair seeker flow is active
    pub fast_pair: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Answer bt-start with a simulated stack instead of a real one
    pub loopback_stack: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            nvram_path: PathBuf::from("headset-nvram.json"),
            mic_frame_len: 60,
            mic_frame_interval_us: 7500,
            pairing_allowed: true,
            fast_pair: false,
            log_filter: "info".to_string(),
            loopback_stack: true,
        }
    }
}

impl HostConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> HostResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|source| HostError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// SCO frame cadence; never zero
    pub fn mic_frame_interval(&self) -> Duration {
        Duration::from_micros(self.mic_frame_interval_us.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HostConfig::default();
        assert_eq!(config.mic_frame_len, 60);
        assert_eq!(config.mic_frame_interval(), Duration::from_micros(7500));
        assert!(config.pairing_allowed);
        assert!(!config.fast_pair);
        assert!(config.loopback_stack);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headset.json");
        std::fs::write(&path, r#"{ "pairing_allowed": false, "mic_frame_len": 120 }"#).unwrap();

        let config = HostConfig::load(&path).unwrap();
        assert!(!config.pairing_allowed);
        assert_eq!(config.mic_frame_len, 120);
        assert_eq!(config.mic_frame_interval_us, 7500);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(HostConfig::load(&path), Err(HostError::Config { .. })));
    }
}
