use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use stepline_decode::SAMPLES_ROOT;

use crate::time::TempoContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sample_rate: u32,
    /// Tempo for new songs.
    pub bpm: u32,
    /// Frames rendered per mixer period.
    pub period_frames: usize,
    pub freeze_progress_interval_ms: u64,
    pub samples_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            bpm: 140,
            period_frames: 256,
            freeze_progress_interval_ms: 50,
            samples_root: PathBuf::from(SAMPLES_ROOT),
        }
    }
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stepline").join("config.toml"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(_) => Self::default(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Self {
        toml::from_str(contents).unwrap_or_else(|e| {
            log::warn!("ignoring invalid config: {e}");
            Self::default()
        })
    }

    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };

        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        if let Ok(contents) = toml::to_string_pretty(self) {
            let _ = fs::write(&path, contents);
        }
    }

    pub fn tempo(&self) -> TempoContext {
        TempoContext::new(self.bpm, self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.bpm, 140);
        assert_eq!(config.period_frames, 256);
        assert_eq!(config.freeze_progress_interval_ms, 50);
        assert_eq!(config.samples_root, PathBuf::from("samples"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml_str("bpm = 90\nsamples_root = \"/data/samples\"\n");
        assert_eq!(config.bpm, 90);
        assert_eq!(config.samples_root, PathBuf::from("/data/samples"));
        assert_eq!(config.sample_rate, 44100);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        assert_eq!(Config::from_toml_str("bpm = \"fast\""), Config::default());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config {
            sample_rate: 48000,
            period_frames: 512,
            ..Config::default()
        };
        let text = toml::to_string_pretty(&config).expect("serialize");
        assert_eq!(Config::from_toml_str(&text), config);
    }

    #[test]
    fn test_tempo() {
        let tempo = Config::default().tempo();
        assert_eq!(tempo, TempoContext::new(140, 44100));
    }
}
