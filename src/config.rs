use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PostframeError, Result};

fn default_max_concurrent_segments() -> usize {
    4
}

fn default_frame_rate() -> f32 {
    5.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub media: MediaConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
    /// Additional encoding options applied to the final mux
    /// Common options: ["-preset", "medium", "-crf", "23"]
    pub encode_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum source video duration in seconds; longer inputs are rejected
    pub max_duration_secs: f64,
    /// Segment length in seconds for the splitter
    pub segment_secs: u32,
    /// Frame sampling rate for extraction and reassembly
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
    /// Cap on simultaneously processed segments (bounds ffmpeg fan-out)
    #[serde(default = "default_max_concurrent_segments")]
    pub max_concurrent_segments: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for per-source working directories
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Maximum attachment size in bytes; larger outputs get a text notice
    pub max_upload_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                probe_path: "ffprobe".to_string(),
                encode_options: vec![
                    // Example encoding options users can customize:
                    // "-preset".to_string(), "medium".to_string(),
                    // "-crf".to_string(), "23".to_string(),
                ],
            },
            pipeline: PipelineConfig {
                max_duration_secs: 60.0,
                segment_secs: 10,
                frame_rate: 5.0,
                max_concurrent_segments: 4,
            },
            storage: StorageConfig {
                base_dir: PathBuf::from("ffmpeg"),
            },
            delivery: DeliveryConfig {
                // Discord's default attachment ceiling
                max_upload_bytes: 8 * 1024 * 1024,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PostframeError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| PostframeError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PostframeError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| PostframeError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_duration_secs <= 0.0 {
            return Err(PostframeError::Config(
                "max_duration_secs must be positive".to_string(),
            ));
        }
        if self.pipeline.segment_secs == 0 {
            return Err(PostframeError::Config(
                "segment_secs must be at least 1".to_string(),
            ));
        }
        if self.pipeline.frame_rate <= 0.0 {
            return Err(PostframeError::Config(
                "frame_rate must be positive".to_string(),
            ));
        }
        if self.pipeline.max_concurrent_segments == 0 {
            return Err(PostframeError::Config(
                "max_concurrent_segments must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.max_duration_secs, 60.0);
        assert_eq!(config.pipeline.segment_secs, 10);
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::default();
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.media.binary_path, config.media.binary_path);
        assert_eq!(
            loaded.pipeline.max_concurrent_segments,
            config.pipeline.max_concurrent_segments
        );
    }

    #[test]
    fn test_validate_rejects_zero_segment_length() {
        let mut config = Config::default();
        config.pipeline.segment_secs = 0;
        assert!(config.validate().is_err());
    }
}
