// Modular media processing architecture
//
// This module provides an abstraction over the external transcoder:
// - Commands: command builders for the pipeline's ffmpeg invocations
// - Processor: ffmpeg/ffprobe-backed implementation

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Main trait for the external transcoder operations the pipeline needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Duration of a media file in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Cut a video into fixed-length segments, resetting timestamps
    async fn split_segments(
        &self,
        input: &Path,
        output_pattern: &Path,
        segment_secs: u32,
    ) -> Result<()>;

    /// Sample frames at a fixed rate into numbered PNGs
    async fn extract_frames(&self, input: &Path, output_pattern: &Path, fps: f32) -> Result<()>;

    /// Reassemble numbered frames into a video
    async fn frames_to_video(&self, input_pattern: &Path, output: &Path, fps: f32) -> Result<()>;

    /// Copy the audio track out of a video
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<()>;

    /// Concatenate videos listed in a concat-demuxer file, stream copy
    async fn concat_segments(&self, list_file: &Path, output: &Path) -> Result<()>;

    /// Mux an audio track back into a video, re-encoding audio to AAC.
    /// When a video filter is given the video stream is re-encoded,
    /// otherwise it is stream-copied.
    async fn mux_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        video_filter: Option<String>,
    ) -> Result<()>;

    /// Apply a filter chain (drawtext overlays) to a single image
    async fn annotate_image(&self, input: &Path, output: &Path, filter: String) -> Result<()>;

    /// Check if the transcoder is available
    fn check_availability(&self) -> Result<()>;

    /// Get transcoder version information
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
