use async_trait::async_trait;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use super::{MediaCommand, MediaCommandBuilder, MediaProcessorTrait};
use crate::config::MediaConfig;
use crate::error::{PostframeError, Result};

/// Concrete media processor backed by ffmpeg and ffprobe binaries.
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }

    fn probe_command<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.config.probe_path, "Duration probe")
            .arg("-v").arg("quiet")
            .arg("-print_format").arg("json")
            .arg("-show_format")
            .arg(path.as_ref().to_string_lossy().to_string())
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        debug!("Probing duration of {}", path.display());

        let stdout = self.probe_command(path).execute_capture().await?;
        let parsed: serde_json::Value = serde_json::from_slice(&stdout)?;

        parsed
            .get("format")
            .and_then(|f| f.get("duration"))
            .and_then(|d| d.as_str())
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| PostframeError::Process {
                description: "Duration probe".to_string(),
                exit_code: None,
                stderr: format!("no duration in probe output for {}", path.display()),
            })
    }

    async fn split_segments(
        &self,
        input: &Path,
        output_pattern: &Path,
        segment_secs: u32,
    ) -> Result<()> {
        info!(
            "Splitting {} into {}s segments",
            input.display(),
            segment_secs
        );

        self.command_builder
            .split_segments(input, output_pattern, segment_secs)
            .execute()
            .await
    }

    async fn extract_frames(&self, input: &Path, output_pattern: &Path, fps: f32) -> Result<()> {
        info!("Extracting frames from {} at {} fps", input.display(), fps);

        self.command_builder
            .extract_frames(input, output_pattern, fps)
            .execute()
            .await
    }

    async fn frames_to_video(&self, input_pattern: &Path, output: &Path, fps: f32) -> Result<()> {
        info!(
            "Reassembling frames {} -> {}",
            input_pattern.display(),
            output.display()
        );

        self.command_builder
            .frames_to_video(input_pattern, output, fps)
            .execute()
            .await
    }

    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<()> {
        info!(
            "Extracting audio from {} to {}",
            input.display(),
            output.display()
        );

        self.command_builder
            .extract_audio(input, output)
            .execute()
            .await
    }

    async fn concat_segments(&self, list_file: &Path, output: &Path) -> Result<()> {
        info!("Concatenating segments into {}", output.display());

        self.command_builder
            .concat_segments(list_file, output)
            .execute()
            .await
    }

    async fn mux_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        video_filter: Option<String>,
    ) -> Result<()> {
        info!(
            "Muxing audio {} into {} -> {}",
            audio.display(),
            video.display(),
            output.display()
        );

        self.command_builder
            .mux_audio(video, audio, output, video_filter, &self.config.encode_options)
            .execute()
            .await
    }

    async fn annotate_image(&self, input: &Path, output: &Path, filter: String) -> Result<()> {
        info!("Annotating {} -> {}", input.display(), output.display());

        self.command_builder
            .annotate_image(input, output, filter)
            .execute()
            .await
    }

    fn check_availability(&self) -> Result<()> {
        for binary in [&self.config.binary_path, &self.config.probe_path] {
            let output = Command::new(binary)
                .arg("-version")
                .output()
                .map_err(|e| PostframeError::Process {
                    description: "Version check".to_string(),
                    exit_code: None,
                    stderr: format!("{} not found: {}", binary, e),
                })?;

            if !output.status.success() {
                return Err(PostframeError::Process {
                    description: "Version check".to_string(),
                    exit_code: output.status.code(),
                    stderr: format!("{} version check failed", binary),
                });
            }
        }

        info!("Transcoder binaries are available");
        Ok(())
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting transcoder version information");

        let stdout = self.command_builder.version_check().execute_capture().await?;
        let version_info = String::from_utf8_lossy(&stdout);
        let first_line = version_info.lines().next().unwrap_or("Unknown version");
        Ok(first_line.to_string())
    }
}
