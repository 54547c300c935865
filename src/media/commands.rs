use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{PostframeError, Result};

/// Abstract transcoder command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new transcoder command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy video stream
    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    /// Copy audio stream
    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Disable audio
    pub fn no_audio(self) -> Self {
        self.arg("-an")
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Set input frame rate for image sequences
    pub fn framerate(self, fps: f32) -> Self {
        self.arg("-framerate").arg(fps.to_string())
    }

    /// Set pixel format
    pub fn pixel_format<S: Into<String>>(self, format: S) -> Self {
        self.arg("-pix_fmt").arg(format)
    }

    /// Execute the command
    pub async fn execute(&self) -> Result<()> {
        self.execute_capture().await.map(|_| ())
    }

    /// Execute the command and return its stdout
    pub async fn execute_capture(&self) -> Result<Vec<u8>> {
        debug!("Executing transcoder command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| PostframeError::Process {
                description: self.description.clone(),
                exit_code: None,
                stderr: format!("Failed to execute transcoder: {}", e),
            })?;

        if !output.status.success() {
            return Err(PostframeError::Process {
                description: self.description.clone(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output.stdout)
    }
}

/// Builder for the pipeline's transcoder operations
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Build segment-split command: fixed-length slices, timestamps reset
    /// per segment, streams copied
    pub fn split_segments<P: AsRef<Path>>(
        &self,
        input: P,
        output_pattern: P,
        segment_secs: u32,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Segment split")
            .input(input)
            .arg("-f").arg("segment")
            .arg("-segment_time").arg(segment_secs.to_string())
            .arg("-reset_timestamps").arg("1")
            .copy_video()
            .copy_audio()
            .overwrite()
            .output(output_pattern)
    }

    /// Build frame extraction command: sample at a fixed rate into
    /// numbered image files
    pub fn extract_frames<P: AsRef<Path>>(
        &self,
        input: P,
        output_pattern: P,
        fps: f32,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Frame extraction")
            .input(input)
            .video_filter(format!("fps={}", fps))
            .overwrite()
            .output(output_pattern)
    }

    /// Build frame reassembly command: numbered frames back into a video
    pub fn frames_to_video<P: AsRef<Path>>(
        &self,
        input_pattern: P,
        output: P,
        fps: f32,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Frame reassembly")
            .framerate(fps)
            .input(input_pattern)
            .video_codec("libx264")
            .pixel_format("yuv420p")
            .overwrite()
            .output(output)
    }

    /// Build audio extraction command, stream copy of the source track
    pub fn extract_audio<P: AsRef<Path>>(&self, input: P, output: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .input(input)
            .no_video()
            .copy_audio()
            .overwrite()
            .output(output)
    }

    /// Build concat command over a concat-demuxer list file
    pub fn concat_segments<P: AsRef<Path>>(&self, list_file: P, output: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Segment concatenation")
            .arg("-f").arg("concat")
            .arg("-safe").arg("0")
            .input(list_file)
            .copy_video()
            .copy_audio()
            .overwrite()
            .output(output)
    }

    /// Build audio/video mux command. With a video filter the video stream
    /// is re-encoded; otherwise it is stream-copied. Audio becomes AAC.
    pub fn mux_audio<P: AsRef<Path>>(
        &self,
        video: P,
        audio: P,
        output: P,
        video_filter: Option<String>,
        encode_options: &[String],
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.binary_path, "Audio/video mux")
            .input(video)
            .input(audio);

        cmd = match video_filter {
            Some(filter) => cmd.video_filter(filter).video_codec("libx264"),
            None => cmd.copy_video(),
        };

        for option in encode_options {
            cmd = cmd.arg(option);
        }

        cmd.audio_codec("aac")
            .arg("-map").arg("0:v:0")
            .arg("-map").arg("1:a:0")
            .overwrite()
            .output(output)
    }

    /// Build single-image annotation command
    pub fn annotate_image<P: AsRef<Path>>(
        &self,
        input: P,
        output: P,
        filter: String,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Image annotation")
            .input(input)
            .video_filter(filter)
            .arg("-frames:v").arg("1")
            .overwrite()
            .output(output)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}
