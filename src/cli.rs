use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a post's video with the full pipeline
    Render {
        /// Post metadata JSON file
        #[arg(short, long)]
        post: PathBuf,
    },

    /// Render the still-image variant of a photo post
    Still {
        /// Post metadata JSON file
        #[arg(short, long)]
        post: PathBuf,
    },

    /// Download a source video, enforcing the duration ceiling
    Download {
        /// Source video URL
        #[arg(short, long)]
        url: String,
    },

    /// Split a local video into fixed-length segments
    Split {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Segment length in seconds (defaults to the configured value)
        #[arg(short, long)]
        segment_secs: Option<u32>,
    },

    /// Sample frames from a local video into numbered PNGs
    ExtractFrames {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Sampling rate in frames per second
        #[arg(short, long)]
        fps: Option<f32>,
    },

    /// Reassemble numbered frames into a video and mux an audio track in
    Recombine {
        /// printf-style frame pattern, e.g. work/clip_%03d.png
        #[arg(long)]
        frames: PathBuf,

        /// Audio track to mux back in
        #[arg(short, long)]
        audio: PathBuf,

        /// Final output video
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Remove the intermediate artifacts for a source URL
    Clean {
        /// Source video URL the working directory was derived from
        #[arg(short, long)]
        url: String,
    },
}
