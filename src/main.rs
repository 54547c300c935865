//! Postframe - Social-post rendering pipeline
//!
//! This is the main entry point for the postframe tool, which renders
//! social-media posts as composited still images or annotated videos
//! using ffmpeg.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use postframe::cleanup;
use postframe::cli::{Args, Commands};
use postframe::config::Config;
use postframe::delivery::{self, Delivery};
use postframe::download;
use postframe::error::PostframeError;
use postframe::media::MediaProcessorFactory;
use postframe::paths::PathBundle;
use postframe::pipeline::Pipeline;
use postframe::post::Post;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    config.validate()?;

    match args.command {
        Commands::Render { post } => {
            info!("Rendering post video: {}", post.display());

            let post = Post::from_file(&post).await?;
            let pipeline = Pipeline::new(config.clone())?;
            let outcome = pipeline.render_video(&post).await?;

            match delivery::gate_attachment(
                &outcome.final_video,
                config.delivery.max_upload_bytes,
            )
            .await?
            {
                Delivery::Attachment(path) => {
                    println!("Rendered video: {}", path.display());
                }
                Delivery::TooLarge { path, size_bytes } => {
                    println!(
                        "Rendered video at {} is {} bytes, over the {} byte upload ceiling",
                        path.display(),
                        size_bytes,
                        config.delivery.max_upload_bytes
                    );
                }
            }
        }
        Commands::Still { post } => {
            info!("Rendering still post: {}", post.display());

            let post = Post::from_file(&post).await?;
            let pipeline = Pipeline::new(config)?;
            let output = pipeline.render_still(&post).await?;
            println!("Rendered image: {}", output.display());
        }
        Commands::Download { url } => {
            info!("Downloading source video: {}", url);

            let media = MediaProcessorFactory::create_processor(config.media.clone());
            let bundle = PathBundle::derive(&config.storage.base_dir, &url)?;
            let client = reqwest::Client::new();
            let duration = download::download_video(
                &client,
                media.as_ref(),
                &url,
                &bundle.source_video,
                config.pipeline.max_duration_secs,
            )
            .await?;
            println!(
                "Downloaded {} ({:.1}s)",
                bundle.source_video.display(),
                duration
            );
        }
        Commands::Split { input, segment_secs } => {
            info!("Splitting video: {}", input.display());

            if !input.exists() {
                return Err(PostframeError::FileNotFound(input.display().to_string()).into());
            }

            let media = MediaProcessorFactory::create_processor(config.media.clone());
            let pattern = input.with_file_name("segment_%03d.mp4");
            let secs = segment_secs.unwrap_or(config.pipeline.segment_secs);
            media.split_segments(&input, &pattern, secs).await?;
            println!("Split into {}s segments beside {}", secs, input.display());
        }
        Commands::ExtractFrames { input, fps } => {
            info!("Extracting frames: {}", input.display());

            if !input.exists() {
                return Err(PostframeError::FileNotFound(input.display().to_string()).into());
            }

            let media = MediaProcessorFactory::create_processor(config.media.clone());
            let stem = input
                .file_stem()
                .ok_or_else(|| PostframeError::Config("Invalid video filename".to_string()))?
                .to_string_lossy()
                .into_owned();
            let pattern = input.with_file_name(format!("{}_%03d.png", stem));
            let fps = fps.unwrap_or(config.pipeline.frame_rate);
            media.extract_frames(&input, &pattern, fps).await?;
            println!("Extracted frames at {} fps to {}", fps, pattern.display());
        }
        Commands::Recombine { frames, audio, output } => {
            info!("Recombining frames {} -> {}", frames.display(), output.display());

            let media = MediaProcessorFactory::create_processor(config.media.clone());
            let silent = output.with_file_name(format!(
                "recompiled-{}",
                output
                    .file_name()
                    .ok_or_else(|| PostframeError::Config("Invalid output filename".to_string()))?
                    .to_string_lossy()
            ));

            media
                .frames_to_video(&frames, &silent, config.pipeline.frame_rate)
                .await?;
            media.mux_audio(&silent, &audio, &output, None).await?;

            if !output.exists() {
                return Err(PostframeError::MissingOutput { path: output }.into());
            }
            println!("Recombined video: {}", output.display());
        }
        Commands::Clean { url } => {
            info!("Cleaning working directory for {}", url);

            let bundle = PathBundle::derive(&config.storage.base_dir, &url)?;
            cleanup::clean_bundle(&bundle).await?;
            println!("Cleaned {}", bundle.work_dir.display());
        }
    }

    info!("postframe completed successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let app_dir = std::env::current_dir()?.join(".postframe");
    let log_dir = app_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "postframe.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("postframe.log").display()
    );

    Ok(())
}
