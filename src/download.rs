use futures_util::StreamExt;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{PostframeError, Result};
use crate::media::MediaProcessorTrait;

/// Stream a remote file to disk without buffering the whole body in memory.
/// Creates the destination's parent directory if absent.
pub async fn download_file<P: AsRef<Path>>(
    client: &reqwest::Client,
    url: &str,
    dest: P,
) -> Result<()> {
    let dest = dest.as_ref();
    info!("Downloading {} -> {}", url, dest.display());

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    let response = client.get(url).send().await?.error_for_status()?;
    let mut stream = response.bytes_stream();

    let mut file = fs::File::create(dest).await?;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    debug!("Download complete: {}", dest.display());
    Ok(())
}

/// Download a source video and enforce the duration ceiling.
///
/// The ceiling bounds processing cost; longer inputs return `SizeExceeded`
/// and the caller abandons the video path entirely. Returns the probed
/// duration on success.
pub async fn download_video<P: AsRef<Path>>(
    client: &reqwest::Client,
    media: &dyn MediaProcessorTrait,
    url: &str,
    dest: P,
    max_duration_secs: f64,
) -> Result<f64> {
    let dest = dest.as_ref();
    download_file(client, url, dest).await?;

    let duration = enforce_duration_ceiling(media, dest, max_duration_secs).await?;
    info!("Downloaded {} ({:.1}s)", dest.display(), duration);
    Ok(duration)
}

/// Verify the written file exists and probe its duration against the ceiling.
pub async fn enforce_duration_ceiling(
    media: &dyn MediaProcessorTrait,
    path: &Path,
    max_duration_secs: f64,
) -> Result<f64> {
    if !path.exists() {
        return Err(PostframeError::MissingOutput {
            path: path.to_path_buf(),
        });
    }

    let duration = media.probe_duration(path).await?;
    if duration > max_duration_secs {
        return Err(PostframeError::SizeExceeded {
            path: path.to_path_buf(),
            duration,
            limit: max_duration_secs,
        });
    }

    Ok(duration)
}
