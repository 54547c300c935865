use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

use crate::error::Result;

/// What the calling chat layer should send for a finished render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Attach the file at this path
    Attachment(PathBuf),
    /// File exceeds the upload ceiling; send a notice instead
    TooLarge { path: PathBuf, size_bytes: u64 },
}

/// Gate a finished artifact against the upload size ceiling.
pub async fn gate_attachment<P: AsRef<Path>>(path: P, max_upload_bytes: u64) -> Result<Delivery> {
    let path = path.as_ref();
    let size_bytes = fs::metadata(path).await?.len();

    if size_bytes > max_upload_bytes {
        warn!(
            "{} is {} bytes, over the {} byte upload ceiling",
            path.display(),
            size_bytes,
            max_upload_bytes
        );
        return Ok(Delivery::TooLarge {
            path: path.to_path_buf(),
            size_bytes,
        });
    }

    Ok(Delivery::Attachment(path.to_path_buf()))
}
