use std::path::Path;
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::Result;
use crate::paths::PathBundle;

/// Delete the named files. A failed deletion propagates and aborts the
/// remaining batch.
pub async fn remove_files<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        if path.exists() {
            debug!("Removing {}", path.display());
            fs::remove_file(path).await?;
        }
    }
    Ok(())
}

/// Delete all regular files directly inside the named directories,
/// leaving subdirectories untouched.
pub async fn clear_dirs<P: AsRef<Path>>(dirs: &[P]) -> Result<()> {
    for dir in dirs {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            continue;
        }

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() {
                debug!("Removing {}", entry.path().display());
                fs::remove_file(entry.path()).await?;
            }
        }
    }
    Ok(())
}

/// Clear out the intermediate artifacts of one pipeline run: the source
/// video plus everything inside the working and canvassed directories.
pub async fn clean_bundle(bundle: &PathBundle) -> Result<()> {
    info!("Cleaning working directory {}", bundle.work_dir.display());

    remove_files(&[&bundle.source_video]).await?;
    clear_dirs(&[&bundle.canvassed_dir, &bundle.work_dir]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_remove_files_deletes_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.png");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"y").unwrap();

        remove_files(&[&a, &b]).await.unwrap();
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[tokio::test]
    async fn test_remove_files_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.mp4");
        remove_files(&[&absent]).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_dirs_leaves_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("canvassed");
        std::fs::create_dir(&sub).unwrap();
        let top_file = dir.path().join("frame_001.png");
        let sub_file = sub.join("frame_001.png");
        std::fs::write(&top_file, b"x").unwrap();
        std::fs::write(&sub_file, b"y").unwrap();

        clear_dirs(&[dir.path()]).await.unwrap();

        assert!(!top_file.exists());
        assert!(sub.exists());
        assert!(sub_file.exists());
    }

    #[tokio::test]
    async fn test_clean_bundle_empties_work_and_canvassed() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = PathBundle::derive(dir.path(), "https://v.example.com/clip.mp4").unwrap();

        std::fs::create_dir_all(&bundle.canvassed_dir).unwrap();
        std::fs::write(&bundle.source_video, b"v").unwrap();
        let frame = bundle.work_dir.join("clip_001.png");
        let canvassed = bundle.canvassed_dir.join("clip_001.png");
        std::fs::write(&frame, b"f").unwrap();
        std::fs::write(&canvassed, b"c").unwrap();

        clean_bundle(&bundle).await.unwrap();

        assert!(!bundle.source_video.exists());
        assert!(!frame.exists());
        assert!(!canvassed.exists());
        // Directories themselves survive
        assert!(bundle.work_dir.exists());
        assert!(bundle.canvassed_dir.exists());
    }

    #[tokio::test]
    async fn test_clear_dirs_ignores_missing_dir() {
        let missing = PathBuf::from("/nonexistent/postframe-test");
        clear_dirs(&[&missing]).await.unwrap();
    }
}
