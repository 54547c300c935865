use std::path::{Path, PathBuf};

use crate::error::{PostframeError, Result};

/// Derived filesystem layout for one pipeline run.
///
/// All paths share the working-directory prefix `<base>/<stem>/`, keyed by
/// the source filename without extension, so concurrent runs for different
/// sources never collide on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathBundle {
    /// Per-source working directory
    pub work_dir: PathBuf,
    /// Downloaded source video
    pub source_video: PathBuf,
    /// Audio track extracted from the source
    pub audio: PathBuf,
    /// printf-style pattern for extracted frames
    pub frame_pattern: PathBuf,
    /// Directory of composited frames
    pub canvassed_dir: PathBuf,
    /// printf-style pattern for composited frames
    pub canvassed_pattern: PathBuf,
    /// Video reassembled from composited frames, no audio
    pub recompiled_video: PathBuf,
    /// Final output with the original audio muxed back in
    pub final_video: PathBuf,
}

impl PathBundle {
    /// Derive the full bundle from a base directory and a source URL.
    ///
    /// Pure and idempotent: the same URL always yields the same bundle.
    pub fn derive<P: AsRef<Path>>(base_dir: P, source_url: &str) -> Result<Self> {
        let filename = source_filename(source_url)?;
        let stem = filename
            .rsplit_once('.')
            .map(|(stem, _ext)| stem)
            .unwrap_or(&filename);

        let work_dir = base_dir.as_ref().join(stem);
        let canvassed_dir = work_dir.join("canvassed");

        Ok(Self {
            source_video: work_dir.join(&filename),
            audio: work_dir.join(format!("{}.aac", stem)),
            frame_pattern: work_dir.join(format!("{}_%03d.png", stem)),
            canvassed_pattern: canvassed_dir.join(format!("{}_%03d.png", stem)),
            recompiled_video: work_dir.join(format!("recompiled-{}", filename)),
            final_video: work_dir.join(format!("recombined-av-{}", filename)),
            work_dir,
            canvassed_dir,
        })
    }

    /// Paths for one split segment, siblings of the source inside the bundle.
    pub fn segment(&self, index: usize) -> SegmentPaths {
        let stem = format!("segment_{:03}", index);
        SegmentPaths {
            video: self.work_dir.join(format!("{}.mp4", stem)),
            frame_pattern: self.work_dir.join(format!("{}_%03d.png", stem)),
            canvassed_pattern: self.canvassed_dir.join(format!("{}_%03d.png", stem)),
            recompiled: self.canvassed_dir.join(format!("{}-recompiled.mp4", stem)),
        }
    }

    /// Pattern the splitter writes segment files to.
    pub fn segment_split_pattern(&self) -> PathBuf {
        self.work_dir.join("segment_%03d.mp4")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPaths {
    pub video: PathBuf,
    pub frame_pattern: PathBuf,
    pub canvassed_pattern: PathBuf,
    pub recompiled: PathBuf,
}

/// Last path segment of the URL with any query string stripped.
fn source_filename(source_url: &str) -> Result<String> {
    let without_query = source_url
        .split_once('?')
        .map(|(head, _)| head)
        .unwrap_or(source_url);

    // Skip past the scheme so a bare host never passes as a filename
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);

    let filename = after_scheme
        .rsplit_once('/')
        .map(|(_, tail)| tail)
        .ok_or_else(|| PostframeError::InvalidUrl(source_url.to_string()))?;

    if filename.is_empty()
        || !filename.contains('.')
        || filename.contains(char::is_whitespace)
    {
        return Err(PostframeError::InvalidUrl(source_url.to_string()));
    }

    Ok(filename.to_string())
}

/// Expand a printf-style `%03d` pattern into a concrete frame path.
pub fn frame_path(pattern: &Path, index: usize) -> PathBuf {
    let rendered = pattern
        .to_string_lossy()
        .replace("%03d", &format!("{:03}", index));
    PathBuf::from(rendered)
}
