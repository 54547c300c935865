use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::sync::{OwnedMutexGuard, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::cleanup;
use crate::compose::{self, FrameCompositor};
use crate::config::Config;
use crate::download;
use crate::error::{PostframeError, Result};
use crate::layout;
use crate::manifest::{RenderManifest, Stage};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::paths::PathBundle;
use crate::post::Post;

/// Serializes pipeline runs that target the same working directory, so two
/// concurrent requests for one source URL never race on the same files.
#[derive(Default)]
struct WorkdirLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl WorkdirLocks {
    async fn acquire(&self, work_dir: &PathBuf) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| {
                PostframeError::Pipeline("workdir lock registry poisoned".to_string())
            })?;
            locks
                .entry(work_dir.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        Ok(lock.lock_owned().await)
    }
}

#[derive(Debug)]
pub struct RenderOutcome {
    pub bundle: PathBundle,
    pub final_video: PathBuf,
    pub manifest: RenderManifest,
    pub duration_secs: f64,
}

pub struct Pipeline {
    config: Config,
    media: Arc<dyn MediaProcessorTrait>,
    client: reqwest::Client,
    workdir_locks: WorkdirLocks,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let media: Arc<dyn MediaProcessorTrait> =
            Arc::from(MediaProcessorFactory::create_processor(config.media.clone()));

        // Fail fast if the transcoder binaries are missing
        media.check_availability()?;

        Ok(Self {
            config,
            media,
            client: reqwest::Client::new(),
            workdir_locks: WorkdirLocks::default(),
        })
    }

    /// Construct with an externally supplied processor, skipping the
    /// availability check. Used by tests and embedders.
    pub fn with_processor(config: Config, media: Arc<dyn MediaProcessorTrait>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            media,
            client: reqwest::Client::new(),
            workdir_locks: WorkdirLocks::default(),
        })
    }

    /// Full video render: download the post's video, process it, and verify
    /// the final output. Intermediates are left in place for the caller to
    /// clean after delivery.
    pub async fn render_video(&self, post: &Post) -> Result<RenderOutcome> {
        let video = post
            .video_media()
            .ok_or_else(|| PostframeError::Pipeline("post has no video attachment".to_string()))?;

        let bundle = PathBundle::derive(&self.config.storage.base_dir, &video.url)?;
        let _guard = self.workdir_locks.acquire(&bundle.work_dir).await?;

        let mut manifest = RenderManifest::new(&video.url);
        let result = self.run_download(post, &bundle, &mut manifest).await;
        self.finish(result, bundle, manifest).await
    }

    /// Process a source video that is already on disk at the bundle's
    /// source path. Skips the download stage.
    pub async fn render_downloaded(&self, post: &Post, bundle: &PathBundle) -> Result<RenderOutcome> {
        let video = post
            .video_media()
            .ok_or_else(|| PostframeError::Pipeline("post has no video attachment".to_string()))?;

        let _guard = self.workdir_locks.acquire(&bundle.work_dir).await?;

        let mut manifest = RenderManifest::new(&video.url);
        manifest.advance(Stage::ProbingDuration);
        let result = self.run_from_probe(post, bundle, &mut manifest).await;
        self.finish(result, bundle.clone(), manifest).await
    }

    /// Render the still-image variant of a photo post. Returns the path of
    /// the composited PNG.
    pub async fn render_still(&self, post: &Post) -> Result<PathBuf> {
        let photos = post.photo_media();
        let first = photos
            .first()
            .ok_or_else(|| PostframeError::Pipeline("post has no photo attachment".to_string()))?;

        let bundle = PathBundle::derive(&self.config.storage.base_dir, &first.url)?;
        let _guard = self.workdir_locks.acquire(&bundle.work_dir).await?;
        fs::create_dir_all(&bundle.work_dir).await?;

        let layout = layout::layout_post(&post.text, &photos);
        let avatar = self.fetch_avatar(post, &bundle).await;

        let mut images = Vec::with_capacity(photos.len());
        for (index, photo) in photos.iter().enumerate() {
            let dest = bundle.work_dir.join(format!("photo_{:02}.img", index));
            download::download_file(&self.client, &photo.url, &dest).await?;
            images.push(open_image(&dest)?);
        }

        let plain = bundle.work_dir.join("post-plain.png");
        let output = bundle.work_dir.join("post.png");
        let canvas = compose::compose_still(&layout, &avatar, &images);
        canvas
            .save(&plain)
            .map_err(PostframeError::Image)?;

        // Text goes on through the same drawtext path the video uses
        let filter = compose::drawtext_filter(post, &layout);
        self.media.annotate_image(&plain, &output, filter).await?;

        if !output.exists() {
            return Err(PostframeError::MissingOutput { path: output });
        }
        Ok(output)
    }

    async fn run_download(
        &self,
        post: &Post,
        bundle: &PathBundle,
        manifest: &mut RenderManifest,
    ) -> Result<RenderOutcome> {
        let video = post
            .video_media()
            .ok_or_else(|| PostframeError::Pipeline("post has no video attachment".to_string()))?;

        download::download_file(&self.client, &video.url, &bundle.source_video).await?;
        manifest.advance(Stage::ProbingDuration);

        self.run_from_probe(post, bundle, manifest).await
    }

    async fn run_from_probe(
        &self,
        post: &Post,
        bundle: &PathBundle,
        manifest: &mut RenderManifest,
    ) -> Result<RenderOutcome> {
        let video = post
            .video_media()
            .ok_or_else(|| PostframeError::Pipeline("post has no video attachment".to_string()))?;

        let duration_secs = download::enforce_duration_ceiling(
            self.media.as_ref(),
            &bundle.source_video,
            self.config.pipeline.max_duration_secs,
        )
        .await?;

        fs::create_dir_all(&bundle.canvassed_dir).await?;
        self.media
            .extract_audio(&bundle.source_video, &bundle.audio)
            .await?;

        manifest.advance(Stage::Splitting);
        self.media
            .split_segments(
                &bundle.source_video,
                &bundle.segment_split_pattern(),
                self.config.pipeline.segment_secs,
            )
            .await?;
        let segment_count = count_segments(bundle).await?;
        if segment_count == 0 {
            return Err(PostframeError::Pipeline(
                "splitter produced no segments".to_string(),
            ));
        }

        manifest.advance(Stage::ProcessingSegments);
        let layout = layout::layout_post(&post.text, &[video]);
        let avatar = self.fetch_avatar(post, bundle).await;
        let compositor = Arc::new(FrameCompositor::new(&layout, &avatar)?);

        let recompiled_segments = self
            .process_segments(bundle, segment_count, compositor)
            .await?;

        manifest.advance(Stage::Concatenating);
        let list_file = bundle.canvassed_dir.join("segments.txt");
        write_concat_list(&list_file, &recompiled_segments).await?;
        self.media
            .concat_segments(&list_file, &bundle.recompiled_video)
            .await?;

        manifest.advance(Stage::Muxing);
        let filter = compose::drawtext_filter(post, &layout);
        self.media
            .mux_audio(
                &bundle.recompiled_video,
                &bundle.audio,
                &bundle.final_video,
                Some(filter),
            )
            .await?;

        manifest.advance(Stage::VerifyingOutput);
        for path in [&bundle.recompiled_video, &bundle.final_video] {
            if !path.exists() {
                return Err(PostframeError::MissingOutput {
                    path: path.clone(),
                });
            }
        }

        manifest.advance(Stage::Done);
        info!(
            "Render complete: {} ({:.1}s source)",
            bundle.final_video.display(),
            duration_secs
        );

        Ok(RenderOutcome {
            bundle: bundle.clone(),
            final_video: bundle.final_video.clone(),
            manifest: manifest.clone(),
            duration_secs,
        })
    }

    /// Fan the segments out through extract -> compose -> reassemble, with
    /// the permit pool bounding simultaneous transcoder processes.
    async fn process_segments(
        &self,
        bundle: &PathBundle,
        segment_count: usize,
        compositor: Arc<FrameCompositor>,
    ) -> Result<Vec<PathBuf>> {
        let semaphore = Arc::new(Semaphore::new(self.config.pipeline.max_concurrent_segments));
        let fps = self.config.pipeline.frame_rate;
        let mut tasks: JoinSet<Result<(usize, PathBuf)>> = JoinSet::new();

        for index in 0..segment_count {
            let semaphore = Arc::clone(&semaphore);
            let media = Arc::clone(&self.media);
            let compositor = Arc::clone(&compositor);
            let seg = bundle.segment(index);
            let work_dir = bundle.work_dir.clone();
            let canvassed_dir = bundle.canvassed_dir.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|_| {
                    PostframeError::Pipeline("segment permit pool closed".to_string())
                })?;

                media
                    .extract_frames(&seg.video, &seg.frame_pattern, fps)
                    .await?;

                let frames =
                    segment_frames(&work_dir, &canvassed_dir, index).await?;
                if frames.is_empty() {
                    return Err(PostframeError::Pipeline(format!(
                        "no frames extracted for segment {}",
                        index
                    )));
                }

                let compose_batch = frames.clone();
                let compositor_task = Arc::clone(&compositor);
                tokio::task::spawn_blocking(move || compositor_task.compose_all(&compose_batch))
                    .await
                    .map_err(|e| PostframeError::Pipeline(format!("compose task failed: {}", e)))??;

                media
                    .frames_to_video(&seg.canvassed_pattern, &seg.recompiled, fps)
                    .await?;

                Ok((index, seg.recompiled))
            });
        }

        let mut recompiled = vec![PathBuf::new(); segment_count];
        while let Some(joined) = tasks.join_next().await {
            let (index, path) = joined
                .map_err(|e| PostframeError::Pipeline(format!("segment task panicked: {}", e)))??;
            recompiled[index] = path;
        }
        Ok(recompiled)
    }

    /// Avatar fetch is best-effort: a failed download falls back to a flat
    /// placeholder rather than failing the whole render.
    async fn fetch_avatar(&self, post: &Post, bundle: &PathBundle) -> image::DynamicImage {
        let dest = bundle.work_dir.join("avatar.img");
        match download::download_file(&self.client, &post.avatar_url, &dest).await {
            Ok(()) => match open_image(&dest) {
                Ok(avatar) => avatar,
                Err(e) => {
                    warn!("Unreadable avatar for @{}: {}", post.handle, e);
                    placeholder_avatar()
                }
            },
            Err(e) => {
                warn!("Avatar download failed for @{}: {}", post.handle, e);
                placeholder_avatar()
            }
        }
    }

    async fn finish(
        &self,
        result: Result<RenderOutcome>,
        bundle: PathBundle,
        manifest: RenderManifest,
    ) -> Result<RenderOutcome> {
        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let mut manifest = manifest;
                manifest.fail(e.to_string());
                warn!(
                    "Render failed for {}: {:?}",
                    manifest.source_url, manifest.status
                );

                if let Err(cleanup_err) = cleanup::clean_bundle(&bundle).await {
                    warn!(
                        "Cleanup after failure left artifacts in {}: {}",
                        bundle.work_dir.display(),
                        cleanup_err
                    );
                }
                Err(e)
            }
        }
    }
}

/// Decode by sniffing content; CDN URLs rarely carry a usable extension.
fn open_image(path: &std::path::Path) -> Result<image::DynamicImage> {
    let reader = image::ImageReader::open(path)?.with_guessed_format()?;
    Ok(reader.decode()?)
}

fn placeholder_avatar() -> image::DynamicImage {
    image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        layout::AVATAR_SIZE,
        layout::AVATAR_SIZE,
        image::Rgba([101, 119, 134, 255]),
    ))
}

/// Count the segment files the splitter wrote into the working directory.
async fn count_segments(bundle: &PathBundle) -> Result<usize> {
    let mut count = 0;
    let mut entries = fs::read_dir(&bundle.work_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("segment_") && name.ends_with(".mp4") {
            count += 1;
        }
    }
    Ok(count)
}

/// Pair each extracted frame of one segment with its canvassed output path,
/// sorted by sequence number.
async fn segment_frames(
    work_dir: &PathBuf,
    canvassed_dir: &PathBuf,
    index: usize,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let prefix = format!("segment_{:03}_", index);
    let mut frames = Vec::new();

    let mut entries = fs::read_dir(work_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy().into_owned();
        if name.starts_with(&prefix) && name.ends_with(".png") {
            frames.push((entry.path(), canvassed_dir.join(&name)));
        }
    }

    frames.sort();
    Ok(frames)
}

/// Write a concat-demuxer list file referencing the recompiled segments.
async fn write_concat_list(list_file: &PathBuf, segments: &[PathBuf]) -> Result<()> {
    let mut content = String::new();
    for segment in segments {
        let absolute = fs::canonicalize(segment).await?;
        content.push_str(&format!("file '{}'\n", absolute.display()));
    }
    fs::write(list_file, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaProcessorTrait;
    use crate::paths::frame_path;
    use crate::post::{MediaItem, MediaKind};
    use chrono::TimeZone;
    use image::{Rgba, RgbaImage};

    fn test_config(base_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.base_dir = base_dir.to_path_buf();
        config.pipeline.max_concurrent_segments = 2;
        config
    }

    fn video_post() -> Post {
        Post {
            author: "Example Author".to_string(),
            handle: "example".to_string(),
            // Unroutable address so the avatar fetch falls back instantly
            avatar_url: "http://127.0.0.1:1/avatar.png".to_string(),
            text: "pipeline fixture".to_string(),
            created_at: chrono::Utc.with_ymd_and_hms(2023, 4, 5, 18, 30, 0).unwrap(),
            media: vec![MediaItem {
                url: "https://video.example.com/vDn0W9g9SgNGVEcD.mp4".to_string(),
                width: 1280,
                height: 720,
                kind: MediaKind::Video,
            }],
        }
    }

    fn write_png(path: &std::path::Path) {
        RgbaImage::from_pixel(64, 36, Rgba([200, 30, 30, 255]))
            .save(path)
            .unwrap();
    }

    fn stub_file(path: &std::path::Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"stub").unwrap();
    }

    /// Mock that mimics ffmpeg's on-disk effects: each operation writes the
    /// files the next stage expects.
    fn scripted_media(
        segment_count: usize,
        frames_per_segment: usize,
        mux_writes_output: bool,
    ) -> MockMediaProcessorTrait {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_duration().returning(|_| Ok(30.0));
        media
            .expect_extract_audio()
            .returning(|_, output| {
                stub_file(output);
                Ok(())
            });
        media.expect_split_segments().returning(move |_, pattern, _| {
            for index in 0..segment_count {
                stub_file(&frame_path(pattern, index));
            }
            Ok(())
        });
        media
            .expect_extract_frames()
            .returning(move |_, pattern, _| {
                for frame in 1..=frames_per_segment {
                    let path = frame_path(pattern, frame);
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent).unwrap();
                    }
                    write_png(&path);
                }
                Ok(())
            });
        media
            .expect_frames_to_video()
            .returning(|_, output, _| {
                stub_file(output);
                Ok(())
            });
        media.expect_concat_segments().returning(|list, output| {
            assert!(list.exists());
            stub_file(output);
            Ok(())
        });
        media
            .expect_mux_audio()
            .returning(move |_, _, output, filter| {
                assert!(filter.is_some());
                if mux_writes_output {
                    stub_file(output);
                }
                Ok(())
            });
        media
    }

    #[tokio::test]
    async fn test_end_to_end_render_with_scripted_transcoder() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let post = video_post();

        let bundle = PathBundle::derive(dir.path(), &post.media[0].url).unwrap();
        std::fs::create_dir_all(&bundle.work_dir).unwrap();
        std::fs::write(&bundle.source_video, b"source").unwrap();

        let media = scripted_media(2, 3, true);
        let pipeline = Pipeline::with_processor(config, Arc::new(media)).unwrap();

        let outcome = pipeline.render_downloaded(&post, &bundle).await.unwrap();

        assert!(bundle.source_video.exists());
        assert!(bundle.recompiled_video.exists());
        assert!(bundle.final_video.exists());
        assert_eq!(outcome.final_video, bundle.final_video);
        assert_eq!(outcome.manifest.status, crate::manifest::RunStatus::Done);
        assert_eq!(outcome.duration_secs, 30.0);

        // Composited frames landed in canvassed/
        let canvassed: Vec<_> = std::fs::read_dir(&bundle.canvassed_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".png"))
            .collect();
        assert_eq!(canvassed.len(), 6);

        // Cleanup after delivery empties the working directories
        cleanup::clean_bundle(&bundle).await.unwrap();
        assert!(!bundle.source_video.exists());
        assert!(!bundle.final_video.exists());
    }

    #[tokio::test]
    async fn test_over_long_source_aborts_before_splitting() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let post = video_post();

        let bundle = PathBundle::derive(dir.path(), &post.media[0].url).unwrap();
        std::fs::create_dir_all(&bundle.work_dir).unwrap();
        std::fs::write(&bundle.source_video, b"source").unwrap();

        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_duration().returning(|_| Ok(90.0));
        media.expect_extract_audio().never();
        media.expect_split_segments().never();

        let pipeline = Pipeline::with_processor(config, Arc::new(media)).unwrap();
        let err = pipeline.render_downloaded(&post, &bundle).await.unwrap_err();
        assert!(matches!(err, PostframeError::SizeExceeded { .. }));
    }

    #[tokio::test]
    async fn test_missing_final_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let post = video_post();

        let bundle = PathBundle::derive(dir.path(), &post.media[0].url).unwrap();
        std::fs::create_dir_all(&bundle.work_dir).unwrap();
        std::fs::write(&bundle.source_video, b"source").unwrap();

        // Mux claims success but writes nothing
        let media = scripted_media(1, 1, false);

        let pipeline = Pipeline::with_processor(config, Arc::new(media)).unwrap();
        let err = pipeline.render_downloaded(&post, &bundle).await.unwrap_err();
        assert!(matches!(err, PostframeError::MissingOutput { .. }));
    }

    #[tokio::test]
    async fn test_post_without_video_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut post = video_post();
        post.media.clear();

        let media = MockMediaProcessorTrait::new();
        let pipeline = Pipeline::with_processor(config, Arc::new(media)).unwrap();
        let err = pipeline.render_video(&post).await.unwrap_err();
        assert!(matches!(err, PostframeError::Pipeline(_)));
    }
}
