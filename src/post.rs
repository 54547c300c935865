use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::error::Result;

/// Upstream-supplied post record, consumed read-only to drive layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Display name of the author
    pub author: String,
    /// Handle without the leading @
    pub handle: String,
    /// Avatar image URL
    pub avatar_url: String,
    /// Body text of the post
    pub text: String,
    /// Publication timestamp
    pub created_at: DateTime<Utc>,
    /// Attached media, in display order
    #[serde(default)]
    pub media: Vec<MediaItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Photo,
    Video,
    Gif,
}

impl Post {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// First video attachment, if any. A post carries at most one video.
    pub fn video_media(&self) -> Option<&MediaItem> {
        self.media.iter().find(|m| m.kind == MediaKind::Video)
    }

    pub fn photo_media(&self) -> Vec<&MediaItem> {
        self.media
            .iter()
            .filter(|m| m.kind == MediaKind::Photo || m.kind == MediaKind::Gif)
            .collect()
    }

    /// Timestamp formatted the way the rendered footer shows it.
    pub fn display_date(&self) -> String {
        self.created_at.format("%-I:%M %p · %b %-d, %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_post() -> Post {
        Post {
            author: "Example Author".to_string(),
            handle: "example".to_string(),
            avatar_url: "https://cdn.example.com/avatar.jpg".to_string(),
            text: "hello world".to_string(),
            created_at: Utc.with_ymd_and_hms(2023, 4, 5, 18, 30, 0).unwrap(),
            media: vec![
                MediaItem {
                    url: "https://video.example.com/vDn0W9g9SgNGVEcD.mp4".to_string(),
                    width: 1280,
                    height: 720,
                    kind: MediaKind::Video,
                },
                MediaItem {
                    url: "https://pbs.example.com/a.jpg".to_string(),
                    width: 800,
                    height: 600,
                    kind: MediaKind::Photo,
                },
            ],
        }
    }

    #[test]
    fn test_video_media_picks_video_attachment() {
        let post = sample_post();
        let video = post.video_media().unwrap();
        assert!(video.url.ends_with(".mp4"));
        assert_eq!(post.photo_media().len(), 1);
    }

    #[test]
    fn test_display_date_format() {
        let post = sample_post();
        assert_eq!(post.display_date(), "6:30 PM · Apr 5, 2023");
    }

    #[test]
    fn test_deserializes_without_media() {
        let json = r#"{
            "author": "A",
            "handle": "a",
            "avatar_url": "https://cdn.example.com/a.png",
            "text": "no attachments",
            "created_at": "2023-04-05T18:30:00Z"
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert!(post.media.is_empty());
        assert!(post.video_media().is_none());
    }
}
