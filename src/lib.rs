//! Postframe - Social-post rendering pipeline
//!
//! A Rust implementation of a media pipeline that renders social-media posts
//! as composited still images or annotated videos using ffmpeg.

pub mod cli;
pub mod cleanup;
pub mod compose;
pub mod config;
pub mod delivery;
pub mod download;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod media;
pub mod paths;
pub mod pipeline;
pub mod post;
