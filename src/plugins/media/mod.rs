pub mod cli;
pub mod ffmpeg;

use crate::core::accept::AcceptPolicy;
use crate::plugins::registry::{Tool, ToolCliConfig, ToolOp};
use ffmpeg::{FfmpegTranscode, MediaKind, DEFAULT_FFMPEG_BIN};
use std::sync::Arc;

const AUDIO_EXTENSIONS: [&str; 8] = ["mp3", "wav", "ogg", "aac", "flac", "m4a", "opus", "wma"];

fn ffmpeg_bin(cfg: &ToolCliConfig) -> String {
    cfg.options
        .get("ffmpeg_bin")
        .cloned()
        .unwrap_or_else(|| DEFAULT_FFMPEG_BIN.to_string())
}

pub struct AudioTool;

impl Tool for AudioTool {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn about(&self) -> &'static str {
        "Transcode audio to MP3, WAV, OGG, AAC or FLAC (needs ffmpeg)"
    }

    fn accept(&self, _cfg: &ToolCliConfig) -> AcceptPolicy {
        AcceptPolicy::new("Upload audio: MP3, WAV, OGG, AAC, FLAC, M4A")
            .mime_prefix("audio/")
            .extensions(&AUDIO_EXTENSIONS)
    }

    fn operation(&self, cfg: &ToolCliConfig) -> ToolOp {
        ToolOp::Each(Arc::new(FfmpegTranscode::new(MediaKind::Audio, ffmpeg_bin(cfg))))
    }
}

pub struct VideoTool;

impl Tool for VideoTool {
    fn name(&self) -> &'static str {
        "video"
    }

    fn about(&self) -> &'static str {
        "Transcode video to MP4, WebM, MOV, MKV, AVI or GIF (needs ffmpeg)"
    }

    fn accept(&self, cfg: &ToolCliConfig) -> AcceptPolicy {
        AcceptPolicy::new("Upload a video file (MP4, AVI, MOV, MKV, WebM)")
            .mime_prefix("video/")
            .max_bytes(cfg.limits.max_video_bytes)
    }

    fn operation(&self, cfg: &ToolCliConfig) -> ToolOp {
        ToolOp::Each(Arc::new(FfmpegTranscode::new(MediaKind::Video, ffmpeg_bin(cfg))))
    }
}
