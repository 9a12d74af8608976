use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::core::model::{ConversionConfig, InputFile, TransformOutput};
use crate::plugins::external::{check_binary, run, stage_input};
use crate::plugins::registry::Transform;

pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";
pub const DEFAULT_AUDIO_FORMAT: &str = "mp3";
pub const DEFAULT_VIDEO_FORMAT: &str = "mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    fn label(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    fn default_format(self) -> &'static str {
        match self {
            Self::Audio => DEFAULT_AUDIO_FORMAT,
            Self::Video => DEFAULT_VIDEO_FORMAT,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    #[error("unsupported {kind} format: {format}")]
    UnsupportedFormat { kind: &'static str, format: String },
}

/// Encoder flags placed between the input and the output file.
pub fn codec_args(kind: MediaKind, format: &str) -> Result<Vec<&'static str>, MediaError> {
    let args: &[&str] = match (kind, format) {
        (MediaKind::Audio, "mp3") => &["-codec:a", "libmp3lame", "-q:a", "2"],
        (MediaKind::Audio, "ogg") => &["-codec:a", "libvorbis", "-q:a", "4"],
        (MediaKind::Audio, "aac") => &["-codec:a", "aac", "-b:a", "192k"],
        (MediaKind::Audio, "flac") => &["-codec:a", "flac"],
        (MediaKind::Audio, "wav") => &["-codec:a", "pcm_s16le"],
        (MediaKind::Video, "gif") => &["-vf", "fps=12,scale=480:-1:flags=lanczos", "-loop", "0"],
        (MediaKind::Video, "webm") => &["-c:v", "libvpx", "-b:v", "1M", "-c:a", "libvorbis"],
        (MediaKind::Video, "mp4" | "mov") => &[
            "-c:v", "libx264", "-preset", "fast", "-crf", "28", "-c:a", "aac", "-movflags", "+faststart",
        ],
        (MediaKind::Video, "mkv" | "avi") => &["-c:v", "libx264", "-preset", "fast", "-crf", "28", "-c:a", "aac"],
        _ => {
            return Err(MediaError::UnsupportedFormat {
                kind: kind.label(),
                format: format.to_string(),
            });
        }
    };
    Ok(args.to_vec())
}

/// Transcodes one file with an external ffmpeg.
pub struct FfmpegTranscode {
    kind: MediaKind,
    bin: String,
}

impl FfmpegTranscode {
    pub fn new(kind: MediaKind, bin: impl Into<String>) -> Self {
        Self { kind, bin: bin.into() }
    }

    fn format(&self, config: &ConversionConfig) -> String {
        config
            .format
            .as_deref()
            .unwrap_or(self.kind.default_format())
            .to_ascii_lowercase()
    }
}

#[async_trait]
impl Transform for FfmpegTranscode {
    fn name(&self) -> &'static str {
        match self.kind {
            MediaKind::Audio => "ffmpeg-audio",
            MediaKind::Video => "ffmpeg-video",
        }
    }

    async fn prepare(&self, config: &ConversionConfig) -> anyhow::Result<()> {
        codec_args(self.kind, &self.format(config))?;
        check_binary(&self.bin, "-version").await?;
        Ok(())
    }

    async fn transform(&self, input: &InputFile, config: &ConversionConfig) -> anyhow::Result<TransformOutput> {
        let format = self.format(config);
        let codec = codec_args(self.kind, &format)?;

        let in_ext = Path::new(&input.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string());

        let dir = tempfile::tempdir().context("create temp dir")?;
        let in_path = stage_input(dir.path(), &format!("input.{in_ext}"), &input.data).await?;
        let out_path = dir.path().join(format!("output.{format}"));

        let mut cmd = Command::new(&self.bin);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(&in_path)
            .args(&codec)
            .arg(&out_path);
        debug!(file = %input.name, format = %format, "ffmpeg transcode");
        run(&self.bin, cmd).await?;

        let data = tokio::fs::read(&out_path)
            .await
            .with_context(|| format!("read {}", out_path.display()))?;
        Ok(TransformOutput::Single { data: data.into(), ext: format })
    }
}
