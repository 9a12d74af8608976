use crate::plugins::media::ffmpeg::{DEFAULT_AUDIO_FORMAT, DEFAULT_FFMPEG_BIN, DEFAULT_VIDEO_FORMAT};
use crate::plugins::registry::{CliPlugin, ToolCliConfig};
use clap::{Arg, ArgMatches, Command};

const MIB: u64 = 1024 * 1024;

pub struct MediaCliPlugin;

impl MediaCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CliPlugin for MediaCliPlugin {
    fn handles(&self, tool: &str) -> bool {
        matches!(tool, "audio" | "video")
    }

    fn augment_tool_command(&self, tool: &str, cmd: Command) -> Command {
        let (default_format, formats) = if tool == "video" {
            (DEFAULT_VIDEO_FORMAT, "Target format: mp4, webm, mov, mkv, avi, gif")
        } else {
            (DEFAULT_AUDIO_FORMAT, "Target format: mp3, wav, ogg, aac, flac")
        };

        let cmd = cmd
            .arg(
                Arg::new("media_format")
                    .long("format")
                    .help_heading("MEDIA")
                    .help(formats)
                    .default_value(default_format)
                    .num_args(1),
            )
            .arg(
                Arg::new("ffmpeg_bin")
                    .long("ffmpeg-bin")
                    .help_heading("MEDIA")
                    .help("Path to the ffmpeg binary")
                    .default_value(DEFAULT_FFMPEG_BIN)
                    .num_args(1),
            );

        if tool != "video" {
            return cmd;
        }

        cmd.arg(
            Arg::new("max_video_mb")
                .long("max-video-mb")
                .help_heading("MEDIA")
                .help("Reject videos larger than this many MiB")
                .default_value("500")
                .num_args(1),
        )
    }

    fn apply_tool_matches(&self, tool: &str, matches: &ArgMatches, cfg: &mut ToolCliConfig) -> anyhow::Result<()> {
        if let Some(f) = matches.get_one::<String>("media_format") {
            cfg.config.format = Some(f.to_ascii_lowercase());
        }
        if let Some(b) = matches.get_one::<String>("ffmpeg_bin") {
            cfg.options.insert("ffmpeg_bin".to_string(), b.clone());
        }
        if tool == "video" {
            if let Some(s) = matches.get_one::<String>("max_video_mb") {
                let mb: u64 = s.parse()?;
                cfg.limits.max_video_bytes = mb.saturating_mul(MIB);
            }
        }
        Ok(())
    }
}
