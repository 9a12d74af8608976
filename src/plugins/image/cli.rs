use crate::core::model::Quality;
use crate::plugins::image::compress::DEFAULT_COMPRESS_QUALITY;
use crate::plugins::image::convert::{honours_quality, DEFAULT_CONVERT_FORMAT, DEFAULT_CONVERT_QUALITY};
use crate::plugins::registry::{CliPlugin, ToolCliConfig};
use clap::parser::ValueSource;
use clap::{Arg, ArgMatches, Command};
use tracing::warn;

pub struct ImageCliPlugin;

impl ImageCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CliPlugin for ImageCliPlugin {
    fn handles(&self, tool: &str) -> bool {
        matches!(tool, "image-convert" | "image-compress")
    }

    fn augment_tool_command(&self, tool: &str, cmd: Command) -> Command {
        let (default_quality, quality_help) = if tool == "image-compress" {
            (DEFAULT_COMPRESS_QUALITY, "JPEG quality, 1-100 (PNG inputs stay lossless PNG)")
        } else {
            (DEFAULT_CONVERT_QUALITY, "JPEG quality, 1-100; other formats are written losslessly")
        };

        let cmd = cmd.arg(
            Arg::new("image_quality")
                .long("quality")
                .help_heading("IMAGE")
                .help(quality_help)
                .default_value(default_quality.to_string())
                .num_args(1),
        );

        if tool != "image-convert" {
            return cmd;
        }

        cmd.arg(
            Arg::new("image_format")
                .long("format")
                .help_heading("IMAGE")
                .help("Target format: png, jpeg, webp, gif, bmp, tiff (or a MIME type like image/jpeg); webp is lossless")
                .default_value(DEFAULT_CONVERT_FORMAT)
                .num_args(1),
        )
        .arg(
            Arg::new("image_scale")
                .long("scale")
                .help_heading("IMAGE")
                .help("Resize factor applied before encoding, e.g. 0.5")
                .num_args(1),
        )
    }

    fn apply_tool_matches(&self, tool: &str, matches: &ArgMatches, cfg: &mut ToolCliConfig) -> anyhow::Result<()> {
        if let Some(s) = matches.get_one::<String>("image_quality") {
            let percent: u8 = s
                .parse()
                .map_err(|_| anyhow::anyhow!("--quality must be 1-100, got {}", s))?;
            if !(1..=100).contains(&percent) {
                anyhow::bail!("--quality must be 1-100, got {}", percent);
            }
            cfg.config.quality = Some(Quality::from_percent(percent));
        }

        if tool == "image-convert" {
            if let Some(f) = matches.get_one::<String>("image_format") {
                cfg.config.format = Some(f.clone());
                if quality_ignored(matches, f) {
                    warn!(format = %f, "--quality only applies to jpeg output; ignoring it");
                }
            }
            if let Some(s) = matches.get_one::<String>("image_scale") {
                cfg.config.scale = Some(s.parse()?);
            }
        }
        Ok(())
    }
}

/// `--quality` given explicitly for a target that has no quality setting.
fn quality_ignored(matches: &ArgMatches, format: &str) -> bool {
    matches.value_source("image_quality") == Some(ValueSource::CommandLine) && !honours_quality(format)
}
