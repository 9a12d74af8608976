use crate::core::model::Rotation;
use crate::plugins::pdf::to_images::{DEFAULT_PAGE_FORMAT, DEFAULT_PDFTOPPM_BIN};
use crate::plugins::registry::{CliPlugin, ToolCliConfig};
use clap::{Arg, ArgMatches, Command};

pub struct PdfCliPlugin;

impl PdfCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CliPlugin for PdfCliPlugin {
    fn handles(&self, tool: &str) -> bool {
        tool.starts_with("pdf-")
    }

    fn augment_tool_command(&self, tool: &str, cmd: Command) -> Command {
        match tool {
            "pdf-rotate" => cmd.arg(
                Arg::new("pdf_degrees")
                    .long("degrees")
                    .help_heading("PDF")
                    .help("Clockwise rotation: 90, 180 or 270")
                    .default_value("90")
                    .num_args(1),
            ),
            "pdf-to-images" => cmd
                .arg(
                    Arg::new("pdf_image_format")
                        .long("format")
                        .help_heading("PDF")
                        .help("Page image format: jpeg or png")
                        .default_value(DEFAULT_PAGE_FORMAT)
                        .num_args(1),
                )
                .arg(
                    Arg::new("pdf_scale")
                        .long("scale")
                        .help_heading("PDF")
                        .help("Render scale; 1.0 = 72 dpi")
                        .default_value("2")
                        .num_args(1),
                )
                .arg(
                    Arg::new("pdftoppm_bin")
                        .long("pdftoppm-bin")
                        .help_heading("PDF")
                        .help("Path to the pdftoppm binary")
                        .default_value(DEFAULT_PDFTOPPM_BIN)
                        .num_args(1),
                ),
            _ => cmd,
        }
    }

    fn apply_tool_matches(&self, tool: &str, matches: &ArgMatches, cfg: &mut ToolCliConfig) -> anyhow::Result<()> {
        match tool {
            "pdf-rotate" => {
                if let Some(s) = matches.get_one::<String>("pdf_degrees") {
                    cfg.config.rotate = Some(Rotation::try_from(s.parse::<i64>()?)?);
                }
            }
            "pdf-to-images" => {
                if let Some(f) = matches.get_one::<String>("pdf_image_format") {
                    cfg.config.format = Some(f.clone());
                }
                if let Some(s) = matches.get_one::<String>("pdf_scale") {
                    cfg.config.scale = Some(s.parse()?);
                }
                if let Some(b) = matches.get_one::<String>("pdftoppm_bin") {
                    cfg.options.insert("pdftoppm_bin".to_string(), b.clone());
                }
            }
            _ => {}
        }
        Ok(())
    }
}
