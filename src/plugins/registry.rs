use async_trait::async_trait;
use crate::core::accept::AcceptPolicy;
use crate::core::model::{ConversionConfig, InputFile, TransformOutput, WorkflowLimits};
use bytes::Bytes;
use clap::{ArgMatches, Command};
use std::collections::HashMap;
use std::sync::Arc;

/// Single-file conversion supplied by a tool. The workflow never looks inside the blobs.
#[async_trait]
pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs once before the batch loop. An error here aborts the whole batch.
    async fn prepare(&self, _config: &ConversionConfig) -> anyhow::Result<()> {
        Ok(())
    }

    async fn transform(&self, input: &InputFile, config: &ConversionConfig) -> anyhow::Result<TransformOutput>;
}

/// Whole-queue operation producing a single output (e.g. merging PDFs).
#[async_trait]
pub trait Combiner: Send + Sync {
    fn name(&self) -> &'static str;

    fn min_inputs(&self) -> usize {
        2
    }

    fn output_name(&self) -> String;

    async fn combine(&self, inputs: &[InputFile], config: &ConversionConfig) -> anyhow::Result<Bytes>;
}

#[derive(Debug, Clone, Default)]
pub struct ToolCliConfig {
    pub config: ConversionConfig,
    pub options: HashMap<String, String>,
    pub limits: WorkflowLimits,
}

pub enum ToolOp {
    Each(Arc<dyn Transform>),
    Combine(Arc<dyn Combiner>),
}

pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn about(&self) -> &'static str;
    fn accept(&self, cfg: &ToolCliConfig) -> AcceptPolicy;
    fn operation(&self, cfg: &ToolCliConfig) -> ToolOp;
}

pub trait CliPlugin: Send + Sync {
    fn handles(&self, tool: &str) -> bool;
    fn augment_tool_command(&self, tool: &str, cmd: Command) -> Command;
    fn apply_tool_matches(&self, tool: &str, matches: &ArgMatches, cfg: &mut ToolCliConfig) -> anyhow::Result<()>;
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    cli_plugins: Vec<Box<dyn CliPlugin>>,
}

impl ToolRegistry {
    pub fn with_defaults() -> Self {
        let mut reg = Self { tools: vec![], cli_plugins: vec![] };

        reg.tools.push(Box::new(crate::plugins::image::ImageConvertTool));
        reg.tools.push(Box::new(crate::plugins::image::ImageCompressTool));
        reg.tools.push(Box::new(crate::plugins::pdf::PdfCompressTool));
        reg.tools.push(Box::new(crate::plugins::pdf::PdfMergeTool));
        reg.tools.push(Box::new(crate::plugins::pdf::PdfSplitTool));
        reg.tools.push(Box::new(crate::plugins::pdf::PdfRotateTool));
        reg.tools.push(Box::new(crate::plugins::pdf::PdfToImagesTool));
        reg.tools.push(Box::new(crate::plugins::media::AudioTool));
        reg.tools.push(Box::new(crate::plugins::media::VideoTool));

        reg.cli_plugins.push(Box::new(crate::plugins::image::cli::ImageCliPlugin::new()));
        reg.cli_plugins.push(Box::new(crate::plugins::pdf::cli::PdfCliPlugin::new()));
        reg.cli_plugins.push(Box::new(crate::plugins::media::cli::MediaCliPlugin::new()));
        reg
    }

    pub fn tools(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.iter().map(|t| t.as_ref())
    }

    pub fn tool(&self, name: &str) -> Option<&dyn Tool> {
        self.tools().find(|t| t.name() == name)
    }

    pub fn augment_tool_command(&self, tool: &str, cmd: Command) -> Command {
        self.cli_plugins
            .iter()
            .filter(|p| p.handles(tool))
            .fold(cmd, |c, p| p.augment_tool_command(tool, c))
    }

    pub fn apply_tool_matches(&self, tool: &str, matches: &ArgMatches, cfg: &mut ToolCliConfig) -> anyhow::Result<()> {
        for p in self.cli_plugins.iter().filter(|p| p.handles(tool)) {
            p.apply_tool_matches(tool, matches, cfg)?;
        }
        Ok(())
    }
}

/// Closure-backed transforms for exercising the workflow without real codecs.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use futures::future::BoxFuture;

    type TransformFn =
        dyn Fn(InputFile, ConversionConfig) -> BoxFuture<'static, anyhow::Result<TransformOutput>> + Send + Sync;

    pub(crate) struct FnTransform {
        name: &'static str,
        f: Box<TransformFn>,
    }

    impl FnTransform {
        pub(crate) fn new<F>(name: &'static str, f: F) -> Self
        where
            F: Fn(InputFile, ConversionConfig) -> BoxFuture<'static, anyhow::Result<TransformOutput>>
                + Send
                + Sync
                + 'static,
        {
            Self { name, f: Box::new(f) }
        }
    }

    #[async_trait]
    impl Transform for FnTransform {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn transform(&self, input: &InputFile, config: &ConversionConfig) -> anyhow::Result<TransformOutput> {
            (self.f)(input.clone(), config.clone()).await
        }
    }
}
