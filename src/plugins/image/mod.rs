pub mod cli;
pub mod compress;
pub mod convert;

use crate::core::accept::AcceptPolicy;
use crate::plugins::registry::{Tool, ToolCliConfig, ToolOp};
use std::sync::Arc;

pub struct ImageConvertTool;

impl Tool for ImageConvertTool {
    fn name(&self) -> &'static str {
        "image-convert"
    }

    fn about(&self) -> &'static str {
        "Convert images to PNG, JPEG, WebP, GIF, BMP or TIFF"
    }

    fn accept(&self, _cfg: &ToolCliConfig) -> AcceptPolicy {
        AcceptPolicy::new("Upload image files (JPG, PNG, WebP, GIF, BMP)").mime_prefix("image/")
    }

    fn operation(&self, _cfg: &ToolCliConfig) -> ToolOp {
        ToolOp::Each(Arc::new(convert::ImageConvert))
    }
}

pub struct ImageCompressTool;

impl Tool for ImageCompressTool {
    fn name(&self) -> &'static str {
        "image-compress"
    }

    fn about(&self) -> &'static str {
        "Shrink JPEG, PNG and WebP images"
    }

    fn accept(&self, _cfg: &ToolCliConfig) -> AcceptPolicy {
        AcceptPolicy::new("Upload JPG, PNG, or WebP images")
            .mime("image/jpeg")
            .mime("image/png")
            .mime("image/webp")
    }

    fn operation(&self, _cfg: &ToolCliConfig) -> ToolOp {
        ToolOp::Each(Arc::new(compress::ImageCompress))
    }
}
