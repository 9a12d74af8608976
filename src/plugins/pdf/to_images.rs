use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::core::model::{ConversionConfig, InputFile, TransformOutput};
use crate::plugins::external::{check_binary, run, stage_input};
use crate::plugins::pdf::PdfError;
use crate::plugins::registry::Transform;

pub const DEFAULT_PDFTOPPM_BIN: &str = "pdftoppm";
pub const DEFAULT_PAGE_FORMAT: &str = "jpeg";
pub const DEFAULT_PAGE_SCALE: f32 = 2.0;
const JPEG_QUALITY: u8 = 92;

/// Renders pages through poppler's `pdftoppm`.
pub struct PdfToImages {
    bin: String,
}

impl PdfToImages {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

/// (`pdftoppm` flag, file extension) for a requested page format.
fn page_format(format: Option<&str>) -> Result<(&'static str, &'static str), PdfError> {
    let f = format.unwrap_or(DEFAULT_PAGE_FORMAT).to_ascii_lowercase();
    match f.strip_prefix("image/").unwrap_or(f.as_str()) {
        "jpeg" | "jpg" => Ok(("-jpeg", "jpg")),
        "png" => Ok(("-png", "png")),
        _ => Err(PdfError::UnsupportedImageFormat(f.clone())),
    }
}

/// `page-07.jpg` -> 7
fn page_number(file_name: &str) -> Option<u32> {
    let stem = file_name.rsplit_once('.')?.0;
    stem.rsplit_once('-')?.1.parse().ok()
}

async fn collect_pages(dir: &Path, ext: &str) -> anyhow::Result<Vec<Bytes>> {
    let mut found: Vec<(u32, std::path::PathBuf)> = vec![];
    let mut rd = tokio::fs::read_dir(dir).await.context("list rendered pages")?;
    while let Some(entry) = rd.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with("page-") || !name.ends_with(&format!(".{ext}")) {
            continue;
        }
        if let Some(n) = page_number(&name) {
            found.push((n, entry.path()));
        }
    }
    found.sort_by_key(|(n, _)| *n);

    let mut pages = Vec::with_capacity(found.len());
    for (_, path) in found {
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        pages.push(Bytes::from(data));
    }
    Ok(pages)
}

#[async_trait]
impl Transform for PdfToImages {
    fn name(&self) -> &'static str {
        "pdf-to-images"
    }

    async fn prepare(&self, config: &ConversionConfig) -> anyhow::Result<()> {
        page_format(config.format.as_deref())?;
        config.checked_scale()?;
        check_binary(&self.bin, "-v").await?;
        Ok(())
    }

    async fn transform(&self, input: &InputFile, config: &ConversionConfig) -> anyhow::Result<TransformOutput> {
        let (flag, ext) = page_format(config.format.as_deref())?;
        let scale = config.checked_scale()?.unwrap_or(DEFAULT_PAGE_SCALE);
        let dpi = (72.0 * scale).round().max(1.0) as u32;

        let dir = tempfile::tempdir().context("create temp dir")?;
        let input_path = stage_input(dir.path(), "input.pdf", &input.data).await?;

        let mut cmd = Command::new(&self.bin);
        cmd.arg(flag).arg("-r").arg(dpi.to_string());
        if flag == "-jpeg" {
            cmd.arg("-jpegopt").arg(format!("quality={}", JPEG_QUALITY));
        }
        cmd.arg(&input_path).arg(dir.path().join("page"));
        debug!(file = %input.name, dpi, "rendering pages");
        run(&self.bin, cmd).await?;

        let pages = collect_pages(dir.path(), ext).await?;
        if pages.is_empty() {
            return Err(PdfError::NoPages.into());
        }
        Ok(TransformOutput::Pages { pages, ext: ext.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::BadScale;

    #[test]
    fn formats_map_to_pdftoppm_flags() {
        assert_eq!(page_format(None).unwrap(), ("-jpeg", "jpg"));
        assert_eq!(page_format(Some("image/png")).unwrap(), ("-png", "png"));
        assert!(page_format(Some("gif")).is_err());
    }

    #[test]
    fn page_numbers_parse_with_padding() {
        assert_eq!(page_number("page-1.jpg"), Some(1));
        assert_eq!(page_number("page-012.png"), Some(12));
        assert_eq!(page_number("page.png"), None);
    }

    #[tokio::test]
    async fn collects_pages_in_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [("page-10.png", "ten"), ("page-2.png", "two"), ("page-1.png", "one"), ("input.pdf", "x")] {
            tokio::fs::write(dir.path().join(name), body).await.unwrap();
        }

        let pages = collect_pages(dir.path(), "png").await.unwrap();

        let bodies: Vec<_> = pages.iter().map(|p| std::str::from_utf8(p).unwrap()).collect();
        assert_eq!(bodies, ["one", "two", "ten"]);
    }

    #[tokio::test]
    async fn bad_scale_fails_setup_before_running_pdftoppm() {
        let t = PdfToImages::new("no-such-pdftoppm-binary");
        for scale in [-1.0, 0.0, f32::NAN] {
            let cfg = ConversionConfig { scale: Some(scale), ..Default::default() };
            let err = t.prepare(&cfg).await.unwrap_err();
            assert!(err.downcast_ref::<BadScale>().is_some(), "scale {scale} passed setup");
        }
    }

    #[tokio::test]
    async fn missing_renderer_is_a_setup_failure() {
        let t = PdfToImages::new("no-such-pdftoppm-binary");
        assert!(t.prepare(&ConversionConfig::default()).await.is_err());
    }
}
