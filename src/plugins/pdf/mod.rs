pub mod cli;
pub mod compress;
pub mod merge;
pub mod rotate;
pub mod split;
pub mod to_images;

use crate::core::accept::AcceptPolicy;
use crate::plugins::registry::{Tool, ToolCliConfig, ToolOp};
use anyhow::Context;
use lopdf::Document;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum PdfError {
    #[error("document has no pages")]
    NoPages,

    #[error("no rotation configured (use 90, 180 or 270)")]
    MissingRotation,

    #[error("unsupported page image format: {0}")]
    UnsupportedImageFormat(String),
}

pub(crate) fn load(data: &[u8]) -> anyhow::Result<Document> {
    Document::load_mem(data).context("parse pdf")
}

pub(crate) fn save(doc: &mut Document) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    doc.save_to(&mut out).context("write pdf")?;
    Ok(out)
}

/// lopdf is synchronous; keep it off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.context("pdf worker")?
}

fn pdf_policy() -> AcceptPolicy {
    AcceptPolicy::new("Please upload PDF files")
        .mime("application/pdf")
        .extensions(&["pdf"])
}

pub struct PdfCompressTool;

impl Tool for PdfCompressTool {
    fn name(&self) -> &'static str {
        "pdf-compress"
    }

    fn about(&self) -> &'static str {
        "Rewrite PDFs with unused objects dropped and streams compressed"
    }

    fn accept(&self, _cfg: &ToolCliConfig) -> AcceptPolicy {
        pdf_policy()
    }

    fn operation(&self, _cfg: &ToolCliConfig) -> ToolOp {
        ToolOp::Each(Arc::new(compress::PdfCompress))
    }
}

pub struct PdfMergeTool;

impl Tool for PdfMergeTool {
    fn name(&self) -> &'static str {
        "pdf-merge"
    }

    fn about(&self) -> &'static str {
        "Merge two or more PDFs into merged.pdf, in the order given"
    }

    fn accept(&self, _cfg: &ToolCliConfig) -> AcceptPolicy {
        pdf_policy()
    }

    fn operation(&self, _cfg: &ToolCliConfig) -> ToolOp {
        ToolOp::Combine(Arc::new(merge::PdfMerge))
    }
}

pub struct PdfSplitTool;

impl Tool for PdfSplitTool {
    fn name(&self) -> &'static str {
        "pdf-split"
    }

    fn about(&self) -> &'static str {
        "Split every page of a PDF into its own file"
    }

    fn accept(&self, _cfg: &ToolCliConfig) -> AcceptPolicy {
        pdf_policy()
    }

    fn operation(&self, _cfg: &ToolCliConfig) -> ToolOp {
        ToolOp::Each(Arc::new(split::PdfSplit))
    }
}

pub struct PdfRotateTool;

impl Tool for PdfRotateTool {
    fn name(&self) -> &'static str {
        "pdf-rotate"
    }

    fn about(&self) -> &'static str {
        "Rotate every page of a PDF by 90, 180 or 270 degrees"
    }

    fn accept(&self, _cfg: &ToolCliConfig) -> AcceptPolicy {
        pdf_policy()
    }

    fn operation(&self, _cfg: &ToolCliConfig) -> ToolOp {
        ToolOp::Each(Arc::new(rotate::PdfRotate))
    }
}

pub struct PdfToImagesTool;

impl Tool for PdfToImagesTool {
    fn name(&self) -> &'static str {
        "pdf-to-images"
    }

    fn about(&self) -> &'static str {
        "Render each PDF page to a JPEG or PNG image (needs pdftoppm)"
    }

    fn accept(&self, _cfg: &ToolCliConfig) -> AcceptPolicy {
        pdf_policy()
    }

    fn operation(&self, cfg: &ToolCliConfig) -> ToolOp {
        let bin = cfg
            .options
            .get("pdftoppm_bin")
            .cloned()
            .unwrap_or_else(|| to_images::DEFAULT_PDFTOPPM_BIN.to_string());
        ToolOp::Each(Arc::new(to_images::PdfToImages::new(bin)))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{dictionary, Document, Object, Stream};

    /// A PDF whose page `i` has a MediaBox width of `widths[i]`, so tests can tell pages apart.
    pub(crate) fn sample_pdf(widths: &[i64]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = vec![];
        for w in widths {
            let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), Object::Integer(*w), 842.into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => widths.len() as i64,
                "Resources" => dictionary! {},
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    /// MediaBox widths of `doc`'s pages, in page order.
    pub(crate) fn page_widths(doc: &Document) -> Vec<i64> {
        doc.get_pages()
            .values()
            .map(|id| {
                let page = doc.get_dictionary(*id).unwrap();
                let media = page.get(b"MediaBox").unwrap().as_array().unwrap();
                media[2].as_i64().unwrap()
            })
            .collect()
    }
}
