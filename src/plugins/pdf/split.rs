use async_trait::async_trait;
use bytes::Bytes;

use crate::core::model::{ConversionConfig, InputFile, TransformOutput};
use crate::plugins::pdf::{blocking, load, save, PdfError};
use crate::plugins::registry::Transform;

pub struct PdfSplit;

/// One single-page document per page, in page order.
pub(crate) fn split_pages(data: &[u8]) -> anyhow::Result<Vec<Vec<u8>>> {
    let doc = load(data)?;
    let total = doc.get_pages().len() as u32;
    if total == 0 {
        return Err(PdfError::NoPages.into());
    }

    let mut out = Vec::with_capacity(total as usize);
    for keep in 1..=total {
        let mut single = doc.clone();
        let others: Vec<u32> = (1..=total).filter(|p| *p != keep).collect();
        single.delete_pages(&others);
        single.prune_objects();
        single.renumber_objects();
        single.compress();
        out.push(save(&mut single)?);
    }
    Ok(out)
}

#[async_trait]
impl Transform for PdfSplit {
    fn name(&self) -> &'static str {
        "pdf-split"
    }

    async fn transform(&self, input: &InputFile, _config: &ConversionConfig) -> anyhow::Result<TransformOutput> {
        let data = input.data.clone();
        let pages = blocking(move || split_pages(&data)).await?;
        Ok(TransformOutput::Pages {
            pages: pages.into_iter().map(Bytes::from).collect(),
            ext: "pdf".to_string(),
        })
    }
}
