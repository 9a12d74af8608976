use async_trait::async_trait;

use crate::core::model::{ConversionConfig, InputFile, TransformOutput};
use crate::core::naming::prefixed;
use crate::plugins::pdf::{blocking, load, save};
use crate::plugins::registry::Transform;

pub struct PdfCompress;

/// Drops unreachable objects, renumbers and deflates every stream.
pub(crate) fn compress_pdf(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut doc = load(data)?;
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    save(&mut doc)
}

#[async_trait]
impl Transform for PdfCompress {
    fn name(&self) -> &'static str {
        "pdf-compress"
    }

    async fn transform(&self, input: &InputFile, _config: &ConversionConfig) -> anyhow::Result<TransformOutput> {
        let data = input.data.clone();
        let out = blocking(move || compress_pdf(&data)).await?;
        Ok(TransformOutput::Renamed {
            data: out.into(),
            name: prefixed(&input.name, "compressed_"),
        })
    }
}
