use async_trait::async_trait;
use lopdf::{Document, Object};

use crate::core::model::{ConversionConfig, InputFile, TransformOutput};
use crate::core::naming::prefixed;
use crate::plugins::pdf::{blocking, load, save, PdfError};
use crate::plugins::registry::Transform;

pub struct PdfRotate;

/// Adds `degrees` to each page's `/Rotate`, keeping the result in `0..360`.
pub(crate) fn rotate_pages(doc: &mut Document, degrees: i64) -> anyhow::Result<()> {
    for page_id in doc.get_pages().into_values() {
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        let current = page.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0);
        page.set("Rotate", (current + degrees).rem_euclid(360));
    }
    Ok(())
}

#[async_trait]
impl Transform for PdfRotate {
    fn name(&self) -> &'static str {
        "pdf-rotate"
    }

    async fn prepare(&self, config: &ConversionConfig) -> anyhow::Result<()> {
        config.rotate.ok_or(PdfError::MissingRotation)?;
        Ok(())
    }

    async fn transform(&self, input: &InputFile, config: &ConversionConfig) -> anyhow::Result<TransformOutput> {
        let degrees = config.rotate.ok_or(PdfError::MissingRotation)?.degrees();
        let data = input.data.clone();
        let out = blocking(move || {
            let mut doc = load(&data)?;
            rotate_pages(&mut doc, degrees)?;
            save(&mut doc)
        })
        .await?;

        Ok(TransformOutput::Renamed {
            data: out.into(),
            name: prefixed(&input.name, "rotated_"),
        })
    }
}
