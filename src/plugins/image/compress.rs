use anyhow::Context;
use async_trait::async_trait;
use image::ImageFormat;

use crate::core::model::{ConversionConfig, InputFile, Quality, TransformOutput};
use crate::core::naming::{prefixed, replace_extension};
use crate::plugins::image::convert::encode;
use crate::plugins::registry::Transform;

pub const DEFAULT_COMPRESS_QUALITY: u8 = 72;

/// PNG is re-encoded losslessly with maximum compression; everything else becomes JPEG.
pub struct ImageCompress;

fn is_png(input: &InputFile) -> bool {
    input.mime.as_deref() == Some("image/png") || input.name.to_ascii_lowercase().ends_with(".png")
}

#[async_trait]
impl Transform for ImageCompress {
    fn name(&self) -> &'static str {
        "image-compress"
    }

    async fn transform(&self, input: &InputFile, config: &ConversionConfig) -> anyhow::Result<TransformOutput> {
        let quality = config
            .quality
            .unwrap_or_else(|| Quality::from_percent(DEFAULT_COMPRESS_QUALITY));
        let png = is_png(input);
        let target = if png { ImageFormat::Png } else { ImageFormat::Jpeg };
        let data = input.data.clone();

        let out = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
            let img = image::load_from_memory(&data).context("decode image")?;
            encode(&img, target, quality)
        })
        .await
        .context("image worker")??;

        let name = if png {
            prefixed(&input.name, "compressed_")
        } else {
            prefixed(&replace_extension(&input.name, "jpg"), "compressed_")
        };
        Ok(TransformOutput::Renamed { data: out.into(), name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::image::convert::tests::sample;

    #[tokio::test]
    async fn png_stays_png() {
        let input = InputFile::new("shot.png", Some("image/png".into()), sample(ImageFormat::Png));

        let out = ImageCompress.transform(&input, &ConversionConfig::default()).await.unwrap();

        let TransformOutput::Renamed { data, name } = out else { panic!("expected renamed output") };
        assert_eq!(name, "compressed_shot.png");
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn webp_becomes_jpeg() {
        let input = InputFile::new("pic.webp", Some("image/webp".into()), sample(ImageFormat::WebP));
        let config = ConversionConfig { quality: Some(Quality::from_percent(40)), ..Default::default() };

        let out = ImageCompress.transform(&input, &config).await.unwrap();

        let TransformOutput::Renamed { data, name } = out else { panic!("expected renamed output") };
        assert_eq!(name, "compressed_pic.jpg");
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Jpeg);
    }
}
