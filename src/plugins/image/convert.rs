use anyhow::Context;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use crate::core::model::{ConversionConfig, InputFile, Quality, TransformOutput};
use crate::core::naming::image_extension;
use crate::plugins::registry::Transform;

pub const DEFAULT_CONVERT_QUALITY: u8 = 85;
pub const DEFAULT_CONVERT_FORMAT: &str = "png";

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("unsupported target image format: {0}")]
    UnsupportedFormat(String),
}

pub(crate) fn target_format(format: &str) -> Result<ImageFormat, ImageError> {
    match image_extension(format).as_str() {
        "png" => Ok(ImageFormat::Png),
        "jpg" => Ok(ImageFormat::Jpeg),
        "webp" => Ok(ImageFormat::WebP),
        "gif" => Ok(ImageFormat::Gif),
        "bmp" => Ok(ImageFormat::Bmp),
        "tiff" => Ok(ImageFormat::Tiff),
        _ => Err(ImageError::UnsupportedFormat(format.to_string())),
    }
}

/// Only the JPEG encoder takes a quality; every other target here is written losslessly.
pub(crate) fn honours_quality(format: &str) -> bool {
    matches!(target_format(format), Ok(ImageFormat::Jpeg))
}

/// JPEG has no alpha channel; composite onto white first.
pub(crate) fn flatten_on_white(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, p) in rgba.enumerate_pixels() {
        let [r, g, b, a] = p.0;
        let a = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    DynamicImage::ImageRgb8(out)
}

pub(crate) fn encode(img: &DynamicImage, format: ImageFormat, quality: Quality) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let enc = JpegEncoder::new_with_quality(&mut buf, quality.percent());
            flatten_on_white(img).write_with_encoder(enc).context("encode jpeg")?;
        }
        ImageFormat::Png => {
            let enc = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
            img.write_with_encoder(enc).context("encode png")?;
        }
        other => {
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_to(&mut Cursor::new(&mut buf), other)
                .with_context(|| format!("encode {:?}", other))?;
        }
    }
    Ok(buf)
}

fn rescale(img: DynamicImage, scale: f32) -> DynamicImage {
    if (scale - 1.0).abs() < f32::EPSILON {
        return img;
    }
    let w = ((img.width() as f32 * scale).round() as u32).max(1);
    let h = ((img.height() as f32 * scale).round() as u32).max(1);
    img.resize_exact(w, h, FilterType::Lanczos3)
}

/// Re-encodes any decodable image into the configured format.
pub struct ImageConvert;

#[async_trait]
impl Transform for ImageConvert {
    fn name(&self) -> &'static str {
        "image-convert"
    }

    async fn prepare(&self, config: &ConversionConfig) -> anyhow::Result<()> {
        target_format(config.format.as_deref().unwrap_or(DEFAULT_CONVERT_FORMAT))?;
        config.checked_scale()?;
        Ok(())
    }

    async fn transform(&self, input: &InputFile, config: &ConversionConfig) -> anyhow::Result<TransformOutput> {
        let format = config
            .format
            .clone()
            .unwrap_or_else(|| DEFAULT_CONVERT_FORMAT.to_string());
        let target = target_format(&format)?;
        let quality = config
            .quality
            .unwrap_or_else(|| Quality::from_percent(DEFAULT_CONVERT_QUALITY));
        let scale = config.scale.unwrap_or(1.0);
        let data = input.data.clone();

        let out = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
            let img = image::load_from_memory(&data).context("decode image")?;
            encode(&rescale(img, scale), target, quality)
        })
        .await
        .context("image worker")??;

        Ok(TransformOutput::Single { data: out.into(), ext: image_extension(&format) })
    }
}
