use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageError, RgbaImage};
use std::borrow::Cow;
use std::io::Write;

use crate::models::image_ref::ImageFormat;

/// A decoded watermark raster, shared read-only across workers.
#[derive(Debug, Clone)]
pub struct WatermarkAsset {
    image: RgbaImage,
}

impl WatermarkAsset {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: image.to_rgba8(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Scale down to `max_height`, preserving aspect ratio.
    ///
    /// Assets already within the limit are borrowed as-is; otherwise a new
    /// asset is derived and `self` is left untouched.
    pub fn fit_to_height(&self, max_height: u32) -> Cow<'_, WatermarkAsset> {
        if self.height() <= max_height {
            return Cow::Borrowed(self);
        }

        let ratio = f64::from(max_height) / f64::from(self.height());
        let width = ((f64::from(self.width()) * ratio).round() as u32).max(1);
        let resized = imageops::resize(&self.image, width, max_height, FilterType::Lanczos3);

        tracing::debug!(
            from_width = self.width(),
            from_height = self.height(),
            to_width = width,
            to_height = max_height,
            "Resized watermark"
        );

        Cow::Owned(WatermarkAsset { image: resized })
    }
}

/// Fixed bottom-corner placement rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Watermarks taller than this are scaled down to it.
    pub max_height: u32,
    /// Gap between a watermark and the image edges.
    pub padding: u32,
}

impl Placement {
    /// Top-left anchors of the left and right watermark.
    ///
    /// Both share the same row, computed from `max_height` rather than the
    /// actual watermark height. Anchors may be negative on small images.
    pub fn anchors(&self, base_width: u32, base_height: u32, right_width: u32) -> ((i64, i64), (i64, i64)) {
        let padding = i64::from(self.padding);
        let y = i64::from(base_height) - i64::from(self.max_height) - padding;
        let left_x = padding;
        let right_x = i64::from(base_width) - i64::from(right_width) - padding;
        ((left_x, y), (right_x, y))
    }
}

/// Overlay the left and right watermarks onto a copy of `base`.
///
/// The output always has the dimensions of `base`; parts of a watermark that
/// fall outside the canvas are clipped.
pub fn composite(
    base: &DynamicImage,
    left: &WatermarkAsset,
    right: &WatermarkAsset,
    placement: Placement,
) -> DynamicImage {
    let left = left.fit_to_height(placement.max_height);
    let right = right.fit_to_height(placement.max_height);

    let mut canvas = base.to_rgba8();
    let ((left_x, left_y), (right_x, right_y)) =
        placement.anchors(canvas.width(), canvas.height(), right.width());

    imageops::overlay(&mut canvas, left.image(), left_x, left_y);
    imageops::overlay(&mut canvas, right.image(), right_x, right_y);

    DynamicImage::ImageRgba8(canvas)
}

/// Encode `image` in `format`. JPEG output drops the alpha channel.
pub fn encode<W: Write>(
    image: &DynamicImage,
    format: ImageFormat,
    jpeg_quality: u8,
    writer: W,
) -> Result<(), ImageError> {
    match format {
        ImageFormat::Jpeg => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(writer, jpeg_quality).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )
        }
        ImageFormat::Png => {
            let rgba = image.to_rgba8();
            PngEncoder::new(writer).write_image(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                ExtendedColorType::Rgba8,
            )
        }
    }
}
