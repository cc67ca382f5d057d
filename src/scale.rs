//! Height-filling rescale that preserves aspect ratio.

use fast_image_resize as fir;
use image::RgbaImage;
use tracing::trace;

use crate::error::{Error, Result};

/// A bitmap resized for one render.
#[derive(Debug, Clone)]
pub struct ScaledImage {
    pub pixels: RgbaImage,
    /// Ratio of target height to source height.
    pub factor: f64,
}

impl ScaledImage {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Dimensions of a `width`x`height` image scaled by `target_height / height`.
///
/// Each side is `floor(factor * side)`, evaluated as `side * target / height`
/// in integers so that the height lands on `target_height` exactly.
///
/// # Errors
/// Returns [`Error::DegenerateScale`] when either side would be zero or the
/// width does not fit in a `u32`.
pub fn scaled_dimensions(width: u32, height: u32, target_height: u32) -> Result<(u32, u32)> {
    let degenerate = || Error::DegenerateScale {
        width,
        height,
        target_height,
    };
    if height == 0 {
        return Err(degenerate());
    }
    let floor_scaled = |side: u32| {
        u32::try_from(u64::from(side) * u64::from(target_height) / u64::from(height))
            .map_err(|_| degenerate())
    };
    let new_w = floor_scaled(width)?;
    let new_h = floor_scaled(height)?;
    if new_w == 0 || new_h == 0 {
        return Err(degenerate());
    }
    Ok((new_w, new_h))
}

/// Resize `source` so its height equals `target_height`.
///
/// # Errors
/// Returns [`Error::DegenerateScale`] for sizes that cannot be produced and
/// [`Error::Resize`] if the resampler rejects the buffers.
pub fn scale_to_height(source: &RgbaImage, target_height: u32) -> Result<ScaledImage> {
    let (src_w, src_h) = source.dimensions();
    let (dst_w, dst_h) = scaled_dimensions(src_w, src_h, target_height)?;
    let factor = f64::from(target_height) / f64::from(src_h);
    trace!(src_w, src_h, dst_w, dst_h, factor, "scaling to display height");

    if (dst_w, dst_h) == (src_w, src_h) {
        return Ok(ScaledImage {
            pixels: source.clone(),
            factor,
        });
    }

    let resize_err = |reason: String| Error::Resize {
        width: dst_w,
        height: dst_h,
        reason,
    };
    let src_view = fir::images::ImageRef::new(src_w, src_h, source.as_raw(), fir::PixelType::U8x4)
        .map_err(|err| resize_err(err.to_string()))?;
    let mut dst_image = fir::images::Image::new(dst_w, dst_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    fir::Resizer::new()
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|err| resize_err(err.to_string()))?;
    let pixels = RgbaImage::from_raw(dst_w, dst_h, dst_image.into_vec())
        .ok_or_else(|| resize_err("resized buffer has the wrong length".to_string()))?;

    Ok(ScaledImage { pixels, factor })
}
