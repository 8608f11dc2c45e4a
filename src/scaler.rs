// SPDX-License-Identifier: MPL-2.0-only

//! Thumbnail-style downscaling of decoded frames.

use fast_image_resize::{
    PixelType, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use gifloop_config::FilterMethod;
use image::RgbaImage;

/// Dimensions of `(w, h)` scaled so the longest side equals `max_side`.
///
/// Returns `None` when the image already fits; thumbnails never upscale.
#[must_use]
pub fn fit_within(w: u32, h: u32, max_side: u32) -> Option<(u32, u32)> {
    let longest = w.max(h);
    if max_side == 0 || longest <= max_side {
        return None;
    }

    let ratio = f64::from(max_side) / f64::from(longest);

    Some((
        ((f64::from(w) * ratio).round() as u32).max(1),
        ((f64::from(h) * ratio).round() as u32).max(1),
    ))
}

/// Shrink `img` so its longest side is at most `max_side`, keeping aspect.
///
/// Returns the input unchanged when it already fits.
pub fn thumbnail(
    img: RgbaImage,
    max_side: u32,
    filter: FilterMethod,
) -> Result<RgbaImage, String> {
    let (w, h) = img.dimensions();
    let Some((new_width, new_height)) = fit_within(w, h, max_side) else {
        return Ok(img);
    };

    let src = ImageRef::new(w, h, img.as_raw(), PixelType::U8x4).map_err(|e| e.to_string())?;
    let mut dst = Image::new(new_width, new_height, PixelType::U8x4);

    Resizer::new()
        .resize(
            &src,
            &mut dst,
            &ResizeOptions::new().resize_alg(filter.into()),
        )
        .map_err(|e| e.to_string())?;

    RgbaImage::from_raw(new_width, new_height, dst.into_vec())
        .ok_or_else(|| "resized buffer has the wrong length".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_within_preserves_aspect() {
        assert_eq!(fit_within(400, 200, 100), Some((100, 50)));
        assert_eq!(fit_within(200, 400, 100), Some((50, 100)));
        assert_eq!(fit_within(1000, 1, 10), Some((10, 1)));
    }

    #[test]
    fn fit_within_never_upscales() {
        assert_eq!(fit_within(64, 32, 64), None);
        assert_eq!(fit_within(64, 32, 128), None);
        assert_eq!(fit_within(64, 32, 0), None);
    }

    #[test]
    fn thumbnail_bounds_longest_side() {
        let img = RgbaImage::from_pixel(40, 20, image::Rgba([255, 0, 0, 255]));
        let thumb = thumbnail(img.clone(), 10, FilterMethod::Lanczos).unwrap();
        assert_eq!(thumb.dimensions(), (10, 5));

        let thumb = thumbnail(img, 10, FilterMethod::Nearest).unwrap();
        assert_eq!(thumb.get_pixel(4, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn thumbnail_keeps_small_images() {
        let img = RgbaImage::from_pixel(8, 8, image::Rgba([1, 2, 3, 4]));
        let thumb = thumbnail(img.clone(), 16, FilterMethod::Nearest).unwrap();
        assert_eq!(thumb, img);
    }
}
