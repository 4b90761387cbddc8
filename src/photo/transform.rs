/// Pixel operations on candidate photos
///
/// Decoding honours the EXIF orientation so every transform below works on
/// the pixels as the user sees them. All functions are CPU-bound; callers
/// run them on a blocking worker.

use cgmath::Vector2;
use image::codecs::jpeg::JpegEncoder;
use image::error::{ImageError, ImageResult, ParameterError, ParameterErrorKind};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;

/// Side of the saved contact photo, in pixels
pub const CROP_OUTPUT_SIZE: u32 = 240;

/// Smallest configurable output side
pub const MIN_CROP_OUTPUT_SIZE: u32 = 64;

/// Side of the editor frame around the crop circle
pub const EDITOR_FRAME_SIZE: u32 = 280;

/// JPEG quality used when writing photos back (0.8 on a 0..1 scale)
pub const JPEG_QUALITY: u8 = 80;

/// Decode image bytes and rotate/flip them according to their stored orientation
pub fn decode_oriented(bytes: &[u8]) -> ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;

    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Centered square crop with side `min(width, height)`.
/// Empty images are returned unchanged.
pub fn square_crop(image: &DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    let size = width.min(height);
    if size == 0 {
        return image.clone();
    }

    let x = (width - size) / 2;
    let y = (height - size) / 2;
    image.crop_imm(x, y, size, size)
}

/// Render `image` into an `output_size` square the way the crop editor shows it.
///
/// The canvas origin sits at the canvas center, is moved by `offset`, then
/// scaled by `scale`. The image is drawn centered on that origin, its short
/// side filling `output_size` before scaling. Pixels the image does not cover
/// stay transparent. `scale` is expected to be clamped by the caller.
///
/// If the image cannot be drawn (no pixels, degenerate output or scale) the
/// original image is returned unchanged.
pub fn transform_crop(
    image: &DynamicImage,
    scale: f32,
    offset: Vector2<f32>,
    output_size: u32,
) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || output_size == 0 || !(scale.is_finite() && scale > 0.0) {
        tracing::warn!(width, height, output_size, scale, "cannot draw crop, keeping original image");
        return image.clone();
    }

    let out = output_size as f32;
    let aspect_ratio = width as f32 / height as f32;
    let (draw_width, draw_height) = if aspect_ratio > 1.0 {
        (out * aspect_ratio, out)
    } else {
        (out, out / aspect_ratio)
    };

    let source = image.to_rgba8();
    let to_source_x = width as f32 / draw_width;
    let to_source_y = height as f32 / draw_height;
    let half = out / 2.0;

    let mut output = RgbaImage::new(output_size, output_size);
    for (px, py, pixel) in output.enumerate_pixels_mut() {
        // Undo translate(center) → translate(offset) → scale(scale)
        let x = (px as f32 + 0.5 - half - offset.x) / scale;
        let y = (py as f32 + 0.5 - half - offset.y) / scale;

        // Position inside the drawn image rect, then in source pixels
        let u = (x + draw_width / 2.0) * to_source_x - 0.5;
        let v = (y + draw_height / 2.0) * to_source_y - 0.5;

        if let Some(sample) = sample_bilinear(&source, u, v) {
            *pixel = sample;
        }
    }

    DynamicImage::ImageRgba8(output)
}

/// Bilinear sample at pixel-center coordinates; `None` outside the image
fn sample_bilinear(source: &RgbaImage, u: f32, v: f32) -> Option<Rgba<u8>> {
    let (width, height) = source.dimensions();
    let max_x = width as f32 - 0.5;
    let max_y = height as f32 - 0.5;
    if !(u >= -0.5 && v >= -0.5 && u < max_x && v < max_y) {
        return None;
    }

    let u = u.clamp(0.0, (width - 1) as f32);
    let v = v.clamp(0.0, (height - 1) as f32);
    let x0 = u.floor() as u32;
    let y0 = v.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = u - x0 as f32;
    let fy = v - y0 as f32;

    let p00 = source.get_pixel(x0, y0).0;
    let p10 = source.get_pixel(x1, y0).0;
    let p01 = source.get_pixel(x0, y1).0;
    let p11 = source.get_pixel(x1, y1).0;

    let mut channels = [0u8; 4];
    for (c, channel) in channels.iter_mut().enumerate() {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        *channel = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgba(channels))
}

/// Lossy-encode a photo for the contact store. `quality` is 1..=100.
pub fn compress_jpeg(image: &DynamicImage, quality: u8) -> ImageResult<Vec<u8>> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        )));
    }

    // JPEG has no alpha channel
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder.encode_image(&rgb)?;
    Ok(bytes)
}

/// Downscale so neither side exceeds `max`, keeping the aspect ratio
pub fn fit_within(image: &DynamicImage, max: u32) -> DynamicImage {
    if image.width() <= max && image.height() <= max {
        return image.clone();
    }
    image.resize(max, max, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Zero;
    use image::ImageFormat;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    /// Left half red, right half blue
    fn split_image(width: u32, height: u32) -> DynamicImage {
        let buffer = RgbaImage::from_fn(width, height, |x, _| if x < width / 2 { RED } else { BLUE });
        DynamicImage::ImageRgba8(buffer)
    }

    #[test]
    fn test_square_crop_dimensions() {
        for (w, h) in [(1, 1), (300, 200), (200, 300), (7, 1), (64, 64)] {
            let cropped = square_crop(&split_image(w, h));
            assert_eq!(cropped.width(), cropped.height());
            assert!(cropped.width() <= w && cropped.height() <= h);
            assert_eq!(cropped.width(), w.min(h));
        }
    }

    #[test]
    fn test_square_crop_is_centered() {
        // 4x2 image: columns 0-1 red, 2-3 blue; the centered 2x2 spans one of each.
        let cropped = square_crop(&split_image(4, 2)).to_rgba8();
        assert_eq!(*cropped.get_pixel(0, 0), RED);
        assert_eq!(*cropped.get_pixel(1, 0), BLUE);
    }

    #[test]
    fn test_transform_crop_output_is_fixed_size() {
        for (w, h) in [(1, 1), (300, 200), (200, 300), (1000, 10)] {
            for scale in [1.0, 2.5, 5.0] {
                for offset in [Vector2::zero(), Vector2::new(-500.0, 9000.0)] {
                    let out = transform_crop(&split_image(w, h), scale, offset, CROP_OUTPUT_SIZE);
                    assert_eq!(out.dimensions(), (CROP_OUTPUT_SIZE, CROP_OUTPUT_SIZE));
                }
            }
        }
    }

    #[test]
    fn test_transform_crop_fills_short_side() {
        // 2:1 landscape drawn 480x240; the centered 240 window shows the middle.
        let out = transform_crop(&split_image(200, 100), 1.0, Vector2::zero(), 240).to_rgba8();
        assert_eq!(*out.get_pixel(10, 120), RED);
        assert_eq!(*out.get_pixel(230, 120), BLUE);
        // Fully covered, nothing transparent
        assert!(out.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn test_transform_crop_offset_pans() {
        // Panning right by 120 brings the red left edge of the drawn image into view.
        let out = transform_crop(&split_image(200, 100), 1.0, Vector2::new(120.0, 0.0), 240).to_rgba8();
        assert_eq!(*out.get_pixel(230, 120), RED);

        // Panned far away: nothing of the image is visible.
        let out = transform_crop(&split_image(200, 100), 1.0, Vector2::new(2000.0, 0.0), 240).to_rgba8();
        assert!(out.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_transform_crop_zooms_about_center() {
        // At 5x only the middle fifth of the 200px-wide image is visible:
        // columns 80..120, half red and half blue.
        let out = transform_crop(&split_image(200, 200), 5.0, Vector2::zero(), 240).to_rgba8();
        assert_eq!(*out.get_pixel(20, 120), RED);
        assert_eq!(*out.get_pixel(220, 120), BLUE);
    }

    #[test]
    fn test_transform_crop_falls_back_to_original() {
        let empty = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        assert_eq!(transform_crop(&empty, 1.0, Vector2::zero(), 240).dimensions(), (0, 0));

        let image = split_image(30, 20);
        assert_eq!(transform_crop(&image, 1.0, Vector2::zero(), 0).dimensions(), (30, 20));
        assert_eq!(transform_crop(&image, f32::NAN, Vector2::zero(), 240).dimensions(), (30, 20));
    }

    #[test]
    fn test_compress_and_decode() {
        let jpeg = compress_jpeg(&split_image(64, 48), JPEG_QUALITY).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = decode_oriented(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (64, 48));
    }

    #[test]
    fn test_compress_rejects_empty_image() {
        let empty = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        assert!(compress_jpeg(&empty, JPEG_QUALITY).is_err());
    }

    #[test]
    fn test_decode_png_and_garbage() {
        let mut png = Vec::new();
        split_image(5, 3)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        assert_eq!(decode_oriented(&png).unwrap().dimensions(), (5, 3));

        assert!(decode_oriented(b"definitely not an image").is_err());
    }

    #[test]
    fn test_fit_within_keeps_aspect() {
        let fitted = fit_within(&split_image(400, 100), 200);
        assert_eq!(fitted.dimensions(), (200, 50));

        let small = fit_within(&split_image(40, 10), 200);
        assert_eq!(small.dimensions(), (40, 10));
    }
}
