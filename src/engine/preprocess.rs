//! Image preprocessing for detection and embedding

use anyhow::Result;
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};
use ndarray::Array4;

/// Input size for the embedding model.
pub const EMBEDDER_INPUT_SIZE: (u32, u32) = (112, 112);

/// Decode image bytes with EXIF orientation handling.
///
/// Phone cameras often store rotation as an EXIF tag instead of
/// rotating pixels; detection accuracy depends on the upright image.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(data)?;
    Ok(apply_exif_orientation(data, image))
}

fn apply_exif_orientation(data: &[u8], image: DynamicImage) -> DynamicImage {
    use std::io::Cursor;

    let orientation = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif_data) => exif_data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1) as u8,
        Err(_) => 1,
    };

    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Resize preserving aspect ratio, centered on a black canvas of the
/// target size.
pub fn resize_with_padding(image: &DynamicImage, target_w: u32, target_h: u32) -> DynamicImage {
    let (orig_w, orig_h) = image.dimensions();

    let scale = f32::min(
        target_w as f32 / orig_w as f32,
        target_h as f32 / orig_h as f32,
    );
    let new_w = ((orig_w as f32 * scale) as u32).max(1);
    let new_h = ((orig_h as f32 * scale) as u32).max(1);

    let resized = image.resize_exact(new_w, new_h, image::imageops::FilterType::Lanczos3);

    let mut padded = ImageBuffer::from_pixel(target_w, target_h, Rgb([0u8, 0, 0]));
    let offset_x = (target_w - new_w) / 2;
    let offset_y = (target_h - new_h) / 2;

    let rgb = resized.to_rgb8();
    for y in 0..new_h {
        for x in 0..new_w {
            padded.put_pixel(x + offset_x, y + offset_y, *rgb.get_pixel(x, y));
        }
    }

    DynamicImage::ImageRgb8(padded)
}

/// Convert an image to an NCHW tensor, BGR channel order, values
/// normalized to [-1, 1] as `(pixel - 127.5) / 128`.
pub fn image_to_nchw(image: &DynamicImage) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for y in 0..height {
        for x in 0..width {
            let pixel = rgb.get_pixel(x, y);
            tensor[[0, 0, y as usize, x as usize]] = (pixel[2] as f32 - 127.5) / 128.0; // B
            tensor[[0, 1, y as usize, x as usize]] = (pixel[1] as f32 - 127.5) / 128.0; // G
            tensor[[0, 2, y as usize, x as usize]] = (pixel[0] as f32 - 127.5) / 128.0; // R
        }
    }

    tensor
}

/// Crop a face region with a relative margin, clamped to image bounds.
pub fn crop_face(image: &DynamicImage, x1: f32, y1: f32, x2: f32, y2: f32, margin: f32) -> DynamicImage {
    let (img_w, img_h) = image.dimensions();

    let w = x2 - x1;
    let h = y2 - y1;
    let margin_x = w * margin;
    let margin_y = h * margin;

    let cx1 = (x1 - margin_x).max(0.0) as u32;
    let cy1 = (y1 - margin_y).max(0.0) as u32;
    let cx2 = ((x2 + margin_x).min(img_w as f32) as u32).max(cx1 + 1).min(img_w);
    let cy2 = ((y2 + margin_y).min(img_h as f32) as u32).max(cy1 + 1).min(img_h);

    image.crop_imm(cx1, cy1, cx2 - cx1, cy2 - cy1)
}

/// Mapping between the detector's padded working resolution and the
/// original image coordinates.
pub struct ResizeInfo {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl ResizeInfo {
    pub fn new(original: (u32, u32), target: (u32, u32)) -> Self {
        let (orig_w, orig_h) = original;
        let (target_w, target_h) = target;

        let scale = f32::min(
            target_w as f32 / orig_w as f32,
            target_h as f32 / orig_h as f32,
        );
        let new_w = (orig_w as f32 * scale) as u32;
        let new_h = (orig_h as f32 * scale) as u32;

        Self {
            scale,
            offset_x: (target_w - new_w) / 2,
            offset_y: (target_h - new_h) / 2,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Map working-resolution coordinates back to the original image.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let x = (x - self.offset_x as f32) / self.scale;
        let y = (y - self.offset_y as f32) / self.scale;
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_info_round_trip() {
        let info = ResizeInfo::new((832, 416), (416, 416));
        assert!((info.scale - 0.5).abs() < 1e-6);
        assert_eq!(info.offset_x, 0);
        assert_eq!(info.offset_y, 104);

        let (x, y) = info.to_original(208.0, 208.0);
        assert!((x - 416.0).abs() < 1e-3);
        assert!((y - 208.0).abs() < 1e-3);
    }

    #[test]
    fn test_crop_face_clamps_to_bounds() {
        let image = DynamicImage::new_rgb8(100, 100);
        let crop = crop_face(&image, -10.0, -10.0, 120.0, 120.0, 0.2);
        assert_eq!(crop.dimensions(), (100, 100));
    }

    #[test]
    fn test_nchw_shape_and_range() {
        let image = DynamicImage::new_rgb8(4, 2);
        let tensor = image_to_nchw(&image);
        assert_eq!(tensor.shape(), &[1, 3, 2, 4]);
        // Black pixels normalize to (0 - 127.5) / 128.
        assert!((tensor[[0, 0, 0, 0]] + 127.5 / 128.0).abs() < 1e-6);
    }
}
