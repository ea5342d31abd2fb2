//! Functions to preprocess images.

use fast_image_resize::{
    images::{CroppedImageMut, Image as FirImage, ImageRef},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use ndarray::Array4;

use crate::error::InferenceError;

pub const PAD_VALUE: u8 = 114;

/// Model input built from one image, with the scale needed to map boxes back.
#[derive(Debug, Clone)]
pub struct Letterboxed {
    /// `[1, 3, size, size]`, values in `[0, 1]`.
    pub tensor: Array4<f32>,
    /// `model pixels / image pixels`.
    pub ratio: f32,
    pub image_width: u32,
    pub image_height: u32,
}

fn preprocess_err(err: impl std::fmt::Display) -> InferenceError {
    InferenceError::Preprocess(err.to_string())
}

/// Resizes `image` into a `size x size` canvas filled with [`PAD_VALUE`],
/// keeping the aspect ratio and placing the image in the top-left corner.
pub fn letterbox(image: &RgbImage, size: u32) -> Result<Letterboxed, InferenceError> {
    let (w0, h0) = image.dimensions();
    if w0 == 0 || h0 == 0 {
        return Err(InferenceError::InvalidImage { width: w0, height: h0 });
    }

    let ratio = (size as f32 / w0 as f32).min(size as f32 / h0 as f32);
    let new_w = ((w0 as f32 * ratio).round() as u32).clamp(1, size);
    let new_h = ((h0 as f32 * ratio).round() as u32).clamp(1, size);

    let src = ImageRef::new(w0, h0, image.as_raw(), PixelType::U8x3).map_err(preprocess_err)?;
    let mut padded = FirImage::from_vec_u8(
        size,
        size,
        vec![PAD_VALUE; (size * size * 3) as usize],
        PixelType::U8x3,
    )
    .map_err(preprocess_err)?;

    {
        let mut cropped = CroppedImageMut::new(&mut padded, 0, 0, new_w, new_h).map_err(preprocess_err)?;
        let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
        Resizer::new()
            .resize(&src, &mut cropped, &options)
            .map_err(preprocess_err)?;
    }

    let tensor = nchw_normalize(padded.buffer(), size as usize, size as usize)?;
    Ok(Letterboxed {
        tensor,
        ratio,
        image_width: w0,
        image_height: h0,
    })
}

/// Interleaved RGB bytes to a planar `[1, 3, h, w]` tensor scaled by 1/255.
pub fn nchw_normalize(buf: &[u8], h: usize, w: usize) -> Result<Array4<f32>, InferenceError> {
    let hw = w * h;
    if buf.len() != hw * 3 {
        return Err(InferenceError::Preprocess(format!(
            "Unexpected buffer size: got {}, expected {}",
            buf.len(),
            hw * 3
        )));
    }

    let mut out = vec![0.0f32; buf.len()];
    for (i, px) in buf.chunks_exact(3).enumerate() {
        out[i] = px[0] as f32 / 255.0;
        out[i + hw] = px[1] as f32 / 255.0;
        out[i + 2 * hw] = px[2] as f32 / 255.0;
    }

    Array4::from_shape_vec((1, 3, h, w), out).map_err(preprocess_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn wide_image_is_padded_below() {
        let image = RgbImage::from_pixel(64, 32, Rgb([255, 0, 0]));
        let lb = letterbox(&image, 32).unwrap();

        assert_eq!(lb.tensor.dim(), (1, 3, 32, 32));
        assert!((lb.ratio - 0.5).abs() < 1e-6);
        // image occupies rows 0..16
        assert!((lb.tensor[[0, 0, 4, 4]] - 1.0).abs() < 1e-3);
        assert!(lb.tensor[[0, 1, 4, 4]].abs() < 1e-3);
        // padding below it
        let pad = PAD_VALUE as f32 / 255.0;
        assert!((lb.tensor[[0, 0, 24, 4]] - pad).abs() < 1e-6);
        assert!((lb.tensor[[0, 2, 31, 31]] - pad).abs() < 1e-6);
    }

    #[test]
    fn empty_image_is_rejected() {
        let image = RgbImage::new(0, 10);
        assert!(matches!(
            letterbox(&image, 32),
            Err(InferenceError::InvalidImage { width: 0, height: 10 })
        ));
    }

    #[test]
    fn planar_layout() {
        let buf = [10u8, 20, 30, 40, 50, 60];
        let t = nchw_normalize(&buf, 1, 2).unwrap();
        assert!((t[[0, 0, 0, 1]] - 40.0 / 255.0).abs() < 1e-6);
        assert!((t[[0, 2, 0, 0]] - 30.0 / 255.0).abs() < 1e-6);
        assert!(nchw_normalize(&buf, 2, 2).is_err());
    }
}
