//! Grayscale frame type — decoding, cropping and bilinear resize.

use crate::error::DetectionError;
use crate::types::FaceRegion;

/// A decoded 8-bit grayscale image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    /// Row-major luminance (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl GrayFrame {
    /// Wrap an existing luminance buffer, checking length and area.
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32) -> Result<Self, DetectionError> {
        if width == 0 || height == 0 {
            return Err(DetectionError::InvalidImage(format!(
                "zero-area image ({width}x{height})"
            )));
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(DetectionError::InvalidImage(format!(
                "pixel buffer length {} does not match {width}x{height} ({expected})",
                data.len()
            )));
        }
        Ok(Self { data, width, height })
    }

    /// Decode an encoded image (PNG, JPEG, ...) and convert it to luma.
    pub fn decode(bytes: &[u8]) -> Result<Self, DetectionError> {
        if bytes.is_empty() {
            return Err(DetectionError::InvalidImage("empty input".into()));
        }
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| DetectionError::InvalidImage(e.to_string()))?;
        Self::from_dynamic(&decoded)
    }

    /// Convert any decoded image to grayscale.
    pub fn from_dynamic(img: &image::DynamicImage) -> Result<Self, DetectionError> {
        let luma = img.to_luma8();
        let (width, height) = luma.dimensions();
        Self::from_raw(luma.into_raw(), width, height)
    }

    /// Copy out the pixels of `region`.
    pub fn crop(&self, region: &FaceRegion) -> Result<Self, DetectionError> {
        if region.area() == 0 {
            return Err(DetectionError::InvalidRegion(format!(
                "empty region {region:?}"
            )));
        }
        if !region.fits_within(self.width, self.height) {
            return Err(DetectionError::InvalidRegion(format!(
                "region {region:?} exceeds {}x{} frame",
                self.width, self.height
            )));
        }

        let src_w = self.width as usize;
        let (x, y) = (region.x as usize, region.y as usize);
        let (w, h) = (region.width as usize, region.height as usize);

        let mut data = Vec::with_capacity(w * h);
        for row in y..y + h {
            let start = row * src_w + x;
            data.extend_from_slice(&self.data[start..start + w]);
        }

        Ok(Self {
            data,
            width: region.width,
            height: region.height,
        })
    }

    /// Resample to `new_w` × `new_h` using bilinear interpolation.
    pub fn resize(&self, new_w: u32, new_h: u32) -> Result<Self, DetectionError> {
        if new_w == 0 || new_h == 0 {
            return Err(DetectionError::InvalidRegion(format!(
                "cannot resize to {new_w}x{new_h}"
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(DetectionError::InvalidRegion("cannot resize an empty frame".into()));
        }
        if new_w == self.width && new_h == self.height {
            return Ok(self.clone());
        }

        let data = bilinear_resize(
            &self.data,
            self.width as usize,
            self.height as usize,
            new_w as usize,
            new_h as usize,
        );
        Ok(Self {
            data,
            width: new_w,
            height: new_h,
        })
    }
}

/// Bilinear resample of a grayscale buffer with independent x/y scales.
pub(crate) fn bilinear_resize(
    frame: &[u8],
    width: usize,
    height: usize,
    new_w: usize,
    new_h: usize,
) -> Vec<u8> {
    let inv_scale_x = width as f32 / new_w as f32;
    let inv_scale_y = height as f32 / new_h as f32;

    let mut resized = vec![0u8; new_w * new_h];
    for y in 0..new_h {
        let src_y = (y as f32 + 0.5) * inv_scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
        let y1 = (y0 + 1).min(height - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..new_w {
            let src_x = (x as f32 + 0.5) * inv_scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
            let x1 = (x0 + 1).min(width - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let tl = frame[y0 * width + x0] as f32;
            let tr = frame[y0 * width + x1] as f32;
            let bl = frame[y1 * width + x0] as f32;
            let br = frame[y1 * width + x1] as f32;

            let val = tl * (1.0 - fx) * (1.0 - fy)
                + tr * fx * (1.0 - fy)
                + bl * (1.0 - fx) * fy
                + br * fx * fy;

            resized[y * new_w + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }
    resized
}
