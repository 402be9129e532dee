//! Frame export: readback post-processing and PNG encoding.

use image::codecs::png::PngEncoder;
use image::ImageEncoder;

use crate::error::ExportError;

/// Suggested download name for exported frames.
pub const EXPORT_FILE_NAME: &str = "avatar.png";

/// wgpu requires texture-to-buffer copies to use row strides that are a
/// multiple of this.
pub const ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Round a tight row size up to the copy alignment.
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    unpadded.div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT
}

/// Drop the per-row alignment padding from a readback buffer, producing
/// tightly packed pixel rows.
pub fn strip_row_padding(data: &[u8], padded: u32, unpadded: u32, height: u32) -> Vec<u8> {
    if padded == unpadded {
        return data[..(unpadded * height) as usize].to_vec();
    }
    let mut out = Vec::with_capacity((unpadded * height) as usize);
    for row in 0..height {
        let start = (row * padded) as usize;
        out.extend_from_slice(&data[start..start + unpadded as usize]);
    }
    out
}

/// Encode tightly packed RGBA pixels as a PNG.
pub fn encode_png(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(pixels, width, height, image::ExtendedColorType::Rgba8)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(bytes)
}
