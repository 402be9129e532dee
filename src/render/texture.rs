//! Texture projection: photo decode and GPU upload.
//!
//! Decoded photos are uploaded as `Rgba8UnormSrgb` - the sampler converts to
//! linear on read, which is what the lighting math expects for perceptually
//! correct colors. Rows are uploaded in decoded order (no vertical flip):
//! sphere UVs already run top-down in v.

use image::RgbaImage;

use crate::error::TextureLoadError;
use crate::render::resources::{ResourceId, ResourceKind, ResourceRegistry};

/// A GPU texture bound (or bindable) to the avatar surface.
pub struct AvatarTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub id: ResourceId,
}

impl AvatarTexture {
    /// Destroy the GPU object and release it from the registry.
    pub fn destroy(self, registry: &mut ResourceRegistry) {
        self.texture.destroy();
        registry.release(self.id);
    }
}

/// Decode an encoded raster image (PNG, JPEG, ...) to RGBA8.
///
/// Pure CPU work; the viewer runs it off-task. Failure must not touch any
/// scene state, so this returns the pixels and nothing else.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, TextureLoadError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| TextureLoadError::Decode(e.to_string()))?
        .to_rgba8();
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(TextureLoadError::EmptyImage);
    }
    Ok(decoded)
}

/// Upload decoded pixels as an sRGB texture and register it.
pub fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    registry: &mut ResourceRegistry,
    pixels: &RgbaImage,
) -> AvatarTexture {
    let (width, height) = pixels.dimensions();
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("avatar_surface"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels.as_raw(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&Default::default());
    let id = registry.register(ResourceKind::Texture);

    tracing::debug!("uploaded avatar texture {}x{} (id {})", width, height, id);

    AvatarTexture { texture, view, id }
}

/// A 1x1 white placeholder so the pipeline always has a valid binding before
/// any photo arrives; the material base color does the rest.
pub fn white_placeholder(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    registry: &mut ResourceRegistry,
) -> AvatarTexture {
    let pixels = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
    upload_rgba(device, queue, registry, &pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ImageEncoder, Rgba};

    fn tiny_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]));
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_valid_png() {
        let bytes = tiny_png(4, 3);
        let img = decode_rgba(&bytes).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(img.get_pixel(0, 0).0, [200, 100, 50, 255]);
    }

    #[test]
    fn test_decode_garbage_fails_cleanly() {
        let result = decode_rgba(b"definitely not an image");
        assert!(matches!(result, Err(TextureLoadError::Decode(_))));
    }

    #[test]
    fn test_decode_truncated_png_fails() {
        let mut bytes = tiny_png(8, 8);
        bytes.truncate(bytes.len() / 2);
        assert!(decode_rgba(&bytes).is_err());
    }
}
