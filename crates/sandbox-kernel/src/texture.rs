//! Texture loading for the quad batch.
//!
//! Images are decoded as RGB8 and expanded to opaque RGBA8 before upload,
//! since wgpu has no three-channel texture formats.

use std::path::{Path, PathBuf};

use sandbox_common::AssetError;
use tracing::debug;
use wgpu::{Device, Queue};

/// Color format for every sandbox texture.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// A decoded RGB8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGB bytes, row-major from the top
    pub rgb: Vec<u8>,
}

impl DecodedImage {
    /// Expands the RGB data into opaque RGBA.
    #[must_use]
    pub fn to_rgba8(&self) -> Vec<u8> {
        rgb_to_rgba(&self.rgb)
    }
}

/// Expands packed RGB bytes to RGBA with alpha 255.
#[must_use]
pub fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    rgba
}

/// Reads and decodes an image file as RGB8.
pub fn decode_rgb8(path: impl AsRef<Path>) -> Result<DecodedImage, AssetError> {
    let path = path.as_ref();

    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AssetError::NotFound(path.to_path_buf())
        } else {
            AssetError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        }
    })?;

    let img = image::load_from_memory(&bytes).map_err(|e| AssetError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    debug!("Decoded {} ({}x{})", path.display(), width, height);

    Ok(DecodedImage {
        width,
        height,
        rgb: rgb.into_raw(),
    })
}

/// Generates an RGBA checkerboard of `size x size` pixels.
#[must_use]
pub fn checkerboard_pixels(size: u32, cell: u32) -> Vec<u8> {
    let cell = cell.max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let light = ((x / cell) + (y / cell)) % 2 == 0;
            let v = if light { 0xCC } else { 0x66 };
            pixels.extend_from_slice(&[v, v, v, 0xFF]);
        }
    }
    pixels
}

/// A texture ready to be bound to a slot.
pub struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    /// Where the texture came from, if it was loaded from disk
    source: Option<PathBuf>,
}

impl GpuTexture {
    /// Uploads RGBA8 pixels.
    #[must_use]
    pub fn from_rgba8(
        device: &Device,
        queue: &Queue,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
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
            rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            source: None,
        }
    }

    /// A 1x1 opaque white texture.
    #[must_use]
    pub fn white(device: &Device, queue: &Queue) -> Self {
        Self::from_rgba8(device, queue, "White Texture", 1, 1, &[255, 255, 255, 255])
    }

    /// A 64x64 grey checkerboard.
    #[must_use]
    pub fn checkerboard(device: &Device, queue: &Queue) -> Self {
        Self::from_rgba8(
            device,
            queue,
            "Checkerboard Texture",
            64,
            64,
            &checkerboard_pixels(64, 8),
        )
    }

    /// Decodes an image file and uploads it.
    pub fn load(device: &Device, queue: &Queue, path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let image = decode_rgb8(path)?;
        let label = path.display().to_string();
        let mut texture = Self::from_rgba8(
            device,
            queue,
            &label,
            image.width,
            image.height,
            &image.to_rgba8(),
        );
        texture.source = Some(path.to_path_buf());
        debug!("Uploaded texture {}", label);
        Ok(texture)
    }

    /// View for binding.
    #[must_use]
    pub const fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Texture dimensions.
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// File the texture was loaded from.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTexture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
