use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};
use glam::{UVec2, Vec2};
use image::RgbaImage;

/// Identity of a texture asset. Two textures are "the same atlas" iff their
/// ids match, regardless of name or contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl TextureId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        TextureId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// One RGBA8 pixel. Layout matches the `image` crate's `Rgba<u8>` so pixel
/// buffers cast to bytes directly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const TRANSPARENT: Rgba8 = Rgba8 { r: 0, g: 0, b: 0, a: 0 };

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque gray with all three color channels set to `value`.
    pub const fn gray(value: u8) -> Self {
        Self { r: value, g: value, b: value, a: 255 }
    }
}

/// Pixel format of the asset a texture was imported from.
///
/// Pixels are always held as RGBA8 in memory; the format records whether the
/// source actually carried a full alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// Uncompressed 8-bit RGBA. The only format alpha is extracted from.
    #[default]
    Rgba32,
    /// Uncompressed RGB, no alpha.
    Rgb24,
    /// Single alpha channel.
    Alpha8,
    /// Block-compressed color (alpha, if any, is not recoverable).
    Compressed,
}

impl PixelFormat {
    /// Whether sprites in this format contribute to alpha extraction.
    pub fn is_four_channel(self) -> bool {
        matches!(self, PixelFormat::Rgba32)
    }
}

/// A named RGBA8 image. Rows are stored top row first.
///
/// UV space has its origin at the bottom-left corner, so `v = 1` is row 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    id: TextureId,
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<Rgba8>,
}

impl Texture {
    /// Create a fully transparent texture.
    pub fn new(name: impl Into<String>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            id: TextureId::next(),
            name: name.into(),
            width,
            height,
            format,
            pixels: vec![Rgba8::TRANSPARENT; (width as usize) * (height as usize)],
        }
    }

    /// Wrap an existing pixel buffer. Returns None if the buffer size does not
    /// match `width * height`.
    pub fn from_pixels(
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<Rgba8>,
    ) -> Option<Self> {
        if pixels.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            id: TextureId::next(),
            name: name.into(),
            width,
            height,
            format,
            pixels,
        })
    }

    /// Build from a decoded image. Decoded images are always tagged `Rgba32`.
    pub fn from_rgba_image(name: impl Into<String>, image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let pixels = bytemuck::cast_slice::<u8, Rgba8>(image.as_raw()).to_vec();
        Self {
            id: TextureId::next(),
            name: name.into(),
            width,
            height,
            format: PixelFormat::Rgba32,
            pixels,
        }
    }

    /// Copy into an `image` buffer for encoding.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let raw = self.as_bytes().to_vec();
        // Length is width * height * 4 by construction.
        RgbaImage::from_raw(self.width, self.height, raw)
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[Rgba8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Rgba8] {
        &mut self.pixels
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Pixel at column `x`, row `y` (row 0 at the top).
    pub fn get(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[(y * self.width + x) as usize])
    }

    pub fn put(&mut self, x: u32, y: u32, pixel: Rgba8) {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = pixel;
        }
    }

    /// Texel addressed by a UV coordinate, clamped to the edges.
    pub fn texel_at_uv(&self, uv: Vec2) -> (u32, u32) {
        let x = (uv.x * self.width as f32).floor();
        let y = ((1.0 - uv.y) * self.height as f32).floor();
        (
            x.clamp(0.0, self.width.saturating_sub(1) as f32) as u32,
            y.clamp(0.0, self.height.saturating_sub(1) as f32) as u32,
        )
    }

    /// UV coordinate of the center of texel `(x, y)`.
    pub fn texel_center_uv(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            1.0 - (y as f32 + 0.5) / self.height as f32,
        )
    }

    /// Nearest-texel sample. Empty textures sample as transparent.
    pub fn sample_nearest(&self, uv: Vec2) -> Rgba8 {
        if self.pixels.is_empty() {
            return Rgba8::TRANSPARENT;
        }
        let (x, y) = self.texel_at_uv(uv);
        self.pixels[(y * self.width + x) as usize]
    }
}
