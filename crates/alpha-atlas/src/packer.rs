//! Sprites and the sprite packer seam.
//!
//! Packing itself happens elsewhere; this module only describes what the
//! extractor and bundle swap read from a packer: which atlas a sprite landed
//! in and where its vertices ended up.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec2;

use crate::geometry::PixelRect;
use crate::texture::{Texture, TextureId};

/// What a renderer binds when drawing a sprite. Rewritten temporarily while
/// bundling so the sprite points at its atlas.
#[derive(Debug, Clone)]
pub struct SpriteRenderData {
    pub texture: Arc<Texture>,
    pub texture_rect: PixelRect,
    pub alpha_texture: Option<Arc<Texture>>,
}

impl PartialEq for SpriteRenderData {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.texture, &other.texture)
            && self.texture_rect == other.texture_rect
            && match (&self.alpha_texture, &other.alpha_texture) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

/// A sprite: a triangle mesh over a region of its source texture.
#[derive(Debug, Clone)]
pub struct Sprite {
    pub name: String,
    /// Pre-pack UVs in the source texture, one per mesh vertex.
    pub uvs: Vec<Vec2>,
    /// Triangle list indexing into `uvs`.
    pub triangles: Vec<u32>,
    /// Whether the packer placed this sprite into an atlas.
    pub packed: bool,
    source: Arc<Texture>,
    source_rect: PixelRect,
    pub render: SpriteRenderData,
}

impl Sprite {
    /// A sprite covering the whole texture with a two-triangle quad.
    pub fn new(name: impl Into<String>, texture: Arc<Texture>) -> Self {
        let rect = PixelRect::new(0.0, 0.0, texture.width() as f32, texture.height() as f32);
        Self {
            name: name.into(),
            uvs: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
            triangles: vec![0, 1, 2, 0, 2, 3],
            packed: true,
            source: Arc::clone(&texture),
            source_rect: rect,
            render: SpriteRenderData {
                texture,
                texture_rect: rect,
                alpha_texture: None,
            },
        }
    }

    /// Replace the mesh (tight packing). The source rect shrinks to the UV
    /// bounds of the new mesh.
    pub fn with_mesh(mut self, uvs: Vec<Vec2>, triangles: Vec<u32>) -> Self {
        if let Some(&first) = uvs.first() {
            let (min, max) = uvs
                .iter()
                .fold((first, first), |(lo, hi), &uv| (lo.min(uv), hi.max(uv)));
            let size = self.source.size().as_vec2();
            let origin = min * size;
            let extent = (max - min) * size;
            self.source_rect = PixelRect::new(origin.x, origin.y, extent.x, extent.y);
            self.render = self.source_render_data();
        }
        self.uvs = uvs;
        self.triangles = triangles;
        self
    }

    pub fn with_packed(mut self, packed: bool) -> Self {
        self.packed = packed;
        self
    }

    /// The sprite's own (unpacked) texture.
    pub fn source_texture(&self) -> &Arc<Texture> {
        &self.source
    }

    /// Render data pointing at the sprite's own texture, as originally imported.
    pub fn source_render_data(&self) -> SpriteRenderData {
        SpriteRenderData {
            texture: Arc::clone(&self.source),
            texture_rect: self.source_rect,
            alpha_texture: None,
        }
    }
}

/// Anything a UI image can draw that resolves to a backing texture name.
pub trait SpriteHandle {
    fn texture_name(&self) -> &str;
}

impl SpriteHandle for Sprite {
    /// Name of the texture currently bound for rendering.
    fn texture_name(&self) -> &str {
        self.render.texture.name()
    }
}

impl SpriteHandle for str {
    fn texture_name(&self) -> &str {
        self
    }
}

impl SpriteHandle for String {
    fn texture_name(&self) -> &str {
        self
    }
}

/// Read-only view of a packer's results.
pub trait SpritePacker {
    /// Atlas texture the sprite was placed in, if any.
    fn atlas_for(&self, sprite: &Sprite) -> Option<TextureId>;

    /// The sprite's UVs remapped into atlas space, index-aligned with `sprite.uvs`.
    fn atlas_uvs(&self, sprite: &Sprite) -> Option<Vec<Vec2>>;

    /// The atlas texture itself.
    fn atlas_texture(&self, id: TextureId) -> Option<Arc<Texture>>;
}

#[derive(Debug, Clone)]
struct Placement {
    atlas: TextureId,
    uvs: Vec<Vec2>,
}

/// Packer results held in memory, keyed by sprite name.
#[derive(Debug, Default)]
pub struct MemoryPacker {
    atlases: HashMap<TextureId, Arc<Texture>>,
    placements: HashMap<String, Placement>,
}

impl MemoryPacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an atlas texture. Returns its id for use in placements.
    pub fn add_atlas(&mut self, texture: Texture) -> TextureId {
        let id = texture.id();
        self.atlases.insert(id, Arc::new(texture));
        id
    }

    /// Record that `sprite` lives in `atlas` with the given atlas-space UVs.
    pub fn place(&mut self, sprite: &str, atlas: TextureId, atlas_uvs: Vec<Vec2>) {
        self.placements.insert(sprite.to_string(), Placement { atlas, uvs: atlas_uvs });
    }

    /// Place a sprite by scaling its UVs into an atlas region: `uv * scale + offset`.
    pub fn place_scaled(&mut self, sprite: &Sprite, atlas: TextureId, offset: Vec2, scale: Vec2) {
        let uvs = sprite.uvs.iter().map(|&uv| uv * scale + offset).collect();
        self.place(&sprite.name, atlas, uvs);
    }
}

impl SpritePacker for MemoryPacker {
    fn atlas_for(&self, sprite: &Sprite) -> Option<TextureId> {
        self.placements.get(&sprite.name).map(|p| p.atlas)
    }

    fn atlas_uvs(&self, sprite: &Sprite) -> Option<Vec<Vec2>> {
        self.placements.get(&sprite.name).map(|p| p.uvs.clone())
    }

    fn atlas_texture(&self, id: TextureId) -> Option<Arc<Texture>> {
        self.atlases.get(&id).cloned()
    }
}
