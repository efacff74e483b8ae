//! Offline alpha extraction.
//!
//! Sprites are grouped by the atlas the packer put them in. Each group is
//! redrawn into a blank target the size of its atlas, using the pre-pack UVs
//! as sample coordinates and the post-pack UVs as positions, which reproduces
//! the atlas layout. The target's alpha is then stored as opaque grayscale.

pub mod encode;
pub mod raster;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::Vec2;
use log::{debug, info};

use crate::error::{AtlasError, Result};
use crate::packer::{Sprite, SpritePacker};
use crate::texture::{PixelFormat, Texture, TextureId};

pub use encode::{derived_name, encode_alpha_grayscale, DERIVED_SUFFIX};
pub use raster::draw_triangle;

/// A packed sprite ready to be drawn into its atlas group.
#[derive(Debug, Clone)]
pub struct SpriteEntry<'a> {
    pub sprite: &'a Sprite,
    /// Pre-pack UVs, index-aligned with `atlas_uvs`.
    pub uvs: &'a [Vec2],
    pub atlas: Arc<Texture>,
    pub atlas_uvs: Vec<Vec2>,
}

impl SpriteEntry<'_> {
    pub fn texture(&self) -> &Arc<Texture> {
        self.sprite.source_texture()
    }
}

/// All entries that share one atlas texture.
#[derive(Debug, Clone)]
pub struct AtlasGroup<'a> {
    pub atlas: Arc<Texture>,
    pub entries: Vec<SpriteEntry<'a>>,
}

/// Pick out the sprites that carry extractable alpha and pair them with their
/// packing results. Unpacked, unassigned and non-RGBA sprites are skipped.
pub fn collect_entries<'a, P>(sprites: &'a [Sprite], packer: &P) -> Result<Vec<SpriteEntry<'a>>>
where
    P: SpritePacker + ?Sized,
{
    let mut entries = Vec::new();
    for sprite in sprites {
        if !sprite.packed {
            continue;
        }
        let Some(atlas_id) = packer.atlas_for(sprite) else {
            debug!("sprite '{}' has no atlas, skipping", sprite.name);
            continue;
        };
        let format = sprite.source_texture().format();
        if !format.is_four_channel() {
            debug!("sprite '{}' source format {:?} has no alpha, skipping", sprite.name, format);
            continue;
        }
        let atlas = packer
            .atlas_texture(atlas_id)
            .ok_or_else(|| AtlasError::MissingAtlasTexture {
                sprite: sprite.name.clone(),
                atlas_id: atlas_id.0,
            })?;
        let atlas_uvs = packer.atlas_uvs(sprite).unwrap_or_default();
        if atlas_uvs.len() != sprite.uvs.len() {
            return Err(AtlasError::UvLengthMismatch {
                sprite: sprite.name.clone(),
                pre: sprite.uvs.len(),
                post: atlas_uvs.len(),
            });
        }
        entries.push(SpriteEntry {
            sprite,
            uvs: &sprite.uvs,
            atlas,
            atlas_uvs,
        });
    }
    Ok(entries)
}

/// Group entries by atlas identity, in order of first appearance.
pub fn group_by_atlas(entries: Vec<SpriteEntry<'_>>) -> Vec<AtlasGroup<'_>> {
    let mut index: HashMap<TextureId, usize> = HashMap::new();
    let mut groups: Vec<AtlasGroup<'_>> = Vec::new();
    for entry in entries {
        let id = entry.atlas.id();
        match index.get(&id) {
            Some(&i) => groups[i].entries.push(entry),
            None => {
                index.insert(id, groups.len());
                groups.push(AtlasGroup {
                    atlas: Arc::clone(&entry.atlas),
                    entries: vec![entry],
                });
            }
        }
    }
    groups
}

/// Redraw every sprite of a group into a transparent target sized to the atlas.
pub fn rasterize_group(group: &AtlasGroup<'_>) -> Result<Texture> {
    let atlas = &group.atlas;
    let mut target = Texture::new(atlas.name(), atlas.width(), atlas.height(), PixelFormat::Rgba32);

    for entry in &group.entries {
        let triangles = &entry.sprite.triangles;
        if triangles.len() % 3 != 0 {
            return Err(AtlasError::MalformedTriangles {
                atlas: atlas.name().to_string(),
                sprite: entry.sprite.name.clone(),
                len: triangles.len(),
            });
        }
        let vertices = entry.uvs.len();
        for tri in triangles.chunks_exact(3) {
            if let Some(&index) = tri.iter().find(|&&i| i as usize >= vertices) {
                return Err(AtlasError::TriangleIndexOutOfRange {
                    atlas: atlas.name().to_string(),
                    sprite: entry.sprite.name.clone(),
                    index,
                    vertices,
                });
            }
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            draw_triangle(
                &mut target,
                entry.texture(),
                [entry.atlas_uvs[a], entry.atlas_uvs[b], entry.atlas_uvs[c]],
                [entry.uvs[a], entry.uvs[b], entry.uvs[c]],
            );
        }
    }
    Ok(target)
}

/// Build one grayscale alpha texture per atlas, keyed by derived name.
pub fn create_alpha_atlas_textures<P>(sprites: &[Sprite], packer: &P) -> Result<BTreeMap<String, Texture>>
where
    P: SpritePacker + ?Sized,
{
    let groups = group_by_atlas(collect_entries(sprites, packer)?);
    let mut sources: HashMap<String, String> = HashMap::new();
    let mut result = BTreeMap::new();

    for group in &groups {
        let atlas_name = group.atlas.name();
        let name = derived_name(atlas_name)?;
        if let Some(first) = sources.get(&name) {
            return Err(AtlasError::DuplicateDerivedName {
                derived: name,
                first: first.clone(),
                second: atlas_name.to_string(),
            });
        }

        let rendered = rasterize_group(group)?;
        let alpha = encode_alpha_grayscale(&rendered, name.as_str());
        debug!(
            "atlas '{}' -> '{}' ({}x{}, {} sprites)",
            atlas_name,
            name,
            alpha.width(),
            alpha.height(),
            group.entries.len()
        );
        sources.insert(name.clone(), atlas_name.to_string());
        result.insert(name, alpha);
    }

    info!("extracted {} alpha atlases", result.len());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::MemoryPacker;
    use crate::texture::Rgba8;

    fn sprite_with_alpha(name: &str, size: u32, alpha: u8, format: PixelFormat) -> Sprite {
        let pixels = vec![Rgba8::new(200, 100, 50, alpha); (size * size) as usize];
        let tex = Texture::from_pixels(name, size, size, format, pixels).unwrap();
        Sprite::new(name, Arc::new(tex))
    }

    #[test]
    fn derived_texture_matches_atlas_layout() {
        let a = sprite_with_alpha("a", 4, 255, PixelFormat::Rgba32);
        let b = sprite_with_alpha("b", 4, 64, PixelFormat::Rgba32);
        let mut packer = MemoryPacker::new();
        let atlas = packer.add_atlas(Texture::new("ui-0", 8, 8, PixelFormat::Compressed));
        packer.place_scaled(&a, atlas, Vec2::new(0.0, 0.0), Vec2::splat(0.5));
        packer.place_scaled(&b, atlas, Vec2::new(0.5, 0.5), Vec2::splat(0.5));

        let out = create_alpha_atlas_textures(&[a, b], &packer).unwrap();
        assert_eq!(out.len(), 1);
        let tex = &out["ui-fmt32"];
        assert_eq!(tex.size(), glam::UVec2::new(8, 8));

        for y in 0..8 {
            for x in 0..8 {
                let px = tex.get(x, y).unwrap();
                let expected = match (x < 4, y >= 4) {
                    (true, true) => 255,   // a: bottom-left
                    (false, false) => 64,  // b: top-right
                    _ => 0,
                };
                assert_eq!(px, Rgba8::gray(expected), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn non_rgba_sprites_contribute_nothing() {
        let opaque = sprite_with_alpha("opaque", 4, 255, PixelFormat::Rgb24);
        let mut packer = MemoryPacker::new();
        let atlas = packer.add_atlas(Texture::new("solid-0", 4, 4, PixelFormat::Compressed));
        packer.place_scaled(&opaque, atlas, Vec2::ZERO, Vec2::ONE);

        let out = create_alpha_atlas_textures(&[opaque], &packer).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn unpacked_and_unassigned_sprites_are_skipped() {
        let loose = sprite_with_alpha("loose", 2, 255, PixelFormat::Rgba32);
        let unpacked = sprite_with_alpha("unpacked", 2, 255, PixelFormat::Rgba32).with_packed(false);
        let mut packer = MemoryPacker::new();
        let atlas = packer.add_atlas(Texture::new("ui-0", 2, 2, PixelFormat::Rgba32));
        packer.place_scaled(&unpacked, atlas, Vec2::ZERO, Vec2::ONE);

        let sprites = [loose, unpacked];
        assert!(collect_entries(&sprites, &packer).unwrap().is_empty());
    }

    #[test]
    fn groups_by_atlas_identity_not_name() {
        let a = sprite_with_alpha("a", 2, 255, PixelFormat::Rgba32);
        let b = sprite_with_alpha("b", 2, 255, PixelFormat::Rgba32);
        let c = sprite_with_alpha("c", 2, 255, PixelFormat::Rgba32);
        let mut packer = MemoryPacker::new();
        let first = packer.add_atlas(Texture::new("ui-0", 4, 4, PixelFormat::Rgba32));
        let second = packer.add_atlas(Texture::new("ui-0", 4, 4, PixelFormat::Rgba32));
        packer.place_scaled(&a, first, Vec2::ZERO, Vec2::splat(0.5));
        packer.place_scaled(&b, second, Vec2::ZERO, Vec2::splat(0.5));
        packer.place_scaled(&c, first, Vec2::splat(0.5), Vec2::splat(0.5));

        let sprites = [a, b, c];
        let groups = group_by_atlas(collect_entries(&sprites, &packer).unwrap());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].atlas.id(), first);
        assert_eq!(groups[0].entries.len(), 2);
        assert_eq!(groups[1].entries.len(), 1);

        // both atlases derive "ui-fmt32"
        let err = create_alpha_atlas_textures(&sprites, &packer).unwrap_err();
        assert!(matches!(err, AtlasError::DuplicateDerivedName { .. }));
    }

    #[test]
    fn tight_mesh_only_covers_its_triangles() {
        // single triangle over the lower-left half of the sprite
        let sprite = sprite_with_alpha("tri", 4, 255, PixelFormat::Rgba32).with_mesh(
            vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
            vec![0, 1, 2],
        );
        let mut packer = MemoryPacker::new();
        let atlas = packer.add_atlas(Texture::new("fx-0", 4, 4, PixelFormat::Rgba32));
        packer.place_scaled(&sprite, atlas, Vec2::ZERO, Vec2::ONE);

        let out = create_alpha_atlas_textures(&[sprite], &packer).unwrap();
        let tex = &out["fx-fmt32"];
        assert_eq!(tex.get(0, 3), Some(Rgba8::gray(255)));
        assert_eq!(tex.get(3, 0), Some(Rgba8::gray(0)));
        assert!(tex.pixels().iter().all(|p| p.a == 255));
    }

    #[test]
    fn bad_triangle_index_names_the_sprite() {
        let sprite = sprite_with_alpha("broken", 2, 255, PixelFormat::Rgba32)
            .with_mesh(vec![Vec2::ZERO, Vec2::X, Vec2::Y], vec![0, 1, 7]);
        let mut packer = MemoryPacker::new();
        let atlas = packer.add_atlas(Texture::new("ui-0", 2, 2, PixelFormat::Rgba32));
        packer.place_scaled(&sprite, atlas, Vec2::ZERO, Vec2::ONE);

        match create_alpha_atlas_textures(&[sprite], &packer) {
            Err(AtlasError::TriangleIndexOutOfRange { sprite, atlas, index, .. }) => {
                assert_eq!(sprite, "broken");
                assert_eq!(atlas, "ui-0");
                assert_eq!(index, 7);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn partial_triangle_list_fails() {
        let sprite = sprite_with_alpha("s", 2, 255, PixelFormat::Rgba32)
            .with_mesh(vec![Vec2::ZERO, Vec2::X, Vec2::Y, Vec2::ONE], vec![0, 1, 2, 3]);
        let mut packer = MemoryPacker::new();
        let atlas = packer.add_atlas(Texture::new("ui-0", 2, 2, PixelFormat::Rgba32));
        packer.place_scaled(&sprite, atlas, Vec2::ZERO, Vec2::ONE);

        match create_alpha_atlas_textures(&[sprite], &packer) {
            Err(AtlasError::MalformedTriangles { atlas, sprite, len }) => {
                assert_eq!(atlas, "ui-0");
                assert_eq!(sprite, "s");
                assert_eq!(len, 4);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    /// Packer that assigns sprites to atlases but has lost the textures.
    struct LostAtlases(MemoryPacker);

    impl SpritePacker for LostAtlases {
        fn atlas_for(&self, sprite: &Sprite) -> Option<TextureId> {
            self.0.atlas_for(sprite)
        }

        fn atlas_uvs(&self, sprite: &Sprite) -> Option<Vec<Vec2>> {
            self.0.atlas_uvs(sprite)
        }

        fn atlas_texture(&self, _id: TextureId) -> Option<Arc<Texture>> {
            None
        }
    }

    #[test]
    fn unknown_atlas_texture_fails() {
        use crate::assets::manifest::AlphaAtlasManifest;
        use crate::assets::registry::AlphaTextureRegistry;
        use crate::assets::store::ResourceCache;
        use crate::bundle::BundleSwap;
        use crate::config::StorageConfig;

        let sprite = sprite_with_alpha("s", 2, 255, PixelFormat::Rgba32);
        let mut inner = MemoryPacker::new();
        let atlas = inner.add_atlas(Texture::new("ui-0", 2, 2, PixelFormat::Rgba32));
        inner.place_scaled(&sprite, atlas, Vec2::ZERO, Vec2::ONE);
        let packer = LostAtlases(inner);

        let mut sprites = vec![sprite];
        match create_alpha_atlas_textures(&sprites, &packer) {
            Err(AtlasError::MissingAtlasTexture { sprite, atlas_id }) => {
                assert_eq!(sprite, "s");
                assert_eq!(atlas_id, atlas.0);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let dir = tempfile::tempdir().unwrap();
        let mut registry = AlphaTextureRegistry::from_manifest(
            &AlphaAtlasManifest::default(),
            ResourceCache::new(StorageConfig::default().with_root(dir.path())),
        );
        let before = sprites[0].render.clone();
        match BundleSwap::apply(&mut sprites, &packer, &mut registry) {
            Err(AtlasError::MissingAtlasTexture { sprite, atlas_id }) => {
                assert_eq!(sprite, "s");
                assert_eq!(atlas_id, atlas.0);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(sprites[0].render, before);
    }

    #[test]
    fn mismatched_atlas_uvs_fail() {
        let sprite = sprite_with_alpha("a", 2, 255, PixelFormat::Rgba32);
        let mut packer = MemoryPacker::new();
        let atlas = packer.add_atlas(Texture::new("ui-0", 2, 2, PixelFormat::Rgba32));
        packer.place("a", atlas, vec![Vec2::ZERO]);

        let err = create_alpha_atlas_textures(&[sprite], &packer).unwrap_err();
        assert!(matches!(err, AtlasError::UvLengthMismatch { pre: 4, post: 1, .. }));
    }

    #[test]
    fn extraction_is_repeatable() {
        let a = sprite_with_alpha("a", 4, 77, PixelFormat::Rgba32);
        let mut packer = MemoryPacker::new();
        let atlas = packer.add_atlas(Texture::new("ui-0", 8, 8, PixelFormat::Rgba32));
        packer.place_scaled(&a, atlas, Vec2::splat(0.25), Vec2::splat(0.5));

        let sprites = [a];
        let first = create_alpha_atlas_textures(&sprites, &packer).unwrap();
        let second = create_alpha_atlas_textures(&sprites, &packer).unwrap();
        assert_eq!(first["ui-fmt32"].pixels(), second["ui-fmt32"].pixels());
    }
}
