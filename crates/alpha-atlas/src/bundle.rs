//! Point sprites at their atlas while an asset bundle is built.
//!
//! The bundler serializes whatever render data a sprite carries, so packed
//! sprites are temporarily rewritten to reference the atlas texture, their
//! rect inside it, and the matching alpha atlas. Afterwards every sprite gets
//! its previous render data back.

use std::sync::Arc;

use log::{debug, info};

use crate::assets::registry::AlphaTextureRegistry;
use crate::assets::store::TextureSource;
use crate::error::{AtlasError, Result};
use crate::extract::derived_name;
use crate::geometry::compute_atlas_rect;
use crate::packer::{Sprite, SpritePacker, SpriteRenderData};

/// Render data saved by [`BundleSwap::apply`], keyed by sprite index.
#[must_use = "sprites stay pointed at their atlas until restore() is called"]
#[derive(Debug)]
pub struct BundleSwap {
    originals: Vec<(usize, SpriteRenderData)>,
}

impl BundleSwap {
    /// Rewrite every packed sprite to its atlas render data.
    ///
    /// Nothing is modified unless every sprite's atlas data resolves.
    pub fn apply<P, S>(
        sprites: &mut [Sprite],
        packer: &P,
        registry: &mut AlphaTextureRegistry<S>,
    ) -> Result<Self>
    where
        P: SpritePacker + ?Sized,
        S: TextureSource,
    {
        let mut swaps = Vec::new();
        for (index, sprite) in sprites.iter().enumerate() {
            if !sprite.packed {
                continue;
            }
            let Some(atlas_id) = packer.atlas_for(sprite) else {
                continue;
            };
            let atlas = packer
                .atlas_texture(atlas_id)
                .ok_or_else(|| AtlasError::MissingAtlasTexture {
                    sprite: sprite.name.clone(),
                    atlas_id: atlas_id.0,
                })?;
            let atlas_uvs = packer.atlas_uvs(sprite).unwrap_or_default();
            let rect = compute_atlas_rect(&sprite.uvs, &atlas_uvs, atlas.size())
                .map_err(|e| e.in_sprite(&sprite.name))?;
            let alpha_texture = registry.get_alpha_texture(&derived_name(atlas.name())?);
            debug!(
                "sprite '{}' -> atlas '{}' rect {:?} alpha {}",
                sprite.name,
                atlas.name(),
                rect,
                alpha_texture.is_some()
            );
            swaps.push((
                index,
                SpriteRenderData {
                    texture: Arc::clone(&atlas),
                    texture_rect: rect,
                    alpha_texture,
                },
            ));
        }

        let originals = swaps
            .into_iter()
            .map(|(index, data)| (index, std::mem::replace(&mut sprites[index].render, data)))
            .collect();
        Ok(Self { originals })
    }

    /// Put back the render data every swapped sprite had before `apply`.
    pub fn restore(self, sprites: &mut [Sprite]) {
        let count = self.originals.len();
        for (index, data) in self.originals {
            if let Some(sprite) = sprites.get_mut(index) {
                sprite.render = data;
            }
        }
        debug!("restored render data of {} sprites", count);
    }

    /// Number of sprites rewritten.
    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }
}

/// Restores a swap when dropped, including during unwinding.
struct RestoreOnDrop<'a> {
    sprites: &'a mut [Sprite],
    swap: Option<BundleSwap>,
}

impl Drop for RestoreOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(swap) = self.swap.take() {
            swap.restore(self.sprites);
        }
    }
}

/// Run `bundle` with packed sprites pointed at their atlases, then restore them.
///
/// Sprites are restored whatever `bundle` returns, and also if it panics; a
/// fallible bundler should return its own `Result` as `R`.
pub fn with_atlas_render_data<P, S, R>(
    sprites: &mut [Sprite],
    packer: &P,
    registry: &mut AlphaTextureRegistry<S>,
    bundle: impl FnOnce(&[Sprite]) -> R,
) -> Result<R>
where
    P: SpritePacker + ?Sized,
    S: TextureSource,
{
    let swap = BundleSwap::apply(sprites, packer, registry)?;
    info!("bundling with {} sprites redirected to atlases", swap.len());
    let guard = RestoreOnDrop {
        sprites,
        swap: Some(swap),
    };
    let out = bundle(&*guard.sprites);
    drop(guard);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::manifest::AlphaAtlasManifest;
    use crate::geometry::PixelRect;
    use crate::texture::{PixelFormat, Texture};
    use glam::Vec2;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FixedSource {
        held: HashMap<String, Arc<Texture>>,
    }

    impl TextureSource for FixedSource {
        fn load(&mut self, asset: &str) -> Option<Arc<Texture>> {
            let tex = Arc::new(Texture::new(asset, 16, 16, PixelFormat::Rgba32));
            self.held.insert(asset.to_string(), Arc::clone(&tex));
            Some(tex)
        }

        fn unload(&mut self, texture: &Arc<Texture>) {
            self.held.retain(|_, t| !Arc::ptr_eq(t, texture));
        }
    }

    fn setup() -> (Vec<Sprite>, crate::packer::MemoryPacker, AlphaTextureRegistry<FixedSource>) {
        let hero = Sprite::new("hero", Arc::new(Texture::new("hero", 4, 4, PixelFormat::Rgba32)));
        let loose = Sprite::new("loose", Arc::new(Texture::new("loose", 4, 4, PixelFormat::Rgba32)))
            .with_packed(false);
        let mut packer = crate::packer::MemoryPacker::new();
        let atlas = packer.add_atlas(Texture::new("ui-fmt32", 16, 16, PixelFormat::Compressed));
        packer.place_scaled(&hero, atlas, Vec2::new(0.5, 0.25), Vec2::splat(0.25));

        let manifest = AlphaAtlasManifest::new(vec!["ui-fmt32".into()]);
        let registry = AlphaTextureRegistry::from_manifest(&manifest, FixedSource::default());
        (vec![hero, loose], packer, registry)
    }

    #[test]
    fn swap_points_packed_sprites_at_atlas() {
        let (mut sprites, packer, mut registry) = setup();
        let before: Vec<_> = sprites.iter().map(|s| s.render.clone()).collect();

        let swap = BundleSwap::apply(&mut sprites, &packer, &mut registry).unwrap();
        assert_eq!(swap.len(), 1);
        let hero = &sprites[0].render;
        assert_eq!(hero.texture.name(), "ui-fmt32");
        assert_eq!(hero.texture_rect, PixelRect::new(8.0, 4.0, 4.0, 4.0));
        assert_eq!(hero.alpha_texture.as_ref().unwrap().name(), "ui-fmt32_alpha");
        assert_eq!(sprites[1].render, before[1]);

        swap.restore(&mut sprites);
        assert_eq!(sprites[0].render, before[0]);
        assert_eq!(sprites[0].render, sprites[0].source_render_data());
    }

    #[test]
    fn restores_even_when_bundling_fails() {
        let (mut sprites, packer, mut registry) = setup();
        let before = sprites[0].render.clone();

        let result = with_atlas_render_data(&mut sprites, &packer, &mut registry, |seen| {
            assert_eq!(seen[0].render.texture.name(), "ui-fmt32");
            Err::<(), _>("disk full")
        })
        .unwrap();
        assert_eq!(result, Err("disk full"));
        assert_eq!(sprites[0].render, before);
    }

    #[test]
    fn restores_when_bundling_panics() {
        let (mut sprites, packer, mut registry) = setup();
        let before = sprites[0].render.clone();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            with_atlas_render_data(&mut sprites, &packer, &mut registry, |_| -> usize {
                panic!("bundler crashed")
            })
        }));
        assert!(outcome.is_err());
        assert_eq!(sprites[0].render, before);
    }

    #[test]
    fn degenerate_sprite_aborts_without_changes() {
        let (mut sprites, mut packer, mut registry) = setup();
        let flat = Sprite::new("flat", Arc::new(Texture::new("flat", 4, 4, PixelFormat::Rgba32)))
            .with_mesh(vec![Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.5, 0.0)], vec![0, 1, 2]);
        let atlas = packer.atlas_for(&sprites[0]).unwrap();
        packer.place_scaled(&flat, atlas, Vec2::ZERO, Vec2::splat(0.25));
        sprites.push(flat);
        let before: Vec<_> = sprites.iter().map(|s| s.render.clone()).collect();

        let err = BundleSwap::apply(&mut sprites, &packer, &mut registry).unwrap_err();
        match err {
            AtlasError::InSprite { sprite, source } => {
                assert_eq!(sprite, "flat");
                assert!(matches!(*source, AtlasError::DegenerateUvs { count: 3 }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let after: Vec<_> = sprites.iter().map(|s| s.render.clone()).collect();
        assert_eq!(after, before);
    }
}
