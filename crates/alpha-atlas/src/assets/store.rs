//! On-disk storage of derived alpha atlases.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::assets::manifest::AlphaAtlasManifest;
use crate::config::StorageConfig;
use crate::error::{AtlasError, Result};
use crate::extract::create_alpha_atlas_textures;
use crate::packer::{Sprite, SpritePacker};
use crate::texture::Texture;

/// Where the registry fetches textures from.
///
/// Implementors own the loaded textures; callers only get shared handles and
/// must not assume a texture stays loaded after their handle is dropped.
pub trait TextureSource {
    /// Load an image asset by name (e.g. `"ui-fmt32_alpha"`). None if missing or unreadable.
    fn load(&mut self, asset: &str) -> Option<Arc<Texture>>;

    /// Release a texture previously returned by `load`.
    fn unload(&mut self, texture: &Arc<Texture>);
}

/// Disk-backed resource cache rooted at [`StorageConfig::root`].
///
/// Holds the only long-lived strong handle to each loaded texture, so
/// [`ResourceCache::reclaim_unused`] frees anything no one else is using.
pub struct ResourceCache {
    config: StorageConfig,
    loaded: HashMap<String, Arc<Texture>>,
}

impl ResourceCache {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            loaded: HashMap::new(),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Decode an image asset from disk, bypassing the cache.
    pub fn read(&self, asset: &str) -> Result<Texture> {
        let path = self.config.image_path(asset)?;
        let image = image::open(&path).map_err(|source| AtlasError::Image {
            path: path.clone(),
            source,
        })?;
        Ok(Texture::from_rgba_image(asset, image.to_rgba8()))
    }

    /// Number of textures currently held.
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_loaded(&self, asset: &str) -> bool {
        self.loaded.contains_key(asset)
    }

    /// Drop every texture nothing outside the cache refers to. Returns how many were freed.
    pub fn reclaim_unused(&mut self) -> usize {
        let before = self.loaded.len();
        self.loaded.retain(|_, tex| Arc::strong_count(tex) > 1);
        let freed = before - self.loaded.len();
        if freed > 0 {
            debug!("reclaimed {} unused textures", freed);
        }
        freed
    }
}

impl TextureSource for ResourceCache {
    fn load(&mut self, asset: &str) -> Option<Arc<Texture>> {
        if let Some(tex) = self.loaded.get(asset) {
            return Some(Arc::clone(tex));
        }
        match self.read(asset) {
            Ok(tex) => {
                debug!("loaded '{}' ({}x{})", asset, tex.width(), tex.height());
                let tex = Arc::new(tex);
                self.loaded.insert(asset.to_string(), Arc::clone(&tex));
                Some(tex)
            }
            Err(e) => {
                warn!("failed to load '{}': {}", asset, e);
                None
            }
        }
    }

    fn unload(&mut self, texture: &Arc<Texture>) {
        self.loaded.retain(|_, tex| !Arc::ptr_eq(tex, texture));
    }
}

/// Write derived textures as `<root>/<name><alpha_suffix>.<ext>` plus the
/// manifest listing their names. Returns the manifest written.
pub fn write_alpha_atlases(
    config: &StorageConfig,
    textures: &BTreeMap<String, Texture>,
) -> Result<AlphaAtlasManifest> {
    fs::create_dir_all(&config.root).map_err(|source| AtlasError::Io {
        path: config.root.clone(),
        source,
    })?;

    for (name, texture) in textures {
        let path = config.image_path(&config.alpha_asset_name(name))?;
        texture
            .to_rgba_image()
            .save(&path)
            .map_err(|source| AtlasError::Image {
                path: path.clone(),
                source,
            })?;
        debug!("wrote {}", path.display());
    }

    let manifest = AlphaAtlasManifest::new(textures.keys().cloned().collect());
    manifest.save(&config.manifest_path())?;
    info!(
        "wrote {} alpha atlases and manifest to {}",
        manifest.len(),
        config.root.display()
    );
    Ok(manifest)
}

/// Extract every atlas and persist the result in one step.
pub fn save_alpha_atlases<P>(sprites: &[Sprite], packer: &P, config: &StorageConfig) -> Result<AlphaAtlasManifest>
where
    P: SpritePacker + ?Sized,
{
    let textures = create_alpha_atlas_textures(sprites, packer)?;
    write_alpha_atlases(config, &textures)
}
