use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use log::{debug, info, warn};

use crate::assets::manifest::AlphaAtlasManifest;
use crate::assets::store::{ResourceCache, TextureSource};
use crate::config::StorageConfig;
use crate::packer::SpriteHandle;
use crate::texture::Texture;

/// Whether a registry entry currently points at a live texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Unresolved,
    Resolved,
}

/// Runtime lookup of alpha atlases by texture name, built from an
/// [`AlphaAtlasManifest`].
///
/// Entries hold weak handles only. The [`TextureSource`] owns loaded
/// textures and may reclaim them at any time, so every lookup re-checks
/// liveness and fetches again if the texture is gone.
pub struct AlphaTextureRegistry<S: TextureSource = ResourceCache> {
    entries: HashMap<String, Weak<Texture>>,
    names: Vec<String>,
    source: S,
    alpha_suffix: String,
}

impl<S: TextureSource> AlphaTextureRegistry<S> {
    /// Build a registry with every manifest name unresolved.
    pub fn from_manifest(manifest: &AlphaAtlasManifest, source: S) -> Self {
        let mut entries = HashMap::with_capacity(manifest.names.len());
        let mut names = Vec::with_capacity(manifest.names.len());
        for name in &manifest.names {
            if entries.insert(name.clone(), Weak::new()).is_none() {
                names.push(name.clone());
            }
        }
        Self {
            entries,
            names,
            source,
            alpha_suffix: StorageConfig::default().alpha_suffix,
        }
    }

    /// Override the suffix appended to names when fetching (default `_alpha`).
    pub fn with_alpha_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.alpha_suffix = suffix.into();
        self
    }

    /// Alpha texture for a derived atlas name. None if the name is not in the
    /// manifest or the texture cannot be fetched.
    pub fn get_alpha_texture(&mut self, name: &str) -> Option<Arc<Texture>> {
        let entry = self.entries.get_mut(name)?;
        if let Some(tex) = entry.upgrade() {
            return Some(tex);
        }

        let asset = format!("{}{}", name, self.alpha_suffix);
        match self.source.load(&asset) {
            Some(tex) => {
                debug!("resolved alpha texture '{}'", asset);
                *entry = Arc::downgrade(&tex);
                Some(tex)
            }
            None => {
                warn!("alpha texture '{}' listed in manifest but not available", asset);
                None
            }
        }
    }

    /// Alpha texture for whatever texture the sprite is currently drawn from.
    pub fn get_alpha_texture_for_sprite<H>(&mut self, sprite: &H) -> Option<Arc<Texture>>
    where
        H: SpriteHandle + ?Sized,
    {
        self.get_alpha_texture(sprite.texture_name())
    }

    /// Release every live texture back to the source and mark all entries unresolved.
    pub fn unload_all_textures(&mut self) {
        let mut released = 0;
        for entry in self.entries.values_mut() {
            if let Some(tex) = entry.upgrade() {
                self.source.unload(&tex);
                released += 1;
            }
            *entry = Weak::new();
        }
        debug!("unloaded {} alpha textures", released);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// State of an entry, or None if the name is not in the manifest.
    pub fn state(&self, name: &str) -> Option<EntryState> {
        self.entries.get(name).map(|weak| {
            if weak.strong_count() > 0 {
                EntryState::Resolved
            } else {
                EntryState::Unresolved
            }
        })
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.state(name) == Some(EntryState::Resolved)
    }

    /// Manifest names in manifest order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl AlphaTextureRegistry<ResourceCache> {
    /// Load the manifest under `config.root` and build a disk-backed registry.
    ///
    /// Never fails: a missing or unreadable manifest yields an empty registry.
    pub fn open(config: StorageConfig) -> Self {
        let path = config.manifest_path();
        let manifest = match AlphaAtlasManifest::load(&path) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                info!("{} not found, alpha atlases disabled", path.display());
                AlphaAtlasManifest::default()
            }
            Err(e) => {
                warn!("failed to read {}: {}", path.display(), e);
                AlphaAtlasManifest::default()
            }
        };
        let suffix = config.alpha_suffix.clone();
        Self::from_manifest(&manifest, ResourceCache::new(config)).with_alpha_suffix(suffix)
    }
}

thread_local! {
    static REGISTRY: RefCell<Option<AlphaTextureRegistry>> = const { RefCell::new(None) };
}

/// Run `f` against this thread's registry, opening it from the default
/// storage layout on first use.
pub fn with_registry<R>(f: impl FnOnce(&mut AlphaTextureRegistry) -> R) -> R {
    REGISTRY.with(|cell| {
        let mut slot = cell.borrow_mut();
        let registry = slot.get_or_insert_with(|| AlphaTextureRegistry::open(StorageConfig::default()));
        f(registry)
    })
}

/// Replace this thread's registry, returning the previous one.
pub fn install_registry(registry: AlphaTextureRegistry) -> Option<AlphaTextureRegistry> {
    REGISTRY.with(|cell| cell.borrow_mut().replace(registry))
}
