//! Split the alpha channel of packed sprite atlases into companion grayscale
//! textures, and look those textures up again at draw time.
//!
//! Offline, [`create_alpha_atlas_textures`] redraws each atlas from its sprites
//! and [`save_alpha_atlases`] writes the results plus an [`AlphaAtlasManifest`].
//! At runtime an [`AlphaTextureRegistry`] serves them by name, loading lazily
//! and letting the resource cache reclaim anything no one is drawing.

pub mod assets;
pub mod bundle;
pub mod config;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod packer;
pub mod texture;

// Re-export key types at crate root for convenience
pub use assets::manifest::AlphaAtlasManifest;
pub use assets::registry::{install_registry, with_registry, AlphaTextureRegistry, EntryState};
pub use assets::store::{save_alpha_atlases, write_alpha_atlases, ResourceCache, TextureSource};
pub use bundle::{with_atlas_render_data, BundleSwap};
pub use config::StorageConfig;
pub use error::{AtlasError, Result};
pub use extract::{create_alpha_atlas_textures, derived_name, AtlasGroup, SpriteEntry};
pub use geometry::{compute_atlas_rect, PixelRect};
pub use packer::{MemoryPacker, Sprite, SpriteHandle, SpritePacker, SpriteRenderData};
pub use texture::{PixelFormat, Rgba8, Texture, TextureId};
