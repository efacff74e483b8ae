use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// Where derived alpha atlases and their manifest live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Resource root holding the manifest and images (default: `Resources/TextureAlphaAtlas`).
    pub root: PathBuf,
    /// Manifest asset name, without extension (default: `AlphaAtlasConfig`).
    pub manifest_name: String,
    /// Appended to a derived name to form its image asset name (default: `_alpha`).
    pub alpha_suffix: String,
    /// Image file extension (default: `png`).
    pub image_extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("Resources/TextureAlphaAtlas"),
            manifest_name: "AlphaAtlasConfig".to_string(),
            alpha_suffix: "_alpha".to_string(),
            image_extension: "png".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    pub fn with_alpha_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.alpha_suffix = suffix.into();
        self
    }

    /// Path of the manifest file.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(format!("{}.json", self.manifest_name))
    }

    /// Asset name of the image for a derived texture: `<name><alpha_suffix>`.
    pub fn alpha_asset_name(&self, derived: &str) -> String {
        format!("{}{}", derived, self.alpha_suffix)
    }

    /// Resolve an image asset name to a file under the root.
    ///
    /// Names that are absolute or climb out of the root are rejected with
    /// [`AtlasError::UnsupportedLocation`].
    pub fn image_path(&self, asset: &str) -> Result<PathBuf> {
        let inside_root = !asset.is_empty()
            && Path::new(asset)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !inside_root {
            return Err(AtlasError::UnsupportedLocation(asset.to_string()));
        }
        Ok(self.root.join(format!("{}.{}", asset, self.image_extension)))
    }
}
