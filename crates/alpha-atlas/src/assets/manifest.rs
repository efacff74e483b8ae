use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// Manifest listing every derived alpha atlas, by name without suffix or extension.
/// Written by extraction, read once at startup by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaAtlasManifest {
    /// Derived texture names, e.g. `"ui-fmt32"`.
    #[serde(default)]
    pub names: Vec<String>,
}

impl AlphaAtlasManifest {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Parse a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a manifest file. `Ok(None)` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(AtlasError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Write the manifest, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| AtlasError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
