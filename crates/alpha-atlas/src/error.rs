use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by atlas extraction, rect remapping and asset storage.
///
/// Runtime lookups through the registry never surface these; they degrade to
/// a miss instead.
#[derive(Error, Debug)]
pub enum AtlasError {
    /// No vertex differs from vertex 0 in U, or none differs in V.
    #[error("degenerate UVs: no vertex differs from vertex 0 in U (or in V), got {count} vertices")]
    DegenerateUvs {
        /// Number of vertices supplied.
        count: usize,
    },

    /// Pre-pack and post-pack UV sets do not line up.
    #[error("UV length mismatch for sprite '{sprite}': {pre} pre-pack vs {post} post-pack")]
    UvLengthMismatch {
        sprite: String,
        pre: usize,
        post: usize,
    },

    /// A triangle references a vertex the UV set does not have.
    #[error("sprite '{sprite}' in atlas '{atlas}': triangle index {index} out of range for {vertices} vertices")]
    TriangleIndexOutOfRange {
        atlas: String,
        sprite: String,
        index: u32,
        vertices: usize,
    },

    /// Triangle index list length is not a multiple of three.
    #[error("sprite '{sprite}' in atlas '{atlas}': {len} triangle indices is not a multiple of 3")]
    MalformedTriangles {
        atlas: String,
        sprite: String,
        len: usize,
    },

    /// The packer assigned a sprite to an atlas it cannot return.
    #[error("sprite '{sprite}' assigned to atlas texture {atlas_id} which the packer does not provide")]
    MissingAtlasTexture { sprite: String, atlas_id: u32 },

    /// Atlas texture name carries no `-<suffix>` to replace.
    #[error("atlas texture name '{0}' has no '-' suffix to replace")]
    AtlasNameWithoutSuffix(String),

    /// Two distinct atlases map to the same derived texture name.
    #[error("atlases '{first}' and '{second}' both derive alpha texture '{derived}'")]
    DuplicateDerivedName {
        derived: String,
        first: String,
        second: String,
    },

    /// Loading from outside the resource root is not implemented.
    #[error("loading '{0}' outside the resource root is not implemented")]
    UnsupportedLocation(String),

    /// Wraps a geometry error with the sprite it came from.
    #[error("sprite '{sprite}': {source}")]
    InSprite {
        sprite: String,
        #[source]
        source: Box<AtlasError>,
    },

    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl AtlasError {
    /// Attach the sprite name to an error raised without it.
    pub fn in_sprite(self, sprite: &str) -> Self {
        match self {
            AtlasError::UvLengthMismatch { pre, post, .. } => AtlasError::UvLengthMismatch {
                sprite: sprite.to_string(),
                pre,
                post,
            },
            other => AtlasError::InSprite {
                sprite: sprite.to_string(),
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;
