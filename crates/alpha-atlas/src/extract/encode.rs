use crate::error::{AtlasError, Result};
use crate::texture::{PixelFormat, Rgba8, Texture};

/// Suffix replacing the packer's page/format suffix on derived textures.
pub const DERIVED_SUFFIX: &str = "-fmt32";

/// Encode the alpha of `rendered` as opaque grayscale: `(a, a, a, 255)`.
pub fn encode_alpha_grayscale(rendered: &Texture, name: impl Into<String>) -> Texture {
    let mut out = Texture::new(name, rendered.width(), rendered.height(), PixelFormat::Rgba32);
    for (dst, src) in out.pixels_mut().iter_mut().zip(rendered.pixels()) {
        *dst = Rgba8::gray(src.a);
    }
    out
}

/// Derived texture name: drop everything from the last `-` and append [`DERIVED_SUFFIX`].
///
/// `"ui-1024x1024-fmt4"` becomes `"ui-1024x1024-fmt32"`.
pub fn derived_name(atlas_name: &str) -> Result<String> {
    let cut = atlas_name
        .rfind('-')
        .ok_or_else(|| AtlasError::AtlasNameWithoutSuffix(atlas_name.to_string()))?;
    Ok(format!("{}{}", &atlas_name[..cut], DERIVED_SUFFIX))
}
