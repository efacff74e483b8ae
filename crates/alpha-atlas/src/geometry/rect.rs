//! Pixel rectangle a packed sprite occupies inside its atlas.
//!
//! The packer only reports UVs, so the rectangle is recovered by solving the
//! per-axis affine map `post = pre * scale + offset`. Each axis is solved from
//! vertex 0 and the first later vertex that differs from it on that axis.

use glam::{UVec2, Vec2};

use crate::error::{AtlasError, Result};

/// Axis-aligned rectangle in atlas pixels. Origin is the bottom-left corner of
/// the atlas, matching UV space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Scale and offset of one axis, from the first vertex pair that differs on it.
fn solve_axis(pre: &[f32], post: &[f32]) -> Option<(f32, f32)> {
    let (&pre0, &post0) = (pre.first()?, post.first()?);
    let other = pre.iter().skip(1).position(|&p| p != pre0)? + 1;
    let scale = (post0 - post[other]) / (pre0 - pre[other]);
    Some((scale, post0 - scale * pre0))
}

/// Compute the rectangle of the atlas covered by a sprite's unit UV square.
///
/// `pre` are the sprite's UVs in its own texture, `post` the same vertices in
/// atlas space. Fails with [`AtlasError::DegenerateUvs`] when every vertex
/// shares its U or its V with vertex 0, since that axis has no solution.
pub fn compute_atlas_rect(pre: &[Vec2], post: &[Vec2], atlas_size: UVec2) -> Result<PixelRect> {
    if pre.len() != post.len() {
        return Err(AtlasError::UvLengthMismatch {
            sprite: String::new(),
            pre: pre.len(),
            post: post.len(),
        });
    }
    let degenerate = || AtlasError::DegenerateUvs { count: pre.len() };

    let (pre_u, pre_v): (Vec<f32>, Vec<f32>) = pre.iter().map(|uv| (uv.x, uv.y)).unzip();
    let (post_u, post_v): (Vec<f32>, Vec<f32>) = post.iter().map(|uv| (uv.x, uv.y)).unzip();
    let (scale_x, offset_x) = solve_axis(&pre_u, &post_u).ok_or_else(degenerate)?;
    let (scale_y, offset_y) = solve_axis(&pre_v, &post_v).ok_or_else(degenerate)?;

    let size = atlas_size.as_vec2();
    let origin = Vec2::new(offset_x, offset_y) * size;
    let extent = Vec2::new(scale_x, scale_y) * size;
    Ok(PixelRect::new(origin.x, origin.y, extent.x, extent.y))
}
