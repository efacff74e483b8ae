//! CPU triangle rasterizer standing in for an off-screen render pass.

use glam::Vec2;

use crate::texture::Texture;

const EDGE_EPSILON: f32 = 1e-5;

/// Signed double area of triangle `(a, b, p)`.
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Map a UV coordinate to continuous pixel space of `target` (y down).
fn to_pixel_space(target: &Texture, uv: Vec2) -> Vec2 {
    Vec2::new(uv.x * target.width() as f32, (1.0 - uv.y) * target.height() as f32)
}

/// Draw one textured triangle.
///
/// `positions` are destination vertices in the target's UV space and
/// `tex_coords` the matching sample points in `source`. Every pixel whose
/// center lies inside or on the triangle is overwritten with the nearest
/// source texel. Zero-area triangles draw nothing.
pub fn draw_triangle(target: &mut Texture, source: &Texture, positions: [Vec2; 3], tex_coords: [Vec2; 3]) {
    if target.width() == 0 || target.height() == 0 {
        return;
    }
    let [a, b, c] = positions.map(|uv| to_pixel_space(target, uv));
    let area = edge(a, b, c);
    if area.abs() <= f32::EPSILON {
        return;
    }

    let lo = a.min(b).min(c);
    let hi = a.max(b).max(c);
    let max_x = target.width() as f32 - 1.0;
    let max_y = target.height() as f32 - 1.0;
    let x0 = (lo.x - 0.5).floor().clamp(0.0, max_x) as u32;
    let y0 = (lo.y - 0.5).floor().clamp(0.0, max_y) as u32;
    let x1 = hi.x.ceil().clamp(0.0, max_x) as u32;
    let y1 = hi.y.ceil().clamp(0.0, max_y) as u32;

    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b, c, p) / area;
            let w1 = edge(c, a, p) / area;
            let w2 = edge(a, b, p) / area;
            if w0 < -EDGE_EPSILON || w1 < -EDGE_EPSILON || w2 < -EDGE_EPSILON {
                continue;
            }
            let uv = tex_coords[0] * w0 + tex_coords[1] * w1 + tex_coords[2] * w2;
            target.put(x, y, source.sample_nearest(uv));
        }
    }
}
