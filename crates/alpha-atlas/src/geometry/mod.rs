pub mod rect;

pub use rect::{compute_atlas_rect, PixelRect};
