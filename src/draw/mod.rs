//! Software drawing primitives over a locked [`Viewport`](crate::gbuffer::Viewport)

pub mod line;
pub mod stamp;
pub mod window;

pub use line::draw_line;
pub use stamp::{draw_stamp_clip, IconSet, RemapTable};
pub use window::{WindowTable, WINDOW_MAIN};
