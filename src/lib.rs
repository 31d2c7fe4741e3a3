//! Graphic buffers, viewports and blits for an 8-bit paletted renderer.
//!
//! A [`GraphicBuffer`] owns (or borrows, or fronts a backend surface for) a
//! block of 8-bit pixels. A [`Viewport`] is a clipped rectangle inside one
//! buffer; all drawing and blitting goes through viewports. Surface-backed
//! buffers must be locked before their pixels are addressable, and locks are
//! counted so nested lock/unlock pairs only touch the backend at the edges.

pub mod config;
pub mod display;
pub mod draw;
pub mod error;
pub mod gbuffer;
pub mod video;

pub use config::VideoConfig;
pub use error::{GfxError, Result};
pub use gbuffer::{GraphicBuffer, LogicPage, Viewport};
