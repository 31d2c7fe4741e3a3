//! Surface backend capability
//!
//! The buffer layer never talks to a display driver directly. Anything that
//! can create, lock and blit a surface implements [`Video`] and
//! [`VideoSurface`]; the buffer only ever calls through these traits.

pub mod memory;
pub mod sdl;

pub use memory::{MemorySurface, MemoryVideo, VideoStats};
pub use sdl::{SdlSurface, SdlVideo};

use std::any::Any;

bitflags::bitflags! {
    /// Creation flags forwarded to [`Video::create_surface`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SurfaceFlags: u32 {
        /// Surface lives in video memory
        const VIDEOMEM = 0b0000_0001;
        /// Surface is the visible screen page
        const VISIBLE  = 0b0000_0010;
    }
}

impl SurfaceFlags {
    /// True if these flags ask for a backend surface rather than system memory
    pub fn wants_surface(self) -> bool {
        self.intersects(Self::VIDEOMEM | Self::VISIBLE)
    }
}

/// Pixel rectangle in surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Overlapping area of two rectangles, or `None` if they do not touch
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        // Edges in i64: any i32 origin plus any i32 extent fits
        let x = i64::from(self.x.max(other.x));
        let y = i64::from(self.y.max(other.y));
        let right = (i64::from(self.x) + i64::from(self.width))
            .min(i64::from(other.x) + i64::from(other.width));
        let bottom = (i64::from(self.y) + i64::from(self.height))
            .min(i64::from(other.y) + i64::from(other.height));
        if right <= x || bottom <= y {
            return None;
        }
        // The overlap is no wider than either input, so it fits back in i32
        Some(Rect::new(x as i32, y as i32, (right - x) as i32, (bottom - y) as i32))
    }
}

/// Factory and host-state queries of a display backend
pub trait Video {
    /// Create a `width` x `height` 8-bit surface. `None` if the backend refuses.
    fn create_surface(
        &self,
        width: i32,
        height: i32,
        flags: SurfaceFlags,
    ) -> Option<Box<dyn VideoSurface>>;

    /// Whether the process currently owns display focus
    fn has_focus(&self) -> bool;

    /// Called right before a real surface lock or unlock
    fn block_input(&self) {}

    /// Called right after a real surface lock or unlock
    fn unblock_input(&self) {}
}

/// A single backend surface
///
/// Methods take `&self`; backends keep their own interior state. `data` is
/// only meaningful between a successful `lock_wait` and the matching `unlock`.
pub trait VideoSurface {
    /// Wait for and acquire exclusive CPU access to the pixel memory
    fn lock_wait(&self) -> bool;

    fn unlock(&self) -> bool;

    /// Address of row 0, column 0 while locked
    fn data(&self) -> *mut u8;

    /// Bytes per scanline, including any alignment padding
    fn pitch(&self) -> i32;

    fn is_allocated(&self) -> bool;

    /// Link another surface to this one (e.g. a back buffer to a primary)
    fn add_attached_surface(&self, other: &dyn VideoSurface);

    /// Copy `src_rect` of `src` into `dest` of this surface.
    /// With `mask` set, colour 0 in the source is transparent.
    fn blt(&self, dest: Rect, src: &dyn VideoSurface, src_rect: Rect, mask: bool) -> bool;

    fn as_any(&self) -> &dyn Any;
}
