//! SDL2 surface backend
//!
//! Each backend surface is an 8-bit indexed `SDL_Surface`. All surfaces share
//! one palette so surface-to-surface blits copy indices unchanged; colour
//! conversion happens only at presentation time (see `display::Palette`).

use super::{Rect, SurfaceFlags, Video, VideoSurface};
use crate::error::{GfxError, Result};
use sdl2::pixels::{Color, Palette, PixelFormatEnum};
use sdl2::surface::Surface;
use std::any::Any;
use std::cell::{Cell, RefCell};

/// [`Video`] implementation over SDL2 software surfaces
pub struct SdlVideo {
    palette: Palette,
    focus: Cell<bool>,
    next_id: Cell<usize>,
}

impl SdlVideo {
    pub fn new() -> Result<Self> {
        // Distinct entries keep SDL's 8-bit blitter on its identity mapping
        let colors: Vec<Color> = (0..=255u8).map(|i| Color::RGB(i, i, i)).collect();
        let palette = Palette::with_colors(&colors).map_err(GfxError::Sdl)?;
        Ok(Self {
            palette,
            focus: Cell::new(true),
            next_id: Cell::new(1),
        })
    }

    /// Feed window focus changes from the event loop
    pub fn set_focus(&self, focus: bool) {
        if self.focus.replace(focus) != focus {
            log::info!("display focus {}", if focus { "gained" } else { "lost" });
        }
    }
}

impl Video for SdlVideo {
    fn create_surface(
        &self,
        width: i32,
        height: i32,
        flags: SurfaceFlags,
    ) -> Option<Box<dyn VideoSurface>> {
        if width <= 0 || height <= 0 {
            return None;
        }
        let mut surface = match Surface::new(width as u32, height as u32, PixelFormatEnum::Index8) {
            Ok(surface) => surface,
            Err(e) => {
                log::warn!("SDL refused {}x{} surface: {}", width, height, e);
                return None;
            },
        };
        if let Err(e) = surface.set_palette(&self.palette) {
            log::warn!("failed to set surface palette: {}", e);
            return None;
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        log::debug!(
            "SDL surface #{} created: {}x{} pitch {} {:?}",
            id,
            width,
            height,
            surface.pitch(),
            flags
        );
        Some(Box::new(SdlSurface {
            id,
            surface: RefCell::new(surface),
            locked: Cell::new(false),
            attached: RefCell::new(Vec::new()),
        }))
    }

    fn has_focus(&self) -> bool {
        self.focus.get()
    }
}

/// One surface of an [`SdlVideo`]
pub struct SdlSurface {
    id: usize,
    surface: RefCell<Surface<'static>>,
    locked: Cell<bool>,
    attached: RefCell<Vec<usize>>,
}

impl SdlSurface {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn attached(&self) -> Vec<usize> {
        self.attached.borrow().clone()
    }
}

fn to_sdl_rect(rect: Rect) -> Option<sdl2::rect::Rect> {
    if rect.is_empty() {
        None
    } else {
        Some(sdl2::rect::Rect::new(
            rect.x,
            rect.y,
            rect.width as u32,
            rect.height as u32,
        ))
    }
}

impl VideoSurface for SdlSurface {
    fn lock_wait(&self) -> bool {
        if self.locked.get() {
            return false;
        }
        let raw = self.surface.borrow().raw();
        // Safety: raw points at a live surface owned by self
        let status = unsafe { sdl2::sys::SDL_LockSurface(raw) };
        if status != 0 {
            log::warn!("SDL_LockSurface failed on surface #{}: {}", self.id, sdl2::get_error());
            return false;
        }
        self.locked.set(true);
        true
    }

    fn unlock(&self) -> bool {
        if !self.locked.get() {
            return false;
        }
        let raw = self.surface.borrow().raw();
        // Safety: surface was locked by lock_wait
        unsafe { sdl2::sys::SDL_UnlockSurface(raw) };
        self.locked.set(false);
        true
    }

    fn data(&self) -> *mut u8 {
        let raw = self.surface.borrow().raw();
        // Safety: reading a field of a live surface
        unsafe { (*raw).pixels as *mut u8 }
    }

    fn pitch(&self) -> i32 {
        self.surface.borrow().pitch() as i32
    }

    fn is_allocated(&self) -> bool {
        !self.surface.borrow().raw().is_null()
    }

    fn add_attached_surface(&self, other: &dyn VideoSurface) {
        // SDL has no flip chains; record the link for the presenter
        if let Some(other) = other.as_any().downcast_ref::<SdlSurface>() {
            self.attached.borrow_mut().push(other.id);
        }
    }

    fn blt(&self, dest: Rect, src: &dyn VideoSurface, src_rect: Rect, mask: bool) -> bool {
        let Some(src) = src.as_any().downcast_ref::<SdlSurface>() else {
            return false;
        };
        if std::ptr::eq(self, src) {
            log::debug!("SDL backend cannot blit surface #{} onto itself", self.id);
            return false;
        }
        if self.locked.get() || src.locked.get() {
            return false;
        }
        let (Some(src_sdl), Some(dest_sdl)) = (to_sdl_rect(src_rect), to_sdl_rect(dest)) else {
            return false;
        };

        let src_surface = src.surface.borrow();
        let mut dest_surface = self.surface.borrow_mut();
        // Index 0 is the transparent colour for masked blits
        // Safety: src_surface is live for the duration of the call
        unsafe {
            sdl2::sys::SDL_SetColorKey(src_surface.raw(), i32::from(mask), 0);
        }
        match src_surface.blit(src_sdl, &mut *dest_surface, dest_sdl) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("SDL blit #{} -> #{} failed: {}", src.id, self.id, e);
                false
            },
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
