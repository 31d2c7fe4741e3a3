//! Viewports: clipped rectangular windows onto a graphic buffer
//!
//! A viewport never owns pixels. It records where its rectangle starts in
//! the buffer's scanline layout (`offset`) and how far to skip from the end
//! of one of its rows to the start of the next (`x_add + pitch`). The borrow
//! of the buffer keeps a viewport from outliving it.

use super::buffer::GraphicBuffer;
use crate::draw::{self, IconSet, RemapTable, WindowTable};
use crate::video::Rect;
use std::cell::Cell;

/// Clipped window onto a [`GraphicBuffer`]
pub struct Viewport<'a> {
    buffer: &'a GraphicBuffer<'a>,
    root: bool,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    x_add: i32,
    offset: Cell<usize>,
    pitch: Cell<i32>,
    is_hardware: bool,
}

/// Clamp a requested rectangle into a `bw` x `bh` buffer.
///
/// The origin is clamped to the last valid column/row, then the extent is
/// shrunk so the rectangle ends inside the buffer.
fn clip_to_buffer(bw: i32, bh: i32, x: i32, y: i32, w: i32, h: i32) -> (i32, i32, i32, i32) {
    let x = x.clamp(0, (bw - 1).max(0));
    let y = y.clamp(0, (bh - 1).max(0));
    let w = if x.saturating_add(w) > bw { bw - x } else { w };
    let h = if y.saturating_add(h) > bh { bh - y } else { h };
    (x, y, w.max(0), h.max(0))
}

/// Clip a `w` x `h` copy from (`sx`,`sy`) in `src` to (`dx`,`dy`) in `dst`.
/// Both bounds are sizes; returns the adjusted (sx, sy, dx, dy, w, h).
fn clip_copy(
    src: (i32, i32),
    dst: (i32, i32),
    sx: i32,
    sy: i32,
    dx: i32,
    dy: i32,
    w: i32,
    h: i32,
) -> Option<(i32, i32, i32, i32, i32, i32)> {
    // i64 so extreme origins and extents can't overflow
    let (sx, sy, dx, dy) = (i64::from(sx), i64::from(sy), i64::from(dx), i64::from(dy));
    let left = (-sx).max(-dx).max(0);
    let top = (-sy).max(-dy).max(0);
    let (sx, dx, w) = (sx + left, dx + left, i64::from(w) - left);
    let (sy, dy, h) = (sy + top, dy + top, i64::from(h) - top);
    let w = w.min(i64::from(src.0) - sx).min(i64::from(dst.0) - dx);
    let h = h.min(i64::from(src.1) - sy).min(i64::from(dst.1) - dy);
    if w <= 0 || h <= 0 {
        None
    } else {
        // Non-empty result: every origin lies inside its viewport
        Some((sx as i32, sy as i32, dx as i32, dy as i32, w as i32, h as i32))
    }
}

impl<'a> Viewport<'a> {
    /// Attach a new viewport to `buffer` at (`x`,`y`) with size `w` x `h`,
    /// clipped to the buffer.
    pub fn new(buffer: &'a GraphicBuffer<'a>, x: i32, y: i32, w: i32, h: i32) -> Self {
        let mut view = Self {
            buffer,
            root: false,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            x_add: 0,
            offset: Cell::new(0),
            pitch: Cell::new(0),
            is_hardware: false,
        };
        view.bind(buffer, x, y, w, h);
        view
    }

    /// The buffer's own full view
    pub(crate) fn root(buffer: &'a GraphicBuffer<'a>) -> Self {
        Self {
            buffer,
            root: true,
            x: 0,
            y: 0,
            width: buffer.width(),
            height: buffer.height(),
            x_add: 0,
            offset: Cell::new(buffer.offset()),
            pitch: Cell::new(buffer.pitch()),
            is_hardware: buffer.is_hardware(),
        }
    }

    /// Re-point this viewport at `buffer`. Ignored on a root viewport.
    pub fn attach(&mut self, buffer: &'a GraphicBuffer<'a>, x: i32, y: i32, w: i32, h: i32) {
        if self.root {
            log::trace!("attach ignored on root viewport");
            return;
        }
        self.bind(buffer, x, y, w, h);
    }

    /// Move/resize within the current buffer. `false` on a root viewport.
    pub fn change(&mut self, x: i32, y: i32, w: i32, h: i32) -> bool {
        if self.root {
            return false;
        }
        self.bind(self.buffer, x, y, w, h);
        true
    }

    fn bind(&mut self, buffer: &'a GraphicBuffer<'a>, x: i32, y: i32, w: i32, h: i32) {
        let (x, y, w, h) = clip_to_buffer(buffer.width(), buffer.height(), x, y, w, h);
        self.buffer = buffer;
        self.x = x;
        self.y = y;
        self.width = w;
        self.height = h;
        self.x_add = buffer.width() - w;
        self.is_hardware = buffer.is_hardware();
        self.refresh();
    }

    /// Re-derive offset and pitch from the buffer's current base and stride
    fn refresh(&self) {
        let buffer = self.buffer;
        let row = buffer.width() as isize + buffer.pitch() as isize;
        let delta = row * self.y as isize + self.x as isize;
        self.offset.set(buffer.offset().wrapping_add_signed(delta));
        self.pitch.set(buffer.pitch());
    }

    /// Lock the underlying buffer. On success offset and pitch are
    /// refreshed, since a surface's address is only known while locked.
    pub fn lock(&self) -> bool {
        let locked = self.buffer.lock();
        if locked {
            self.refresh();
        }
        locked
    }

    pub fn unlock(&self) -> bool {
        self.buffer.unlock()
    }

    #[inline]
    pub fn x(&self) -> i32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Bytes skipped between the end of one viewport row and the next,
    /// not counting pitch
    #[inline]
    pub fn x_add(&self) -> i32 {
        self.x_add
    }

    #[inline]
    pub fn pitch(&self) -> i32 {
        self.pitch.get()
    }

    /// Address of this viewport's first pixel
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset.get()
    }

    #[inline]
    pub fn is_hardware(&self) -> bool {
        self.is_hardware
    }

    /// True for the view a buffer has of itself
    #[inline]
    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn buffer(&self) -> &'a GraphicBuffer<'a> {
        self.buffer
    }

    /// This viewport's rectangle in buffer coordinates
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    // ========================================================================
    // Pixel access (caller holds the lock)
    // ========================================================================

    #[inline]
    fn stride(&self) -> isize {
        (self.width + self.x_add + self.pitch.get()) as isize
    }

    /// Address of (x, y) if it is inside the viewport and the store is
    /// currently addressable
    #[inline]
    fn pixel_ptr(&self, x: i32, y: i32) -> Option<*mut u8> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        if !self.buffer.is_addressable() {
            return None;
        }
        self.refresh();
        let at = self.offset.get() as isize + y as isize * self.stride() + x as isize;
        Some(at as *mut u8)
    }

    /// Read a pixel. `None` if out of bounds or the store is not locked.
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<u8> {
        // Safety: pixel_ptr only yields addresses inside the locked store
        self.pixel_ptr(x, y).map(|p| unsafe { p.read() })
    }

    /// Write a pixel. `false` if out of bounds or the store is not locked.
    pub fn put_pixel(&self, x: i32, y: i32, color: u8) -> bool {
        match self.pixel_ptr(x, y) {
            Some(p) => {
                // Safety: see get_pixel
                unsafe { p.write(color) };
                true
            },
            None => false,
        }
    }

    /// Fill a rectangle (viewport coordinates, clipped). Caller holds the lock.
    pub fn fill_rect(&self, x: i32, y: i32, w: i32, h: i32, color: u8) -> bool {
        let Some(area) = Rect::new(x, y, w, h).intersect(&Rect::new(0, 0, self.width, self.height))
        else {
            return false;
        };
        for row in area.y..area.bottom() {
            let Some(p) = self.pixel_ptr(area.x, row) else {
                return false;
            };
            // Safety: the whole span lies inside this viewport's row
            unsafe { p.write_bytes(color, area.width as usize) };
        }
        true
    }

    /// Copy row `y` into `out`; returns the number of pixels copied
    pub fn read_row(&self, y: i32, out: &mut [u8]) -> usize {
        let Some(p) = self.pixel_ptr(0, y) else {
            return 0;
        };
        let count = out.len().min(self.width as usize);
        // Safety: count pixels from column 0 stay inside the row
        unsafe { std::ptr::copy(p, out.as_mut_ptr(), count) };
        count
    }

    /// Fill the whole viewport with `color`
    pub fn clear(&self, color: u8) -> bool {
        let locked = self.lock();
        if locked {
            self.fill_rect(0, 0, self.width, self.height, color);
        }
        self.unlock();
        locked
    }

    // ========================================================================
    // Draw helpers: lock, draw only if locked, always unlock
    // ========================================================================

    pub fn draw_line(&self, x1: i32, y1: i32, x2: i32, y2: i32, color: u8) -> bool {
        let locked = self.lock();
        if locked {
            draw::draw_line(self, x1, y1, x2, y2, color);
        }
        self.unlock();
        locked
    }

    /// Outline the rectangle with corners (x1,y1) and (x2,y2)
    pub fn draw_rect(&self, x1: i32, y1: i32, x2: i32, y2: i32, color: u8) -> bool {
        let locked = self.lock();
        if locked {
            draw::draw_line(self, x1, y1, x2, y1, color);
            draw::draw_line(self, x1, y2, x2, y2, color);
            draw::draw_line(self, x1, y1, x1, y2, color);
            draw::draw_line(self, x2, y1, x2, y2, color);
        }
        self.unlock();
        locked
    }

    /// Draw icon `icon` at (x,y) relative to clip window `clip_window`,
    /// clipped to that window
    pub fn draw_stamp(
        &self,
        icons: &IconSet,
        icon: usize,
        x: i32,
        y: i32,
        remap: Option<&RemapTable>,
        windows: &WindowTable,
        clip_window: usize,
    ) -> bool {
        let Some(clip) = windows.get(clip_window) else {
            log::debug!("draw_stamp: no clip window {}", clip_window);
            return false;
        };
        let locked = self.lock();
        let drawn = locked && draw::draw_stamp_clip(self, icons, icon, x, y, remap, clip);
        self.unlock();
        drawn
    }

    // ========================================================================
    // Blits
    // ========================================================================

    /// Backend blit between two surface-backed viewports.
    ///
    /// Coordinates are surface coordinates and are passed through unclipped.
    /// Returns the backend's verdict, or `false` if either side has no surface.
    pub fn hardware_blit(
        &self,
        dest: &Viewport<'_>,
        src_x: i32,
        src_y: i32,
        dest_x: i32,
        dest_y: i32,
        w: i32,
        h: i32,
        mask: bool,
    ) -> bool {
        let (Some(src_surface), Some(dest_surface)) =
            (self.buffer.surface(), dest.buffer.surface())
        else {
            return false;
        };
        let src_rect = Rect::new(src_x, src_y, w, h);
        let dest_rect = Rect::new(dest_x, dest_y, w, h);
        dest_surface.blt(dest_rect, src_surface, src_rect, mask)
    }

    /// CPU copy between viewports, in viewport coordinates, clipped to both.
    /// With `mask` set, colour 0 is not copied. Overlapping copies within one
    /// buffer are safe.
    pub fn linear_blit(
        &self,
        dest: &Viewport<'_>,
        src_x: i32,
        src_y: i32,
        dest_x: i32,
        dest_y: i32,
        w: i32,
        h: i32,
        mask: bool,
    ) -> bool {
        let Some((sx, sy, dx, dy, w, h)) = clip_copy(
            (self.width, self.height),
            (dest.width, dest.height),
            src_x,
            src_y,
            dest_x,
            dest_y,
            w,
            h,
        ) else {
            return false;
        };

        let src_locked = self.lock();
        let dest_locked = dest.lock();
        let copied = src_locked && dest_locked && self.copy_rows(dest, sx, sy, dx, dy, w, h, mask);
        dest.unlock();
        self.unlock();
        copied
    }

    fn copy_rows(
        &self,
        dest: &Viewport<'_>,
        sx: i32,
        sy: i32,
        dx: i32,
        dy: i32,
        w: i32,
        h: i32,
        mask: bool,
    ) -> bool {
        let (Some(first_src), Some(first_dest)) = (self.pixel_ptr(sx, sy), dest.pixel_ptr(dx, dy))
        else {
            return false;
        };
        // Walk bottom-up when the destination sits later in the same memory
        let rows: Box<dyn Iterator<Item = i32>> = if first_dest > first_src {
            Box::new((0..h).rev())
        } else {
            Box::new(0..h)
        };
        let mut scratch = vec![0u8; w as usize];
        for row in rows {
            let (Some(src), Some(dst)) = (self.pixel_ptr(sx, sy + row), dest.pixel_ptr(dx, dy + row))
            else {
                return false;
            };
            // Safety: both spans of w pixels lie inside their locked viewports
            unsafe {
                if mask {
                    std::ptr::copy(src, scratch.as_mut_ptr(), w as usize);
                    for (i, &pixel) in scratch.iter().enumerate() {
                        if pixel != 0 {
                            dst.add(i).write(pixel);
                        }
                    }
                } else {
                    std::ptr::copy(src, dst, w as usize);
                }
            }
        }
        true
    }

    /// Copy a rectangle to `dest` (viewport coordinates, clipped). Uses the
    /// backend blitter when both buffers are surface-backed, the CPU otherwise.
    pub fn blit(
        &self,
        dest: &Viewport<'_>,
        src_x: i32,
        src_y: i32,
        dest_x: i32,
        dest_y: i32,
        w: i32,
        h: i32,
        mask: bool,
    ) -> bool {
        if !(self.is_hardware && dest.is_hardware) {
            return self.linear_blit(dest, src_x, src_y, dest_x, dest_y, w, h, mask);
        }
        let Some((sx, sy, dx, dy, w, h)) = clip_copy(
            (self.width, self.height),
            (dest.width, dest.height),
            src_x,
            src_y,
            dest_x,
            dest_y,
            w,
            h,
        ) else {
            return false;
        };
        self.hardware_blit(dest, sx + self.x, sy + self.y, dx + dest.x, dy + dest.y, w, h, mask)
    }
}

impl std::fmt::Debug for Viewport<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewport")
            .field("root", &self.root)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("x_add", &self.x_add)
            .field("offset", &format_args!("{:#x}", self.offset.get()))
            .field("pitch", &self.pitch.get())
            .finish()
    }
}
