//! In-process surface backend
//!
//! Surfaces are plain heap blocks with an optional per-row padding so the
//! stride differs from the width, the same shape a display driver hands back.
//! Used for headless runs and to observe backend traffic in tests.

use super::{Rect, SurfaceFlags, Video, VideoSurface};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::rc::Rc;

/// Counters of backend calls, shared by a `MemoryVideo` and all its surfaces
#[derive(Debug, Default)]
pub struct VideoStats {
    surfaces: Cell<usize>,
    locks: Cell<usize>,
    unlocks: Cell<usize>,
    blits: Cell<usize>,
    input_blocks: Cell<usize>,
    input_unblocks: Cell<usize>,
}

impl VideoStats {
    /// Surfaces successfully created
    pub fn surfaces(&self) -> usize {
        self.surfaces.get()
    }

    /// Successful `lock_wait` calls
    pub fn locks(&self) -> usize {
        self.locks.get()
    }

    /// Successful `unlock` calls
    pub fn unlocks(&self) -> usize {
        self.unlocks.get()
    }

    /// Successful `blt` calls
    pub fn blits(&self) -> usize {
        self.blits.get()
    }

    pub fn input_blocks(&self) -> usize {
        self.input_blocks.get()
    }

    pub fn input_unblocks(&self) -> usize {
        self.input_unblocks.get()
    }

    fn bump(counter: &Cell<usize>) {
        counter.set(counter.get() + 1);
    }
}

#[derive(Debug, Default)]
struct Shared {
    stats: VideoStats,
    fail_next_lock: Cell<bool>,
    fail_next_unlock: Cell<bool>,
}

/// Heap-backed [`Video`] implementation
pub struct MemoryVideo {
    focus: Cell<bool>,
    refuse: Cell<bool>,
    padding: i32,
    next_id: Cell<usize>,
    shared: Rc<Shared>,
}

impl MemoryVideo {
    /// Backend with focus and no row padding
    pub fn new() -> Self {
        Self::with_padding(0)
    }

    /// Backend whose surfaces carry `padding` extra bytes per scanline
    pub fn with_padding(padding: i32) -> Self {
        Self {
            focus: Cell::new(true),
            refuse: Cell::new(false),
            padding: padding.max(0),
            next_id: Cell::new(1),
            shared: Rc::new(Shared::default()),
        }
    }

    pub fn set_focus(&self, focus: bool) {
        self.focus.set(focus);
    }

    /// Make `create_surface` return `None` until reset
    pub fn refuse_surfaces(&self, refuse: bool) {
        self.refuse.set(refuse);
    }

    /// The next `lock_wait` on any surface of this backend fails
    pub fn fail_next_lock(&self) {
        self.shared.fail_next_lock.set(true);
    }

    /// The next `unlock` on any surface of this backend fails
    pub fn fail_next_unlock(&self) {
        self.shared.fail_next_unlock.set(true);
    }

    pub fn stats(&self) -> &VideoStats {
        &self.shared.stats
    }
}

impl Default for MemoryVideo {
    fn default() -> Self {
        Self::new()
    }
}

impl Video for MemoryVideo {
    fn create_surface(
        &self,
        width: i32,
        height: i32,
        flags: SurfaceFlags,
    ) -> Option<Box<dyn VideoSurface>> {
        if self.refuse.get() || width <= 0 || height <= 0 {
            log::warn!("memory backend refused {}x{} surface", width, height);
            return None;
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        VideoStats::bump(&self.shared.stats.surfaces);
        log::debug!(
            "memory surface #{} created: {}x{} {:?}",
            id,
            width,
            height,
            flags
        );
        Some(Box::new(MemorySurface::new(
            id,
            width,
            height,
            width + self.padding,
            Rc::clone(&self.shared),
        )))
    }

    fn has_focus(&self) -> bool {
        self.focus.get()
    }

    fn block_input(&self) {
        VideoStats::bump(&self.shared.stats.input_blocks);
    }

    fn unblock_input(&self) {
        VideoStats::bump(&self.shared.stats.input_unblocks);
    }
}

/// One surface of a [`MemoryVideo`]
pub struct MemorySurface {
    id: usize,
    pixels: NonNull<u8>,
    len: usize,
    width: i32,
    height: i32,
    stride: i32,
    locked: Cell<bool>,
    attached: RefCell<Vec<usize>>,
    shared: Rc<Shared>,
}

impl MemorySurface {
    fn new(id: usize, width: i32, height: i32, stride: i32, shared: Rc<Shared>) -> Self {
        let len = (stride * height) as usize;
        let block: Box<[u8]> = vec![0u8; len].into_boxed_slice();
        // Raw ownership so locked writers can alias the block through `data()`
        let pixels = NonNull::new(Box::into_raw(block) as *mut u8).unwrap_or(NonNull::dangling());
        Self {
            id,
            pixels,
            len,
            width,
            height,
            stride,
            locked: Cell::new(false),
            attached: RefCell::new(Vec::new()),
            shared,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    /// Ids of surfaces attached through `add_attached_surface`
    pub fn attached(&self) -> Vec<usize> {
        self.attached.borrow().clone()
    }

    /// Read a pixel regardless of lock state (bounds checked)
    pub fn pixel(&self, x: i32, y: i32) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y * self.stride + x) as usize;
        // Safety: idx < stride * height == len
        Some(unsafe { self.pixels.as_ptr().add(idx).read() })
    }

    fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    fn contains(&self, rect: &Rect) -> bool {
        !rect.is_empty() && self.bounds().intersect(rect) == Some(*rect)
    }
}

impl Drop for MemorySurface {
    fn drop(&mut self) {
        let slice = std::ptr::slice_from_raw_parts_mut(self.pixels.as_ptr(), self.len);
        // Safety: pointer and length come from Box::into_raw in `new`
        unsafe { drop(Box::from_raw(slice)) };
    }
}

impl VideoSurface for MemorySurface {
    fn lock_wait(&self) -> bool {
        if self.shared.fail_next_lock.replace(false) || self.locked.get() {
            return false;
        }
        self.locked.set(true);
        VideoStats::bump(&self.shared.stats.locks);
        true
    }

    fn unlock(&self) -> bool {
        if self.shared.fail_next_unlock.replace(false) || !self.locked.get() {
            return false;
        }
        self.locked.set(false);
        VideoStats::bump(&self.shared.stats.unlocks);
        true
    }

    fn data(&self) -> *mut u8 {
        self.pixels.as_ptr()
    }

    fn pitch(&self) -> i32 {
        self.stride
    }

    fn is_allocated(&self) -> bool {
        self.len > 0
    }

    fn add_attached_surface(&self, other: &dyn VideoSurface) {
        if let Some(other) = other.as_any().downcast_ref::<MemorySurface>() {
            self.attached.borrow_mut().push(other.id);
        }
    }

    fn blt(&self, dest: Rect, src: &dyn VideoSurface, src_rect: Rect, mask: bool) -> bool {
        let Some(src) = src.as_any().downcast_ref::<MemorySurface>() else {
            return false;
        };
        // Busy surfaces and out-of-range or stretched rectangles are refused
        if self.locked.get() || src.locked.get() {
            return false;
        }
        if dest.width != src_rect.width || dest.height != src_rect.height {
            return false;
        }
        if !self.contains(&dest) || !src.contains(&src_rect) {
            return false;
        }

        let w = src_rect.width as usize;
        let mut scratch = vec![0u8; w * src_rect.height as usize];
        for (row, chunk) in scratch.chunks_exact_mut(w).enumerate() {
            let at = ((src_rect.y + row as i32) * src.stride + src_rect.x) as usize;
            // Safety: src_rect lies within the source surface
            unsafe {
                std::ptr::copy_nonoverlapping(src.pixels.as_ptr().add(at), chunk.as_mut_ptr(), w);
            }
        }
        for (row, chunk) in scratch.chunks_exact(w).enumerate() {
            let at = ((dest.y + row as i32) * self.stride + dest.x) as usize;
            // Safety: dest lies within this surface; scratch never aliases it
            let line = unsafe { self.pixels.as_ptr().add(at) };
            for (i, &pixel) in chunk.iter().enumerate() {
                if mask && pixel == 0 {
                    continue;
                }
                unsafe { line.add(i).write(pixel) };
            }
        }
        VideoStats::bump(&self.shared.stats.blits);
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
