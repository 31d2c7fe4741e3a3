//! Graphic buffer: the physical pixel store behind every viewport
//!
//! A buffer is backed by exactly one of:
//! - a heap block it allocated and frees itself
//! - a caller-supplied block it only borrows
//! - a backend surface, addressable only while locked
//!
//! Locks on surface-backed buffers nest. Only the outermost `lock` and the
//! matching last `unlock` reach the backend; everything in between just
//! moves the counter.

use super::viewport::Viewport;
use crate::error::{GfxError, Result};
use crate::video::{SurfaceFlags, Video, VideoSurface};
use std::cell::Cell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Offset value of a surface-backed buffer that is not currently locked
pub const NOT_LOCKED: usize = 0;

/// Real backend locks taken by all buffers (debug builds only)
static TOTAL_LOCKS: AtomicUsize = AtomicUsize::new(0);

/// Number of real backend locks taken so far. Always 0 in release builds.
pub fn total_locks() -> usize {
    TOTAL_LOCKS.load(Ordering::Relaxed)
}

/// Where a buffer's pixels come from, chosen once per `init`
pub enum Backing<'m> {
    /// Allocate `size` bytes; 0 means `width * height`
    Heap { size: usize },
    /// Draw into caller memory; never freed by the buffer
    Memory(&'m mut [u8]),
    /// Ask the backend for a surface
    Surface {
        video: Rc<dyn Video>,
        flags: SurfaceFlags,
    },
}

impl<'m> Backing<'m> {
    /// Pick a backing the way a flag-driven caller asks for it: surface
    /// flags win, then supplied memory, then a heap block of `size` bytes.
    pub fn from_flags(
        flags: SurfaceFlags,
        memory: Option<&'m mut [u8]>,
        size: usize,
        video: &Rc<dyn Video>,
    ) -> Self {
        if flags.wants_surface() {
            Backing::Surface {
                video: Rc::clone(video),
                flags,
            }
        } else if let Some(memory) = memory {
            Backing::Memory(memory)
        } else {
            Backing::Heap { size }
        }
    }
}

/// Storage mode of an initialised buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Never initialised, or torn down
    Released,
    Owned,
    Borrowed,
    Hardware,
}

enum Storage {
    Released,
    Owned(Box<[u8]>),
    Borrowed,
    Hardware {
        video: Rc<dyn Video>,
        surface: Option<Box<dyn VideoSurface>>,
    },
}

/// Rectangular 8-bit pixel store
pub struct GraphicBuffer<'m> {
    width: i32,
    height: i32,
    size: usize,
    storage: Storage,
    offset: Cell<usize>,
    pitch: Cell<i32>,
    lock_count: Cell<u32>,
    _memory: PhantomData<&'m mut [u8]>,
}

impl<'m> GraphicBuffer<'m> {
    /// Empty buffer; cannot be locked until `init` succeeds
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            size: 0,
            storage: Storage::Released,
            offset: Cell::new(0),
            pitch: Cell::new(0),
            lock_count: Cell::new(0),
            _memory: PhantomData,
        }
    }

    /// Heap buffer of exactly `width * height` bytes
    pub fn with_size(width: i32, height: i32) -> Result<Self> {
        Self::with_byte_size(width, height, 0)
    }

    /// Heap buffer with an explicit byte size (0 means `width * height`)
    pub fn with_byte_size(width: i32, height: i32, size: usize) -> Result<Self> {
        let mut buffer = Self::new();
        buffer.init(width, height, Backing::Heap { size })?;
        Ok(buffer)
    }

    /// Buffer drawing straight into caller-owned memory
    pub fn from_memory(width: i32, height: i32, memory: &'m mut [u8]) -> Result<Self> {
        let mut buffer = Self::new();
        buffer.init(width, height, Backing::Memory(memory))?;
        Ok(buffer)
    }

    /// Surface-backed buffer. If the backend refuses the surface the buffer
    /// is still returned; check `is_allocated` before drawing.
    pub fn with_surface(
        width: i32,
        height: i32,
        video: Rc<dyn Video>,
        flags: SurfaceFlags,
    ) -> Result<Self> {
        let mut buffer = Self::new();
        buffer.init(width, height, Backing::Surface { video, flags })?;
        Ok(buffer)
    }

    /// (Re)initialise the buffer. Any previous storage is released first.
    pub fn init(&mut self, width: i32, height: i32, backing: Backing<'m>) -> Result<()> {
        if width < 0 || height < 0 {
            return Err(GfxError::InvalidDimensions { width, height });
        }
        let needed = width as usize * height as usize;

        let (storage, size, offset) = match backing {
            Backing::Surface { video, flags } => {
                let surface = video.create_surface(width, height, flags);
                if surface.is_none() {
                    log::warn!("no surface for {}x{} buffer; drawing disabled", width, height);
                }
                (Storage::Hardware { video, surface }, needed, NOT_LOCKED)
            },
            Backing::Memory(memory) => {
                if memory.len() < needed {
                    return Err(GfxError::TooSmall {
                        size: memory.len(),
                        needed,
                    });
                }
                let size = memory.len();
                (Storage::Borrowed, size, memory.as_mut_ptr() as usize)
            },
            Backing::Heap { size } => {
                let size = if size == 0 { needed } else { size };
                if size < needed {
                    return Err(GfxError::TooSmall { size, needed });
                }
                let mut pixels = allocate(size)?;
                // Boxed slice contents never move, so the address outlives the move
                let base = pixels.as_mut_ptr() as usize;
                (Storage::Owned(pixels), size, base)
            },
        };

        self.un_init();
        self.width = width;
        self.height = height;
        self.size = size;
        self.storage = storage;
        self.offset.set(offset);
        self.pitch.set(0);
        self.lock_count.set(0);
        Ok(())
    }

    /// Release storage: drain outstanding locks, drop the backend surface,
    /// free owned memory. Borrowed memory is left to its owner.
    pub fn un_init(&mut self) {
        if matches!(self.storage, Storage::Hardware { surface: Some(_), .. }) {
            while self.lock_count.get() > 0 {
                if !self.unlock() {
                    log::warn!(
                        "surface refused unlock during teardown; dropping {} lock(s)",
                        self.lock_count.get()
                    );
                    self.lock_count.set(0);
                }
            }
        }

        match std::mem::replace(&mut self.storage, Storage::Released) {
            Storage::Owned(pixels) => log::debug!("freeing {} byte pixel store", pixels.len()),
            Storage::Hardware { surface, .. } => drop(surface),
            Storage::Borrowed | Storage::Released => {},
        }
        self.offset.set(0);
        self.pitch.set(0);
        self.lock_count.set(0);
    }

    /// Acquire pixel access.
    ///
    /// Always succeeds for memory-backed buffers with valid storage. For
    /// surface-backed buffers it fails without a surface or without display
    /// focus; otherwise nested calls just bump the lock count.
    pub fn lock(&self) -> bool {
        let (video, surface) = match &self.storage {
            Storage::Hardware { video, surface } => (video, surface),
            _ => return self.offset.get() != 0,
        };
        let Some(surface) = surface else {
            return false;
        };
        if !video.has_focus() {
            log::trace!("lock denied: no display focus");
            return false;
        }

        let count = self.lock_count.get();
        if count > 0 {
            self.lock_count.set(count + 1);
            return true;
        }

        video.block_input();
        let locked = surface.lock_wait();
        if locked {
            self.offset.set(surface.data() as usize);
            self.pitch.set(surface.pitch() - self.width);
            self.lock_count.set(1);
            if cfg!(debug_assertions) {
                TOTAL_LOCKS.fetch_add(1, Ordering::Relaxed);
            }
            log::debug!("surface locked, pitch {}", self.pitch.get());
        }
        video.unblock_input();
        locked
    }

    /// Release one level of lock. Unlocking an unlocked buffer is a no-op.
    pub fn unlock(&self) -> bool {
        let count = self.lock_count.get();
        let (video, surface) = match &self.storage {
            Storage::Hardware { video, surface } if count > 0 => (video, surface),
            _ => return true,
        };

        if count == 1 {
            if let Some(surface) = surface {
                video.block_input();
                let unlocked = surface.unlock();
                if unlocked {
                    self.offset.set(NOT_LOCKED);
                    self.lock_count.set(0);
                    log::debug!("surface unlocked");
                } else {
                    log::warn!("surface unlock failed; buffer stays locked");
                }
                video.unblock_input();
                return unlocked;
            }
        }
        self.lock_count.set(count - 1);
        true
    }

    /// Link `other`'s surface to this buffer's surface
    pub fn attach_surface(&self, other: &GraphicBuffer<'_>) -> bool {
        match (self.surface(), other.surface()) {
            (Some(surface), Some(attach)) => {
                surface.add_attached_surface(attach);
                true
            },
            _ => false,
        }
    }

    /// Whether the buffer has usable storage
    pub fn is_allocated(&self) -> bool {
        match &self.storage {
            Storage::Hardware { surface, .. } => {
                surface.as_ref().is_some_and(|s| s.is_allocated())
            },
            Storage::Owned(_) | Storage::Borrowed => true,
            Storage::Released => false,
        }
    }

    /// Root viewport: the buffer viewed as a whole. It cannot be re-attached
    /// or resized.
    pub fn view(&self) -> Viewport<'_> {
        Viewport::root(self)
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Byte length of the backing store
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Extra bytes per scanline beyond `width`
    #[inline]
    pub fn pitch(&self) -> i32 {
        self.pitch.get()
    }

    /// Address of row 0 column 0, or `NOT_LOCKED` for an unlocked surface
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset.get()
    }

    #[inline]
    pub fn is_hardware(&self) -> bool {
        matches!(self.storage, Storage::Hardware { .. })
    }

    #[inline]
    pub fn lock_count(&self) -> u32 {
        self.lock_count.get()
    }

    pub fn storage_kind(&self) -> StorageKind {
        match self.storage {
            Storage::Released => StorageKind::Released,
            Storage::Owned(_) => StorageKind::Owned,
            Storage::Borrowed => StorageKind::Borrowed,
            Storage::Hardware { .. } => StorageKind::Hardware,
        }
    }

    /// True while `offset` may be used to read or write pixels
    pub(crate) fn is_addressable(&self) -> bool {
        match self.storage {
            Storage::Hardware { .. } => {
                self.lock_count.get() > 0 && self.offset.get() != NOT_LOCKED
            },
            Storage::Owned(_) | Storage::Borrowed => self.offset.get() != 0,
            Storage::Released => false,
        }
    }

    pub(crate) fn surface(&self) -> Option<&dyn VideoSurface> {
        match &self.storage {
            Storage::Hardware { surface, .. } => surface.as_deref(),
            _ => None,
        }
    }
}

impl Default for GraphicBuffer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GraphicBuffer<'_> {
    fn drop(&mut self) {
        self.un_init();
    }
}

impl std::fmt::Debug for GraphicBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("storage", &self.storage_kind())
            .field("offset", &format_args!("{:#x}", self.offset.get()))
            .field("pitch", &self.pitch.get())
            .field("lock_count", &self.lock_count.get())
            .finish()
    }
}

/// Zeroed heap store; fails cleanly instead of aborting when the request
/// can't be met
fn allocate(size: usize) -> Result<Box<[u8]>> {
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(size)
        .map_err(|_| GfxError::Allocation { size })?;
    pixels.resize(size, 0);
    Ok(pixels.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::MemoryVideo;

    fn hardware(video: &Rc<MemoryVideo>, w: i32, h: i32) -> GraphicBuffer<'static> {
        let host: Rc<dyn Video> = video.clone();
        GraphicBuffer::with_surface(w, h, host, SurfaceFlags::VIDEOMEM).expect("buffer")
    }

    #[test]
    fn test_heap_buffer_defaults() {
        let buffer = GraphicBuffer::with_size(320, 200).expect("buffer");
        assert_eq!(buffer.storage_kind(), StorageKind::Owned);
        assert_eq!(buffer.size(), 64000);
        assert_eq!(buffer.pitch(), 0);
        assert_ne!(buffer.offset(), 0);
        assert!(!buffer.is_hardware());
        assert!(buffer.is_allocated());
    }

    #[test]
    fn test_explicit_size_must_cover_pixels() {
        let buffer = GraphicBuffer::with_byte_size(16, 16, 1024).expect("buffer");
        assert_eq!(buffer.size(), 1024);
        let err = GraphicBuffer::with_byte_size(16, 16, 100).unwrap_err();
        assert!(matches!(err, GfxError::TooSmall { size: 100, needed: 256 }));
    }

    #[test]
    fn test_negative_dimensions_rejected() {
        assert!(matches!(
            GraphicBuffer::with_size(-1, 10),
            Err(GfxError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_borrowed_memory_is_addressed_directly() {
        let mut memory = vec![0u8; 64 * 32];
        let base = memory.as_ptr() as usize;
        {
            let buffer = GraphicBuffer::from_memory(64, 32, &mut memory).expect("buffer");
            assert_eq!(buffer.storage_kind(), StorageKind::Borrowed);
            assert_eq!(buffer.offset(), base);
            let view = buffer.view();
            assert!(view.lock());
            assert!(view.put_pixel(3, 1, 42));
            assert!(view.unlock());
        }
        // Buffer is gone; memory still belongs to us and holds the write
        assert_eq!(memory[64 + 3], 42);
    }

    #[test]
    fn test_borrowed_memory_too_small() {
        let mut memory = vec![0u8; 10];
        assert!(GraphicBuffer::from_memory(4, 4, &mut memory).is_err());
    }

    #[test]
    fn test_software_lock_is_trivial() {
        let buffer = GraphicBuffer::with_size(8, 8).expect("buffer");
        assert!(buffer.lock());
        assert!(buffer.lock());
        assert_eq!(buffer.lock_count(), 0);
        assert!(buffer.unlock());
        assert!(buffer.unlock());
    }

    #[test]
    fn test_torn_down_buffer_cannot_lock() {
        let mut buffer = GraphicBuffer::with_size(8, 8).expect("buffer");
        buffer.un_init();
        assert_eq!(buffer.offset(), 0);
        assert_eq!(buffer.storage_kind(), StorageKind::Released);
        assert!(!buffer.lock());
        assert!(!GraphicBuffer::new().lock());
    }

    #[test]
    fn test_surface_buffer_starts_unlocked() {
        let video = Rc::new(MemoryVideo::with_padding(16));
        let buffer = hardware(&video, 320, 200);
        assert_eq!(buffer.storage_kind(), StorageKind::Hardware);
        assert_eq!(buffer.offset(), NOT_LOCKED);
        assert_eq!(buffer.lock_count(), 0);
        assert!(buffer.is_allocated());
        assert_eq!(video.stats().surfaces(), 1);
    }

    #[test]
    fn test_lock_takes_pitch_from_stride() {
        let video = Rc::new(MemoryVideo::with_padding(16));
        let buffer = hardware(&video, 320, 200);
        assert!(buffer.lock());
        assert_eq!(buffer.pitch(), 16);
        assert_ne!(buffer.offset(), NOT_LOCKED);
        assert!(buffer.unlock());
        assert_eq!(buffer.offset(), NOT_LOCKED);
    }

    #[test]
    fn test_unfocused_lock_denied() {
        let video = Rc::new(MemoryVideo::new());
        let buffer = hardware(&video, 64, 64);
        video.set_focus(false);
        assert!(!buffer.lock());
        assert_eq!(buffer.lock_count(), 0);
        assert_eq!(video.stats().locks(), 0);
    }

    #[test]
    fn test_focus_gate_applies_while_locked() {
        let video = Rc::new(MemoryVideo::new());
        let buffer = hardware(&video, 64, 64);
        assert!(buffer.lock());
        video.set_focus(false);
        assert!(!buffer.lock());
        assert_eq!(buffer.lock_count(), 1);
        video.set_focus(true);
        assert!(buffer.unlock());
    }

    #[test]
    fn test_nested_locks_reach_backend_once() {
        let video = Rc::new(MemoryVideo::new());
        let buffer = hardware(&video, 64, 64);
        let mut counts = Vec::new();

        assert!(buffer.lock());
        counts.push(buffer.lock_count());
        assert!(buffer.lock());
        counts.push(buffer.lock_count());
        assert!(buffer.unlock());
        counts.push(buffer.lock_count());
        assert!(buffer.unlock());
        counts.push(buffer.lock_count());

        assert_eq!(counts, vec![1, 2, 1, 0]);
        assert_eq!(video.stats().locks(), 1);
        assert_eq!(video.stats().unlocks(), 1);
    }

    #[test]
    fn test_offset_stable_while_nested() {
        let video = Rc::new(MemoryVideo::with_padding(4));
        let buffer = hardware(&video, 32, 32);
        assert!(buffer.lock());
        let (offset, pitch) = (buffer.offset(), buffer.pitch());
        assert!(buffer.lock());
        assert!(buffer.unlock());
        assert_eq!((buffer.offset(), buffer.pitch()), (offset, pitch));
        assert!(buffer.unlock());
    }

    #[test]
    fn test_input_bracketed_around_real_transitions() {
        let video = Rc::new(MemoryVideo::new());
        let buffer = hardware(&video, 16, 16);
        assert!(buffer.lock());
        assert!(buffer.lock());
        assert!(buffer.unlock());
        assert!(buffer.unlock());
        assert_eq!(video.stats().input_blocks(), 2);
        assert_eq!(video.stats().input_unblocks(), 2);
    }

    #[test]
    fn test_failed_backend_lock_leaves_unlocked() {
        let video = Rc::new(MemoryVideo::new());
        let buffer = hardware(&video, 16, 16);
        video.fail_next_lock();
        assert!(!buffer.lock());
        assert_eq!(buffer.lock_count(), 0);
        assert_eq!(buffer.offset(), NOT_LOCKED);
        assert_eq!(video.stats().input_unblocks(), 1);
    }

    #[test]
    fn test_failed_unlock_keeps_lock_for_retry() {
        let video = Rc::new(MemoryVideo::new());
        let buffer = hardware(&video, 16, 16);
        assert!(buffer.lock());
        let offset = buffer.offset();
        video.fail_next_unlock();
        assert!(!buffer.unlock());
        assert_eq!(buffer.lock_count(), 1);
        assert_eq!(buffer.offset(), offset);
        assert!(buffer.unlock());
        assert_eq!(buffer.lock_count(), 0);
    }

    #[test]
    fn test_unlock_when_unlocked_is_noop() {
        let video = Rc::new(MemoryVideo::new());
        let buffer = hardware(&video, 16, 16);
        assert!(buffer.unlock());
        assert!(buffer.unlock());
        assert_eq!(buffer.lock_count(), 0);
        assert_eq!(video.stats().unlocks(), 0);

        let software = GraphicBuffer::with_size(4, 4).expect("buffer");
        assert!(software.unlock());
        assert_eq!(software.lock_count(), 0);
    }

    #[test]
    fn test_refused_surface_never_locks() {
        let video = Rc::new(MemoryVideo::new());
        video.refuse_surfaces(true);
        let buffer = hardware(&video, 16, 16);
        assert!(buffer.is_hardware());
        assert!(!buffer.is_allocated());
        assert!(!buffer.lock());
        assert!(!buffer.lock());
    }

    #[test]
    fn test_teardown_drains_nested_locks() {
        let video = Rc::new(MemoryVideo::new());
        let mut buffer = hardware(&video, 16, 16);
        assert!(buffer.lock());
        assert!(buffer.lock());
        assert!(buffer.lock());
        buffer.un_init();
        assert_eq!(buffer.lock_count(), 0);
        assert_eq!(video.stats().locks(), 1);
        assert_eq!(video.stats().unlocks(), 1);
        assert!(!buffer.is_allocated());
    }

    #[test]
    fn test_reinit_switches_storage() {
        let video = Rc::new(MemoryVideo::new());
        let mut buffer = hardware(&video, 16, 16);
        assert!(buffer.lock());
        buffer.init(32, 8, Backing::Heap { size: 0 }).expect("reinit");
        assert_eq!(video.stats().unlocks(), 1);
        assert_eq!(buffer.storage_kind(), StorageKind::Owned);
        assert_eq!((buffer.width(), buffer.height()), (32, 8));
        assert!(buffer.lock());
    }

    #[test]
    fn test_failed_reinit_keeps_old_storage() {
        let mut buffer = GraphicBuffer::with_size(8, 8).expect("buffer");
        assert!(buffer.init(-4, 8, Backing::Heap { size: 0 }).is_err());
        assert_eq!(buffer.storage_kind(), StorageKind::Owned);
        assert!(buffer.lock());
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        let result = GraphicBuffer::with_byte_size(1, 1, usize::MAX);
        assert!(matches!(result, Err(GfxError::Allocation { size: usize::MAX })));

        let mut buffer = GraphicBuffer::with_size(8, 8).expect("buffer");
        let base = buffer.offset();
        let result = buffer.init(1, 1, Backing::Heap { size: usize::MAX });
        assert!(matches!(result, Err(GfxError::Allocation { .. })));
        assert_eq!(buffer.storage_kind(), StorageKind::Owned);
        assert_eq!((buffer.width(), buffer.height()), (8, 8));
        assert_eq!(buffer.offset(), base);
        assert!(buffer.lock());
        assert!(buffer.unlock());
    }

    #[test]
    fn test_backing_from_flags() {
        let video: Rc<dyn Video> = Rc::new(MemoryVideo::new());
        let mut memory = vec![0u8; 4];
        assert!(matches!(
            Backing::from_flags(SurfaceFlags::VISIBLE, Some(memory.as_mut_slice()), 0, &video),
            Backing::Surface { .. }
        ));
        assert!(matches!(
            Backing::from_flags(SurfaceFlags::empty(), Some(memory.as_mut_slice()), 0, &video),
            Backing::Memory(_)
        ));
        assert!(matches!(
            Backing::from_flags(SurfaceFlags::empty(), None, 99, &video),
            Backing::Heap { size: 99 }
        ));
    }

    #[test]
    fn test_attach_surface_links_backend_surfaces() {
        let video = Rc::new(MemoryVideo::new());
        let primary = hardware(&video, 16, 16);
        let back = hardware(&video, 16, 16);
        assert!(primary.attach_surface(&back));
        let software = GraphicBuffer::with_size(16, 16).expect("buffer");
        assert!(!primary.attach_surface(&software));
    }

    proptest::proptest! {
        #[test]
        fn prop_balanced_locks_reach_backend_once(n in 1u32..32) {
            let video = Rc::new(MemoryVideo::new());
            let buffer = hardware(&video, 8, 8);
            for _ in 0..n {
                proptest::prop_assert!(buffer.lock());
            }
            proptest::prop_assert_eq!(buffer.lock_count(), n);
            for _ in 0..n {
                proptest::prop_assert!(buffer.unlock());
            }
            proptest::prop_assert_eq!(buffer.lock_count(), 0);
            proptest::prop_assert_eq!(video.stats().locks(), 1);
            proptest::prop_assert_eq!(video.stats().unlocks(), 1);
        }
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_total_locks_counts_real_locks() {
        let video = Rc::new(MemoryVideo::new());
        let buffer = hardware(&video, 16, 16);
        let before = total_locks();
        assert!(buffer.lock());
        assert!(buffer.lock());
        assert!(total_locks() > before);
        assert!(buffer.unlock());
        assert!(buffer.unlock());
    }
}
