//! Logic page: the viewport that draw calls currently go to
//!
//! Rendering code selects a page, issues draw calls against "whatever is
//! selected", and restores the previous page afterwards. `set` returns the
//! previous page for manual save/restore; `scoped` does the restore on drop.

use super::viewport::Viewport;
use crate::draw::{IconSet, RemapTable, WindowTable};
use std::cell::Cell;

/// Current drawing target selector
#[derive(Default)]
pub struct LogicPage<'v> {
    current: Cell<Option<&'v Viewport<'v>>>,
}

impl<'v> LogicPage<'v> {
    /// Selector with nothing selected
    pub fn new() -> Self {
        Self {
            current: Cell::new(None),
        }
    }

    pub fn with_page(page: &'v Viewport<'v>) -> Self {
        Self {
            current: Cell::new(Some(page)),
        }
    }

    pub fn current(&self) -> Option<&'v Viewport<'v>> {
        self.current.get()
    }

    /// Select `page`, returning the previously selected page
    pub fn set(&self, page: &'v Viewport<'v>) -> Option<&'v Viewport<'v>> {
        self.current.replace(Some(page))
    }

    /// Select `page` (or nothing), returning the previously selected page
    pub fn replace(&self, page: Option<&'v Viewport<'v>>) -> Option<&'v Viewport<'v>> {
        self.current.replace(page)
    }

    /// Select `page` until the returned guard is dropped
    pub fn scoped(&self, page: &'v Viewport<'v>) -> LogicPageGuard<'_, 'v> {
        let previous = self.set(page);
        LogicPageGuard {
            selector: self,
            previous,
        }
    }

    pub fn draw_line(&self, x1: i32, y1: i32, x2: i32, y2: i32, color: u8) -> bool {
        self.current()
            .is_some_and(|page| page.draw_line(x1, y1, x2, y2, color))
    }

    pub fn draw_rect(&self, x1: i32, y1: i32, x2: i32, y2: i32, color: u8) -> bool {
        self.current()
            .is_some_and(|page| page.draw_rect(x1, y1, x2, y2, color))
    }

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
        self.current().is_some_and(|page| {
            page.draw_stamp(icons, icon, x, y, remap, windows, clip_window)
        })
    }

    pub fn clear(&self, color: u8) -> bool {
        self.current().is_some_and(|page| page.clear(color))
    }

    /// Single pixel write with its own lock/unlock
    pub fn put_pixel(&self, x: i32, y: i32, color: u8) -> bool {
        self.current().is_some_and(|page| {
            let locked = page.lock();
            let drawn = locked && page.put_pixel(x, y, color);
            page.unlock();
            drawn
        })
    }
}

/// Restores the previously selected page when dropped
pub struct LogicPageGuard<'p, 'v> {
    selector: &'p LogicPage<'v>,
    previous: Option<&'v Viewport<'v>>,
}

impl<'v> LogicPageGuard<'_, 'v> {
    /// The page that will be restored
    pub fn previous(&self) -> Option<&'v Viewport<'v>> {
        self.previous
    }
}

impl Drop for LogicPageGuard<'_, '_> {
    fn drop(&mut self) {
        self.selector.replace(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbuffer::GraphicBuffer;
    use crate::video::{MemoryVideo, SurfaceFlags, Video};
    use std::rc::Rc;

    fn same(a: Option<&Viewport<'_>>, b: &Viewport<'_>) -> bool {
        a.is_some_and(|a| std::ptr::eq(a, b))
    }

    #[test]
    fn test_set_returns_previous() {
        let buffer = GraphicBuffer::with_size(32, 32).expect("buffer");
        let seen = buffer.view();
        let hidden = Viewport::new(&buffer, 0, 16, 32, 16);
        let page = LogicPage::new();

        assert!(page.set(&seen).is_none());
        let previous = page.set(&hidden);
        assert!(same(previous, &seen));
        assert!(same(page.current(), &hidden));

        // Manual restore
        if let Some(previous) = previous {
            page.set(previous);
        }
        assert!(same(page.current(), &seen));
        assert!(same(page.replace(None), &seen));
        assert!(page.current().is_none());
    }

    #[test]
    fn test_scoped_guards_nest() {
        let buffer = GraphicBuffer::with_size(32, 32).expect("buffer");
        let a = buffer.view();
        let b = Viewport::new(&buffer, 0, 0, 8, 8);
        let c = Viewport::new(&buffer, 8, 8, 8, 8);
        let page = LogicPage::with_page(&a);
        {
            let outer = page.scoped(&b);
            assert!(same(outer.previous(), &a));
            {
                let _inner = page.scoped(&c);
                assert!(same(page.current(), &c));
            }
            assert!(same(page.current(), &b));
        }
        assert!(same(page.current(), &a));
    }

    #[test]
    fn test_draws_go_to_selected_page() {
        let buffer = GraphicBuffer::with_size(32, 32).expect("buffer");
        let root = buffer.view();
        let corner = Viewport::new(&buffer, 16, 16, 16, 16);
        let page = LogicPage::with_page(&root);

        {
            let _corner = page.scoped(&corner);
            assert!(page.put_pixel(0, 0, 3));
            assert!(page.draw_line(0, 2, 3, 2, 4));
        }
        assert!(page.put_pixel(0, 0, 5));

        assert_eq!(root.get_pixel(16, 16), Some(3));
        assert_eq!(root.get_pixel(19, 18), Some(4));
        assert_eq!(root.get_pixel(0, 0), Some(5));
    }

    #[test]
    fn test_nothing_selected_draws_nothing() {
        let page: LogicPage<'_> = LogicPage::new();
        assert!(!page.clear(1));
        assert!(!page.draw_rect(0, 0, 1, 1, 1));
        assert!(!page.put_pixel(0, 0, 1));
    }

    #[test]
    fn test_denied_lock_reported_through_selector() {
        let video = Rc::new(MemoryVideo::new());
        let host: Rc<dyn Video> = video.clone();
        let buffer =
            GraphicBuffer::with_surface(16, 16, host, SurfaceFlags::VISIBLE).expect("buffer");
        let seen = buffer.view();
        let page = LogicPage::with_page(&seen);
        video.set_focus(false);
        assert!(!page.clear(1));
        assert!(!page.draw_rect(0, 0, 4, 4, 1));
        video.set_focus(true);
        assert!(page.clear(1));
    }
}
