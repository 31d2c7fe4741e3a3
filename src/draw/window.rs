//! Clip window table

use crate::video::Rect;

/// Window 0: the full screen
pub const WINDOW_MAIN: usize = 0;

/// Indexed clip rectangles in viewport coordinates
#[derive(Debug, Clone, Default)]
pub struct WindowTable {
    windows: Vec<Option<Rect>>,
}

impl WindowTable {
    /// Table whose main window is `main`
    pub fn new(main: Rect) -> Self {
        Self {
            windows: vec![Some(main)],
        }
    }

    /// Define or redefine window `id`
    pub fn set(&mut self, id: usize, rect: Rect) {
        if id >= self.windows.len() {
            self.windows.resize(id + 1, None);
        }
        self.windows[id] = Some(rect);
    }

    pub fn get(&self, id: usize) -> Option<Rect> {
        self.windows.get(id).copied().flatten()
    }

    /// One past the highest defined window id
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.iter().all(Option::is_none)
    }
}
