//! Icon (tile) stamping

use crate::gbuffer::Viewport;
use crate::video::Rect;

/// 256-entry colour index translation applied while stamping
pub type RemapTable = [u8; 256];

/// A set of equally sized 8-bit icons stored back to back
#[derive(Debug, Clone)]
pub struct IconSet {
    width: i32,
    height: i32,
    transparent: bool,
    data: Vec<u8>,
}

impl IconSet {
    /// Build a set from packed icon data. `None` if the dimensions are not
    /// positive or `data` is not a whole number of icons.
    pub fn new(width: i32, height: i32, data: Vec<u8>, transparent: bool) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        let icon_size = width as usize * height as usize;
        if data.is_empty() || data.len() % icon_size != 0 {
            return None;
        }
        Some(Self {
            width,
            height,
            transparent,
            data,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Colour 0 is skipped when stamping
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn count(&self) -> usize {
        self.data.len() / self.icon_size()
    }

    fn icon_size(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Pixels of icon `index`, row-major
    pub fn icon(&self, index: usize) -> Option<&[u8]> {
        let size = self.icon_size();
        let start = index.checked_mul(size)?;
        self.data.get(start..start + size)
    }
}

/// Stamp icon `icon` with its top-left at (x, y) relative to `clip`, drawing
/// only the part inside `clip` and the viewport. The caller holds the lock.
///
/// Returns `false` if the icon does not exist.
pub fn draw_stamp_clip(
    view: &Viewport<'_>,
    icons: &IconSet,
    icon: usize,
    x: i32,
    y: i32,
    remap: Option<&RemapTable>,
    clip: Rect,
) -> bool {
    let Some(pixels) = icons.icon(icon) else {
        log::debug!("draw_stamp: icon {} out of range ({} icons)", icon, icons.count());
        return false;
    };
    let Some(clip) = clip.intersect(&Rect::new(0, 0, view.width(), view.height())) else {
        return true;
    };
    // A saturated origin still lies outside the clip window
    let placed = Rect::new(
        clip.x.saturating_add(x),
        clip.y.saturating_add(y),
        icons.width(),
        icons.height(),
    );
    let Some(area) = placed.intersect(&clip) else {
        return true;
    };

    let stride = icons.width() as usize;
    for row in area.y..area.bottom() {
        let src_row = (row - placed.y) as usize;
        for col in area.x..area.right() {
            let src_col = (col - placed.x) as usize;
            let mut color = pixels[src_row * stride + src_col];
            if icons.is_transparent() && color == 0 {
                continue;
            }
            if let Some(table) = remap {
                color = table[usize::from(color)];
            }
            view.put_pixel(col, row, color);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbuffer::GraphicBuffer;

    fn checker() -> IconSet {
        // Two 2x2 icons
        IconSet::new(2, 2, vec![1, 0, 0, 1, 5, 5, 5, 5], true).expect("icons")
    }

    #[test]
    fn test_icon_set_rejects_ragged_data() {
        assert!(IconSet::new(2, 2, vec![0; 7], false).is_none());
        assert!(IconSet::new(0, 2, vec![0; 4], false).is_none());
        assert!(IconSet::new(2, 2, Vec::new(), false).is_none());
    }

    #[test]
    fn test_icon_lookup() {
        let icons = checker();
        assert_eq!(icons.count(), 2);
        assert_eq!(icons.icon(1), Some(&[5u8, 5, 5, 5][..]));
        assert!(icons.icon(2).is_none());
        assert!(icons.icon(usize::MAX).is_none());
    }

    #[test]
    fn test_transparent_icon_skips_zero() {
        let buffer = GraphicBuffer::with_size(4, 4).expect("buffer");
        let view = buffer.view();
        assert!(view.clear(7));
        assert!(view.lock());
        assert!(draw_stamp_clip(&view, &checker(), 0, 1, 1, None, Rect::new(0, 0, 4, 4)));
        assert_eq!(view.get_pixel(1, 1), Some(1));
        assert_eq!(view.get_pixel(2, 1), Some(7));
        assert_eq!(view.get_pixel(2, 2), Some(1));
        assert!(view.unlock());
    }

    #[test]
    fn test_remap_applied() {
        let buffer = GraphicBuffer::with_size(4, 4).expect("buffer");
        let view = buffer.view();
        let mut remap: RemapTable = [0; 256];
        for (i, entry) in remap.iter_mut().enumerate() {
            *entry = i as u8;
        }
        remap[5] = 200;
        assert!(view.lock());
        assert!(draw_stamp_clip(&view, &checker(), 1, 0, 0, Some(&remap), Rect::new(0, 0, 4, 4)));
        assert_eq!(view.get_pixel(0, 0), Some(200));
        assert_eq!(view.get_pixel(1, 1), Some(200));
        assert_eq!(view.get_pixel(2, 2), Some(0));
        assert!(view.unlock());
    }

    #[test]
    fn test_missing_icon_reports_false() {
        let buffer = GraphicBuffer::with_size(4, 4).expect("buffer");
        let view = buffer.view();
        assert!(view.lock());
        assert!(!draw_stamp_clip(&view, &checker(), 3, 0, 0, None, Rect::new(0, 0, 4, 4)));
        assert!(view.unlock());
    }

    #[test]
    fn test_stamp_at_extreme_offsets_draws_nothing() {
        let buffer = GraphicBuffer::with_size(8, 8).expect("buffer");
        let view = buffer.view();
        let clip = Rect::new(2, 2, 4, 4);
        assert!(view.lock());
        for (x, y) in [(i32::MAX, 0), (0, i32::MAX), (i32::MIN, 0), (i32::MIN, i32::MIN)] {
            assert!(draw_stamp_clip(&view, &checker(), 1, x, y, None, clip));
        }
        let mut row = [0u8; 8];
        for y in 0..8 {
            assert_eq!(view.read_row(y, &mut row), 8);
            assert_eq!(row, [0; 8]);
        }
        assert!(view.unlock());
    }

    #[test]
    fn test_stamp_outside_window_draws_nothing() {
        let buffer = GraphicBuffer::with_size(8, 8).expect("buffer");
        let view = buffer.view();
        assert!(view.lock());
        assert!(draw_stamp_clip(&view, &checker(), 1, -4, -4, None, Rect::new(2, 2, 4, 4)));
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(view.get_pixel(x, y), Some(0));
            }
        }
        assert!(view.unlock());
    }
}
