//! 256-colour palette for presenting 8-bit pixels

/// Bytes in a packed VGA palette: 256 entries of 6-bit R, G, B
pub const VGA_PALETTE_SIZE: usize = 768;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [[u8; 3]; 256],
}

impl Default for Palette {
    fn default() -> Self {
        Self::grayscale()
    }
}

/// Expand a 6-bit DAC level to 8 bits
#[inline]
fn expand6(v: u8) -> u8 {
    let v = v & 0x3f;
    (v << 2) | (v >> 4)
}

impl Palette {
    pub fn grayscale() -> Self {
        let mut entries = [[0u8; 3]; 256];
        for (i, entry) in entries.iter_mut().enumerate() {
            *entry = [i as u8; 3];
        }
        Self { entries }
    }

    /// Parse a packed VGA palette (768 bytes of 6-bit components)
    pub fn from_vga(data: &[u8]) -> Option<Self> {
        if data.len() != VGA_PALETTE_SIZE {
            return None;
        }
        let mut entries = [[0u8; 3]; 256];
        for (entry, rgb) in entries.iter_mut().zip(data.chunks_exact(3)) {
            *entry = [expand6(rgb[0]), expand6(rgb[1]), expand6(rgb[2])];
        }
        Some(Self { entries })
    }

    pub fn set(&mut self, index: u8, r: u8, g: u8, b: u8) {
        self.entries[usize::from(index)] = [r, g, b];
    }

    pub fn get(&self, index: u8) -> (u8, u8, u8) {
        let [r, g, b] = self.entries[usize::from(index)];
        (r, g, b)
    }

    /// Convert a row of indices to RGBA8888 (ABGR byte order in memory).
    /// Converts as many pixels as both slices hold.
    pub fn write_rgba8888(&self, indices: &[u8], dest: &mut [u8]) {
        for (&index, px) in indices.iter().zip(dest.chunks_exact_mut(4)) {
            let [r, g, b] = self.entries[usize::from(index)];
            px[0] = 255; // A
            px[1] = b;
            px[2] = g;
            px[3] = r;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grayscale() {
        let palette = Palette::grayscale();
        assert_eq!(palette.get(0), (0, 0, 0));
        assert_eq!(palette.get(128), (128, 128, 128));
        assert_eq!(palette.get(255), (255, 255, 255));
    }

    #[test]
    fn test_from_vga_expands_six_bit() {
        let mut data = vec![0u8; VGA_PALETTE_SIZE];
        data[3..6].copy_from_slice(&[63, 32, 0]);
        let palette = Palette::from_vga(&data).expect("palette");
        assert_eq!(palette.get(1), (255, 130, 0));
        assert_eq!(palette.get(0), (0, 0, 0));
        assert!(Palette::from_vga(&data[..767]).is_none());
    }

    #[test]
    fn test_write_rgba8888_byte_order() {
        let mut palette = Palette::grayscale();
        palette.set(7, 10, 20, 30);
        let mut out = [0u8; 8];
        palette.write_rgba8888(&[7, 0], &mut out);
        assert_eq!(out, [255, 30, 20, 10, 255, 0, 0, 0]);
    }

    #[test]
    fn test_write_stops_at_shorter_slice() {
        let palette = Palette::grayscale();
        let mut out = [9u8; 6];
        palette.write_rgba8888(&[1, 2, 3], &mut out);
        assert_eq!(out, [255, 1, 1, 1, 9, 9]);
    }
}
