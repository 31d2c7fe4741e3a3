//! Clipped line primitive

use crate::gbuffer::Viewport;

const INSIDE: u8 = 0;
const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const BOTTOM: u8 = 4;
const TOP: u8 = 8;
// Converges in at most 4 passes for well-formed input
const MAX_ITERATIONS: u32 = 16;

/// Draw a line using Bresenham's algorithm with Cohen-Sutherland clipping
/// against the viewport. The caller holds the viewport's lock.
pub fn draw_line(view: &Viewport<'_>, x1: i32, y1: i32, x2: i32, y2: i32, color: u8) {
    let Some((cx0, cy0, cx1, cy1)) = clip_line(view.width(), view.height(), x1, y1, x2, y2)
    else {
        return;
    };

    let dx = (cx1 - cx0).abs();
    let dy = -((cy1 - cy0).abs());
    let sx = if cx0 < cx1 { 1 } else { -1 };
    let sy = if cy0 < cy1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut x = cx0;
    let mut y = cy0;

    loop {
        view.put_pixel(x, y, color);
        if x == cx1 && y == cy1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn outcode(w: i64, h: i64, x: i64, y: i64) -> u8 {
    let mut code = INSIDE;
    if x < 0 {
        code |= LEFT;
    } else if x >= w {
        code |= RIGHT;
    }
    if y < 0 {
        code |= TOP;
    } else if y >= h {
        code |= BOTTOM;
    }
    code
}

/// `a0 + da * num / den`; the product needs more than 64 bits when both
/// factors span the whole i32 range
#[inline]
fn intercept(a0: i64, da: i64, num: i64, den: i64) -> i64 {
    a0 + (i128::from(da) * i128::from(num) / i128::from(den)) as i64
}

/// Cohen-Sutherland clip of a segment to `0..w` x `0..h`.
///
/// Endpoints are widened to i64 before any arithmetic so segments spanning
/// the whole i32 range clip without overflow.
fn clip_line(w: i32, h: i32, x0: i32, y0: i32, x1: i32, y1: i32) -> Option<(i32, i32, i32, i32)> {
    if w <= 0 || h <= 0 {
        return None;
    }
    let (w, h) = (i64::from(w), i64::from(h));
    let (mut x0, mut y0) = (i64::from(x0), i64::from(y0));
    let (mut x1, mut y1) = (i64::from(x1), i64::from(y1));
    let mut code0 = outcode(w, h, x0, y0);
    let mut code1 = outcode(w, h, x1, y1);

    for _ in 0..MAX_ITERATIONS {
        if (code0 | code1) == 0 {
            // Both ends inside 0..w x 0..h, so they fit back in i32
            return Some((x0 as i32, y0 as i32, x1 as i32, y1 as i32));
        }
        if (code0 & code1) != 0 {
            return None;
        }

        let code_out = if code0 != 0 { code0 } else { code1 };
        let dy = y1 - y0;
        let dx = x1 - x0;
        let (x, y);

        if (code_out & BOTTOM) != 0 {
            if dy == 0 {
                return None;
            }
            x = intercept(x0, dx, h - 1 - y0, dy);
            y = h - 1;
        } else if (code_out & TOP) != 0 {
            if dy == 0 {
                return None;
            }
            x = intercept(x0, dx, -y0, dy);
            y = 0;
        } else if (code_out & RIGHT) != 0 {
            if dx == 0 {
                return None;
            }
            y = intercept(y0, dy, w - 1 - x0, dx);
            x = w - 1;
        } else {
            if dx == 0 {
                return None;
            }
            y = intercept(y0, dy, -x0, dx);
            x = 0;
        }

        if code_out == code0 {
            x0 = x;
            y0 = y;
            code0 = outcode(w, h, x0, y0);
        } else {
            x1 = x;
            y1 = y;
            code1 = outcode(w, h, x1, y1);
        }
    }

    None
}
