use serde::{Deserialize, Serialize};

/// An integer rectangle in root-window coordinates.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn max_x(&self) -> i64 { self.x as i64 + self.width as i64 }

    /// The content area left once a border of `border` pixels is drawn
    /// outside it on every side. X11 rejects zero-sized windows, so each
    /// dimension is clamped to one pixel.
    pub fn inset_border(&self, border: u32) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: self.width.saturating_sub(2 * border).max(1),
            height: self.height.saturating_sub(2 * border).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inset_border_shrinks_both_dimensions() {
        let r = Rect::new(640, 0, 640, 1080).inset_border(2);
        assert_eq!(r, Rect::new(640, 0, 636, 1076));
    }

    #[test]
    fn inset_border_never_produces_empty_window() {
        let r = Rect::new(0, 0, 3, 3).inset_border(4);
        assert_eq!((r.width, r.height), (1, 1));
    }
}
