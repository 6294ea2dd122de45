//! Equal-width horizontal tiling.
//!
//! The layout is a pure function of the ordered window list and the screen:
//! every window gets one full-height column, left to right in list order.

use serde::{Deserialize, Serialize};

use crate::sys::geometry::Rect;
use crate::sys::window_server::WindowServerId;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileAssignment {
    pub window: WindowServerId,
    /// The screen slice owned by this window, border included.
    pub column: Rect,
    /// The content rectangle handed to the display server. The border is
    /// drawn outside it.
    pub frame: Rect,
}

/// Split `screen` into one column per window. Every column is
/// `screen.width / n` wide except the last, which absorbs the remainder so
/// the columns cover the screen exactly.
pub fn calculate_columns(
    windows: &[WindowServerId],
    screen: Rect,
    border_width: u32,
) -> Vec<TileAssignment> {
    let n = windows.len() as u32;
    if n == 0 {
        return Vec::new();
    }
    let base = screen.width / n;
    windows
        .iter()
        .enumerate()
        .map(|(i, &window)| {
            let i = i as u32;
            let width = if i == n - 1 { screen.width - base * (n - 1) } else { base };
            let column = Rect::new(screen.x + (i * base) as i32, screen.y, width, screen.height);
            TileAssignment {
                window,
                column,
                frame: column.inset_border(border_width),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn windows(n: u32) -> Vec<WindowServerId> { (1..=n).map(WindowServerId::new).collect() }

    fn widths(tiles: &[TileAssignment]) -> Vec<u32> { tiles.iter().map(|t| t.column.width).collect() }

    #[test]
    fn no_windows_no_geometry() {
        assert!(calculate_columns(&[], Rect::new(0, 0, 1920, 1080), 2).is_empty());
    }

    #[test]
    fn single_window_fills_the_screen() {
        let tiles = calculate_columns(&windows(1), Rect::new(0, 0, 1920, 1080), 2);
        assert_eq!(tiles, vec![TileAssignment {
            window: WindowServerId::new(1),
            column: Rect::new(0, 0, 1920, 1080),
            frame: Rect::new(0, 0, 1916, 1076),
        }]);
    }

    #[test]
    fn even_split() {
        let tiles = calculate_columns(&windows(3), Rect::new(0, 0, 1920, 1080), 0);
        assert_eq!(widths(&tiles), vec![640, 640, 640]);
        assert_eq!(tiles.iter().map(|t| t.column.x).collect::<Vec<_>>(), vec![0, 640, 1280]);
    }

    #[test]
    fn last_column_absorbs_remainder() {
        let tiles = calculate_columns(&windows(3), Rect::new(0, 0, 1921, 1080), 1);
        assert_eq!(widths(&tiles), vec![640, 640, 641]);
        assert_eq!(tiles[2].frame, Rect::new(1280, 0, 639, 1078));
    }

    #[test]
    fn columns_partition_the_screen() {
        for width in [1, 7, 100, 1023, 1366, 1920, 1921, 2560, 3840] {
            for n in 1..=12u32 {
                let screen = Rect::new(0, 0, width, 800);
                let tiles = calculate_columns(&windows(n), screen, 2);
                assert_eq!(tiles.len(), n as usize);

                let mut next_x = 0i64;
                for tile in &tiles {
                    assert_eq!(tile.column.x as i64, next_x, "gap or overlap at W={width} N={n}");
                    assert_eq!(tile.column.y, 0);
                    assert_eq!(tile.column.height, 800);
                    assert_eq!(tile.frame.x, tile.column.x);
                    next_x = tile.column.max_x();
                }
                assert_eq!(next_x, width as i64, "columns do not span W={width} N={n}");
            }
        }
    }

    #[test]
    fn order_follows_input() {
        let ids = [WindowServerId::new(9), WindowServerId::new(3), WindowServerId::new(5)];
        let tiles = calculate_columns(&ids, Rect::new(0, 0, 900, 600), 0);
        assert_eq!(tiles.iter().map(|t| t.window).collect::<Vec<_>>(), ids.to_vec());
    }
}
