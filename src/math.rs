
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RoundingMode {
    Down, Up,
}

impl RoundingMode {
    pub fn divide(self, dividend: u32, divisor: u32) -> u32 {
        match self {
            RoundingMode::Up => (dividend + divisor - 1) / divisor, // only works for positive numbers
            RoundingMode::Down => dividend / divisor,
        }
    }
}

/// Number of tiles needed to cover `full_res` cells of `tile_size` cells
/// each, rounding up so a partially populated last tile still counts.
pub fn compute_tile_count(full_res: u32, tile_size: u32) -> u32 {
    RoundingMode::Up.divide(full_res, tile_size)
}

/// A point in grid space: zero-based row and column.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct GridPoint {
    pub row: i64,
    pub col: i64,
}

/// A point in model (Cartesian or geographic) space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModelPoint {
    pub x: f64,
    pub y: f64,
}

/// How grid rows/columns map onto model x/y coordinates, computed once
/// from the raster bounds `(x0, y0) .. (x1, y1)` and dimensions (§4.12).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    pub x0: f64, pub y0: f64, pub x1: f64, pub y1: f64,
    pub n_rows: u32, pub n_cols: u32,
    pub geographic: bool,
}

impl CoordinateTransform {
    fn cell_width(&self) -> f64 { (self.x1 - self.x0) / self.n_cols as f64 }
    fn cell_height(&self) -> f64 { (self.y1 - self.y0) / self.n_rows as f64 }

    /// Maps a grid row/column to a model-space point at the cell center.
    /// Row 0 is the top of the raster, matching the row-major cell layout.
    pub fn grid_to_model(&self, point: GridPoint) -> ModelPoint {
        let mut x = self.x0 + (point.col as f64 + 0.5) * self.cell_width();
        let y = self.y1 - (point.row as f64 + 0.5) * self.cell_height();

        if self.geographic {
            x = wrap_longitude(x);
        }

        ModelPoint { x, y }
    }

    /// Maps a model-space point back to the grid row/column whose cell
    /// contains it. For geographic coordinates, x wraps at +/-180 degrees
    /// before the mapping is computed.
    pub fn model_to_grid(&self, point: ModelPoint) -> GridPoint {
        let x = if self.geographic { wrap_longitude_into(point.x, self.x0, self.x1) } else { point.x };

        let col = ((x - self.x0) / self.cell_width()).floor() as i64;
        let row = ((self.y1 - point.y) / self.cell_height()).floor() as i64;
        GridPoint { row, col }
    }
}

/// Wraps a longitude into the canonical [-180, 180) range.
fn wrap_longitude(mut x: f64) -> f64 {
    while x < -180.0 { x += 360.0; }
    while x >= 180.0 { x -= 360.0; }
    x
}

/// Wraps `x` into whichever 360-degree-wide window starting at a multiple
/// of 360 from `x0` contains it, so that raster bounds not centered on the
/// date line still resolve correctly.
fn wrap_longitude_into(mut x: f64, x0: f64, x1: f64) -> f64 {
    let span = x1 - x0;
    if span <= 0.0 || span > 360.0 + 1e-9 {
        return x;
    }

    while x < x0 { x += 360.0; }
    while x >= x0 + 360.0 { x -= 360.0; }
    x
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tile_count_rounds_up() {
        assert_eq!(compute_tile_count(10, 4), 3);
        assert_eq!(compute_tile_count(8, 4), 2);
        assert_eq!(compute_tile_count(1, 4), 1);
    }

    #[test]
    fn cartesian_round_trip() {
        let transform = CoordinateTransform {
            x0: 0.0, y0: 0.0, x1: 100.0, y1: 50.0,
            n_rows: 50, n_cols: 100, geographic: false,
        };

        let grid = GridPoint { row: 10, col: 20 };
        let model = transform.grid_to_model(grid);
        let back = transform.model_to_grid(model);
        assert_eq!(grid, back);
    }

    #[test]
    fn longitude_wraps() {
        assert!((wrap_longitude(190.0) - (-170.0)).abs() < 1e-9);
        assert!((wrap_longitude(-190.0) - 170.0).abs() < 1e-9);
    }
}
