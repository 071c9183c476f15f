use crate::error::{Result, ToolError};
use crate::raster::{DataScale, PackedRgb, RasterSource};

/// Summed-area table over a grayscale image.
///
/// Each cell holds the sum of all source values above and to the left of it (inclusive), which
/// makes the sum over any axis-aligned rectangle a four-lookup operation via
/// [box_integral](IntegralImage::box_integral).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntegralImage {
    width: usize,
    height: usize,
    cells: Vec<f32>,
}

impl IntegralImage {
    /// Builds an integral image of the given dimensions, sampling source values from `pixel`.
    /// `pixel(row, column)` is expected to return values in `[0, 1]`. Returns an error if
    /// either dimension is zero.
    pub fn from_fn<F>(width: usize, height: usize, pixel: F) -> Result<Self>
    where
        F: Fn(usize, usize) -> f32,
    {
        if width == 0 || height == 0 {
            return Err(ToolError::InvalidInput(format!(
                "image dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        let mut cells = vec![0.0f32; width * height];
        for row in 0..height {
            let mut row_sum = 0.0f32;
            for column in 0..width {
                row_sum += pixel(row, column);
                let above = if row > 0 {
                    cells[(row - 1) * width + column]
                } else {
                    0.0
                };
                cells[row * width + column] = row_sum + above;
            }
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Builds an integral image from a raster. Continuous data is rescaled from the raster's
    /// display range to `[0, 1]` with no-data cells contributing zero; packed color data is
    /// converted to luminance `0.299 R + 0.587 G + 0.114 B` using the given channel order.
    pub fn from_raster<R: RasterSource + ?Sized>(raster: &R, order: PackedRgb) -> Result<Self> {
        let no_data = raster.no_data_value();
        match raster.data_scale() {
            DataScale::Continuous => {
                let minimum = raster.display_minimum();
                let range = raster.display_maximum() - minimum;
                Self::from_fn(raster.columns(), raster.rows(), |row, column| {
                    let value = raster.value(row, column);
                    if value == no_data || range <= 0.0 {
                        0.0
                    } else {
                        ((value - minimum) / range) as f32
                    }
                })
            }
            DataScale::Rgb => Self::from_fn(raster.columns(), raster.rows(), |row, column| {
                let value = raster.value(row, column);
                if value == no_data {
                    0.0
                } else {
                    let (red, green, blue) = order.unpack(value as u32);
                    let luma =
                        0.299 * red as f64 + 0.587 * green as f64 + 0.114 * blue as f64;
                    (luma.round() / 255.0) as f32
                }
            }),
        }
    }

    /// Width of the underlying image in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the underlying image in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Sum of the source values inside the rectangle starting at `(row, col)` and spanning
    /// `rows` by `cols` pixels. The rectangle is clipped against the image; coordinates may be
    /// negative. The result is clamped to be non-negative, so accumulated rounding error never
    /// produces a negative box sum.
    pub fn box_integral(&self, row: i32, col: i32, rows: i32, cols: i32) -> f32 {
        let height = self.height as i32;
        let width = self.width as i32;
        let r1 = row.min(height) - 1;
        let c1 = col.min(width) - 1;
        let r2 = (row + rows).min(height) - 1;
        let c2 = (col + cols).min(width) - 1;

        let a = self.cell(r1, c1);
        let b = self.cell(r1, c2);
        let c = self.cell(r2, c1);
        let d = self.cell(r2, c2);
        (a - b - c + d).max(0.0)
    }

    fn cell(&self, row: i32, col: i32) -> f32 {
        if row >= 0 && col >= 0 {
            self.cells[row as usize * self.width + col as usize]
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::MemoryRaster;
    use rand::prelude::*;

    #[test]
    fn zero_dimensions_rejected() {
        assert!(IntegralImage::from_fn(0, 10, |_, _| 0.0).is_err());
        assert!(IntegralImage::from_fn(10, 0, |_, _| 0.0).is_err());
    }

    #[test]
    fn box_sums_match_brute_force() {
        let mut rng = StdRng::seed_from_u64(99);
        let width = 37;
        let height = 23;
        let pixels: Vec<f32> = (0..width * height).map(|_| rng.gen_range(0.0..1.0)).collect();
        let integral =
            IntegralImage::from_fn(width, height, |row, column| pixels[row * width + column])
                .unwrap();

        for _ in 0..200 {
            let row = rng.gen_range(-5..height as i32 + 5);
            let col = rng.gen_range(-5..width as i32 + 5);
            let rows = rng.gen_range(0..height as i32 + 5);
            let cols = rng.gen_range(0..width as i32 + 5);

            let mut expected = 0.0f64;
            for r in row.max(0)..(row + rows).min(height as i32) {
                for c in col.max(0)..(col + cols).min(width as i32) {
                    expected += pixels[r as usize * width + c as usize] as f64;
                }
            }
            let actual = integral.box_integral(row, col, rows, cols);
            assert!(
                (actual as f64 - expected).abs() < 1e-3,
                "box ({}, {}, {}, {}): expected {}, got {}",
                row,
                col,
                rows,
                cols,
                expected,
                actual
            );
        }
    }

    #[test]
    fn fully_outside_box_is_zero() {
        let integral = IntegralImage::from_fn(10, 10, |_, _| 1.0).unwrap();
        assert_eq!(integral.box_integral(-20, -20, 5, 5), 0.0);
        assert_eq!(integral.box_integral(100, 100, 5, 5), 0.0);
    }

    #[test]
    fn continuous_raster_is_rescaled() {
        let raster = MemoryRaster::from_values(
            2,
            2,
            vec![10.0, 20.0, 30.0, 40.0],
            DataScale::Continuous,
        )
        .unwrap();
        let integral = IntegralImage::from_raster(&raster, PackedRgb::Argb).unwrap();
        // rescaled pixels are 0, 1/3, 2/3, 1; full-image sum is 2
        assert!((integral.box_integral(0, 0, 2, 2) - 2.0).abs() < 1e-6);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip_preserves_box_sums() {
        let integral =
            IntegralImage::from_fn(8, 8, |row, column| (row + column) as f32 / 14.0).unwrap();
        let encoded = serde_json::to_string(&integral).unwrap();
        let decoded: IntegralImage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.width(), integral.width());
        assert_eq!(decoded.height(), integral.height());
        assert_eq!(
            decoded.box_integral(2, 1, 4, 5),
            integral.box_integral(2, 1, 4, 5)
        );
    }

    #[test]
    fn rgb_raster_uses_luminance() {
        let white = PackedRgb::Argb.pack(255, 255, 255) as f64;
        let raster =
            MemoryRaster::from_values(1, 1, vec![white], DataScale::Rgb).unwrap();
        let integral = IntegralImage::from_raster(&raster, PackedRgb::Argb).unwrap();
        assert!((integral.box_integral(0, 0, 1, 1) - 1.0).abs() < 1e-6);
    }
}
