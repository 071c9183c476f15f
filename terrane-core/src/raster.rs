use crate::error::{Result, ToolError};

/// How the cell values of a raster are to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataScale {
    /// Continuous measurements, e.g. elevation or intensity
    Continuous,
    /// Packed 32-bit color values
    Rgb,
}

/// Channel layout of a packed 32-bit color value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedRgb {
    /// `0xAARRGGBB`
    Argb,
    /// `0xAABBGGRR`
    Abgr,
}

impl PackedRgb {
    /// Unpacks a color value into `(red, green, blue)` channels
    /// ```
    /// # use terrane_core::raster::PackedRgb;
    /// assert_eq!(PackedRgb::Argb.unpack(0xFF102030), (0x10, 0x20, 0x30));
    /// assert_eq!(PackedRgb::Abgr.unpack(0xFF102030), (0x30, 0x20, 0x10));
    /// ```
    pub fn unpack(&self, value: u32) -> (u8, u8, u8) {
        match self {
            PackedRgb::Argb => (
                ((value >> 16) & 0xFF) as u8,
                ((value >> 8) & 0xFF) as u8,
                (value & 0xFF) as u8,
            ),
            PackedRgb::Abgr => (
                (value & 0xFF) as u8,
                ((value >> 8) & 0xFF) as u8,
                ((value >> 16) & 0xFF) as u8,
            ),
        }
    }

    /// Packs `(red, green, blue)` channels into a color value with full alpha
    pub fn pack(&self, red: u8, green: u8, blue: u8) -> u32 {
        match self {
            PackedRgb::Argb => {
                0xFF00_0000 | ((red as u32) << 16) | ((green as u32) << 8) | blue as u32
            }
            PackedRgb::Abgr => {
                0xFF00_0000 | ((blue as u32) << 16) | ((green as u32) << 8) | red as u32
            }
        }
    }
}

/// Read access to a gridded raster
pub trait RasterSource {
    /// Number of rows in the raster
    fn rows(&self) -> usize;
    /// Number of columns in the raster
    fn columns(&self) -> usize;
    /// The cell value at the given position
    fn value(&self, row: usize, column: usize) -> f64;
    /// The sentinel marking cells without data
    fn no_data_value(&self) -> f64;
    /// The interpretation of the cell values
    fn data_scale(&self) -> DataScale;
    /// Lower bound of the value range used for display scaling
    fn display_minimum(&self) -> f64;
    /// Upper bound of the value range used for display scaling
    fn display_maximum(&self) -> f64;
}

/// Write access to a gridded raster
pub trait RasterSink {
    /// Number of rows in the raster
    fn rows(&self) -> usize;
    /// Number of columns in the raster
    fn columns(&self) -> usize;
    /// Overwrites the cell value at the given position
    fn set_value(&mut self, row: usize, column: usize, value: f64);
    /// The sentinel the sink uses for cells without data
    fn no_data_value(&self) -> f64;
    /// Attaches a free-form metadata entry, e.g. the provenance of the raster
    fn add_metadata_entry(&mut self, entry: String);
}

/// Default no-data sentinel for rasters that do not declare one
pub const DEFAULT_NO_DATA: f64 = -32768.0;

/// In-memory raster backed by a flat `Vec<f64>`, implementing both [RasterSource] and
/// [RasterSink]
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    rows: usize,
    columns: usize,
    cells: Vec<f64>,
    no_data: f64,
    scale: DataScale,
    display_min: f64,
    display_max: f64,
    metadata: Vec<String>,
}

impl MemoryRaster {
    /// Creates a raster of the given dimensions with every cell set to the no-data value.
    /// Returns an error if either dimension is zero.
    pub fn filled_with_no_data(rows: usize, columns: usize, scale: DataScale) -> Result<Self> {
        if rows == 0 || columns == 0 {
            return Err(ToolError::InvalidInput(format!(
                "raster dimensions must be non-zero, got {}x{}",
                rows, columns
            )));
        }
        Ok(Self {
            rows,
            columns,
            cells: vec![DEFAULT_NO_DATA; rows * columns],
            no_data: DEFAULT_NO_DATA,
            scale,
            display_min: 0.0,
            display_max: 0.0,
            metadata: Vec::new(),
        })
    }

    /// Creates a raster from row-major cell values. Returns an error if the dimensions are zero
    /// or do not match the number of values.
    pub fn from_values(
        rows: usize,
        columns: usize,
        cells: Vec<f64>,
        scale: DataScale,
    ) -> Result<Self> {
        if rows == 0 || columns == 0 {
            return Err(ToolError::InvalidInput(format!(
                "raster dimensions must be non-zero, got {}x{}",
                rows, columns
            )));
        }
        if cells.len() != rows * columns {
            return Err(ToolError::InvalidInput(format!(
                "expected {} cell values, got {}",
                rows * columns,
                cells.len()
            )));
        }
        let mut display_min = f64::INFINITY;
        let mut display_max = f64::NEG_INFINITY;
        for &cell in &cells {
            if cell != DEFAULT_NO_DATA {
                if cell < display_min {
                    display_min = cell;
                }
                if cell > display_max {
                    display_max = cell;
                }
            }
        }
        Ok(Self {
            rows,
            columns,
            cells,
            no_data: DEFAULT_NO_DATA,
            scale,
            display_min,
            display_max,
            metadata: Vec::new(),
        })
    }

    /// Overrides the display range used when rescaling continuous data
    pub fn with_display_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.display_min = minimum;
        self.display_max = maximum;
        self
    }

    /// The metadata entries attached to this raster so far
    pub fn metadata(&self) -> &[String] {
        &self.metadata
    }
}

impl RasterSource for MemoryRaster {
    fn rows(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn value(&self, row: usize, column: usize) -> f64 {
        self.cells[row * self.columns + column]
    }

    fn no_data_value(&self) -> f64 {
        self.no_data
    }

    fn data_scale(&self) -> DataScale {
        self.scale
    }

    fn display_minimum(&self) -> f64 {
        self.display_min
    }

    fn display_maximum(&self) -> f64 {
        self.display_max
    }
}

impl RasterSink for MemoryRaster {
    fn rows(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn set_value(&mut self, row: usize, column: usize, value: f64) {
        self.cells[row * self.columns + column] = value;
    }

    fn no_data_value(&self) -> f64 {
        self.no_data
    }

    fn add_metadata_entry(&mut self, entry: String) {
        self.metadata.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip() {
        for order in [PackedRgb::Argb, PackedRgb::Abgr] {
            let packed = order.pack(12, 200, 77);
            assert_eq!(order.unpack(packed), (12, 200, 77));
        }
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(MemoryRaster::filled_with_no_data(0, 10, DataScale::Continuous).is_err());
        assert!(MemoryRaster::from_values(2, 2, vec![1.0; 3], DataScale::Continuous).is_err());
    }

    #[test]
    fn display_range_skips_no_data() {
        let raster = MemoryRaster::from_values(
            1,
            4,
            vec![5.0, DEFAULT_NO_DATA, -3.0, 10.0],
            DataScale::Continuous,
        )
        .unwrap();
        assert_eq!(raster.display_minimum(), -3.0);
        assert_eq!(raster.display_maximum(), 10.0);
    }
}
