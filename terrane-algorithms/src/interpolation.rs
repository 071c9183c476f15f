use anyhow::Result;
use terrane_core::cloud::{PointFilter, PointSource};
use terrane_core::error::ToolError;
use terrane_core::math::{Bounds2, KdTree};
use terrane_core::progress::{ProgressSink, ProgressTicker};
use terrane_core::raster::{PackedRgb, RasterSink};

/// Point attribute written into the output grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationField {
    Elevation,
    Intensity,
    Classification,
    ScanAngle,
    /// Packed color, interpolated per channel
    Rgb,
}

/// Geometry of an output grid aligned to point bounds.
///
/// The grid extends half a cell beyond the point extent on the west and north side so that
/// boundary points fall onto cell centers rather than cell edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub west: f64,
    pub north: f64,
    pub resolution: f64,
    pub rows: usize,
    pub columns: usize,
}

impl GridSpec {
    /// Derives the grid covering `bounds` at the given cell size
    pub fn from_bounds(bounds: &Bounds2, resolution: f64) -> std::result::Result<Self, ToolError> {
        if resolution <= 0.0 {
            return Err(ToolError::InvalidInput(format!(
                "resolution must be > 0, got {}",
                resolution
            )));
        }
        if bounds.is_empty() {
            return Err(ToolError::InvalidInput(
                "cannot derive a grid from empty bounds".into(),
            ));
        }
        let (min_x, min_y) = bounds.min();
        let (max_x, max_y) = bounds.max();
        let west = min_x - resolution / 2.0;
        let north = max_y + resolution / 2.0;
        let rows = ((north - min_y) / resolution).ceil() as usize;
        let columns = ((max_x - west) / resolution).ceil() as usize;
        Ok(Self {
            west,
            north,
            resolution,
            rows,
            columns,
        })
    }

    /// Center coordinate `(x, y)` of the given cell
    pub fn cell_center(&self, row: usize, column: usize) -> (f64, f64) {
        (
            self.west + self.resolution / 2.0 + column as f64 * self.resolution,
            self.north - self.resolution / 2.0 - row as f64 * self.resolution,
        )
    }
}

/// Derives the output grid for a filtered point source. Fails if no point passes the filter.
pub fn derive_grid_spec<S: PointSource + ?Sized>(
    source: &S,
    filter: &PointFilter,
    resolution: f64,
) -> std::result::Result<GridSpec, ToolError> {
    let mut bounds = Bounds2::empty();
    for index in 0..source.len() {
        let record = source.record(index);
        if filter.accepts(&record) {
            bounds.extend_with_point(record.x, record.y);
        }
    }
    if bounds.is_empty() {
        return Err(ToolError::InvalidInput(
            "no points left after filtering".into(),
        ));
    }
    GridSpec::from_bounds(&bounds, resolution)
}

/// Parameters of the inverse-distance-weighted interpolation
#[derive(Debug, Clone, Copy)]
pub struct IdwParams {
    pub field: InterpolationField,
    pub filter: PointFilter,
    /// Exponent of the distance weighting
    pub power: f64,
    /// Number of nearest neighbors considered per cell
    pub neighbor_count: usize,
    /// Neighbors beyond this distance are ignored; `None` means unbounded
    pub max_distance: Option<f64>,
}

impl Default for IdwParams {
    fn default() -> Self {
        Self {
            field: InterpolationField::Elevation,
            filter: PointFilter::keep_all(),
            power: 2.0,
            neighbor_count: 8,
            max_distance: None,
        }
    }
}

/// Parameters of the maximum-value interpolation
#[derive(Debug, Clone, Copy)]
pub struct MaxParams {
    pub field: InterpolationField,
    pub filter: PointFilter,
}

impl Default for MaxParams {
    fn default() -> Self {
        Self {
            field: InterpolationField::Elevation,
            filter: PointFilter::keep_all(),
        }
    }
}

/// Loaded, filtered points keyed for spatial lookup. For scalar fields `values` holds the
/// field directly; for color it holds the packed value.
struct LoadedPoints {
    tree: KdTree<f64, usize>,
    values: Vec<f64>,
}

fn load_points<S: PointSource + ?Sized>(
    source: &S,
    filter: &PointFilter,
    field: InterpolationField,
    progress: &dyn ProgressSink,
) -> Result<LoadedPoints> {
    // count first so the value vector is allocated once
    let mut accepted = 0usize;
    {
        let mut ticker = ProgressTicker::new(progress, "counting points", source.len());
        for index in 0..source.len() {
            ticker.tick(index)?;
            if filter.accepts(&source.record(index)) {
                accepted += 1;
            }
        }
    }

    let mut tree: KdTree<f64, usize> = KdTree::new();
    let mut values = Vec::with_capacity(accepted);
    let mut ticker = ProgressTicker::new(progress, "reading points", source.len());
    for index in 0..source.len() {
        ticker.tick(index)?;
        let record = source.record(index);
        if !filter.accepts(&record) {
            continue;
        }
        let value = match field {
            InterpolationField::Elevation => record.z,
            InterpolationField::Intensity => record.intensity as f64,
            InterpolationField::Classification => record.classification as f64,
            InterpolationField::ScanAngle => record.scan_angle,
            InterpolationField::Rgb => match source.color(index) {
                Some(color) => color as f64,
                None => {
                    return Err(ToolError::InvalidInput(
                        "source carries no color data".into(),
                    )
                    .into())
                }
            },
        };
        tree.insert([record.x, record.y], values.len());
        values.push(value);
    }
    log::info!("loaded {} of {} points", values.len(), source.len());
    Ok(LoadedPoints { tree, values })
}

fn check_sink_dimensions(grid: &GridSpec, sink: &dyn RasterSink) -> std::result::Result<(), ToolError> {
    if sink.rows() != grid.rows || sink.columns() != grid.columns {
        return Err(ToolError::InvalidInput(format!(
            "sink is {}x{} but the grid needs {}x{}",
            sink.rows(),
            sink.columns(),
            grid.rows,
            grid.columns
        )));
    }
    Ok(())
}

/// Fills `sink` with inverse-distance-weighted values of the selected field.
///
/// Each cell takes the weighted mean of its `neighbor_count` nearest points, weighted by
/// `1 / distance^power`. A point exactly on the cell center short-circuits to its exact value.
/// Cells with no point in range receive the sink's no-data value. Color fields are
/// interpolated per channel and repacked as `0xAARRGGBB`.
pub fn interpolate_idw<S: PointSource + ?Sized>(
    source: &S,
    grid: &GridSpec,
    params: &IdwParams,
    sink: &mut dyn RasterSink,
    progress: &dyn ProgressSink,
) -> Result<()> {
    if params.neighbor_count == 0 {
        return Err(ToolError::InvalidInput("neighbor count must be > 0".into()).into());
    }
    if params.power <= 0.0 {
        return Err(ToolError::InvalidInput(format!(
            "power must be > 0, got {}",
            params.power
        ))
        .into());
    }
    check_sink_dimensions(grid, sink)?;
    let loaded = load_points(source, &params.filter, params.field, progress)?;
    let max_squared = params.max_distance.map(|d| d * d);
    let no_data = sink.no_data_value();

    let mut ticker = ProgressTicker::new(progress, "interpolating", grid.rows);
    for row in 0..grid.rows {
        ticker.tick(row)?;
        for column in 0..grid.columns {
            let center = grid.cell_center(row, column);
            let neighbors = loaded
                .tree
                .nearest_neighbors(&[center.0, center.1], params.neighbor_count);

            let value = if params.field == InterpolationField::Rgb {
                idw_color(&neighbors, &loaded.values, params.power, max_squared)
            } else {
                idw_scalar(&neighbors, &loaded.values, params.power, max_squared)
            };
            sink.set_value(row, column, value.unwrap_or(no_data));
        }
    }
    sink.add_metadata_entry(format!(
        "IDW interpolation of {:?}: power {}, {} neighbors, max distance {:?}",
        params.field, params.power, params.neighbor_count, params.max_distance
    ));
    Ok(())
}

fn idw_scalar(
    neighbors: &[terrane_core::math::Neighbor<f64, usize>],
    values: &[f64],
    power: f64,
    max_squared: Option<f64>,
) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for neighbor in neighbors {
        if let Some(max) = max_squared {
            if neighbor.squared_distance > max {
                continue;
            }
        }
        if neighbor.squared_distance == 0.0 {
            return Some(values[neighbor.value]);
        }
        // 1 / d^power, on the squared distance to spare the square root
        let weight = 1.0 / neighbor.squared_distance.powf(power / 2.0);
        weighted_sum += weight * values[neighbor.value];
        weight_sum += weight;
    }
    if weight_sum > 0.0 {
        Some(weighted_sum / weight_sum)
    } else {
        None
    }
}

fn idw_color(
    neighbors: &[terrane_core::math::Neighbor<f64, usize>],
    values: &[f64],
    power: f64,
    max_squared: Option<f64>,
) -> Option<f64> {
    let mut channels = [0.0f64; 3];
    let mut weight_sum = 0.0;
    for neighbor in neighbors {
        if let Some(max) = max_squared {
            if neighbor.squared_distance > max {
                continue;
            }
        }
        let (red, green, blue) = PackedRgb::Argb.unpack(values[neighbor.value] as u32);
        if neighbor.squared_distance == 0.0 {
            return Some(PackedRgb::Argb.pack(red, green, blue) as f64);
        }
        let weight = 1.0 / neighbor.squared_distance.powf(power / 2.0);
        channels[0] += weight * red as f64;
        channels[1] += weight * green as f64;
        channels[2] += weight * blue as f64;
        weight_sum += weight;
    }
    if weight_sum > 0.0 {
        let packed = PackedRgb::Argb.pack(
            (channels[0] / weight_sum).round() as u8,
            (channels[1] / weight_sum).round() as u8,
            (channels[2] / weight_sum).round() as u8,
        );
        Some(packed as f64)
    } else {
        None
    }
}

/// Fills `sink` with the maximum field value of the points around each cell center, searching
/// a radius of `sqrt(2)` cell sizes so diagonal cell neighborhoods overlap. Cells without a
/// point in range receive the sink's no-data value. Color fields are not supported.
pub fn interpolate_max<S: PointSource + ?Sized>(
    source: &S,
    grid: &GridSpec,
    params: &MaxParams,
    sink: &mut dyn RasterSink,
    progress: &dyn ProgressSink,
) -> Result<()> {
    if params.field == InterpolationField::Rgb {
        return Err(ToolError::InvalidInput(
            "maximum interpolation is not defined for color data".into(),
        )
        .into());
    }
    check_sink_dimensions(grid, sink)?;
    let loaded = load_points(source, &params.filter, params.field, progress)?;
    let radius = std::f64::consts::SQRT_2 * grid.resolution;
    let no_data = sink.no_data_value();

    let mut ticker = ProgressTicker::new(progress, "interpolating", grid.rows);
    for row in 0..grid.rows {
        ticker.tick(row)?;
        for column in 0..grid.columns {
            let center = grid.cell_center(row, column);
            let mut best: Option<f64> = None;
            for neighbor in loaded
                .tree
                .neighbors_within_range(&[center.0, center.1], radius)
            {
                let value = loaded.values[neighbor.value];
                if best.map_or(true, |current| value > current) {
                    best = Some(value);
                }
            }
            sink.set_value(row, column, best.unwrap_or(no_data));
        }
    }
    sink.add_metadata_entry(format!("maximum interpolation of {:?}", params.field));
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use terrane_core::cloud::VecPointSource;
    use terrane_core::progress::SilentProgress;
    use terrane_core::raster::{DataScale, MemoryRaster, RasterSource};

    use super::*;

    #[test]
    fn grid_derivation() {
        let source = VecPointSource::from_xyz(&[(0.0, 0.0, 1.0), (10.0, 10.0, 2.0)]);
        let grid = derive_grid_spec(&source, &PointFilter::keep_all(), 1.0).unwrap();
        assert_approx_eq!(grid.west, -0.5);
        assert_approx_eq!(grid.north, 10.5);
        assert_eq!(grid.rows, 11);
        assert_eq!(grid.columns, 11);
        // the north-west point sits on the center of the first cell
        let (x, y) = grid.cell_center(0, 0);
        assert_approx_eq!(x, 0.0);
        assert_approx_eq!(y, 10.0);
    }

    #[test]
    fn empty_filter_result_is_an_error() {
        let source = VecPointSource::from_xyz(&[]);
        assert!(derive_grid_spec(&source, &PointFilter::keep_all(), 1.0).is_err());
    }

    #[test]
    fn idw_is_exact_on_cell_centers() {
        let source = VecPointSource::from_xyz(&[
            (0.0, 0.0, 5.0),
            (2.0, 0.0, 100.0),
            (0.0, 2.0, 200.0),
            (2.0, 2.0, 300.0),
        ]);
        let grid = derive_grid_spec(&source, &PointFilter::keep_all(), 2.0).unwrap();
        let mut sink =
            MemoryRaster::filled_with_no_data(grid.rows, grid.columns, DataScale::Continuous)
                .unwrap();
        interpolate_idw(
            &source,
            &grid,
            &IdwParams::default(),
            &mut sink,
            &SilentProgress,
        )
        .unwrap();

        // (0, 0, 5) falls exactly on the center of the lower-left cell
        assert_eq!(sink.value(1, 0), 5.0);
    }

    #[test]
    fn idw_writes_no_data_beyond_max_distance() {
        let source = VecPointSource::from_xyz(&[(0.0, 0.0, 5.0), (10.0, 10.0, 7.0)]);
        let grid = derive_grid_spec(&source, &PointFilter::keep_all(), 1.0).unwrap();
        let mut sink =
            MemoryRaster::filled_with_no_data(grid.rows, grid.columns, DataScale::Continuous)
                .unwrap();
        let params = IdwParams {
            max_distance: Some(1.0),
            ..Default::default()
        };
        interpolate_idw(&source, &grid, &params, &mut sink, &SilentProgress).unwrap();

        // a cell in the middle of the grid is far from both points
        let middle = sink.value(grid.rows / 2, grid.columns / 2);
        assert_eq!(middle, RasterSource::no_data_value(&sink));
        assert_eq!(sink.value(grid.rows - 1, 0), 5.0);
    }

    #[test]
    fn idw_interpolates_between_points() {
        let source = VecPointSource::from_xyz(&[(0.0, 0.0, 0.0), (2.0, 0.0, 10.0)]);
        let grid = GridSpec {
            west: 0.5,
            north: 0.5,
            resolution: 1.0,
            rows: 1,
            columns: 1,
        };
        let mut sink =
            MemoryRaster::filled_with_no_data(1, 1, DataScale::Continuous).unwrap();
        interpolate_idw(
            &source,
            &grid,
            &IdwParams::default(),
            &mut sink,
            &SilentProgress,
        )
        .unwrap();

        // cell center (1, 0) is equidistant to both points
        assert_approx_eq!(sink.value(0, 0), 5.0);
    }

    #[test]
    fn idw_color_interpolates_per_channel() {
        let red = PackedRgb::Argb.pack(200, 0, 0);
        let blue = PackedRgb::Argb.pack(0, 0, 100);
        let source = VecPointSource::with_colors(
            vec![
                terrane_core::cloud::PointRecord {
                    x: 0.0,
                    y: 0.0,
                    ..Default::default()
                },
                terrane_core::cloud::PointRecord {
                    x: 2.0,
                    y: 0.0,
                    ..Default::default()
                },
            ],
            vec![red, blue],
        );
        let grid = GridSpec {
            west: 0.5,
            north: 0.5,
            resolution: 1.0,
            rows: 1,
            columns: 1,
        };
        let mut sink = MemoryRaster::filled_with_no_data(1, 1, DataScale::Rgb).unwrap();
        let params = IdwParams {
            field: InterpolationField::Rgb,
            ..Default::default()
        };
        interpolate_idw(&source, &grid, &params, &mut sink, &SilentProgress).unwrap();

        let (r, g, b) = PackedRgb::Argb.unpack(sink.value(0, 0) as u32);
        assert_eq!((r, g, b), (100, 0, 50));
    }

    #[test]
    fn max_takes_the_largest_neighbor() {
        let source = VecPointSource::from_xyz(&[
            (0.0, 0.0, 1.0),
            (0.4, 0.4, 9.0),
            (10.0, 10.0, 2.0),
        ]);
        let grid = derive_grid_spec(&source, &PointFilter::keep_all(), 1.0).unwrap();
        let mut sink =
            MemoryRaster::filled_with_no_data(grid.rows, grid.columns, DataScale::Continuous)
                .unwrap();
        interpolate_max(
            &source,
            &grid,
            &MaxParams::default(),
            &mut sink,
            &SilentProgress,
        )
        .unwrap();

        assert_eq!(sink.value(grid.rows - 1, 0), 9.0);
        let middle = sink.value(grid.rows / 2, grid.columns / 2);
        assert_eq!(middle, RasterSource::no_data_value(&sink));
    }

    #[test]
    fn mismatched_sink_dimensions_rejected() {
        let source = VecPointSource::from_xyz(&[(0.0, 0.0, 1.0), (10.0, 10.0, 2.0)]);
        let grid = derive_grid_spec(&source, &PointFilter::keep_all(), 1.0).unwrap();
        let mut sink =
            MemoryRaster::filled_with_no_data(2, 2, DataScale::Continuous).unwrap();
        assert!(interpolate_idw(
            &source,
            &grid,
            &IdwParams::default(),
            &mut sink,
            &SilentProgress
        )
        .is_err());
    }

    #[test]
    fn max_rejects_color_fields() {
        let source = VecPointSource::from_xyz(&[(0.0, 0.0, 1.0), (1.0, 1.0, 2.0)]);
        let grid = derive_grid_spec(&source, &PointFilter::keep_all(), 1.0).unwrap();
        let mut sink =
            MemoryRaster::filled_with_no_data(grid.rows, grid.columns, DataScale::Rgb).unwrap();
        let params = MaxParams {
            field: InterpolationField::Rgb,
            ..Default::default()
        };
        assert!(
            interpolate_max(&source, &grid, &params, &mut sink, &SilentProgress).is_err()
        );
    }
}
