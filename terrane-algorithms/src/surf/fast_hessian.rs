use terrane_core::error::{Result, ToolError};
use terrane_core::image::IntegralImage;
use terrane_core::nalgebra::{Matrix3, Vector3};

use super::{InterestPoint, ResponseLayer};

/// Parameters of the scale-space detector
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectorParams {
    /// Number of octaves of the response pyramid
    pub octaves: usize,
    /// Sampling stride of the finest octave, in pixels
    pub init_sample: usize,
    /// Minimum absolute response for a candidate extremum
    pub threshold: f32,
    /// Weight of the mixed second derivative in the determinant approximation
    pub balance: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            octaves: 5,
            init_sample: 2,
            threshold: 0.0085,
            balance: 0.81,
        }
    }
}

/// Detects scale-space interest points in the given integral image.
///
/// Builds a pyramid of Hessian response layers, scans consecutive layer triples for strict
/// 3x3x3 extrema above the response threshold and refines each surviving candidate to sub-pixel
/// position and scale. Candidates whose refinement system is singular or whose refined offset
/// leaves the sampling cell are dropped.
pub fn detect(integral: &IntegralImage, params: &DetectorParams) -> Result<Vec<InterestPoint>> {
    if params.octaves == 0 {
        return Err(ToolError::InvalidInput("octaves must be > 0".into()));
    }
    if params.init_sample == 0 {
        return Err(ToolError::InvalidInput("init_sample must be > 0".into()));
    }

    let layers = build_layers(integral, params);
    let mut points = Vec::new();

    for octave in 0..params.octaves {
        let map = filter_map(octave);
        if map[3] >= layers.len() {
            break;
        }
        for i in 0..2 {
            let bottom = &layers[map[i]];
            let middle = &layers[map[i + 1]];
            let top = &layers[map[i + 2]];
            for row in 0..top.height() {
                for column in 0..top.width() {
                    if is_extremum(row, column, top, middle, bottom, params.threshold) {
                        if let Some(point) = interpolate(row, column, top, middle, bottom) {
                            points.push(point);
                        }
                    }
                }
            }
        }
    }
    log::debug!("detected {} interest points", points.len());
    Ok(points)
}

/// Filter sizes grow by 6 * 2^octave within an octave; every octave past the first reuses the
/// middle layers of its predecessor and contributes only its two largest filters.
fn build_layers(integral: &IntegralImage, params: &DetectorParams) -> Vec<ResponseLayer> {
    let base_width = integral.width() / params.init_sample;
    let base_height = integral.height() / params.init_sample;

    let mut layers = Vec::new();
    let mut sizes = [9i32, 15, 21, 27];
    for octave in 0..params.octaves {
        let width = base_width >> octave;
        let height = base_height >> octave;
        if width == 0 || height == 0 {
            break;
        }
        let step = params.init_sample << octave;
        if octave == 0 {
            for &filter in &sizes {
                layers.push(ResponseLayer::build(
                    integral,
                    width,
                    height,
                    step,
                    filter,
                    params.balance,
                ));
            }
        } else {
            let increase = 6 << octave;
            sizes = [
                sizes[1],
                sizes[3],
                sizes[3] + increase,
                sizes[3] + 2 * increase,
            ];
            for &filter in &sizes[2..] {
                layers.push(ResponseLayer::build(
                    integral,
                    width,
                    height,
                    step,
                    filter,
                    params.balance,
                ));
            }
        }
    }
    layers
}

/// Indices into the layer list forming the four filter sizes of an octave
fn filter_map(octave: usize) -> [usize; 4] {
    if octave == 0 {
        [0, 1, 2, 3]
    } else {
        let first = 1 + 2 * (octave - 1);
        [first, first + 2, first + 3, first + 4]
    }
}

/// Sign-aware strict extremum test over the 3x3x3 neighborhood of `(row, column)` in the middle
/// layer, sampled on the top layer's grid
fn is_extremum(
    row: usize,
    column: usize,
    top: &ResponseLayer,
    middle: &ResponseLayer,
    bottom: &ResponseLayer,
    threshold: f32,
) -> bool {
    let border = ((top.filter() + 1) / (2 * top.step() as i32)) as usize;
    if top.height() <= 2 * border || top.width() <= 2 * border {
        return false;
    }
    if row <= border
        || row >= top.height() - border
        || column <= border
        || column >= top.width() - border
    {
        return false;
    }

    let candidate = middle.response_relative(row, column, top);
    if candidate.abs() < threshold {
        return false;
    }

    for dr in -1i32..=1 {
        for dc in -1i32..=1 {
            let r = (row as i32 + dr) as usize;
            let c = (column as i32 + dc) as usize;
            let top_value = top.response(r, c);
            let middle_value = middle.response_relative(r, c, top);
            let bottom_value = bottom.response_relative(r, c, top);
            let center = dr == 0 && dc == 0;
            if candidate >= 0.0 {
                if top_value >= candidate
                    || (!center && middle_value >= candidate)
                    || bottom_value >= candidate
                {
                    return false;
                }
            } else if top_value <= candidate
                || (!center && middle_value <= candidate)
                || bottom_value <= candidate
            {
                return false;
            }
        }
    }
    true
}

/// Refines an extremum to sub-pixel position and scale by solving the local second-order
/// system. Returns `None` when the system is singular or the refined offset leaves the cell.
fn interpolate(
    row: usize,
    column: usize,
    top: &ResponseLayer,
    middle: &ResponseLayer,
    bottom: &ResponseLayer,
) -> Option<InterestPoint> {
    let m = |dr: i32, dc: i32| {
        middle.response_relative(
            (row as i32 + dr) as usize,
            (column as i32 + dc) as usize,
            top,
        )
    };
    let t = |dr: i32, dc: i32| top.response((row as i32 + dr) as usize, (column as i32 + dc) as usize);
    let b = |dr: i32, dc: i32| {
        bottom.response_relative(
            (row as i32 + dr) as usize,
            (column as i32 + dc) as usize,
            top,
        )
    };

    let dx = (m(0, 1) - m(0, -1)) / 2.0;
    let dy = (m(1, 0) - m(-1, 0)) / 2.0;
    let ds = (t(0, 0) - b(0, 0)) / 2.0;

    let value = m(0, 0);
    let dxx = m(0, 1) + m(0, -1) - 2.0 * value;
    let dyy = m(1, 0) + m(-1, 0) - 2.0 * value;
    let dss = t(0, 0) + b(0, 0) - 2.0 * value;
    let dxy = (m(1, 1) - m(1, -1) - m(-1, 1) + m(-1, -1)) / 4.0;
    let dxs = (t(0, 1) - t(0, -1) - b(0, 1) + b(0, -1)) / 4.0;
    let dys = (t(1, 0) - t(-1, 0) - b(1, 0) + b(-1, 0)) / 4.0;

    let hessian = Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss);
    let derivative = Vector3::new(dx, dy, ds);
    let solution = hessian.lu().solve(&derivative)?;

    let xc = -solution[0];
    let xr = -solution[1];
    let xi = -solution[2];
    if xc.abs() >= 0.5 || xr.abs() >= 0.5 || xi.abs() >= 0.5 {
        return None;
    }

    let step = top.step() as f32;
    let filter_step = (middle.filter() - bottom.filter()) as f32;
    Some(InterestPoint::new(
        (column as f32 + xc) * step,
        (row as f32 + xr) * step,
        0.1333 * (middle.filter() as f32 + xi * filter_step),
        middle.laplacian_relative(row, column, top),
    ))
}
