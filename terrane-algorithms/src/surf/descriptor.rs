use std::f32::consts::PI;

use itertools::iproduct;
use terrane_core::image::IntegralImage;

use super::{InterestPoint, DESCRIPTOR_LENGTH};

/// Discretised 7x7 Gaussian (sigma 2.5) used to weigh orientation samples, indexed by the
/// absolute sample offsets
#[rustfmt::skip]
const GAUSS25: [[f32; 7]; 7] = [
    [0.02546481, 0.02350698, 0.01849125, 0.01239505, 0.00708017, 0.00344629, 0.00142946],
    [0.02350698, 0.02169968, 0.01706957, 0.01144208, 0.00653582, 0.00318132, 0.00131956],
    [0.01849125, 0.01706957, 0.01342740, 0.00900066, 0.00514126, 0.00250252, 0.00103800],
    [0.01239505, 0.01144208, 0.00900066, 0.00603332, 0.00344629, 0.00167749, 0.00069579],
    [0.00708017, 0.00653582, 0.00514126, 0.00344629, 0.00196855, 0.00095820, 0.00039744],
    [0.00344629, 0.00318132, 0.00250252, 0.00167749, 0.00095820, 0.00046640, 0.00019346],
    [0.00142946, 0.00131956, 0.00103800, 0.00069579, 0.00039744, 0.00019346, 0.00008024],
];

/// Builds orientations and descriptors for detected interest points over one integral image
pub struct DescriptorBuilder<'a> {
    integral: &'a IntegralImage,
}

impl<'a> DescriptorBuilder<'a> {
    pub fn new(integral: &'a IntegralImage) -> Self {
        Self { integral }
    }

    /// Horizontal Haar wavelet response of size `size` centered at `(row, column)`
    fn haar_x(&self, row: i32, column: i32, size: i32) -> f32 {
        self.integral
            .box_integral(row - size / 2, column, size, size / 2)
            - self
                .integral
                .box_integral(row - size / 2, column - size / 2, size, size / 2)
    }

    /// Vertical Haar wavelet response of size `size` centered at `(row, column)`
    fn haar_y(&self, row: i32, column: i32, size: i32) -> f32 {
        self.integral
            .box_integral(row, column - size / 2, size / 2, size)
            - self
                .integral
                .box_integral(row - size / 2, column - size / 2, size / 2, size)
    }

    /// Assigns the dominant orientation: Haar responses in a circle of radius 6 scale units are
    /// collected, then a pi/3 window slides around the circle in 0.15 radian steps and the
    /// window with the largest summed response wins.
    pub fn assign_orientation(&self, point: &mut InterestPoint) {
        let scale = point.scale.round() as i32;
        let row = point.y.round() as i32;
        let column = point.x.round() as i32;

        let mut res_x = Vec::with_capacity(109);
        let mut res_y = Vec::with_capacity(109);
        let mut angles = Vec::with_capacity(109);
        for (i, j) in iproduct!(-6i32..=6, -6i32..=6) {
            if i * i + j * j < 36 {
                let gauss = GAUSS25[i.unsigned_abs() as usize][j.unsigned_abs() as usize];
                let x = gauss * self.haar_x(row + j * scale, column + i * scale, 4 * scale);
                let y = gauss * self.haar_y(row + j * scale, column + i * scale, 4 * scale);
                res_x.push(x);
                res_y.push(y);
                angles.push(angle_of(x, y));
            }
        }

        let mut best = 0.0f32;
        let mut orientation = 0.0f32;
        let mut window_start = 0.0f32;
        while window_start < 2.0 * PI {
            let window_end = if window_start + PI / 3.0 > 2.0 * PI {
                window_start - 5.0 * PI / 3.0
            } else {
                window_start + PI / 3.0
            };

            let mut sum_x = 0.0f32;
            let mut sum_y = 0.0f32;
            for ((&angle, &x), &y) in angles.iter().zip(&res_x).zip(&res_y) {
                let inside = if window_start < window_end {
                    window_start < angle && angle < window_end
                } else {
                    (angle > 0.0 && angle < window_end)
                        || (angle > window_start && angle < 2.0 * PI)
                };
                if inside {
                    sum_x += x;
                    sum_y += y;
                }
            }

            let magnitude = sum_x * sum_x + sum_y * sum_y;
            if magnitude > best {
                best = magnitude;
                orientation = angle_of(sum_x, sum_y);
            }
            window_start += 0.15;
        }
        point.orientation = orientation;
    }

    /// Builds the 64-element descriptor: 4x4 subregions of 9x9 rotated Haar samples, weighted
    /// by a sigma 2.5 scale-units Gaussian around each subregion center and a sigma 1.5
    /// Gaussian across subregions, then normalized to unit length. An all-zero response field
    /// leaves the descriptor at zero instead of dividing by zero.
    ///
    /// With `upright` set the point's orientation is ignored and the sampling grid stays axis
    /// aligned.
    pub fn build_descriptor(&self, point: &mut InterestPoint, upright: bool) {
        let x = point.x.round();
        let y = point.y.round();
        let scale = point.scale;
        let round_scale = scale.round() as i32;
        let (si, co) = if upright {
            (0.0f32, 1.0f32)
        } else {
            point.orientation.sin_cos()
        };

        let mut descriptor = [0.0f32; DESCRIPTOR_LENGTH];
        let mut count = 0;
        let mut total = 0.0f32;
        let mut cx = -0.5f32;

        let mut i = -8i32;
        while i < 12 {
            let mut j = -8i32;
            i -= 4;
            cx += 1.0;
            let mut cy = -0.5f32;
            while j < 12 {
                j -= 4;
                cy += 1.0;

                let ix = i + 5;
                let jx = j + 5;
                let xs =
                    (x + (-(jx as f32) * scale * si + ix as f32 * scale * co)).round();
                let ys = (y + (jx as f32 * scale * co + ix as f32 * scale * si)).round();

                let mut dx = 0.0f32;
                let mut dy = 0.0f32;
                let mut mdx = 0.0f32;
                let mut mdy = 0.0f32;
                for k in i..i + 9 {
                    for l in j..j + 9 {
                        let sample_x =
                            (x + (-(l as f32) * scale * si + k as f32 * scale * co)).round();
                        let sample_y =
                            (y + (l as f32 * scale * co + k as f32 * scale * si)).round();

                        let gauss_inner =
                            gaussian(xs - sample_x, ys - sample_y, 2.5 * scale);
                        let rx =
                            self.haar_x(sample_y as i32, sample_x as i32, 2 * round_scale);
                        let ry =
                            self.haar_y(sample_y as i32, sample_x as i32, 2 * round_scale);

                        let rrx = gauss_inner * (-rx * si + ry * co);
                        let rry = gauss_inner * (rx * co + ry * si);
                        dx += rrx;
                        dy += rry;
                        mdx += rrx.abs();
                        mdy += rry.abs();
                    }
                }

                let gauss_outer = gaussian(cx - 2.0, cy - 2.0, 1.5);
                descriptor[count] = dx * gauss_outer;
                descriptor[count + 1] = dy * gauss_outer;
                descriptor[count + 2] = mdx * gauss_outer;
                descriptor[count + 3] = mdy * gauss_outer;
                count += 4;
                total +=
                    (dx * dx + dy * dy + mdx * mdx + mdy * mdy) * gauss_outer * gauss_outer;

                j += 9;
            }
            i += 9;
        }

        let length = total.sqrt();
        if length > 0.0 {
            for value in descriptor.iter_mut() {
                *value /= length;
            }
        }
        point.descriptor = Some(descriptor);
    }
}

/// Angle of the vector `(x, y)` in `[0, 2*pi)`
fn angle_of(x: f32, y: f32) -> f32 {
    if x >= 0.0 && y >= 0.0 {
        (y / x).atan()
    } else if x < 0.0 && y >= 0.0 {
        PI - (-y / x).atan()
    } else if x < 0.0 && y < 0.0 {
        PI + (y / x).atan()
    } else {
        2.0 * PI - (-y / x).atan()
    }
}

/// Circular 2-D Gaussian of standard deviation `sigma`, evaluated at `(x, y)`
fn gaussian(x: f32, y: f32, sigma: f32) -> f32 {
    1.0 / (2.0 * PI * sigma * sigma) * (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn gauss_table_is_symmetric() {
        for i in 0..7 {
            for j in 0..7 {
                assert_eq!(GAUSS25[i][j], GAUSS25[j][i]);
            }
        }
    }

    #[test]
    fn angle_quadrants() {
        assert_approx_eq!(angle_of(1.0, 0.0), 0.0);
        assert_approx_eq!(angle_of(0.0, 1.0), PI / 2.0);
        assert_approx_eq!(angle_of(-1.0, 1.0), 3.0 * PI / 4.0);
        assert_approx_eq!(angle_of(-1.0, -1.0), 5.0 * PI / 4.0);
        assert_approx_eq!(angle_of(1.0, -1.0), 7.0 * PI / 4.0);
    }

    #[test]
    fn descriptor_is_unit_length() {
        // vertical edge so the Haar responses are non-zero
        let integral = IntegralImage::from_fn(128, 128, |_, column| {
            if column >= 64 {
                1.0
            } else {
                0.0
            }
        })
        .unwrap();
        let builder = DescriptorBuilder::new(&integral);
        let mut point = InterestPoint::new(64.0, 64.0, 2.0, 1);
        builder.assign_orientation(&mut point);
        builder.build_descriptor(&mut point, false);

        let descriptor = point.descriptor.unwrap();
        let length: f32 = descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert_approx_eq!(length, 1.0, 1e-4);
    }

    #[test]
    fn flat_image_descriptor_stays_zero() {
        let integral = IntegralImage::from_fn(128, 128, |_, _| 0.0).unwrap();
        let builder = DescriptorBuilder::new(&integral);
        let mut point = InterestPoint::new(64.0, 64.0, 2.0, 1);
        builder.build_descriptor(&mut point, true);

        let descriptor = point.descriptor.unwrap();
        assert!(descriptor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn upright_ignores_orientation() {
        let integral = IntegralImage::from_fn(128, 128, |row, column| {
            ((row * 31 + column * 17) % 97) as f32 / 97.0
        })
        .unwrap();
        let builder = DescriptorBuilder::new(&integral);

        let mut rotated = InterestPoint::new(64.0, 64.0, 2.0, 1);
        rotated.orientation = 1.0;
        builder.build_descriptor(&mut rotated, true);

        let mut unrotated = InterestPoint::new(64.0, 64.0, 2.0, 1);
        builder.build_descriptor(&mut unrotated, true);

        assert_eq!(rotated.descriptor, unrotated.descriptor);
    }
}
