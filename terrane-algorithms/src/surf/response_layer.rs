use terrane_core::image::IntegralImage;

/// One scale level of the Hessian response pyramid.
///
/// Holds the approximated Hessian determinant and the Laplacian sign for every sampling
/// position of its grid. Layers of coarser octaves cover the same image area with fewer
/// samples, so cross-layer lookups go through [response_relative](ResponseLayer::response_relative)
/// which rescales coordinates by the width ratio.
#[derive(Debug, Clone)]
pub struct ResponseLayer {
    width: usize,
    height: usize,
    step: usize,
    filter: i32,
    responses: Vec<f32>,
    laplacians: Vec<u8>,
}

impl ResponseLayer {
    /// Computes the response layer for the given filter size over a sampling grid of
    /// `width` x `height` positions spaced `step` pixels apart. `balance` weighs the mixed
    /// second derivative in the determinant approximation.
    pub fn build(
        integral: &IntegralImage,
        width: usize,
        height: usize,
        step: usize,
        filter: i32,
        balance: f32,
    ) -> Self {
        let mut responses = vec![0.0f32; width * height];
        let mut laplacians = vec![0u8; width * height];

        let b = (filter - 1) / 2;
        let l = filter / 3;
        let w = filter;
        let inverse_area = 1.0f32 / (w * w) as f32;

        for layer_row in 0..height {
            for layer_col in 0..width {
                let r = (layer_row * step) as i32;
                let c = (layer_col * step) as i32;

                let dxx = integral.box_integral(r - l + 1, c - b, 2 * l - 1, w)
                    - 3.0 * integral.box_integral(r - l + 1, c - l / 2, 2 * l - 1, l);
                let dyy = integral.box_integral(r - b, c - l + 1, w, 2 * l - 1)
                    - 3.0 * integral.box_integral(r - l / 2, c - l + 1, l, 2 * l - 1);
                let dxy = integral.box_integral(r - l, c + 1, l, l)
                    + integral.box_integral(r + 1, c - l, l, l)
                    - integral.box_integral(r - l, c - l, l, l)
                    - integral.box_integral(r + 1, c + 1, l, l);

                let dxx = dxx * inverse_area;
                let dyy = dyy * inverse_area;
                let dxy = dxy * inverse_area;

                let index = layer_row * width + layer_col;
                responses[index] = dxx * dyy - balance * dxy * dxy;
                laplacians[index] = (dxx + dyy >= 0.0) as u8;
            }
        }

        Self {
            width,
            height,
            step,
            filter,
            responses,
            laplacians,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn filter(&self) -> i32 {
        self.filter
    }

    /// Response at the layer's own grid position
    pub fn response(&self, row: usize, column: usize) -> f32 {
        self.responses[row * self.width + column]
    }

    /// Response at a grid position of `src`, a coarser layer covering the same image
    pub fn response_relative(&self, row: usize, column: usize, src: &ResponseLayer) -> f32 {
        let scale = self.width / src.width;
        self.responses[(scale * row) * self.width + scale * column]
    }

    /// Laplacian sign (1 or 0) at a grid position of `src`
    pub fn laplacian_relative(&self, row: usize, column: usize, src: &ResponseLayer) -> i32 {
        let scale = self.width / src.width;
        self.laplacians[(scale * row) * self.width + scale * column] as i32
    }
}
