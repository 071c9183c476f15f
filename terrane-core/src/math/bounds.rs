/// 2D axis-aligned bounding rectangle over `f64` coordinates.
///
/// Starts out empty (inverted extents) and grows as points are added, which matches how point
/// cloud extents are accumulated during a read pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds2 {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Bounds2 {
    /// Creates an empty bounding rectangle that contains no points
    /// ```
    /// # use terrane_core::math::Bounds2;
    /// let bounds = Bounds2::empty();
    /// assert!(bounds.is_empty());
    /// ```
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Returns true if no point has been added to this bounding rectangle yet
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x
    }

    /// Grows this bounding rectangle so that it contains the point `(x, y)`
    /// ```
    /// # use terrane_core::math::Bounds2;
    /// let mut bounds = Bounds2::empty();
    /// bounds.extend_with_point(1.0, 2.0);
    /// bounds.extend_with_point(-1.0, 0.5);
    /// assert_eq!(bounds.min(), (-1.0, 0.5));
    /// assert_eq!(bounds.max(), (1.0, 2.0));
    /// ```
    pub fn extend_with_point(&mut self, x: f64, y: f64) {
        if x < self.min_x {
            self.min_x = x;
        }
        if x > self.max_x {
            self.max_x = x;
        }
        if y < self.min_y {
            self.min_y = y;
        }
        if y > self.max_y {
            self.max_y = y;
        }
    }

    /// Returns the minimum corner `(min_x, min_y)` of this bounding rectangle
    pub fn min(&self) -> (f64, f64) {
        (self.min_x, self.min_y)
    }

    /// Returns the maximum corner `(max_x, max_y)` of this bounding rectangle
    pub fn max(&self) -> (f64, f64) {
        (self.max_x, self.max_y)
    }
}

impl Default for Bounds2 {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_point_bounds() {
        let mut bounds = Bounds2::empty();
        bounds.extend_with_point(3.0, -4.0);
        assert!(!bounds.is_empty());
        assert_eq!(bounds.min(), (3.0, -4.0));
        assert_eq!(bounds.max(), (3.0, -4.0));
    }
}
