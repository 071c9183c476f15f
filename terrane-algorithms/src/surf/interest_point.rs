/// Length of an interest point descriptor
pub const DESCRIPTOR_LENGTH: usize = 64;

/// A scale-space interest point.
///
/// Position and scale come out of the detector; orientation and descriptor are filled in by the
/// descriptor builder and stay unset until then.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterestPoint {
    /// Sub-pixel column position in the source image
    pub x: f32,
    /// Sub-pixel row position in the source image
    pub y: f32,
    /// Detection scale
    pub scale: f32,
    /// Sign of the Laplacian at the detection site: 1 when the trace of the Hessian is
    /// non-negative (dark blobs on bright background), 0 otherwise
    pub laplacian: i32,
    /// Dominant orientation in radians, 0 until assigned
    pub orientation: f32,
    /// 64-element descriptor, `None` until built
    #[cfg_attr(feature = "serde", serde(with = "serde_descriptor"))]
    pub descriptor: Option<[f32; DESCRIPTOR_LENGTH]>,
}

impl InterestPoint {
    /// Creates a bare detection without orientation or descriptor
    pub fn new(x: f32, y: f32, scale: f32, laplacian: i32) -> Self {
        Self {
            x,
            y,
            scale,
            laplacian,
            orientation: 0.0,
            descriptor: None,
        }
    }

    /// Euclidean distance between the descriptors of two points.
    ///
    /// # Panics
    ///
    /// Panics if either point has no descriptor.
    pub fn descriptor_distance(&self, other: &InterestPoint) -> f32 {
        let own = self
            .descriptor
            .as_ref()
            .expect("descriptor has not been built");
        let theirs = other
            .descriptor
            .as_ref()
            .expect("descriptor has not been built");
        own.iter()
            .zip(theirs.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }

    /// Structural equivalence: same position, scale and Laplacian sign. Orientation and
    /// descriptor are derived data and do not participate.
    pub fn is_equivalent_to(&self, other: &InterestPoint) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.scale == other.scale
            && self.laplacian == other.laplacian
    }
}

// serde has no built-in support for arrays beyond 32 elements, so the descriptor round-trips
// through a Vec
#[cfg(feature = "serde")]
mod serde_descriptor {
    use super::DESCRIPTOR_LENGTH;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<[f32; DESCRIPTOR_LENGTH]>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .as_ref()
            .map(|descriptor| descriptor.to_vec())
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<[f32; DESCRIPTOR_LENGTH]>, D::Error> {
        let values: Option<Vec<f32>> = Option::deserialize(deserializer)?;
        match values {
            None => Ok(None),
            Some(values) => {
                let mut descriptor = [0.0f32; DESCRIPTOR_LENGTH];
                if values.len() != DESCRIPTOR_LENGTH {
                    return Err(serde::de::Error::invalid_length(
                        values.len(),
                        &"a 64-element descriptor",
                    ));
                }
                descriptor.copy_from_slice(&values);
                Ok(Some(descriptor))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_distance_is_euclidean() {
        let mut a = InterestPoint::new(0.0, 0.0, 2.0, 1);
        let mut b = InterestPoint::new(0.0, 0.0, 2.0, 1);
        let mut descriptor_a = [0.0f32; DESCRIPTOR_LENGTH];
        let mut descriptor_b = [0.0f32; DESCRIPTOR_LENGTH];
        descriptor_a[0] = 3.0;
        descriptor_b[1] = 4.0;
        a.descriptor = Some(descriptor_a);
        b.descriptor = Some(descriptor_b);
        assert!((a.descriptor_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn equivalence_ignores_orientation() {
        let mut a = InterestPoint::new(1.0, 2.0, 3.0, 0);
        let b = InterestPoint::new(1.0, 2.0, 3.0, 0);
        a.orientation = 1.5;
        assert!(a.is_equivalent_to(&b));
        let c = InterestPoint::new(1.0, 2.0, 3.0, 1);
        assert!(!a.is_equivalent_to(&c));
    }
}
