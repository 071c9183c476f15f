use rayon::prelude::*;
use terrane_core::error::Result;
use terrane_core::image::IntegralImage;

use super::{
    detect, matching_points, DescriptorBuilder, DetectorParams, InterestPoint, PointMatch,
};

/// Detection plus descriptor extraction over one image, with cached results.
///
/// Detection runs once at construction; the upright and free-oriented descriptor sets are
/// computed on first use and cached, so repeated matching against several other images pays
/// the descriptor cost once.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfEngine {
    integral: IntegralImage,
    params: DetectorParams,
    detections: Vec<InterestPoint>,
    upright_cache: Option<Vec<InterestPoint>>,
    oriented_cache: Option<Vec<InterestPoint>>,
}

impl SurfEngine {
    /// Runs detection over the given integral image
    pub fn new(integral: IntegralImage, params: DetectorParams) -> Result<Self> {
        let detections = detect(&integral, &params)?;
        Ok(Self {
            integral,
            params,
            detections,
            upright_cache: None,
            oriented_cache: None,
        })
    }

    /// The detector parameters this engine was built with
    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// The raw detections, without orientation or descriptor
    pub fn detections(&self) -> &[InterestPoint] {
        &self.detections
    }

    /// Interest points with upright descriptors, computed on first call
    pub fn upright_points(&mut self) -> &[InterestPoint] {
        if self.upright_cache.is_none() {
            let builder = DescriptorBuilder::new(&self.integral);
            let points = self
                .detections
                .par_iter()
                .map(|detection| {
                    let mut point = detection.clone();
                    builder.build_descriptor(&mut point, true);
                    point
                })
                .collect();
            self.upright_cache = Some(points);
        }
        self.upright_cache.as_deref().unwrap_or_default()
    }

    /// Interest points with assigned orientations and rotation-aware descriptors, computed on
    /// first call
    pub fn oriented_points(&mut self) -> &[InterestPoint] {
        if self.oriented_cache.is_none() {
            let builder = DescriptorBuilder::new(&self.integral);
            let points = self
                .detections
                .par_iter()
                .map(|detection| {
                    let mut point = detection.clone();
                    builder.assign_orientation(&mut point);
                    builder.build_descriptor(&mut point, false);
                    point
                })
                .collect();
            self.oriented_cache = Some(points);
        }
        self.oriented_cache.as_deref().unwrap_or_default()
    }

    /// Matches this engine's points against another engine's, with the ratio-test threshold of
    /// [matching_points](super::matching_points)
    pub fn matching_points(
        &mut self,
        other: &mut SurfEngine,
        threshold: f32,
        upright: bool,
    ) -> Vec<PointMatch> {
        if upright {
            self.upright_points();
            other.upright_points();
            matching_points(
                self.upright_cache.as_deref().unwrap_or_default(),
                other.upright_cache.as_deref().unwrap_or_default(),
                threshold,
            )
        } else {
            self.oriented_points();
            other.oriented_points();
            matching_points(
                self.oriented_cache.as_deref().unwrap_or_default(),
                other.oriented_cache.as_deref().unwrap_or_default(),
                threshold,
            )
        }
    }

    /// Structural equivalence: both engines hold pairwise equivalent detections
    pub fn is_equivalent_to(&self, other: &SurfEngine) -> bool {
        self.detections.len() == other.detections.len()
            && self
                .detections
                .iter()
                .zip(&other.detections)
                .all(|(a, b)| a.is_equivalent_to(b))
    }
}
