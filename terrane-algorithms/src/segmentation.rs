use anyhow::Result;
use float_ord::FloatOrd;
use rayon::prelude::*;
use terrane_core::cloud::PointSource;
use terrane_core::error::ToolError;
use terrane_core::math::KdTree;
use terrane_core::progress::{ProgressSink, ProgressTicker};

/// Parameters of the drop-based region growing segmentation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationParams {
    /// Radius of the horizontal neighborhood each point is compared against
    pub search_distance: f64,
    /// Slope angle defining the drop threshold, `threshold = search_distance * tan(slope)`
    pub slope_degrees: f64,
    /// Expansion points beyond this stack depth are parked on the deferred queue
    pub max_stack_depth: usize,
    /// Capacity of the deferred queue; overflowing points go back onto the stack
    pub max_deferred_points: usize,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            search_distance: 2.0,
            slope_degrees: 65.0,
            max_stack_depth: 1000,
            max_deferred_points: 80_000,
        }
    }
}

/// Per-point segmentation result, indexed like the source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationRecord {
    /// Assigned segment, starting at 1; -1 for points that were withheld or never reached
    pub class_value: i32,
    /// How far the point sits above the lowest of its horizontal neighbors
    pub max_downward_drop: f64,
    /// Ground likeness in `[0, 1]`, 0 for points dropping beyond the threshold
    pub weight: f64,
}

impl Default for SegmentationRecord {
    fn default() -> Self {
        Self {
            class_value: -1,
            max_downward_drop: 0.0,
            weight: 0.0,
        }
    }
}

/// Output of [segment_points]
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentOutput {
    /// One record per source index, withheld points keep the default record
    pub records: Vec<SegmentationRecord>,
    /// Number of segments grown
    pub segment_count: usize,
}

/// Segments a point cloud into regions of similar downward drop.
///
/// Every point's drop is the height above the lowest other point within `search_distance`
/// horizontally. Regions grow from the lowest unclassified point outward, accepting neighbors
/// whose drop differs from the expansion point's by at most the drop threshold. Each point is
/// classified at most once; withheld points are skipped entirely.
///
/// Cancellation through `progress` aborts with [ToolError::Cancelled]; a partial result is
/// never returned.
pub fn segment_points<S: PointSource + ?Sized>(
    source: &S,
    params: &SegmentationParams,
    progress: &dyn ProgressSink,
) -> Result<SegmentOutput> {
    if params.search_distance <= 0.0 {
        return Err(ToolError::InvalidInput(format!(
            "search distance must be > 0, got {}",
            params.search_distance
        ))
        .into());
    }
    if params.slope_degrees <= 0.0 || params.slope_degrees >= 90.0 {
        return Err(ToolError::InvalidInput(format!(
            "slope angle must be in (0, 90) degrees, got {}",
            params.slope_degrees
        ))
        .into());
    }
    let threshold = params.search_distance * params.slope_degrees.to_radians().tan();

    // load pass: withheld points never enter the index
    let mut positions = Vec::new();
    let mut source_indices = Vec::new();
    let mut tree: KdTree<f64, usize> = KdTree::new();
    {
        let mut ticker = ProgressTicker::new(progress, "reading points", source.len());
        for index in 0..source.len() {
            ticker.tick(index)?;
            let record = source.record(index);
            if record.withheld {
                continue;
            }
            tree.insert([record.x, record.y], positions.len());
            positions.push([record.x, record.y, record.z]);
            source_indices.push(index);
        }
    }
    log::info!(
        "segmenting {} of {} points, drop threshold {:.3}",
        positions.len(),
        source.len(),
        threshold
    );

    // neighbor pass, one task per point
    let drops: Vec<f64> = positions
        .par_iter()
        .enumerate()
        .map(|(position, point)| {
            let mut lowest = f64::INFINITY;
            for neighbor in
                tree.neighbors_within_range(&[point[0], point[1]], params.search_distance)
            {
                if neighbor.value != position && positions[neighbor.value][2] < lowest {
                    lowest = positions[neighbor.value][2];
                }
            }
            if lowest.is_finite() {
                (point[2] - lowest).max(0.0)
            } else {
                0.0
            }
        })
        .collect();
    if progress.cancel_requested() {
        return Err(ToolError::Cancelled.into());
    }

    // region growing from the lowest unclassified point
    let mut seed_order: Vec<usize> = (0..positions.len()).collect();
    seed_order.sort_by_key(|&position| (FloatOrd(positions[position][2]), position));

    let mut classes = vec![-1i32; positions.len()];
    let mut segment_count = 0usize;
    let mut classified = 0usize;
    let mut ticker = ProgressTicker::new(progress, "growing segments", positions.len());

    for &seed in &seed_order {
        if classes[seed] != -1 {
            continue;
        }
        segment_count += 1;
        let class = segment_count as i32;
        classes[seed] = class;

        let mut stack = vec![seed];
        let mut deferred: Vec<usize> = Vec::new();
        loop {
            while let Some(current) = stack.pop() {
                classified += 1;
                ticker.tick(classified.saturating_sub(1))?;

                let drop_here = drops[current];
                let point = &positions[current];
                for neighbor in tree
                    .neighbors_within_range(&[point[0], point[1]], params.search_distance)
                {
                    let other = neighbor.value;
                    if classes[other] != -1 {
                        continue;
                    }
                    if (drops[other] - drop_here).abs() > threshold {
                        continue;
                    }
                    classes[other] = class;
                    if stack.len() >= params.max_stack_depth {
                        if deferred.len() < params.max_deferred_points {
                            deferred.push(other);
                        } else {
                            // queue full: keep growing the stack rather than losing the point
                            stack.push(other);
                        }
                    } else {
                        stack.push(other);
                    }
                }
            }
            if deferred.is_empty() {
                break;
            }
            stack.append(&mut deferred);
        }
    }
    log::info!("grew {} segments", segment_count);

    let mut records = vec![SegmentationRecord::default(); source.len()];
    for (position, &source_index) in source_indices.iter().enumerate() {
        let drop = drops[position];
        records[source_index] = SegmentationRecord {
            class_value: classes[position],
            max_downward_drop: drop,
            weight: if drop <= threshold {
                1.0 - drop / threshold
            } else {
                0.0
            },
        };
    }
    Ok(SegmentOutput {
        records,
        segment_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrane_core::cloud::{PointRecord, VecPointSource};
    use terrane_core::progress::SilentProgress;

    /// 10x10 unit grid at z = 0 with one point raised 50 units above its neighbors
    fn grid_with_outlier() -> VecPointSource {
        let mut points = Vec::new();
        for row in 0..10 {
            for column in 0..10 {
                let z = if row == 5 && column == 5 { 50.0 } else { 0.0 };
                points.push((column as f64, row as f64, z));
            }
        }
        VecPointSource::from_xyz(&points)
    }

    #[test]
    fn outlier_forms_its_own_segment() {
        let source = grid_with_outlier();
        let params = SegmentationParams {
            search_distance: 2.0,
            ..Default::default()
        };
        let output = segment_points(&source, &params, &SilentProgress).unwrap();
        assert_eq!(output.segment_count, 2);

        let outlier = output.records[5 * 10 + 5];
        assert_eq!(outlier.class_value, 2);
        assert_eq!(outlier.max_downward_drop, 50.0);
        assert_eq!(outlier.weight, 0.0);

        for (index, record) in output.records.iter().enumerate() {
            if index == 5 * 10 + 5 {
                continue;
            }
            assert_eq!(record.class_value, 1, "point {} belongs to the ground", index);
            assert_eq!(record.max_downward_drop, 0.0);
            assert_eq!(record.weight, 1.0);
        }
    }

    #[test]
    fn segmentation_is_deterministic() {
        let source = grid_with_outlier();
        let params = SegmentationParams {
            search_distance: 1.5,
            ..Default::default()
        };
        let first = segment_points(&source, &params, &SilentProgress).unwrap();
        let second = segment_points(&source, &params, &SilentProgress).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn withheld_points_stay_unclassified() {
        let mut records = vec![
            PointRecord {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                ..Default::default()
            },
            PointRecord {
                x: 1.0,
                y: 0.0,
                z: 0.0,
                withheld: true,
                ..Default::default()
            },
        ];
        records.push(PointRecord {
            x: 0.5,
            y: 0.5,
            z: 0.0,
            ..Default::default()
        });
        let source = VecPointSource::new(records);
        let output =
            segment_points(&source, &SegmentationParams::default(), &SilentProgress).unwrap();
        assert_eq!(output.records[1].class_value, -1);
        assert_eq!(output.records[0].class_value, 1);
        assert_eq!(output.records[2].class_value, 1);
    }

    #[test]
    fn invalid_parameters_rejected() {
        let source = grid_with_outlier();
        let bad_distance = SegmentationParams {
            search_distance: 0.0,
            ..Default::default()
        };
        assert!(segment_points(&source, &bad_distance, &SilentProgress).is_err());
        let bad_slope = SegmentationParams {
            slope_degrees: 90.0,
            ..Default::default()
        };
        assert!(segment_points(&source, &bad_slope, &SilentProgress).is_err());
    }

    #[test]
    fn cancellation_surfaces_as_tool_error() {
        struct AlwaysCancel;
        impl ProgressSink for AlwaysCancel {
            fn update_progress(&self, _label: &str, _percent: i32) {}
            fn cancel_requested(&self) -> bool {
                true
            }
        }

        let source = grid_with_outlier();
        let error = segment_points(&source, &SegmentationParams::default(), &AlwaysCancel)
            .unwrap_err();
        assert_eq!(
            error.downcast_ref::<ToolError>(),
            Some(&ToolError::Cancelled)
        );
    }
}
