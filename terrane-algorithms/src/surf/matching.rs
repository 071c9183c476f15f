use rayon::prelude::*;

use super::InterestPoint;

/// A pair of matched interest points
#[derive(Debug, Clone, PartialEq)]
pub struct PointMatch {
    pub query: InterestPoint,
    pub target: InterestPoint,
    /// Descriptor distance between the two points
    pub distance: f32,
}

/// Smallest accepted ratio-test threshold
pub const MIN_MATCH_THRESHOLD: f32 = 0.05;
/// Largest accepted ratio-test threshold
pub const MAX_MATCH_THRESHOLD: f32 = 0.99;

/// Matches interest points between two sets.
///
/// A query point matches a target point when the target is its descriptor-space nearest
/// neighbor among candidates of the same Laplacian sign, the distance ratio to the second
/// nearest neighbor is at most `threshold`, and the reverse lookup from the target set comes
/// back to the query point. The threshold is clamped to
/// `[MIN_MATCH_THRESHOLD, MAX_MATCH_THRESHOLD]`. Queries run in parallel, one task per query
/// point; all points must have descriptors.
pub fn matching_points(
    queries: &[InterestPoint],
    targets: &[InterestPoint],
    threshold: f32,
) -> Vec<PointMatch> {
    let threshold = threshold.clamp(MIN_MATCH_THRESHOLD, MAX_MATCH_THRESHOLD);
    queries
        .par_iter()
        .filter_map(|query| {
            let (target, distance) = ratio_test_match(query, targets, threshold)?;
            // symmetry: the target's plain nearest neighbor must be this query
            let back = nearest_same_sign(target, queries)?;
            if back.is_equivalent_to(query) {
                Some(PointMatch {
                    query: query.clone(),
                    target: target.clone(),
                    distance,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Nearest same-sign candidate passing the ratio test against the second nearest, if any
fn ratio_test_match<'a>(
    query: &InterestPoint,
    candidates: &'a [InterestPoint],
    threshold: f32,
) -> Option<(&'a InterestPoint, f32)> {
    let mut best: Option<(&InterestPoint, f32)> = None;
    let mut second_best = f32::INFINITY;

    for candidate in candidates {
        if candidate.laplacian != query.laplacian {
            continue;
        }
        let distance = query.descriptor_distance(candidate);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {
                if distance < second_best {
                    second_best = distance;
                }
            }
            _ => {
                if let Some((_, previous)) = best {
                    second_best = previous;
                }
                best = Some((candidate, distance));
            }
        }
    }

    let (target, distance) = best?;
    if distance / second_best <= threshold {
        Some((target, distance))
    } else {
        None
    }
}

/// Closest same-sign candidate by descriptor distance, without a ratio test
fn nearest_same_sign<'a>(
    query: &InterestPoint,
    candidates: &'a [InterestPoint],
) -> Option<&'a InterestPoint> {
    let mut best: Option<(&InterestPoint, f32)> = None;
    for candidate in candidates {
        if candidate.laplacian != query.laplacian {
            continue;
        }
        let distance = query.descriptor_distance(candidate);
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((candidate, distance));
        }
    }
    best.map(|(candidate, _)| candidate)
}
