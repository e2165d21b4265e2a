use crate::constants::{FALLBACK_SPACING, SPACING_TOLERANCE};
use crate::csv_reader::PointRecord;

use log::{debug, info};
use std::collections::BTreeMap;

/// Half of the characteristic point gap along each axis [deg]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpacingEstimate {
    pub half_latitude: f64,
    pub half_longitude: f64,
}

impl Default for SpacingEstimate {
    fn default() -> Self {
        Self {
            half_latitude: FALLBACK_SPACING / 2.0,
            half_longitude: FALLBACK_SPACING / 2.0,
        }
    }
}

/// Estimates the lattice spacing of a point set.
///
/// Each axis is measured independently; an axis without a regular gap
/// falls back to `FALLBACK_SPACING`.
pub fn estimate_spacing(records: &[PointRecord]) -> SpacingEstimate {
    let lats: Vec<f64> = records.iter().map(|r| r.latitude).collect();
    let lons: Vec<f64> = records.iter().map(|r| r.longitude).collect();

    let estimate = SpacingEstimate {
        half_latitude: axis_spacing(&lats, "latitude") / 2.0,
        half_longitude: axis_spacing(&lons, "longitude") / 2.0,
    };
    debug!(
        "Spacing estimate for {} points: half_lat={:.6}, half_lon={:.6}",
        records.len(),
        estimate.half_latitude,
        estimate.half_longitude
    );
    estimate
}

fn axis_spacing(values: &[f64], axis: &str) -> f64 {
    match common_spacing(values) {
        Some(spacing) => spacing,
        None => {
            info!(
                "No regular {} spacing found in {} points, using fallback {}",
                axis,
                values.len(),
                FALLBACK_SPACING
            );
            FALLBACK_SPACING
        }
    }
}

/// Most frequent gap between sorted neighbours, quantized to `SPACING_TOLERANCE`.
///
/// Gaps not larger than the tolerance are treated as duplicates and ignored.
/// Ties go to the smallest gap. Returns `None` when no gap survives.
pub fn common_spacing(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    // quantized gap (in tolerance units) -> count
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for pair in sorted.windows(2) {
        let steps = ((pair[1] - pair[0]).abs() / SPACING_TOLERANCE).round() as i64;
        *counts.entry(steps).or_insert(0) += 1;
    }

    let mut best: Option<(i64, usize)> = None;
    for (&steps, &count) in counts.iter().filter(|&(&steps, _)| steps > 1) {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((steps, count));
        }
    }

    best.map(|(steps, _)| steps as f64 * SPACING_TOLERANCE)
}
