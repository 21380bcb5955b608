//! Curvature energy spread along the contour for display.

use crate::types::{ControlPoint, Point};

/// One value per contour sample, for coloring the contour by curvature.
///
/// Each interior control point contributes a tent: zero at the contour
/// sample nearest its predecessor, its curvature energy at the sample
/// nearest itself and zero again at the sample nearest its successor.
/// Overlapping tents combine by maximum. With fewer than three control
/// points every value is zero.
#[must_use]
pub fn curvature_profile(
    contour: &[Point],
    control_points: &[ControlPoint],
    curvature_energies: &[f64],
) -> Vec<f64> {
    let mut profile = vec![0.0; contour.len()];
    if control_points.len() < 3 || contour.is_empty() {
        return profile;
    }
    debug_assert_eq!(curvature_energies.len(), control_points.len() - 2);

    let anchors: Vec<usize> = control_points
        .iter()
        .map(|cp| nearest_index(contour, cp.to_point()))
        .collect();

    for (window, &energy) in anchors.windows(3).zip(curvature_energies) {
        let (lo, hi) = (window[0].min(window[2]), window[0].max(window[2]));
        let peak = window[1].clamp(lo, hi);
        for (i, slot) in profile.iter_mut().enumerate().take(hi + 1).skip(lo) {
            let v = energy * tent(lo, peak, hi, i);
            *slot = f64::max(*slot, v);
        }
    }
    profile
}

/// Height in `[0, 1]` of a tent over `[lo, hi]` peaking at `peak`.
#[allow(clippy::cast_precision_loss)]
fn tent(lo: usize, peak: usize, hi: usize, i: usize) -> f64 {
    if i == peak {
        1.0
    } else if i < peak {
        (i - lo) as f64 / (peak - lo) as f64
    } else {
        (hi - i) as f64 / (hi - peak) as f64
    }
}

/// Index of the contour sample closest to `target` (first on ties).
fn nearest_index(contour: &[Point], target: Point) -> usize {
    contour
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, best_d), (i, p)| {
            let d = p.distance_squared(target);
            if d < best_d { (i, d) } else { (best, best_d) }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn line(n: usize) -> Vec<Point> {
        (0..n).map(|i| Point::new(i as f64 * 10.0, 0.0)).collect()
    }

    #[test]
    fn short_snakes_have_flat_profile() {
        let contour = line(5);
        let cps = [ControlPoint::new(0, 0), ControlPoint::new(40, 0)];
        assert_eq!(curvature_profile(&contour, &cps, &[]), vec![0.0; 5]);
    }

    #[test]
    fn single_tent_peaks_at_middle_point() {
        let contour = line(9);
        let cps = [
            ControlPoint::new(0, 0),
            ControlPoint::new(40, 0),
            ControlPoint::new(80, 0),
        ];
        let profile = curvature_profile(&contour, &cps, &[1.0]);
        assert_eq!(profile, vec![0.0, 0.25, 0.5, 0.75, 1.0, 0.75, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn overlapping_tents_take_the_maximum() {
        let contour = line(7);
        let cps = [
            ControlPoint::new(0, 0),
            ControlPoint::new(20, 0),
            ControlPoint::new(40, 0),
            ControlPoint::new(60, 0),
        ];
        let profile = curvature_profile(&contour, &cps, &[0.4, 2.0]);
        assert_eq!(profile.len(), 7);
        assert!((profile[2] - 0.4).abs() < 1e-12);
        assert!((profile[3] - 1.0).abs() < 1e-12);
        assert!((profile[4] - 2.0).abs() < 1e-12);
        assert!(profile[6].abs() < 1e-12);
        assert!(profile.iter().all(|v| (0.0..=2.0).contains(v)));
    }
}
