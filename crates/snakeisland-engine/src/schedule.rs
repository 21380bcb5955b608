//! Coarse-to-fine scale schedule.
//!
//! An optimization run of `total` iterations is split into `R` buckets.
//! The first bucket uses the most smoothed field (index `R - 1`) and the
//! last arrives at the sharpest (index 0). The per-axis step size follows
//! the σ of the active level.

use serde::{Deserialize, Serialize};

use crate::types::{Iteration, SnakeError};

/// Step size suggested when no iteration is known.
pub const DEFAULT_STEP_SIZE: u32 = 8;

/// The σ of each scale-space level and the iteration → level mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleSchedule {
    scales: Vec<f32>,
}

impl ScaleSchedule {
    /// Levels `σ_i = i·σ0 + σ0` for `i` in `0..resolution`.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidResolution`] if `resolution` is 0 and
    /// [`SnakeError::InvalidSigma`] if `base_sigma` is not positive.
    pub fn new(resolution: usize, base_sigma: f32) -> Result<Self, SnakeError> {
        if resolution == 0 {
            return Err(SnakeError::InvalidResolution);
        }
        if !(base_sigma.is_finite() && base_sigma > 0.0) {
            return Err(SnakeError::InvalidSigma(base_sigma));
        }
        #[allow(clippy::cast_precision_loss)]
        let scales = (0..resolution)
            .map(|i| (i as f32).mul_add(base_sigma, base_sigma))
            .collect();
        Ok(Self { scales })
    }

    /// Number of levels (R).
    #[must_use]
    pub fn resolution(&self) -> usize {
        self.scales.len()
    }

    /// σ of every level, finest first.
    #[must_use]
    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    /// Level used at `iteration`, in `[0, R - 1]`.
    #[must_use]
    pub fn scale_index(&self, iteration: Iteration) -> usize {
        self.index_at(iteration.total(), iteration.current())
    }

    /// Returns `true` when `iteration` is the first on its level.
    ///
    /// The first iteration of a run always counts as a scale step.
    #[must_use]
    pub fn is_scale_step(&self, iteration: Iteration) -> bool {
        iteration.is_first()
            || self.scale_index(iteration)
                != self.index_at(iteration.total(), iteration.current() - 1)
    }

    /// Suggested per-axis step size: the integer part of the active σ, or
    /// [`DEFAULT_STEP_SIZE`] without an iteration.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn step_size(&self, iteration: Option<Iteration>) -> u32 {
        iteration.map_or(DEFAULT_STEP_SIZE, |it| {
            (self.scales[self.scale_index(it)].trunc() as u32).max(1)
        })
    }

    fn index_at(&self, total: u32, current: u32) -> usize {
        let r = self.resolution();
        let total = total as usize;
        let current = current as usize;
        let per_level = total / r;
        if per_level == 0 {
            // Fewer iterations than levels: spread the levels linearly over
            // the run. This walks from the finest level up, not down.
            if total <= 1 {
                return 0;
            }
            return ((r - 1) * current.saturating_sub(1) / (total - 1)).min(r - 1);
        }
        (r - 1).saturating_sub(current.saturating_sub(1) / per_level)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn it(total: u32, current: u32) -> Iteration {
        Iteration::new(total, current).unwrap()
    }

    #[test]
    fn scales_grow_linearly() {
        let s = ScaleSchedule::new(5, 6.0).unwrap();
        assert_eq!(s.scales(), &[6.0, 12.0, 18.0, 24.0, 30.0]);
    }

    #[test]
    fn rejects_zero_resolution_and_bad_sigma() {
        assert!(matches!(
            ScaleSchedule::new(0, 6.0),
            Err(SnakeError::InvalidResolution)
        ));
        assert!(matches!(
            ScaleSchedule::new(5, 0.0),
            Err(SnakeError::InvalidSigma(_))
        ));
        assert!(ScaleSchedule::new(5, f32::NAN).is_err());
    }

    #[test]
    fn coarsest_first_finest_last() {
        let s = ScaleSchedule::new(5, 6.0).unwrap();
        assert_eq!(s.scale_index(it(100, 1)), 4);
        assert_eq!(s.scale_index(it(100, 20)), 4);
        assert_eq!(s.scale_index(it(100, 21)), 3);
        assert_eq!(s.scale_index(it(100, 100)), 0);
    }

    #[test]
    fn index_clamps_at_finest() {
        let s = ScaleSchedule::new(5, 6.0).unwrap();
        // 14 / 5 = 2 iterations per level leaves the tail past level 0.
        assert_eq!(s.scale_index(it(14, 13)), 0);
        assert_eq!(s.scale_index(it(14, 14)), 0);
    }

    #[test]
    fn short_runs_spread_linearly() {
        let s = ScaleSchedule::new(5, 6.0).unwrap();
        let indices: Vec<usize> = (1..=3).map(|c| s.scale_index(it(3, c))).collect();
        assert_eq!(indices, vec![0, 2, 4]);
        assert_eq!(s.scale_index(it(1, 1)), 0);
    }

    #[test]
    fn scale_steps_mark_level_changes() {
        let s = ScaleSchedule::new(5, 6.0).unwrap();
        assert!(s.is_scale_step(it(15, 1)));
        assert!(!s.is_scale_step(it(15, 2)));
        assert!(!s.is_scale_step(it(15, 3)));
        assert!(s.is_scale_step(it(15, 4)));
        assert!(s.is_scale_step(it(15, 13)));
        assert!(!s.is_scale_step(it(15, 15)));
    }

    #[test]
    fn step_size_follows_sigma() {
        let s = ScaleSchedule::new(5, 6.0).unwrap();
        assert_eq!(s.step_size(None), DEFAULT_STEP_SIZE);
        assert_eq!(s.step_size(Some(it(15, 1))), 30);
        assert_eq!(s.step_size(Some(it(15, 15))), 6);

        let fine = ScaleSchedule::new(2, 1.5).unwrap();
        assert_eq!(fine.step_size(Some(it(2, 2))), 1);
        assert_eq!(fine.step_size(Some(it(2, 1))), 3);
    }
}
