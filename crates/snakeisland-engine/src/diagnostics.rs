//! Optimization diagnostics: timing and energy trace of every sweep.
//!
//! The engine never reads the system time itself. Callers pass a
//! [`Clock`], so the same code runs natively, under WASM or with a fake
//! clock in tests.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time source used to measure optimization phases.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time passed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Clock for untimed runs.
pub(crate) struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _: &()) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Record of one greedy sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationDiagnostics {
    /// 1-based iteration number.
    pub iteration: u32,
    /// Scale-space level the sweep ran on.
    pub scale_index: usize,
    /// Whether this sweep was the first on its level.
    pub scale_step: bool,
    /// Per-axis step size in pixels.
    pub step_size: u32,
    /// Snake energy before the sweep, under the previous iteration.
    pub energy_before: f64,
    /// Snake energy after the sweep.
    pub energy_after: f64,
    /// Number of control points that moved.
    pub moved_points: usize,
    /// Wall-clock duration of the sweep (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

/// Diagnostics collected from a full trace run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationDiagnostics {
    /// Time spent building the energy field's scale space (seconds).
    #[serde(with = "duration_serde")]
    pub field_build: Duration,
    /// One record per sweep, in order.
    pub iterations: Vec<IterationDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts.
    pub summary: OptimizationSummary,
}

/// High-level summary of a trace run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Registry name of the energy variant.
    pub energy: String,
    /// Number of control points.
    pub control_points: usize,
    /// Snake energy before the first sweep.
    pub initial_energy: f64,
    /// Snake energy after the last sweep.
    pub final_energy: f64,
}

impl OptimizationDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Snake Optimization Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{}  |  Energy: {}  |  Control points: {}",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.energy,
            self.summary.control_points,
        ));
        lines.push(format!(
            "Field build: {:.3}ms  |  Total duration: {:.3}ms",
            duration_ms(self.field_build),
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:>5} {:>6} {:>5} {:>5} {:>14} {:>14} {:>6} {:>10}",
            "Iter", "Scale", "Jump", "Step", "Before", "After", "Moved", "Duration"
        ));
        lines.push("-".repeat(80));

        for it in &self.iterations {
            let jump = if it.scale_step { "yes" } else { "" };
            lines.push(format!(
                "{:>5} {:>6} {:>5} {:>5} {:>14.3} {:>14.3} {:>6} {:>8.3}ms",
                it.iteration,
                it.scale_index,
                jump,
                it.step_size,
                it.energy_before,
                it.energy_after,
                it.moved_points,
                duration_ms(it.duration),
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Energy: {:.3} -> {:.3}",
            self.summary.initial_energy, self.summary.final_energy,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
