//! Print-time estimation seam.
//!
//! The emitter feeds every planned machine position through a
//! [`TimeEstimator`]; an acceleration-aware trapezoidal planner can be
//! plugged in behind the same trait. The built-in
//! [`NominalTimeEstimator`] assumes each move runs at its commanded
//! feed rate, which is good enough for minimum-layer-time bookkeeping.

use nalgebra::Point3;

/// One planned machine state sample: position in millimeters plus the
/// accumulated E-axis value at that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveSample {
    /// Head position in millimeters.
    pub position: Point3<f64>,
    /// Accumulated extrusion at this position.
    pub extrusion: f64,
}

impl MoveSample {
    /// Create a sample from millimeter coordinates.
    pub fn new(x: f64, y: f64, z: f64, extrusion: f64) -> Self {
        Self {
            position: Point3::new(x, y, z),
            extrusion,
        }
    }
}

/// Consumes planned move samples and produces elapsed-time estimates.
pub trait TimeEstimator {
    /// Record that the machine will move to `sample` at `speed` mm/s.
    fn plan(&mut self, sample: MoveSample, speed: f64);

    /// Elapsed time in seconds for all samples planned since the last
    /// drain, clearing the internal accumulation. The last planned
    /// position is kept as the starting point for the next batch.
    fn drain(&mut self) -> f64;
}

/// Straight distance-over-feed-rate estimator.
#[derive(Debug, Default)]
pub struct NominalTimeEstimator {
    last: Option<MoveSample>,
    elapsed: f64,
}

impl NominalTimeEstimator {
    /// Create an estimator with no planned samples.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeEstimator for NominalTimeEstimator {
    fn plan(&mut self, sample: MoveSample, speed: f64) {
        if let Some(last) = self.last {
            let travel = (sample.position - last.position).norm();
            let extrude = (sample.extrusion - last.extrusion).abs();
            let distance = travel.max(extrude);
            if speed > 0.0 {
                self.elapsed += distance / speed;
            }
        }
        self.last = Some(sample);
    }

    fn drain(&mut self) -> f64 {
        std::mem::take(&mut self.elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nominal_estimate() {
        let mut est = NominalTimeEstimator::new();
        est.plan(MoveSample::new(0.0, 0.0, 0.0, 0.0), 50.0);
        est.plan(MoveSample::new(100.0, 0.0, 0.0, 0.0), 50.0);
        assert_relative_eq!(est.drain(), 2.0);
        // Drained; position retained for the next batch.
        assert_relative_eq!(est.drain(), 0.0);
        est.plan(MoveSample::new(100.0, 50.0, 0.0, 0.0), 25.0);
        assert_relative_eq!(est.drain(), 2.0);
    }

    #[test]
    fn test_retraction_dominates() {
        // A pure E move takes |delta E| / speed.
        let mut est = NominalTimeEstimator::new();
        est.plan(MoveSample::new(0.0, 0.0, 0.0, 0.0), 45.0);
        est.plan(MoveSample::new(0.0, 0.0, 0.0, -4.5), 45.0);
        assert_relative_eq!(est.drain(), 0.1);
    }
}
