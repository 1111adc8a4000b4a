//! Constant-jerk polynomial primitives

use nalgebra::Vector3;

use super::{MotionPrimitive, Segment};
use crate::common::VehicleState;

/// Constant-jerk primitive anchored at the vehicle's last known state.
///
/// `a(t) = j t`, `v(t) = v0 + j t^2 / 2`, `p(t) = p0 + v0 t + j t^3 / 6`.
/// Evaluation past the horizon extrapolates the same polynomials.
#[derive(Debug, Clone)]
pub struct PolynomialPrimitive {
    jerk: Vector3<f64>,
    start_position: Vector3<f64>,
    start_velocity: Vector3<f64>,
    horizon: f64,
    samples: usize,
}

impl PolynomialPrimitive {
    /// Create a primitive with a fixed jerk input, anchored at the origin
    /// until the first `generate`
    pub fn new(jerk: Vector3<f64>, horizon: f64, samples: usize) -> Self {
        PolynomialPrimitive {
            jerk,
            start_position: Vector3::zeros(),
            start_velocity: Vector3::zeros(),
            horizon,
            samples,
        }
    }

    pub fn jerk(&self) -> Vector3<f64> {
        self.jerk
    }
}

impl MotionPrimitive for PolynomialPrimitive {
    fn generate(&mut self, state: &VehicleState) {
        self.start_position = state.position;
        self.start_velocity = state.velocity;
    }

    fn position_at(&self, t: f64) -> Vector3<f64> {
        self.start_position + self.start_velocity * t + self.jerk * (t.powi(3) / 6.0)
    }

    fn velocity_at(&self, t: f64) -> Vector3<f64> {
        self.start_velocity + self.jerk * (t * t / 2.0)
    }

    fn acceleration_at(&self, t: f64) -> Vector3<f64> {
        self.jerk * t
    }

    fn segment(&self) -> Segment<'_> {
        Segment::new(self, self.horizon, self.samples)
    }
}
