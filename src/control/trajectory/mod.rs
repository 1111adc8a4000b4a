//! Motion primitives: trajectory generators evaluable at any simulated time

pub mod polynomial;
pub mod registry;
pub mod shape;

use std::fmt::Debug;

use nalgebra::Vector3;

use crate::common::{PathSample, VehicleState};

pub use polynomial::PolynomialPrimitive;
pub use registry::PrimitiveRegistry;
pub use shape::{ShapeKind, ShapeParams, ShapePrimitive};

/// Trait for trajectory generators driven by the simulated clock
pub trait MotionPrimitive: Debug + Send + Sync {
    /// Re-anchor the primitive to the vehicle's current estimate.
    /// Calling it twice with the same state yields the same trajectory.
    fn generate(&mut self, state: &VehicleState);

    /// Position at `t` seconds after generation
    fn position_at(&self, t: f64) -> Vector3<f64>;

    /// Velocity at `t` seconds after generation
    fn velocity_at(&self, t: f64) -> Vector3<f64>;

    /// Acceleration at `t` seconds after generation
    fn acceleration_at(&self, t: f64) -> Vector3<f64>;

    /// Discretized path over the primitive's horizon, for visualization
    fn segment(&self) -> Segment<'_>;
}

/// Lazy, restartable sampling of a primitive's position.
///
/// Samples run from `t = 0` to `t = horizon` inclusive. Cloning the
/// iterator (or calling `segment()` again) restarts it.
#[derive(Debug, Clone)]
pub struct Segment<'a> {
    primitive: &'a dyn MotionPrimitive,
    step: f64,
    samples: usize,
    next: usize,
}

impl<'a> Segment<'a> {
    pub fn new(primitive: &'a dyn MotionPrimitive, horizon: f64, samples: usize) -> Self {
        let step = if samples > 1 {
            horizon / (samples - 1) as f64
        } else {
            0.0
        };
        Segment {
            primitive,
            step,
            samples,
            next: 0,
        }
    }
}

impl Iterator for Segment<'_> {
    type Item = PathSample;

    fn next(&mut self) -> Option<PathSample> {
        if self.next >= self.samples {
            return None;
        }
        let time = self.next as f64 * self.step;
        self.next += 1;
        Some(PathSample {
            time,
            position: self.primitive.position_at(time),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.samples - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Segment<'_> {}
