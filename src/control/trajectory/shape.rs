//! Parametric closed-curve primitives (circle, lemniscate, stationary)

use std::f64::consts::TAU;

use nalgebra::{Unit, Vector3};

use super::{MotionPrimitive, Segment};
use crate::common::VehicleState;
use crate::error::{Result, TrajectoryError};

/// Axes shorter than this are treated as degenerate
const AXIS_EPSILON: f64 = 1e-9;

/// Curve family of a shape primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Circle,
    /// Lemniscate of Gerono, a figure-eight in the rotation plane
    Lemniscate,
    /// Hold the origin
    Stationary,
}

/// Parameters a shape primitive is derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeParams {
    pub origin: Vector3<f64>,
    /// Rotation axis; need not be normalized but must be non-zero
    pub axis: Vector3<f64>,
    /// Angular rate (rad/s)
    pub angular_rate: f64,
    /// Radius (m)
    pub radius: f64,
    /// Angle at `t = 0` (rad)
    pub phase: f64,
}

impl ShapeParams {
    pub fn validate(&self) -> Result<()> {
        self.unit_axis().map(|_| ())
    }

    fn unit_axis(&self) -> Result<Unit<Vector3<f64>>> {
        let degenerate = || TrajectoryError::DegenerateAxis(self.axis.x, self.axis.y, self.axis.z);
        if self.axis.iter().any(|c| !c.is_finite()) {
            return Err(degenerate());
        }
        let axis = Unit::try_new(self.axis, AXIS_EPSILON).ok_or_else(degenerate)?;

        if self.origin.iter().any(|c| !c.is_finite()) {
            return Err(TrajectoryError::InvalidConfig(
                "shape origin must be finite".to_string(),
            ));
        }
        if !self.angular_rate.is_finite() || !self.phase.is_finite() {
            return Err(TrajectoryError::InvalidConfig(
                "shape angular rate and phase must be finite".to_string(),
            ));
        }
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(TrajectoryError::InvalidConfig(format!(
                "shape radius must be non-negative, got {}",
                self.radius
            )));
        }
        Ok(axis)
    }
}

/// Closed curve about `origin` in the plane perpendicular to `axis`.
///
/// The curve is written in the in-plane basis `(e1, e2)`, `e2 = axis x e1`,
/// and differentiated analytically.
#[derive(Debug, Clone)]
pub struct ShapePrimitive {
    kind: ShapeKind,
    params: ShapeParams,
    axis: Unit<Vector3<f64>>,
    e1: Vector3<f64>,
    e2: Vector3<f64>,
    samples: usize,
    fallback_horizon: f64,
}

impl ShapePrimitive {
    /// Build a shape primitive, failing on a malformed axis, radius or rate.
    ///
    /// `fallback_horizon` is the segment span when the angular rate is zero.
    pub fn new(
        kind: ShapeKind,
        params: &ShapeParams,
        samples: usize,
        fallback_horizon: f64,
    ) -> Result<Self> {
        let axis = params.unit_axis()?;
        let (e1, e2) = plane_basis(&axis);
        Ok(ShapePrimitive {
            kind,
            params: *params,
            axis,
            e1,
            e2,
            samples,
            fallback_horizon,
        })
    }

    /// Re-derive the curve from new parameters. On error the previous
    /// parameters stay in effect.
    pub fn reinitialize(&mut self, params: &ShapeParams) -> Result<()> {
        let axis = params.unit_axis()?;
        let (e1, e2) = plane_basis(&axis);
        self.params = *params;
        self.axis = axis;
        self.e1 = e1;
        self.e2 = e2;
        Ok(())
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn params(&self) -> &ShapeParams {
        &self.params
    }

    pub fn axis(&self) -> Vector3<f64> {
        self.axis.into_inner()
    }

    /// Time for one revolution, if the shape moves at all
    pub fn period(&self) -> Option<f64> {
        let omega = self.params.angular_rate.abs();
        (omega > 0.0).then(|| TAU / omega)
    }

    fn angle(&self, t: f64) -> f64 {
        self.params.angular_rate * t + self.params.phase
    }

    fn in_plane(&self, u: f64, v: f64) -> Vector3<f64> {
        self.e1 * u + self.e2 * v
    }
}

impl MotionPrimitive for ShapePrimitive {
    fn generate(&mut self, _state: &VehicleState) {
        // Shapes are pure functions of time
    }

    fn position_at(&self, t: f64) -> Vector3<f64> {
        let r = self.params.radius;
        let theta = self.angle(t);
        let offset = match self.kind {
            ShapeKind::Circle => self.in_plane(r * theta.cos(), r * theta.sin()),
            ShapeKind::Lemniscate => {
                self.in_plane(r * theta.cos(), r * theta.sin() * theta.cos())
            }
            ShapeKind::Stationary => Vector3::zeros(),
        };
        self.params.origin + offset
    }

    fn velocity_at(&self, t: f64) -> Vector3<f64> {
        let rw = self.params.radius * self.params.angular_rate;
        let theta = self.angle(t);
        match self.kind {
            ShapeKind::Circle => self.in_plane(-rw * theta.sin(), rw * theta.cos()),
            // d/dθ (sinθ cosθ) = cos2θ
            ShapeKind::Lemniscate => {
                self.in_plane(-rw * theta.sin(), rw * (2.0 * theta).cos())
            }
            ShapeKind::Stationary => Vector3::zeros(),
        }
    }

    fn acceleration_at(&self, t: f64) -> Vector3<f64> {
        let rw2 = self.params.radius * self.params.angular_rate.powi(2);
        let theta = self.angle(t);
        match self.kind {
            ShapeKind::Circle => self.in_plane(-rw2 * theta.cos(), -rw2 * theta.sin()),
            ShapeKind::Lemniscate => {
                self.in_plane(-rw2 * theta.cos(), -2.0 * rw2 * (2.0 * theta).sin())
            }
            ShapeKind::Stationary => Vector3::zeros(),
        }
    }

    fn segment(&self) -> Segment<'_> {
        let horizon = self.period().unwrap_or(self.fallback_horizon);
        Segment::new(self, horizon, self.samples)
    }
}

/// Orthonormal basis of the plane perpendicular to `axis`. `e1` is the
/// projection of the x axis (y axis when nearly parallel), so a z axis
/// gives `(x, y)`.
fn plane_basis(axis: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let reference = if axis.x.abs() > 0.9 {
        Vector3::y()
    } else {
        Vector3::x()
    };
    let e1 = (reference - axis * axis.dot(&reference)).normalize();
    let e2 = axis.cross(&e1);
    (e1, e2)
}
