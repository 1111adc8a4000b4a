//! Common types shared by the primitives, the reference engine and dispatch

use nalgebra::Vector3;

/// Most recent vehicle estimate supplied by the state estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

impl VehicleState {
    /// A vehicle at rest at `position`
    pub fn at_rest(position: Vector3<f64>) -> Self {
        VehicleState {
            position,
            velocity: Vector3::zeros(),
        }
    }
}

/// Reference handed to the flight controller on every fast tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub acceleration: Vector3<f64>,
}

impl TargetState {
    /// Hold `position` with zero velocity and acceleration
    pub fn hold(position: Vector3<f64>) -> Self {
        TargetState {
            position,
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
        }
    }
}

/// One sample of a discretized path segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSample {
    /// Time offset from the primitive's generation instant (s)
    pub time: f64,
    pub position: Vector3<f64>,
}

/// Diagnostic info published on the slow tick and on lap/windup events
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryInfo {
    pub lap_count: u32,
    pub windup_ratio: f64,
    pub velocity_scaler: f64,
}
