//! Motion primitive reference generator.
//!
//! Generates position, velocity and acceleration references for a vehicle
//! controller from interchangeable motion primitives (constant-jerk
//! polynomials or parametric shapes), advancing a simulated trajectory
//! clock that can be started, wound up smoothly and lapped.

pub mod common;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod error;

pub use crate::common::{PathSample, TargetState, TrajectoryInfo, VehicleState};
pub use crate::config::TrajectoryConfig;
pub use crate::control::{ReferenceEngine, ReferenceMessage, TriggerRequest, TriggerResponse};
pub use crate::dispatch::{EngineHandle, ReferenceSink, TickPeriods};
pub use crate::error::{Result, TrajectoryError};
