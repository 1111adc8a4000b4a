//! Reference engine: simulated trajectory clock, windup ramp, lap counter
//! and primitive selection.
//!
//! The engine turns wall-clock ticks into simulated trajectory time and
//! evaluates the selected primitive to produce the current target. It does
//! no I/O; callers publish what it returns.

use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use super::setpoint::{ReferenceMessage, ReferenceType};
use super::trajectory::{PrimitiveRegistry, Segment, ShapeParams};
use crate::common::{TargetState, TrajectoryInfo, VehicleState};
use crate::config::TrajectoryConfig;
use crate::error::{Result, TrajectoryError};

/// Slack on the lap boundary so a clock landing exactly on it counts
const LAP_TOLERANCE: f64 = 1e-6;

/// Run state of the engine. `Idle -> Running` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Idle,
    Running,
}

/// Start request; `start = false` is not supported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerRequest {
    pub start: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
}

/// Result of one fast tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutput {
    pub target: TargetState,
    /// Set when a lap completed or the windup ratio moved this tick
    pub info: Option<TrajectoryInfo>,
}

/// Copy of the engine state for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub mode: EngineMode,
    pub simulated_time: f64,
    pub windup_ratio: f64,
    pub velocity_scaler: f64,
    pub lap_count: u32,
    pub selected_index: usize,
    /// Simulated time of the last trigger or selection. Diagnostic only;
    /// primitives are always evaluated at `simulated_time`.
    pub selection_origin: f64,
    pub vehicle: VehicleState,
    pub target: TargetState,
}

/// Time integration and selection state machine
#[derive(Debug)]
pub struct ReferenceEngine {
    registry: PrimitiveRegistry,
    reference_type: ReferenceType,
    shape_params: ShapeParams,
    windup_step: f64,
    vehicle: VehicleState,
    mode: EngineMode,
    simulated_time: f64,
    windup_ratio: f64,
    velocity_scaler: f64,
    lap_count: u32,
    selected_index: usize,
    selection_origin: f64,
    target: TargetState,
    last_tick: Option<Instant>,
}

impl ReferenceEngine {
    /// Build the engine and its primitives. Until the first vehicle update
    /// the vehicle is assumed at rest at the configured initial position.
    pub fn new(config: &TrajectoryConfig) -> Result<Self> {
        config.validate()?;

        let vehicle = VehicleState::at_rest(config.initial_position());
        let registry = PrimitiveRegistry::from_config(config, &vehicle)?;

        info!(
            primitives = registry.len(),
            shape = registry.is_shape(),
            "Reference engine configured"
        );

        Ok(ReferenceEngine {
            registry,
            reference_type: config.reference_type()?,
            shape_params: config.shape_params(),
            windup_step: config.windup_step,
            vehicle,
            mode: EngineMode::Idle,
            simulated_time: 0.0,
            windup_ratio: config.windup_ratio,
            velocity_scaler: config.velocity_scaler,
            lap_count: 0,
            selected_index: 0,
            selection_origin: 0.0,
            target: TargetState::hold(config.initial_position()),
            last_tick: None,
        })
    }

    /// Fast tick driven by a wall clock. The first call advances nothing.
    pub fn tick(&mut self, now: Instant) -> TickOutput {
        let delta = self
            .last_tick
            .map(|previous| now.saturating_duration_since(previous))
            .unwrap_or_default();
        self.last_tick = Some(now);
        self.advance(delta)
    }

    /// Fast tick given the wall-clock time elapsed since the previous one
    pub fn advance(&mut self, wall_delta: Duration) -> TickOutput {
        let running = self.is_running();

        if running {
            self.simulated_time +=
                wall_delta.as_secs_f64() * self.windup_ratio * self.velocity_scaler;
        }

        let mut info_due = self.count_laps();

        if running && self.windup_ratio < 1.0 {
            self.windup_ratio = (self.windup_ratio + self.windup_step).min(1.0);
            info_due = true;
            if self.windup_ratio >= 1.0 {
                info!("Done speeding up");
            }
            if let Err(e) = self.registry.reinitialize_all(&self.shape_params) {
                warn!(error = %e, "Failed to reinitialize primitives during windup");
            }
        }

        self.evaluate();

        TickOutput {
            target: self.target,
            info: info_due.then(|| self.info()),
        }
    }

    fn count_laps(&mut self) -> bool {
        let omega = self.shape_params.angular_rate.abs();
        if omega == 0.0 {
            return false;
        }

        let swept = self.simulated_time * omega;
        let mut completed = false;
        while swept >= f64::from(self.lap_count + 1) * TAU - LAP_TOLERANCE {
            self.lap_count += 1;
            completed = true;
            info!(lap = self.lap_count, "Lap completed");
        }
        completed
    }

    fn evaluate(&mut self) {
        let Some(primitive) = self.registry.get(self.selected_index) else {
            return;
        };
        let t = self.simulated_time;

        let acceleration = if self.reference_type.wants_acceleration() {
            primitive.acceleration_at(t)
        } else {
            Vector3::zeros()
        };

        // Damp velocity and acceleration while winding up; position is exact
        self.target = TargetState {
            position: primitive.position_at(t),
            velocity: primitive.velocity_at(t) * self.windup_ratio,
            acceleration: acceleration * self.windup_ratio,
        };
    }

    /// Handle a start request. Re-triggering while running keeps progress.
    pub fn trigger(&mut self, request: TriggerRequest) -> TriggerResponse {
        if !request.start {
            return TriggerResponse {
                success: false,
                message: "only start requests are supported".to_string(),
            };
        }

        match self.mode {
            EngineMode::Running => {
                debug!("Trigger ignored, trajectory already running");
                TriggerResponse {
                    success: true,
                    message: "trajectory already running".to_string(),
                }
            }
            EngineMode::Idle => {
                self.mode = EngineMode::Running;
                self.simulated_time = 0.0;
                self.selection_origin = 0.0;
                info!(
                    windup_ratio = self.windup_ratio,
                    velocity_scaler = self.velocity_scaler,
                    "Trajectory triggered"
                );
                TriggerResponse {
                    success: true,
                    message: "trajectory triggered".to_string(),
                }
            }
        }
    }

    /// Switch to primitive `index` and re-anchor all primitives at the
    /// current vehicle state. Out-of-range indices change nothing.
    pub fn select(&mut self, index: i64) -> Result<()> {
        let len = self.registry.len();
        let selected = usize::try_from(index)
            .ok()
            .filter(|&i| i < len)
            .ok_or(TrajectoryError::InvalidSelection { index, len })?;

        self.selected_index = selected;
        self.registry.regenerate_all(&self.vehicle);
        self.selection_origin = self.simulated_time;
        debug!(index = selected, "Primitive selected");
        Ok(())
    }

    pub fn update_position(&mut self, position: Vector3<f64>) {
        self.vehicle.position = position;
        self.registry.regenerate_all(&self.vehicle);
    }

    pub fn update_velocity(&mut self, velocity: Vector3<f64>) {
        self.vehicle.velocity = velocity;
        self.registry.regenerate_all(&self.vehicle);
    }

    /// Change the playback speed multiplier. Returns the info to publish.
    pub fn set_velocity_scaler(&mut self, velocity_scaler: f64) -> Result<TrajectoryInfo> {
        if !velocity_scaler.is_finite() || velocity_scaler < 0.0 {
            return Err(TrajectoryError::InvalidConfig(format!(
                "velocity_scaler must be non-negative, got {}",
                velocity_scaler
            )));
        }
        if velocity_scaler != self.velocity_scaler {
            self.velocity_scaler = velocity_scaler;
            info!(velocity_scaler, "Velocity scaler updated");
        }
        Ok(self.info())
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.mode == EngineMode::Running
    }

    /// Simulated trajectory time (s)
    pub fn simulated_time(&self) -> f64 {
        self.simulated_time
    }

    pub fn windup_ratio(&self) -> f64 {
        self.windup_ratio
    }

    pub fn velocity_scaler(&self) -> f64 {
        self.velocity_scaler
    }

    pub fn lap_count(&self) -> u32 {
        self.lap_count
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    /// Simulated time of the last selection change. Not used for evaluation.
    pub fn selection_origin(&self) -> f64 {
        self.selection_origin
    }

    pub fn target(&self) -> TargetState {
        self.target
    }

    pub fn vehicle_state(&self) -> VehicleState {
        self.vehicle
    }

    pub fn registry(&self) -> &PrimitiveRegistry {
        &self.registry
    }

    pub fn reference_type(&self) -> ReferenceType {
        self.reference_type
    }

    /// Current target in the configured encoding
    pub fn reference_message(&self) -> ReferenceMessage {
        self.reference_type.encode(&self.target)
    }

    pub fn info(&self) -> TrajectoryInfo {
        TrajectoryInfo {
            lap_count: self.lap_count,
            windup_ratio: self.windup_ratio,
            velocity_scaler: self.velocity_scaler,
        }
    }

    /// Path segment of the selected primitive
    pub fn selected_segment(&self) -> Option<Segment<'_>> {
        self.registry
            .get(self.selected_index)
            .map(|primitive| primitive.segment())
    }

    /// Path segments of every primitive, in registry order
    pub fn primitive_segments(&self) -> impl Iterator<Item = Segment<'_>> + '_ {
        self.registry.iter().map(|primitive| primitive.segment())
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            mode: self.mode,
            simulated_time: self.simulated_time,
            windup_ratio: self.windup_ratio,
            velocity_scaler: self.velocity_scaler,
            lap_count: self.lap_count,
            selected_index: self.selected_index,
            selection_origin: self.selection_origin,
            vehicle: self.vehicle,
            target: self.target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    fn start() -> TriggerRequest {
        TriggerRequest { start: true }
    }

    fn engine_with(config: TrajectoryConfig) -> ReferenceEngine {
        ReferenceEngine::new(&config).unwrap()
    }

    #[test]
    fn idle_engine_does_not_advance() {
        let mut engine = engine_with(TrajectoryConfig {
            windup_ratio: 1.0,
            ..Default::default()
        });
        for _ in 0..10 {
            let output = engine.advance(TICK);
            assert!(output.info.is_none());
        }
        assert_eq!(engine.mode(), EngineMode::Idle);
        assert_eq!(engine.simulated_time(), 0.0);
        assert_eq!(engine.target().position, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn windup_is_monotonic_and_saturates() {
        let mut engine = engine_with(TrajectoryConfig {
            windup_step: 0.01,
            ..Default::default()
        });
        engine.trigger(start());

        let mut previous = engine.windup_ratio();
        for _ in 0..150 {
            engine.advance(TICK);
            let ratio = engine.windup_ratio();
            assert!(ratio >= previous);
            assert!(ratio <= 1.0);
            previous = ratio;
        }
        assert_eq!(engine.windup_ratio(), 1.0);
        assert!(engine.advance(TICK).info.is_none());
    }

    #[test]
    fn zero_windup_holds_clock_on_first_tick() {
        let mut engine = engine_with(TrajectoryConfig::default());
        engine.trigger(start());
        let output = engine.advance(TICK);

        assert_eq!(engine.simulated_time(), 0.0);
        let info = output.info.unwrap();
        assert!((info.windup_ratio - 0.001).abs() < 1e-12);
    }

    #[test]
    fn clock_scales_with_velocity_scaler() {
        let mut engine = engine_with(TrajectoryConfig {
            windup_ratio: 1.0,
            velocity_scaler: 2.0,
            ..Default::default()
        });
        engine.trigger(start());
        engine.advance(Duration::from_millis(250));
        assert!((engine.simulated_time() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn laps_increment_once_per_period() {
        let omega = 1.5;
        let mut engine = engine_with(TrajectoryConfig {
            trajectory_type: 1,
            shape_omega: omega,
            windup_ratio: 1.0,
            velocity_scaler: 1.0,
            ..Default::default()
        });
        engine.trigger(start());

        let mut previous = 0;
        for _ in 0..1300 {
            engine.advance(TICK);
            let laps = engine.lap_count();
            assert!(laps >= previous);
            assert!(laps - previous <= 1);
            let expected = (engine.simulated_time() * omega / TAU).floor() as u32;
            assert!(laps == expected || laps == expected + 1);
            previous = laps;
        }
        // 13 s at 1.5 rad/s is just over three revolutions
        assert_eq!(engine.lap_count(), 3);
    }

    #[test]
    fn lap_counting_uses_shape_rate_for_polynomials() {
        let mut engine = engine_with(TrajectoryConfig {
            windup_ratio: 1.0,
            velocity_scaler: 1.0,
            shape_omega: 1.0,
            ..Default::default()
        });
        engine.trigger(start());
        engine.advance(Duration::from_secs_f64(TAU + 0.01));
        assert_eq!(engine.lap_count(), 1);
    }

    #[test]
    fn retrigger_keeps_progress() {
        let mut engine = engine_with(TrajectoryConfig {
            windup_ratio: 1.0,
            ..Default::default()
        });
        assert!(engine.trigger(start()).success);
        engine.advance(Duration::from_millis(100));
        let progress = engine.simulated_time();
        assert!(progress > 0.0);

        let response = engine.trigger(start());
        assert!(response.success);
        assert_eq!(response.message, "trajectory already running");
        assert_eq!(engine.simulated_time(), progress);
    }

    #[test]
    fn stop_request_is_refused() {
        let mut engine = engine_with(TrajectoryConfig::default());
        let response = engine.trigger(TriggerRequest { start: false });
        assert!(!response.success);
        assert_eq!(engine.mode(), EngineMode::Idle);
    }

    #[test]
    fn invalid_selection_leaves_index() {
        let mut engine = engine_with(TrajectoryConfig::default());
        engine.select(3).unwrap();

        for index in [7, 100, -1] {
            let result = engine.select(index);
            assert!(matches!(
                result,
                Err(TrajectoryError::InvalidSelection { len: 7, .. })
            ));
            assert_eq!(engine.selected_index(), 3);
        }
    }

    #[test]
    fn selection_records_origin() {
        let mut engine = engine_with(TrajectoryConfig {
            windup_ratio: 1.0,
            velocity_scaler: 1.0,
            ..Default::default()
        });
        engine.trigger(start());
        engine.advance(Duration::from_millis(300));
        engine.select(2).unwrap();
        assert!((engine.selection_origin() - 0.3).abs() < 1e-12);
        assert_eq!(engine.snapshot().selection_origin, engine.selection_origin());

        // the new primitive is still evaluated on the engine clock
        let output = engine.advance(Duration::from_millis(100));
        let t = engine.simulated_time();
        assert!((t - 0.4).abs() < 1e-12);
        let primitive = engine.registry().get(2).unwrap();
        assert_eq!(output.target.position, primitive.position_at(t));
    }

    #[test]
    fn vehicle_updates_reanchor_primitives() {
        let mut engine = engine_with(TrajectoryConfig::default());
        engine.update_position(Vector3::new(5.0, 0.0, 1.0));
        engine.update_velocity(Vector3::new(1.0, 0.0, 0.0));

        for primitive in engine.registry().iter() {
            assert_eq!(primitive.position_at(0.0), Vector3::new(5.0, 0.0, 1.0));
            assert_eq!(primitive.velocity_at(0.0), Vector3::new(1.0, 0.0, 0.0));
        }
    }

    #[test]
    fn empty_flat_mask_publishes_zero_acceleration() {
        let mut engine = engine_with(TrajectoryConfig {
            reference_type: 0,
            windup_ratio: 1.0,
            velocity_scaler: 1.0,
            ..Default::default()
        });
        engine.select(5).unwrap();
        engine.trigger(start());
        engine.advance(Duration::from_millis(500));
        assert_eq!(engine.target().acceleration, Vector3::zeros());
    }

    #[test]
    fn velocity_scaler_rejects_negative() {
        let mut engine = engine_with(TrajectoryConfig::default());
        assert!(engine.set_velocity_scaler(-1.0).is_err());
        assert_eq!(engine.velocity_scaler(), 2.1);

        let info = engine.set_velocity_scaler(1.0).unwrap();
        assert_eq!(info.velocity_scaler, 1.0);
    }

    #[test]
    fn wall_clock_ticks_measure_elapsed_time() {
        let mut engine = engine_with(TrajectoryConfig {
            windup_ratio: 1.0,
            velocity_scaler: 1.0,
            ..Default::default()
        });
        engine.trigger(start());
        let origin = Instant::now();
        engine.tick(origin);
        assert_eq!(engine.simulated_time(), 0.0);
        engine.tick(origin + Duration::from_millis(40));
        assert!((engine.simulated_time() - 0.04).abs() < 1e-9);
    }
}
