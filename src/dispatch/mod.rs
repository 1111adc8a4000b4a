//! Single-owner dispatch for the reference engine.
//!
//! One task owns the `ReferenceEngine` and runs both periodic ticks plus
//! every external input. Inputs arrive through an `EngineHandle`, which is
//! cheap to clone and usable from synchronous callbacks.

use std::time::Duration;

use nalgebra::Vector3;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::common::{PathSample, TrajectoryInfo};
use crate::config::TrajectoryConfig;
use crate::control::{
    EngineSnapshot, ReferenceEngine, ReferenceMessage, TriggerRequest, TriggerResponse,
};
use crate::error::{Result, TrajectoryError};

/// Receives everything the engine publishes
pub trait ReferenceSink: Send + 'static {
    /// Current target, once per fast tick
    fn publish_reference(&mut self, message: &ReferenceMessage);

    /// Segment of the selected primitive, once per slow tick
    fn publish_trajectory(&mut self, segment: &[PathSample]);

    /// Segment of primitive `index`, once per slow tick
    fn publish_primitive(&mut self, index: usize, segment: &[PathSample]);

    /// Lap count, windup ratio and velocity scaler
    fn publish_info(&mut self, info: &TrajectoryInfo);
}

/// Periods of the two independent ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPeriods {
    /// Reference tick
    pub fast: Duration,
    /// Trajectory and info tick
    pub slow: Duration,
}

impl TickPeriods {
    pub fn from_config(config: &TrajectoryConfig) -> Self {
        TickPeriods {
            fast: config.update_period(),
            slow: config.info_period(),
        }
    }
}

#[derive(Debug)]
enum Command {
    UpdatePosition(Vector3<f64>),
    UpdateVelocity(Vector3<f64>),
    Select(i64),
    SetVelocityScaler(f64),
    Trigger(TriggerRequest, oneshot::Sender<TriggerResponse>),
    Snapshot(oneshot::Sender<EngineSnapshot>),
    Shutdown,
}

/// Sender side of the engine task
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| TrajectoryError::EngineStopped)
    }

    pub fn update_position(&self, position: Vector3<f64>) -> Result<()> {
        self.send(Command::UpdatePosition(position))
    }

    pub fn update_velocity(&self, velocity: Vector3<f64>) -> Result<()> {
        self.send(Command::UpdateVelocity(velocity))
    }

    /// Out-of-range indices are logged and dropped by the engine task
    pub fn select(&self, index: i64) -> Result<()> {
        self.send(Command::Select(index))
    }

    pub fn set_velocity_scaler(&self, velocity_scaler: f64) -> Result<()> {
        self.send(Command::SetVelocityScaler(velocity_scaler))
    }

    pub async fn trigger(&self, request: TriggerRequest) -> Result<TriggerResponse> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Trigger(request, reply))?;
        response.await.map_err(|_| TrajectoryError::EngineStopped)
    }

    /// Trigger from outside the async runtime (e.g. a service callback).
    /// Panics if called from within an async context.
    pub fn blocking_trigger(&self, request: TriggerRequest) -> Result<TriggerResponse> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Trigger(request, reply))?;
        response
            .blocking_recv()
            .map_err(|_| TrajectoryError::EngineStopped)
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        response.await.map_err(|_| TrajectoryError::EngineStopped)
    }

    /// Stop the engine task after it drains earlier commands
    pub fn shutdown(&self) {
        let _ = self.send(Command::Shutdown);
    }
}

/// Spawn the engine task on the current tokio runtime.
///
/// The join handle yields the engine back once the task stops, either on
/// `shutdown` or when every handle is dropped.
pub fn spawn<S: ReferenceSink>(
    engine: ReferenceEngine,
    sink: S,
    periods: TickPeriods,
) -> (EngineHandle, JoinHandle<ReferenceEngine>) {
    let (commands, receiver) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(engine, sink, receiver, periods));
    (EngineHandle { commands }, task)
}

async fn run<S: ReferenceSink>(
    mut engine: ReferenceEngine,
    mut sink: S,
    mut commands: mpsc::UnboundedReceiver<Command>,
    periods: TickPeriods,
) -> ReferenceEngine {
    let mut fast = time::interval(periods.fast);
    fast.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut slow = time::interval(periods.slow);
    slow.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // Pending commands are applied before the next tick observes state
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => break,
                Some(command) => apply(&mut engine, &mut sink, command),
            },
            now = fast.tick() => {
                let output = engine.tick(now.into_std());
                sink.publish_reference(&engine.reference_message());
                if let Some(info) = output.info {
                    sink.publish_info(&info);
                }
            }
            _ = slow.tick() => publish_segments(&engine, &mut sink),
        }
    }

    debug!("Reference engine task stopped");
    engine
}

fn apply<S: ReferenceSink>(engine: &mut ReferenceEngine, sink: &mut S, command: Command) {
    match command {
        Command::UpdatePosition(position) => engine.update_position(position),
        Command::UpdateVelocity(velocity) => engine.update_velocity(velocity),
        Command::Select(index) => {
            if let Err(e) = engine.select(index) {
                warn!(error = %e, "Rejected primitive selection");
            }
        }
        Command::SetVelocityScaler(velocity_scaler) => {
            match engine.set_velocity_scaler(velocity_scaler) {
                Ok(info) => sink.publish_info(&info),
                Err(e) => warn!(error = %e, "Rejected velocity scaler"),
            }
        }
        Command::Trigger(request, reply) => {
            let _ = reply.send(engine.trigger(request));
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(engine.snapshot());
        }
        Command::Shutdown => {}
    }
}

fn publish_segments<S: ReferenceSink>(engine: &ReferenceEngine, sink: &mut S) {
    if let Some(segment) = engine.selected_segment() {
        let samples: Vec<PathSample> = segment.collect();
        sink.publish_trajectory(&samples);
    }
    for (index, segment) in engine.primitive_segments().enumerate() {
        let samples: Vec<PathSample> = segment.collect();
        sink.publish_primitive(index, &samples);
    }
    sink.publish_info(&engine.info());
}
