use anyhow::{Context as _, Error, Result};
use nalgebra::Vector3;
use rclrs::{Context, CreateBasicExecutor, Node, RclrsErrorFilter, SpinOptions, QOS_PROFILE_DEFAULT};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trajectory_publisher::dispatch::{self, EngineHandle, ReferenceSink, TickPeriods};
use trajectory_publisher::{
    PathSample, ReferenceEngine, ReferenceMessage, TrajectoryConfig, TrajectoryInfo,
    TriggerRequest,
};

// Import the message types directly from the crates
use builtin_interfaces::msg::Time;
use geometry_msgs::msg::{PoseStamped, TwistStamped};
use mavros_msgs::msg::PositionTarget;
use nav_msgs::msg::Path;
use std_msgs::msg::{Float64, Float64MultiArray, Int32};
use std_srvs::srv::{SetBool, SetBool_Request, SetBool_Response};

const FRAME_ID: &str = "map";
const CONFIG_ENV: &str = "TRAJECTORY_PUBLISHER_CONFIG";
const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Header stamp for a clock reading in nanoseconds
fn stamp_from_nanos(nanos: i64) -> Time {
    Time {
        sec: nanos.div_euclid(NANOS_PER_SEC) as i32,
        nanosec: nanos.rem_euclid(NANOS_PER_SEC) as u32,
    }
}

/// Publishes everything the reference engine produces
struct RosSink {
    clock: rclrs::Clock,
    trajectory_publisher: Arc<rclrs::Publisher<Path>>,
    primitive_publishers: Vec<Arc<rclrs::Publisher<Path>>>,
    reference_publisher: Arc<rclrs::Publisher<TwistStamped>>,
    flat_reference_publisher: Arc<rclrs::Publisher<PositionTarget>>,
    raw_reference_publisher: Arc<rclrs::Publisher<PositionTarget>>,
    info_publisher: Arc<rclrs::Publisher<Float64MultiArray>>,
}

impl RosSink {
    fn new(node: &Node, primitives: usize, shape: bool) -> Result<Self, rclrs::RclrsError> {
        let primitive_publishers = if shape {
            vec![node.create_publisher::<Path>(
                "trajectory_publisher/primitiveset",
                QOS_PROFILE_DEFAULT,
            )?]
        } else {
            (0..primitives)
                .map(|i| {
                    node.create_publisher::<Path>(
                        &format!("trajectory_publisher/primitiveset{}", i),
                        QOS_PROFILE_DEFAULT,
                    )
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(RosSink {
            clock: node.get_clock(),
            trajectory_publisher: node
                .create_publisher::<Path>("trajectory_publisher/trajectory", QOS_PROFILE_DEFAULT)?,
            primitive_publishers,
            reference_publisher: node
                .create_publisher::<TwistStamped>("reference/setpoint", QOS_PROFILE_DEFAULT)?,
            flat_reference_publisher: node
                .create_publisher::<PositionTarget>("reference/flatsetpoint", QOS_PROFILE_DEFAULT)?,
            raw_reference_publisher: node.create_publisher::<PositionTarget>(
                "mavros/setpoint_raw/local",
                QOS_PROFILE_DEFAULT,
            )?,
            info_publisher: node.create_publisher::<Float64MultiArray>(
                "trajectory_publisher/info",
                QOS_PROFILE_DEFAULT,
            )?,
        })
    }

    fn stamp(&self) -> Time {
        stamp_from_nanos(self.clock.now().nsec)
    }
}

fn path_msg(segment: &[PathSample], stamp: &Time) -> Path {
    let mut path_msg = Path::default();
    path_msg.header.stamp = stamp.clone();
    path_msg.header.frame_id = FRAME_ID.to_string();
    path_msg.poses = segment
        .iter()
        .map(|sample| {
            let mut pose_stamped = PoseStamped::default();
            pose_stamped.header.stamp = stamp.clone();
            pose_stamped.header.frame_id = FRAME_ID.to_string();
            pose_stamped.pose.position.x = sample.position.x;
            pose_stamped.pose.position.y = sample.position.y;
            pose_stamped.pose.position.z = sample.position.z;
            pose_stamped.pose.orientation.w = 1.0;
            pose_stamped
        })
        .collect();
    path_msg
}

fn position_target_msg(
    stamp: Time,
    type_mask: u16,
    position: &Vector3<f64>,
    velocity: &Vector3<f64>,
    acceleration: &Vector3<f64>,
) -> PositionTarget {
    let mut msg = PositionTarget::default();
    msg.header.stamp = stamp;
    msg.header.frame_id = FRAME_ID.to_string();
    msg.type_mask = type_mask;
    msg.position.x = position.x;
    msg.position.y = position.y;
    msg.position.z = position.z;
    msg.velocity.x = velocity.x;
    msg.velocity.y = velocity.y;
    msg.velocity.z = velocity.z;
    msg.acceleration_or_force.x = acceleration.x;
    msg.acceleration_or_force.y = acceleration.y;
    msg.acceleration_or_force.z = acceleration.z;
    msg
}

impl ReferenceSink for RosSink {
    fn publish_reference(&mut self, message: &ReferenceMessage) {
        let stamp = self.stamp();
        let result = match message {
            ReferenceMessage::Twist { linear, angular } => {
                let mut msg = TwistStamped::default();
                msg.header.stamp = stamp;
                msg.header.frame_id = FRAME_ID.to_string();
                msg.twist.angular.x = angular.x;
                msg.twist.angular.y = angular.y;
                msg.twist.angular.z = angular.z;
                msg.twist.linear.x = linear.x;
                msg.twist.linear.y = linear.y;
                msg.twist.linear.z = linear.z;
                self.reference_publisher.publish(&msg)
            }
            ReferenceMessage::Flat {
                type_mask,
                position,
                velocity,
                acceleration,
            } => self.flat_reference_publisher.publish(&position_target_msg(
                stamp,
                u16::from(*type_mask),
                position,
                velocity,
                acceleration,
            )),
            ReferenceMessage::SetpointRaw {
                type_mask,
                position,
                velocity,
                acceleration,
            } => self.raw_reference_publisher.publish(&position_target_msg(
                stamp,
                *type_mask,
                position,
                velocity,
                acceleration,
            )),
        };
        if let Err(e) = result {
            warn!("Failed to publish reference: {}", e);
        }
    }

    fn publish_trajectory(&mut self, segment: &[PathSample]) {
        let msg = path_msg(segment, &self.stamp());
        if let Err(e) = self.trajectory_publisher.publish(&msg) {
            warn!("Failed to publish trajectory: {}", e);
        }
    }

    fn publish_primitive(&mut self, index: usize, segment: &[PathSample]) {
        let stamp = self.stamp();
        if let Some(publisher) = self.primitive_publishers.get(index) {
            if let Err(e) = publisher.publish(&path_msg(segment, &stamp)) {
                warn!("Failed to publish primitive {}: {}", index, e);
            }
        }
    }

    fn publish_info(&mut self, info: &TrajectoryInfo) {
        let mut msg = Float64MultiArray::default();
        msg.data = vec![
            f64::from(info.lap_count),
            info.windup_ratio,
            info.velocity_scaler,
        ];
        if let Err(e) = self.info_publisher.publish(&msg) {
            warn!("Failed to publish trajectory info: {}", e);
        }
    }
}

/// Subscriptions and service kept alive for the lifetime of the node
struct TrajectoryPublisherNode {
    _node: Arc<Node>,
    _pose_subscription: Arc<rclrs::Subscription<PoseStamped>>,
    _twist_subscription: Arc<rclrs::Subscription<TwistStamped>>,
    _selector_subscription: Arc<rclrs::Subscription<Int32>>,
    _scaler_subscription: Arc<rclrs::Subscription<Float64>>,
    _trigger_service: Arc<rclrs::Service<SetBool>>,
}

impl TrajectoryPublisherNode {
    fn new(node: Arc<Node>, handle: EngineHandle) -> Result<Self, rclrs::RclrsError> {
        let pose_handle = handle.clone();
        let pose_subscription = node.create_subscription::<PoseStamped, _>(
            "mavros/local_position/pose",
            QOS_PROFILE_DEFAULT,
            move |msg: PoseStamped| {
                let p = &msg.pose.position;
                if let Err(e) = pose_handle.update_position(Vector3::new(p.x, p.y, p.z)) {
                    warn!("Dropped pose update: {}", e);
                }
            },
        )?;

        let twist_handle = handle.clone();
        let twist_subscription = node.create_subscription::<TwistStamped, _>(
            "mavros/local_position/velocity",
            QOS_PROFILE_DEFAULT,
            move |msg: TwistStamped| {
                let v = &msg.twist.linear;
                if let Err(e) = twist_handle.update_velocity(Vector3::new(v.x, v.y, v.z)) {
                    warn!("Dropped velocity update: {}", e);
                }
            },
        )?;

        let selector_handle = handle.clone();
        let selector_subscription = node.create_subscription::<Int32, _>(
            "trajectory_publisher/motionselector",
            QOS_PROFILE_DEFAULT,
            move |msg: Int32| {
                if let Err(e) = selector_handle.select(i64::from(msg.data)) {
                    warn!("Dropped primitive selection: {}", e);
                }
            },
        )?;

        // Live tuning; the engine rejects negative or non-finite values
        let scaler_handle = handle.clone();
        let scaler_subscription = node.create_subscription::<Float64, _>(
            "trajectory_publisher/velocity_scaler",
            QOS_PROFILE_DEFAULT,
            move |msg: Float64| {
                if let Err(e) = scaler_handle.set_velocity_scaler(msg.data) {
                    warn!("Dropped velocity scaler update: {}", e);
                }
            },
        )?;

        let trigger_service = node.create_service::<SetBool, _>(
            "start",
            move |request: SetBool_Request| -> SetBool_Response {
                match handle.blocking_trigger(TriggerRequest {
                    start: request.data,
                }) {
                    Ok(response) => SetBool_Response {
                        success: response.success,
                        message: response.message,
                    },
                    Err(e) => SetBool_Response {
                        success: false,
                        message: e.to_string(),
                    },
                }
            },
        )?;

        Ok(TrajectoryPublisherNode {
            _node: node,
            _pose_subscription: pose_subscription,
            _twist_subscription: twist_subscription,
            _selector_subscription: selector_subscription,
            _scaler_subscription: scaler_subscription,
            _trigger_service: trigger_service,
        })
    }
}

fn load_config() -> Result<TrajectoryConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => TrajectoryConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path)),
        Err(_) => {
            info!("{} not set, using default parameters", CONFIG_ENV);
            Ok(TrajectoryConfig::default())
        }
    }
}

fn main() -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Initializing trajectory publisher node...");

    let config = load_config()?;
    let engine = ReferenceEngine::new(&config).context("Invalid trajectory configuration")?;

    // Create the ROS 2 context and executor
    let mut executor = Context::default_from_env()?.create_basic_executor();
    let node = executor.create_node("trajectory_publisher")?;

    let sink = RosSink::new(
        &node,
        engine.registry().len(),
        engine.registry().is_shape(),
    )?;

    // The engine task runs on its own runtime; ROS callbacks only post to it
    let runtime = tokio::runtime::Runtime::new()?;
    let (handle, engine_task) = {
        let _guard = runtime.enter();
        dispatch::spawn(engine, sink, TickPeriods::from_config(&config))
    };

    let _trajectory_publisher_node = TrajectoryPublisherNode::new(node, handle.clone())?;

    info!("Trajectory publisher initialized. Call the start service to trigger.");

    let spin_result = executor
        .spin(SpinOptions::default())
        .first_error()
        .map_err(Error::from);

    handle.shutdown();
    let engine = runtime.block_on(engine_task)?;
    info!(laps = engine.lap_count(), "Trajectory publisher stopped");

    spin_result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_splits_seconds_and_nanoseconds() {
        let stamp = stamp_from_nanos(12 * NANOS_PER_SEC + 345);
        assert_eq!(stamp.sec, 12);
        assert_eq!(stamp.nanosec, 345);

        let zero = stamp_from_nanos(0);
        assert_eq!((zero.sec, zero.nanosec), (0, 0));
    }

    #[test]
    fn path_carries_stamp_on_every_pose() {
        let stamp = stamp_from_nanos(3 * NANOS_PER_SEC + 7);
        let samples = [
            PathSample {
                time: 0.0,
                position: Vector3::new(1.0, 2.0, 3.0),
            },
            PathSample {
                time: 0.5,
                position: Vector3::new(1.5, 2.0, 3.0),
            },
        ];
        let msg = path_msg(&samples, &stamp);
        assert_eq!(msg.header.stamp, stamp);
        assert_eq!(msg.poses.len(), 2);
        assert!(msg.poses.iter().all(|pose| pose.header.stamp == stamp));
        assert_eq!(msg.poses[1].pose.position.x, 1.5);
    }

    #[test]
    fn position_target_is_stamped() {
        let stamp = stamp_from_nanos(NANOS_PER_SEC / 2);
        let msg = position_target_msg(
            stamp.clone(),
            0,
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::zeros(),
            &Vector3::new(0.0, 0.0, -1.0),
        );
        assert_eq!(msg.header.stamp, stamp);
        assert_eq!(msg.header.frame_id, FRAME_ID);
        assert_eq!(msg.acceleration_or_force.z, -1.0);
    }
}
