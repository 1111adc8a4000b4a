//! The shipped parameter file must stay in sync with `TrajectoryConfig`.

use trajectory_publisher::config::TrajectoryType;
use trajectory_publisher::{ReferenceEngine, TrajectoryConfig};

const SHIPPED: &str = include_str!("../config/trajectory_publisher.toml");

#[test]
fn shipped_config_matches_defaults() {
    let config = TrajectoryConfig::from_toml_str(SHIPPED).unwrap();
    assert_eq!(config, TrajectoryConfig::default());
    assert_eq!(config.trajectory_type().unwrap(), TrajectoryType::Polynomial);
    assert!(ReferenceEngine::new(&config).is_ok());
}

#[test]
fn defaults_round_trip_through_toml() {
    let config = TrajectoryConfig {
        trajectory_type: 2,
        jerk_inputs: Some(vec![[0.0, 0.0, 1.0]]),
        number_of_primitives: 1,
        ..Default::default()
    };
    let text = toml::to_string(&config).unwrap();
    let recovered = TrajectoryConfig::from_toml_str(&text).unwrap();
    assert_eq!(recovered, config);
}
