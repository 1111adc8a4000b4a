//! Publisher configuration.
//!
//! Read once at startup, either from a TOML file or from `Default`.
//! Only the velocity scaler is tunable afterwards, through the engine.

use std::path::Path;
use std::time::Duration;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::control::setpoint::ReferenceType;
use crate::control::trajectory::shape::{ShapeKind, ShapeParams};
use crate::error::{Result, TrajectoryError};

/// Unit jerk directions for minimum-time primitives: hover plus +-x, +-y, +-z.
pub const CANONICAL_JERK_INPUTS: [[f64; 3]; 7] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, -1.0],
];

/// Which primitive family the registry is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryType {
    Polynomial,
    Shape(ShapeKind),
}

impl TryFrom<i32> for TrajectoryType {
    type Error = TrajectoryError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(TrajectoryType::Polynomial),
            1 => Ok(TrajectoryType::Shape(ShapeKind::Circle)),
            2 => Ok(TrajectoryType::Shape(ShapeKind::Lemniscate)),
            3 => Ok(TrajectoryType::Shape(ShapeKind::Stationary)),
            other => Err(TrajectoryError::InvalidConfig(format!(
                "unknown trajectory_type {}",
                other
            ))),
        }
    }
}

/// Configuration for the trajectory publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Initial position [x, y, z] (m). Also the shape origin.
    pub init_pos: [f64; 3],

    /// Fast (reference) tick period (s).
    pub update_rate: f64,

    /// Slow (trajectory/info) tick period (s).
    pub info_rate: f64,

    /// Span of a polynomial primitive's path segment (s).
    pub horizon: f64,

    /// Jerk magnitude applied to each unit jerk direction (m/s³).
    pub max_jerk: f64,

    /// Shape angular rate (rad/s). Also defines one lap.
    pub shape_omega: f64,

    /// Shape radius (m).
    pub shape_radius: f64,

    /// Shape rotation axis, normalized at construction.
    pub shape_axis: [f64; 3],

    /// 0 polynomial, 1 circle, 2 lemniscate, 3 stationary.
    pub trajectory_type: i32,

    /// Number of polynomial primitives.
    pub number_of_primitives: usize,

    /// Unit jerk directions, one per primitive. Defaults to the
    /// canonical palette when `number_of_primitives` is 7.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jerk_inputs: Option<Vec<[f64; 3]>>,

    /// 8 twist, 16 raw setpoint, anything else is a flat target mask.
    pub reference_type: i32,

    /// Playback speed multiplier applied to the simulated clock.
    pub velocity_scaler: f64,

    /// Initial windup ratio in [0, 1].
    pub windup_ratio: f64,

    /// Windup increment per fast tick.
    pub windup_step: f64,

    /// Samples per visualization segment.
    pub segment_samples: usize,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        TrajectoryConfig {
            init_pos: [0.0, 0.0, 1.0],
            update_rate: 0.01,
            info_rate: 0.1,
            horizon: 1.0,
            max_jerk: 10.0,
            shape_omega: 1.5,
            shape_radius: 1.0,
            shape_axis: [0.0, 0.0, 1.0],
            trajectory_type: 0,
            number_of_primitives: 7,
            jerk_inputs: None,
            reference_type: 2,
            velocity_scaler: 2.1,
            windup_ratio: 0.0,
            windup_step: 0.001,
            segment_samples: 20,
        }
    }
}

impl TrajectoryConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TrajectoryConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check every field that could make the engine misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        positive("update_rate", self.update_rate)?;
        positive("info_rate", self.info_rate)?;
        positive("horizon", self.horizon)?;
        non_negative("max_jerk", self.max_jerk)?;
        non_negative("shape_radius", self.shape_radius)?;
        non_negative("velocity_scaler", self.velocity_scaler)?;
        positive("windup_step", self.windup_step)?;

        if !self.shape_omega.is_finite() {
            return Err(TrajectoryError::InvalidConfig(
                "shape_omega must be finite".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.windup_ratio) {
            return Err(TrajectoryError::InvalidConfig(format!(
                "windup_ratio must be in [0, 1], got {}",
                self.windup_ratio
            )));
        }
        if self.segment_samples < 2 {
            return Err(TrajectoryError::InvalidConfig(
                "segment_samples must be at least 2".to_string(),
            ));
        }
        if self.init_pos.iter().any(|c| !c.is_finite()) {
            return Err(TrajectoryError::InvalidConfig(
                "init_pos must be finite".to_string(),
            ));
        }

        self.reference_type()?;
        match self.trajectory_type()? {
            TrajectoryType::Polynomial => {
                self.jerk_palette()?;
            }
            TrajectoryType::Shape(_) => {
                self.shape_params().validate()?;
            }
        }
        Ok(())
    }

    pub fn trajectory_type(&self) -> Result<TrajectoryType> {
        TrajectoryType::try_from(self.trajectory_type)
    }

    pub fn reference_type(&self) -> Result<ReferenceType> {
        ReferenceType::try_from(self.reference_type)
    }

    pub fn initial_position(&self) -> Vector3<f64> {
        Vector3::from(self.init_pos)
    }

    pub fn update_period(&self) -> Duration {
        Duration::from_secs_f64(self.update_rate)
    }

    pub fn info_period(&self) -> Duration {
        Duration::from_secs_f64(self.info_rate)
    }

    /// Jerk vectors for the polynomial family, already scaled by `max_jerk`.
    pub fn jerk_palette(&self) -> Result<Vec<Vector3<f64>>> {
        let directions: Vec<[f64; 3]> = match &self.jerk_inputs {
            Some(inputs) => inputs.clone(),
            None if self.number_of_primitives == CANONICAL_JERK_INPUTS.len() => {
                CANONICAL_JERK_INPUTS.to_vec()
            }
            None => {
                return Err(TrajectoryError::InvalidConfig(format!(
                    "jerk_inputs required for {} primitives",
                    self.number_of_primitives
                )))
            }
        };

        if directions.is_empty() {
            return Err(TrajectoryError::InvalidConfig(
                "at least one polynomial primitive is required".to_string(),
            ));
        }
        if directions.len() != self.number_of_primitives {
            return Err(TrajectoryError::InvalidConfig(format!(
                "number_of_primitives is {} but {} jerk inputs were given",
                self.number_of_primitives,
                directions.len()
            )));
        }
        if directions.iter().flatten().any(|c| !c.is_finite()) {
            return Err(TrajectoryError::InvalidConfig(
                "jerk_inputs must be finite".to_string(),
            ));
        }

        Ok(directions
            .into_iter()
            .map(|d| Vector3::from(d) * self.max_jerk)
            .collect())
    }

    /// Shape parameters derived from the configuration; the origin is the
    /// initial position.
    pub fn shape_params(&self) -> ShapeParams {
        ShapeParams {
            origin: self.initial_position(),
            axis: Vector3::from(self.shape_axis),
            angular_rate: self.shape_omega,
            radius: self.shape_radius,
            phase: 0.0,
        }
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TrajectoryError::InvalidConfig(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TrajectoryError::InvalidConfig(format!(
            "{} must be non-negative, got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TrajectoryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.trajectory_type().unwrap(), TrajectoryType::Polynomial);
        assert_eq!(config.jerk_palette().unwrap().len(), 7);
    }

    #[test]
    fn palette_is_scaled_by_max_jerk() {
        let config = TrajectoryConfig {
            max_jerk: 4.0,
            ..Default::default()
        };
        let palette = config.jerk_palette().unwrap();
        assert_eq!(palette[0], Vector3::zeros());
        assert_eq!(palette[2], Vector3::new(-4.0, 0.0, 0.0));
        assert_eq!(palette[5], Vector3::new(0.0, 0.0, 4.0));
    }

    #[test]
    fn non_canonical_count_needs_explicit_inputs() {
        let config = TrajectoryConfig {
            number_of_primitives: 3,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TrajectoryError::InvalidConfig(_))
        ));

        let config = TrajectoryConfig {
            number_of_primitives: 3,
            jerk_inputs: Some(vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_axis_shape_is_rejected() {
        let config = TrajectoryConfig {
            trajectory_type: 1,
            shape_axis: [0.0, 0.0, 0.0],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TrajectoryError::DegenerateAxis(..))
        ));
    }

    #[test]
    fn out_of_range_windup_is_rejected() {
        let config = TrajectoryConfig {
            windup_ratio: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let config = TrajectoryConfig::from_toml_str(
            r#"
            trajectory_type = 2
            shape_radius = 2.5
            init_pos = [1.0, 2.0, 3.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.shape_radius, 2.5);
        assert_eq!(config.initial_position(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(config.max_jerk, 10.0);
        assert_eq!(
            config.trajectory_type().unwrap(),
            TrajectoryType::Shape(ShapeKind::Lemniscate)
        );
    }

    #[test]
    fn unknown_trajectory_type_is_rejected() {
        let result = TrajectoryConfig::from_toml_str("trajectory_type = 9");
        assert!(matches!(result, Err(TrajectoryError::InvalidConfig(_))));
    }
}
