//! Ordered collection of active motion primitives

use nalgebra::Vector3;

use super::{MotionPrimitive, PolynomialPrimitive, ShapeKind, ShapeParams, ShapePrimitive};
use crate::common::VehicleState;
use crate::config::{TrajectoryConfig, TrajectoryType};
use crate::error::{Result, TrajectoryError};

/// The two families are never mixed in one registry
#[derive(Debug)]
enum PrimitiveSet {
    Polynomial(Vec<PolynomialPrimitive>),
    Shape(ShapePrimitive),
}

/// Owns the primitives the reference engine selects from
#[derive(Debug)]
pub struct PrimitiveRegistry {
    set: PrimitiveSet,
}

impl PrimitiveRegistry {
    /// Build the family named by the configuration and anchor it at `state`
    pub fn from_config(config: &TrajectoryConfig, state: &VehicleState) -> Result<Self> {
        match config.trajectory_type()? {
            TrajectoryType::Polynomial => Self::polynomial(
                &config.jerk_palette()?,
                config.horizon,
                config.segment_samples,
                state,
            ),
            TrajectoryType::Shape(kind) => Self::shape(
                kind,
                &config.shape_params(),
                config.segment_samples,
                config.horizon,
            ),
        }
    }

    /// One constant-jerk primitive per jerk vector
    pub fn polynomial(
        jerks: &[Vector3<f64>],
        horizon: f64,
        samples: usize,
        state: &VehicleState,
    ) -> Result<Self> {
        if jerks.is_empty() {
            return Err(TrajectoryError::InvalidConfig(
                "at least one polynomial primitive is required".to_string(),
            ));
        }
        let primitives = jerks
            .iter()
            .map(|&jerk| {
                let mut primitive = PolynomialPrimitive::new(jerk, horizon, samples);
                primitive.generate(state);
                primitive
            })
            .collect();
        Ok(PrimitiveRegistry {
            set: PrimitiveSet::Polynomial(primitives),
        })
    }

    /// A single shape primitive
    pub fn shape(
        kind: ShapeKind,
        params: &ShapeParams,
        samples: usize,
        fallback_horizon: f64,
    ) -> Result<Self> {
        let primitive = ShapePrimitive::new(kind, params, samples, fallback_horizon)?;
        Ok(PrimitiveRegistry {
            set: PrimitiveSet::Shape(primitive),
        })
    }

    pub fn len(&self) -> usize {
        match &self.set {
            PrimitiveSet::Polynomial(primitives) => primitives.len(),
            PrimitiveSet::Shape(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shape(&self) -> bool {
        matches!(self.set, PrimitiveSet::Shape(_))
    }

    pub fn get(&self, index: usize) -> Option<&dyn MotionPrimitive> {
        match &self.set {
            PrimitiveSet::Polynomial(primitives) => {
                primitives.get(index).map(|p| p as &dyn MotionPrimitive)
            }
            PrimitiveSet::Shape(shape) if index == 0 => Some(shape as &dyn MotionPrimitive),
            PrimitiveSet::Shape(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn MotionPrimitive> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    /// Re-anchor every primitive at the vehicle's current estimate
    pub fn regenerate_all(&mut self, state: &VehicleState) {
        match &mut self.set {
            PrimitiveSet::Polynomial(primitives) => {
                for primitive in primitives.iter_mut() {
                    primitive.generate(state);
                }
            }
            PrimitiveSet::Shape(shape) => shape.generate(state),
        }
    }

    /// Re-derive shape primitives from `params`. Polynomial primitives do
    /// not depend on shape parameters and are left as they are.
    pub fn reinitialize_all(&mut self, params: &ShapeParams) -> Result<()> {
        match &mut self.set {
            PrimitiveSet::Polynomial(_) => Ok(()),
            PrimitiveSet::Shape(shape) => shape.reinitialize(params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::trajectory::test_util::{assert_vec_near, EPS};

    #[test]
    fn default_config_builds_seven_polynomials() {
        let config = TrajectoryConfig::default();
        let state = VehicleState::at_rest(config.initial_position());
        let registry = PrimitiveRegistry::from_config(&config, &state).unwrap();

        assert_eq!(registry.len(), 7);
        assert!(!registry.is_shape());
        assert!(registry.get(7).is_none());
        for primitive in registry.iter() {
            assert_vec_near(primitive.position_at(0.0), Vector3::new(0.0, 0.0, 1.0), EPS);
        }
    }

    #[test]
    fn shape_config_builds_single_primitive() {
        let config = TrajectoryConfig {
            trajectory_type: 1,
            number_of_primitives: 7,
            ..Default::default()
        };
        let state = VehicleState::at_rest(config.initial_position());
        let registry = PrimitiveRegistry::from_config(&config, &state).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.is_shape());
        assert!(registry.get(0).is_some());
        assert!(registry.get(1).is_none());
    }

    #[test]
    fn regenerate_all_reanchors_every_polynomial() {
        let config = TrajectoryConfig::default();
        let mut registry =
            PrimitiveRegistry::from_config(&config, &VehicleState::at_rest(Vector3::zeros()))
                .unwrap();

        let state = VehicleState {
            position: Vector3::new(5.0, 0.0, 1.0),
            velocity: Vector3::new(0.0, 1.0, 0.0),
        };
        registry.regenerate_all(&state);

        for primitive in registry.iter() {
            assert_vec_near(primitive.position_at(0.0), state.position, EPS);
            assert_vec_near(primitive.velocity_at(0.0), state.velocity, EPS);
        }
    }

    #[test]
    fn reinitialize_all_updates_shape() {
        let config = TrajectoryConfig {
            trajectory_type: 1,
            ..Default::default()
        };
        let state = VehicleState::at_rest(config.initial_position());
        let mut registry = PrimitiveRegistry::from_config(&config, &state).unwrap();

        let mut params = config.shape_params();
        params.radius = 4.0;
        registry.reinitialize_all(&params).unwrap();

        let start = registry.get(0).unwrap().position_at(0.0);
        assert_vec_near(start, config.initial_position() + Vector3::new(4.0, 0.0, 0.0), EPS);
    }

    #[test]
    fn empty_palette_is_rejected() {
        let result =
            PrimitiveRegistry::polynomial(&[], 1.0, 10, &VehicleState::at_rest(Vector3::zeros()));
        assert!(matches!(result, Err(TrajectoryError::InvalidConfig(_))));
    }
}
