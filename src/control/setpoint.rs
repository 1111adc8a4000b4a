//! Encodings of the current target for the flight controller

use nalgebra::Vector3;

use crate::common::TargetState;
use crate::error::{Result, TrajectoryError};

/// `reference_type` code selecting the twist encoding
pub const REF_TWIST: i32 = 8;
/// `reference_type` code selecting the raw position setpoint
pub const REF_SETPOINTRAW: i32 = 16;

/// Which encoding the fast tick publishes. Exactly one per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    Twist,
    SetpointRaw,
    /// Flat target; the mask tells the controller which fields to honor
    Flat { type_mask: u8 },
}

impl TryFrom<i32> for ReferenceType {
    type Error = TrajectoryError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            REF_TWIST => Ok(ReferenceType::Twist),
            REF_SETPOINTRAW => Ok(ReferenceType::SetpointRaw),
            mask => u8::try_from(mask)
                .map(|type_mask| ReferenceType::Flat { type_mask })
                .map_err(|_| {
                    TrajectoryError::InvalidConfig(format!("unknown reference_type {}", code))
                }),
        }
    }
}

impl ReferenceType {
    /// A flat target with an empty mask carries no acceleration
    pub fn wants_acceleration(&self) -> bool {
        !matches!(self, ReferenceType::Flat { type_mask: 0 })
    }

    pub fn encode(&self, target: &TargetState) -> ReferenceMessage {
        match *self {
            ReferenceType::Twist => ReferenceMessage::Twist {
                linear: target.velocity,
                angular: target.position,
            },
            ReferenceType::Flat { type_mask } => ReferenceMessage::Flat {
                type_mask,
                position: target.position,
                velocity: target.velocity,
                acceleration: target.acceleration,
            },
            ReferenceType::SetpointRaw => ReferenceMessage::SetpointRaw {
                type_mask: 0,
                position: target.position,
                velocity: target.velocity,
                acceleration: target.acceleration,
            },
        }
    }
}

/// Field-level content of a published reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceMessage {
    /// Velocity in the linear slot and position in the angular slot.
    /// The angular slot is not an angular quantity.
    Twist {
        linear: Vector3<f64>,
        angular: Vector3<f64>,
    },
    Flat {
        type_mask: u8,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        acceleration: Vector3<f64>,
    },
    SetpointRaw {
        type_mask: u16,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        acceleration: Vector3<f64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetState {
        TargetState {
            position: Vector3::new(1.0, 2.0, 3.0),
            velocity: Vector3::new(0.1, 0.2, 0.3),
            acceleration: Vector3::new(-1.0, 0.0, 1.0),
        }
    }

    #[test]
    fn codes_map_to_encodings() {
        assert_eq!(ReferenceType::try_from(8).unwrap(), ReferenceType::Twist);
        assert_eq!(ReferenceType::try_from(16).unwrap(), ReferenceType::SetpointRaw);
        assert_eq!(
            ReferenceType::try_from(2).unwrap(),
            ReferenceType::Flat { type_mask: 2 }
        );
        assert!(ReferenceType::try_from(-1).is_err());
        assert!(ReferenceType::try_from(300).is_err());
    }

    #[test]
    fn twist_carries_position_in_angular_slot() {
        match ReferenceType::Twist.encode(&target()) {
            ReferenceMessage::Twist { linear, angular } => {
                assert_eq!(linear, target().velocity);
                assert_eq!(angular, target().position);
            }
            other => panic!("unexpected encoding {:?}", other),
        }
    }

    #[test]
    fn raw_setpoint_has_zero_mask() {
        match ReferenceType::SetpointRaw.encode(&target()) {
            ReferenceMessage::SetpointRaw {
                type_mask,
                acceleration,
                ..
            } => {
                assert_eq!(type_mask, 0);
                assert_eq!(acceleration, target().acceleration);
            }
            other => panic!("unexpected encoding {:?}", other),
        }
    }

    #[test]
    fn empty_flat_mask_skips_acceleration() {
        assert!(!ReferenceType::Flat { type_mask: 0 }.wants_acceleration());
        assert!(ReferenceType::Flat { type_mask: 2 }.wants_acceleration());
        assert!(ReferenceType::Twist.wants_acceleration());
    }
}
