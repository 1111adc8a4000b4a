//! Reference generation: motion primitives, the reference engine and
//! the encodings it publishes
pub mod reference;
pub mod setpoint;
pub mod trajectory;

pub use self::reference::{
    EngineMode, EngineSnapshot, ReferenceEngine, TickOutput, TriggerRequest, TriggerResponse,
};
pub use self::setpoint::{ReferenceMessage, ReferenceType};
pub use self::trajectory::{MotionPrimitive, PrimitiveRegistry, Segment};
