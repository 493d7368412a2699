use chrono::NaiveDateTime;
use serde::Serialize;

/// A single on/off switching point inside a day, as `(hour, minute)`.
pub type DayPoint = (u8, u8);

/// One on/off interval of a cycle timer program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleInterval {
    pub on: DayPoint,
    pub off: DayPoint,
}

impl CycleInterval {
    pub fn new(on: DayPoint, off: DayPoint) -> Self {
        Self { on, off }
    }
}

/// Tri-state reported/accepted by the operating-status encoding.
///
/// `Fault` can only ever be *read*; writing it is rejected by the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperatingStatus {
    Off,
    On,
    Fault,
}

/// A dynamically typed parameter value, as produced by [`crate::encoding::Encoding::deserialize`]
/// or accepted by [`crate::encoding::Encoding::serialize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    /// Backs `UInt`/`Int`/`Float` encodings alike; integral-ness is a unit/encoding
    /// concern, not a representation concern.
    Number(f64),
    SystemTime(NaiveDateTime),
    Timer(Vec<CycleInterval>),
    Array(Vec<Value>),
    OperatingStatus(OperatingStatus),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}
