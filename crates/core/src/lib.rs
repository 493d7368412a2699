//! Controller-side bridge to a heating appliance speaking the KW protocol over
//! an Optolink serial link: typed parameters, a synchronization-driven
//! protocol runner, and a read-through/write-through cache in front of it.

pub mod address;
pub mod cache;
pub mod command;
pub mod device;
pub mod dummy;
pub mod encoding;
pub mod error;
pub mod link;
pub mod parameter;
pub mod runner;
pub mod unit;
pub mod value;

pub use address::Address;
pub use cache::{Cache, Connection};
pub use command::{Answer, Command};
pub use device::{Device, ProtocolFamily};
pub use encoding::Encoding;
pub use error::{CoreError, DecodingError, EncodingError, StorageError, UnitValidationError};
pub use link::{LinkError, Transport};
pub use parameter::{Parameter, ParameterKind, ParameterReading, ParameterStorage};
pub use runner::{ProtocolRunner, RunnerHandle};
pub use unit::{NumberUnit, Unit};
pub use value::{CycleInterval, DayPoint, OperatingStatus, Value};
