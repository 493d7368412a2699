//! Bundles a [`ParameterStorage`] with the protocol family it is addressed
//! through. Distinct from [`crate::cache::Connection`]: a `Device` is a
//! description a binary builds once at startup (the analogue of the source's
//! concrete appliance definitions); the connection/cache pair is the runtime
//! machinery that talks to it.

use crate::cache::{Cache, Connection};
use crate::parameter::ParameterStorage;
use crate::runner::ProtocolRunner;

/// The only protocol family this crate speaks. Kept as an enum (rather than
/// collapsing it away) so a future second appliance family has somewhere to
/// go without reshaping `Device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFamily {
    Kw,
}

/// A named appliance definition: its parameter catalog plus the protocol it
/// is spoken over.
pub struct Device {
    pub name: String,
    pub protocol: ProtocolFamily,
    pub storage: ParameterStorage,
}

impl Device {
    pub fn new(name: impl Into<String>, protocol: ProtocolFamily, storage: ParameterStorage) -> Self {
        Self {
            name: name.into(),
            protocol,
            storage,
        }
    }

    /// Spawns the protocol runner over `transport` and wraps it, together with
    /// this device's parameter storage, in a fresh [`Cache`].
    ///
    /// Idempotent is not required of this operation; calling it twice spawns
    /// two independent runners over two transports.
    pub fn start_communication<T>(self, transport: T) -> Cache
    where
        T: crate::link::Transport + 'static,
    {
        let runner = ProtocolRunner::start(transport);
        Cache::new(Connection::new(runner.handle(), self.storage))
    }
}
