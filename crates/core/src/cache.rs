//! Read-through/write-through cache fronting a [`Device`](crate::device::Device):
//! serves fresh readings without touching the link, synthesizes aggregate
//! children from their cached parent, and invalidates on write.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::address::Address;
use crate::command::{Answer, Command};
use crate::encoding::Encoding;
use crate::error::CoreError;
use crate::parameter::{Parameter, ParameterKind, ParameterReading};
use crate::runner::RunnerHandle;

/// Low-level entry point onto the protocol runner plus the parameter registry
/// that gives addresses meaning. Mirrors the "connection" the source exposes
/// alongside its cache.
pub struct Connection {
    runner: RunnerHandle,
    storage: crate::parameter::ParameterStorage,
}

impl Connection {
    pub fn new(runner: RunnerHandle, storage: crate::parameter::ParameterStorage) -> Self {
        Self { runner, storage }
    }

    pub fn supported(&self) -> Vec<&Parameter> {
        self.storage.supported()
    }

    /// Bypasses parameter storage entirely: issues a raw read for `size` bytes
    /// at `address`.
    pub async fn read_address(&self, address: Address, size: u8) -> Result<Vec<u8>, CoreError> {
        match self.runner.submit(Command::read(address, size)).await? {
            Answer::Data(bytes) => Ok(bytes),
            _ => unreachable!("a Read command always resolves to Data or an error"),
        }
    }

    async fn read_parameter(
        &self,
        parameter: &Parameter,
        address: Address,
        encoding: &Encoding,
    ) -> Result<crate::value::Value, CoreError> {
        let bytes = self.read_address(address, encoding.size() as u8).await?;
        let value = encoding.deserialize(&bytes)?;
        parameter.validate(&value)?;
        Ok(value)
    }

    async fn write_parameter(
        &self,
        address: Address,
        encoding: &Encoding,
        value: &crate::value::Value,
    ) -> Result<(), CoreError> {
        let bytes = encoding.serialize(value)?;
        match self.runner.submit(Command::write(address, bytes)).await? {
            Answer::Success => Ok(()),
            Answer::Failure => Err(CoreError::DeviceFailure),
            Answer::Data(_) => unreachable!("a Write command never resolves to Data"),
        }
    }
}

struct CacheEntry {
    reading: ParameterReading,
}

/// Read-through/write-through cache. Holds its own lock internally so it can
/// be shared across caller tasks without an external `Mutex`.
pub struct Cache {
    connection: Connection,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Cache {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn supported(&self) -> Vec<&Parameter> {
        self.connection.supported()
    }

    /// Reads `id`, honoring the cache unless `force` is set or the cached
    /// entry is older than `max_age`.
    pub async fn read_param(
        &self,
        id: &str,
        force: bool,
        max_age: Option<Duration>,
    ) -> Result<ParameterReading, CoreError> {
        if !force {
            if let Some(reading) = self.fresh_cached(id, max_age) {
                return Ok(reading);
            }
            if let Some(reading) = self.synthesize_child(id) {
                return Ok(reading);
            }
        }

        let (parameter, address, encoding) = self.connection.storage.get(id)?;
        let value = self
            .connection
            .read_parameter(&parameter, address, &encoding)
            .await?;
        let reading = ParameterReading::now(parameter, value);
        self.store(id, reading.clone());
        self.invalidate_children(id);
        Ok(reading)
    }

    /// Validates and writes `value` to `id`, then caches it on success.
    pub async fn set_param(&self, id: &str, value: crate::value::Value) -> Result<(), CoreError> {
        let (parameter, address, encoding) = self.connection.storage.get(id)?;
        if parameter.readonly {
            return Err(CoreError::ReadOnlyViolation(id.to_string()));
        }
        encoding.validate(&value)?;
        parameter.validate(&value)?;

        self.connection.write_parameter(address, &encoding, &value).await?;

        self.store(id, ParameterReading::now(parameter, value));
        self.invalidate_children(id);
        self.invalidate_parent(id);
        Ok(())
    }

    fn fresh_cached(&self, id: &str, max_age: Option<Duration>) -> Option<ParameterReading> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(id)?;
        if let Some(max_age) = max_age {
            if entry.reading.time.elapsed() > max_age {
                return None;
            }
        }
        Some(entry.reading.clone())
    }

    /// For a dotted id `"P.i"` whose parent `P` is cached (but the child
    /// itself is not), synthesizes the child's reading from the parent's
    /// array value without touching the link.
    fn synthesize_child(&self, id: &str) -> Option<ParameterReading> {
        let (parent_id, index) = id.split_once('.')?;
        let index: usize = index.parse().ok()?;
        let entries = self.entries.lock().unwrap();
        let parent = entries.get(parent_id)?;
        let child_parameter = parent.reading.parameter.child(index)?;
        let items = parent.reading.value.as_array()?;
        let value = items.get(index)?.clone();
        Some(ParameterReading {
            parameter: child_parameter,
            value,
            time: parent.reading.time,
        })
    }

    fn store(&self, id: &str, reading: ParameterReading) {
        self.entries
            .lock()
            .unwrap()
            .insert(id.to_string(), CacheEntry { reading });
    }

    /// Drops all cached children of an aggregated parameter `id`, so a stale
    /// element value is never served after its parent changes.
    fn invalidate_children(&self, id: &str) {
        let Ok((parameter, ..)) = self.connection.storage.get(id) else {
            return;
        };
        let ParameterKind::Aggregated { child_count, .. } = parameter.kind else {
            return;
        };
        let mut entries = self.entries.lock().unwrap();
        for index in 0..child_count {
            entries.remove(&format!("{id}.{index}"));
        }
    }

    /// After writing a single child `"P.i"`, the parent's cached aggregate
    /// value no longer reflects the device; drop it rather than serve a stale
    /// whole-array reading.
    fn invalidate_parent(&self, id: &str) {
        if let Some((parent_id, _)) = id.split_once('.') {
            self.entries.lock().unwrap().remove(parent_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::DummyDevice;
    use crate::encoding::Encoding;
    use crate::parameter::{Parameter, ParameterStorage};
    use crate::runner::ProtocolRunner;
    use crate::unit::Unit;
    use crate::value::Value;

    fn build_cache(device: DummyDevice) -> Cache {
        let mut storage = ParameterStorage::new();
        storage
            .add(
                Parameter::scalar("s", "Scalar", Unit::number(None, None, true), true),
                Address(0x0800),
                Encoding::uint(1),
            )
            .unwrap();
        storage
            .add(
                Parameter::scalar("t_set", "Setpoint", Unit::number(None, None, false), false),
                Address(0x2544),
                Encoding::float(2, 10),
            )
            .unwrap();
        storage
            .add(
                Parameter::aggregated("prog", "Program", Unit::number(None, None, true), 4, false),
                Address(0x3000),
                Encoding::array(Encoding::uint(1), 4),
            )
            .unwrap();
        let runner = ProtocolRunner::start(device);
        Cache::new(Connection::new(runner.handle(), storage))
    }

    #[tokio::test]
    async fn read_param_returns_seeded_value() {
        let device = DummyDevice::new();
        device.seed(0x0800, 0x2A);
        let cache = build_cache(device);
        let reading = cache.read_param("s", false, None).await.unwrap();
        assert_eq!(reading.value, Value::Number(42.0));
    }

    #[tokio::test]
    async fn set_then_read_is_served_from_cache() {
        let device = DummyDevice::new();
        let cache = build_cache(device);
        cache.set_param("t_set", Value::Number(21.5)).await.unwrap();
        let reading = cache.read_param("t_set", false, None).await.unwrap();
        assert_eq!(reading.value, Value::Number(21.5));
    }

    #[tokio::test]
    async fn child_is_synthesized_from_cached_parent_without_a_read() {
        let device = DummyDevice::new();
        for i in 0u16..4 {
            device.seed(0x3000 + i, i as u8 + 1);
        }
        let cache = build_cache(device);
        cache.read_param("prog", false, None).await.unwrap();
        let child = cache.read_param("prog.2", false, None).await.unwrap();
        assert_eq!(child.value, Value::Number(3.0));
    }

    #[tokio::test]
    async fn writing_a_child_invalidates_the_cached_parent() {
        let device = DummyDevice::new();
        for i in 0u16..4 {
            device.seed(0x3000 + i, i as u8 + 1);
        }
        let cache = build_cache(device);
        cache.read_param("prog", false, None).await.unwrap();
        cache.set_param("prog.1", Value::Number(9.0)).await.unwrap();
        // parent entry was dropped; re-reading goes back to the device, which
        // now reflects the write at index 1 alongside the original seed data.
        let parent = cache.read_param("prog", false, None).await.unwrap();
        assert_eq!(
            parent.value,
            Value::Array(vec![
                Value::Number(1.0),
                Value::Number(9.0),
                Value::Number(3.0),
                Value::Number(4.0),
            ])
        );
    }

    #[tokio::test]
    async fn readonly_parameter_rejects_set_param() {
        let device = DummyDevice::new();
        let cache = build_cache(device);
        let err = cache.set_param("s", Value::Number(1.0)).await.unwrap_err();
        assert!(matches!(err, CoreError::ReadOnlyViolation(id) if id == "s"));
    }

    #[tokio::test]
    async fn force_reload_always_issues_a_command() {
        let device = DummyDevice::new();
        device.seed(0x0800, 1);
        let cache = build_cache(device);
        cache.read_param("s", false, None).await.unwrap();
        let fresh = cache.read_param("s", true, None).await.unwrap();
        assert_eq!(fresh.value, Value::Number(1.0));
    }

    #[tokio::test]
    async fn stale_cache_entry_beyond_max_age_triggers_a_new_read() {
        let device = DummyDevice::new();
        device.seed(0x0800, 1);
        let cache = build_cache(device);
        cache.read_param("s", false, None).await.unwrap();
        device.seed(0x0800, 2);
        let reading = cache
            .read_param("s", false, Some(Duration::from_nanos(1)))
            .await
            .unwrap();
        assert_eq!(reading.value, Value::Number(2.0));
    }
}
