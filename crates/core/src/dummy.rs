//! In-memory appliance implementing the KW wire protocol, for tests.
//!
//! From the controller's point of view a [`DummyDevice`] is just another
//! [`Transport`]: it is driven by the exact same [`crate::runner`] that drives a
//! real [`crate::link::SerialLink`]. Internally it runs its own little simulation
//! task that speaks the device side of the protocol against a byte-addressed map.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::command::SYNC_BYTE;
use crate::link::{LinkError, Transport};

/// How often the dummy emits a sync byte when idle, matching the real appliance.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(2);
/// How long the dummy waits for `0x01` (or the next command) after a sync byte.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

type Storage = Arc<Mutex<HashMap<u16, u8>>>;
type ResyncAddresses = Arc<Mutex<HashSet<u16>>>;

pub struct DummyDevice {
    to_device: mpsc::Sender<u8>,
    from_device: mpsc::Receiver<u8>,
    storage: Storage,
    resync_addresses: ResyncAddresses,
    simulation: JoinHandle<()>,
}

impl DummyDevice {
    pub fn new() -> Self {
        let storage: Storage = Arc::new(Mutex::new(HashMap::new()));
        let resync_addresses: ResyncAddresses = Arc::new(Mutex::new(HashSet::new()));
        let (to_device_tx, to_device_rx) = mpsc::channel(256);
        let (from_device_tx, from_device_rx) = mpsc::channel(256);
        let simulation = tokio::spawn(simulate(
            storage.clone(),
            resync_addresses.clone(),
            to_device_rx,
            from_device_tx,
        ));
        Self {
            to_device: to_device_tx,
            from_device: from_device_rx,
            storage,
            resync_addresses,
            simulation,
        }
    }

    /// Seeds the backing `addr -> byte` map, as if the device had that value stored.
    pub fn seed(&self, address: u16, value: u8) {
        self.storage.lock().unwrap().insert(address, value);
    }

    /// Reads back whatever byte is currently stored at `address` (0 if untouched).
    pub fn peek(&self, address: u16) -> u8 {
        *self.storage.lock().unwrap().get(&address).unwrap_or(&0)
    }

    /// Makes the next (and every subsequent) read at `address` answer with all
    /// sync bytes instead of the stored data, simulating the device falling back
    /// to sync emission mid-reply. Used to exercise the runner's resync path.
    pub fn force_resync_on_read(&self, address: u16) {
        self.resync_addresses.lock().unwrap().insert(address);
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DummyDevice {
    fn drop(&mut self) {
        self.simulation.abort();
    }
}

impl Transport for DummyDevice {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        for &byte in bytes {
            // The simulation task is the only receiver; if it's gone the device
            // simply never answers again, which read() already tolerates.
            let _ = self.to_device.send(byte).await;
        }
        Ok(())
    }

    async fn read(&mut self, count: usize, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut bytes = Vec::with_capacity(count);
        while bytes.len() < count {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, self.from_device.recv()).await {
                Ok(Some(byte)) => bytes.push(byte),
                Ok(None) => break,
                Err(_elapsed) => break,
            }
        }
        Ok(bytes)
    }

    async fn flush(&mut self) -> Result<(), LinkError> {
        while self.from_device.try_recv().is_ok() {}
        Ok(())
    }
}

async fn simulate(
    storage: Storage,
    resync_addresses: ResyncAddresses,
    mut from_controller: mpsc::Receiver<u8>,
    to_controller: mpsc::Sender<u8>,
) {
    loop {
        let cycle_start = tokio::time::Instant::now();
        if to_controller.send(SYNC_BYTE).await.is_err() {
            return;
        }
        match tokio::time::timeout(SESSION_IDLE_TIMEOUT, recv_byte(&mut from_controller)).await {
            Ok(Some(0x01)) => {
                while handle_command(
                    &storage,
                    &resync_addresses,
                    &mut from_controller,
                    &to_controller,
                )
                .await
                .is_ok()
                {}
            }
            _ => {}
        }
        let elapsed = cycle_start.elapsed();
        if elapsed < SYNC_INTERVAL {
            tokio::time::sleep(SYNC_INTERVAL - elapsed).await;
        }
    }
}

async fn recv_byte(rx: &mut mpsc::Receiver<u8>) -> Option<u8> {
    rx.recv().await
}

async fn recv_exact(rx: &mut mpsc::Receiver<u8>, count: usize, timeout: Duration) -> Option<Vec<u8>> {
    let mut bytes = Vec::with_capacity(count);
    let deadline = tokio::time::Instant::now() + timeout;
    while bytes.len() < count {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(b)) => bytes.push(b),
            _ => return None,
        }
    }
    Some(bytes)
}

/// Services a single frame. Returns `Err(())` on any timeout or unrecognized
/// discriminator, which ends the session and returns the device to sync emission.
async fn handle_command(
    storage: &Storage,
    resync_addresses: &ResyncAddresses,
    from_controller: &mut mpsc::Receiver<u8>,
    to_controller: &mpsc::Sender<u8>,
) -> Result<(), ()> {
    let discriminator = recv_exact(from_controller, 1, Duration::from_millis(100))
        .await
        .ok_or(())?[0];
    match discriminator {
        0xF7 => {
            let header = recv_exact(from_controller, 3, Duration::from_millis(100))
                .await
                .ok_or(())?;
            let address = u16::from_be_bytes([header[0], header[1]]);
            let size = header[2] as usize;
            let forced_resync = resync_addresses.lock().unwrap().contains(&address);
            let reply: Vec<u8> = if forced_resync {
                vec![SYNC_BYTE; size]
            } else {
                let map = storage.lock().unwrap();
                (0..size)
                    .map(|i| *map.get(&(address + i as u16)).unwrap_or(&0))
                    .collect()
            };
            for byte in reply {
                to_controller.send(byte).await.map_err(|_| ())?;
            }
            Ok(())
        }
        0xF4 => {
            let header = recv_exact(from_controller, 3, Duration::from_millis(100))
                .await
                .ok_or(())?;
            let address = u16::from_be_bytes([header[0], header[1]]);
            let size = header[2] as usize;
            let payload = recv_exact(from_controller, size, Duration::from_millis(100))
                .await
                .ok_or(())?;
            {
                let mut map = storage.lock().unwrap();
                for (i, byte) in payload.into_iter().enumerate() {
                    map.insert(address + i as u16, byte);
                }
            }
            to_controller.send(0x00).await.map_err(|_| ())?;
            Ok(())
        }
        _ => Err(()),
    }
}
