//! Raw byte I/O with the device. No framing knowledge lives here: callers (the
//! protocol runner) own deciding what the bytes mean.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};

/// The appliance's native Optolink settings.
pub const BAUD_RATE: u32 = 4800;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },
}

/// Something that can send and receive bytes on the half-duplex link to the
/// appliance. Implemented by [`SerialLink`] for the real device and by
/// [`crate::dummy::DummyDevice`] for tests.
pub trait Transport: Send {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Reads up to `count` bytes, waiting at most `timeout` in total. Returns fewer
    /// bytes than `count` (possibly zero) if the timeout elapses first; this is not
    /// an error.
    async fn read(&mut self, count: usize, timeout: Duration) -> Result<Vec<u8>, LinkError>;

    async fn flush(&mut self) -> Result<(), LinkError>;
}

/// Bound on the producer/consumer byte queue fed by the background reader task.
const QUEUE_CAPACITY: usize = 4096;

/// An asynchronous connection to a physical Optolink serial port.
///
/// A background task reads from the port's file descriptor as bytes become
/// available (the native async reactor's edge-triggered readiness) and pushes them
/// into a bounded channel; [`Transport::read`] pulls from that channel rather than
/// from the port directly, so a slow consumer never blocks the reader.
pub struct SerialLink {
    writer: WriteHalf<SerialStream>,
    queue: mpsc::Receiver<u8>,
    reader_task: JoinHandle<()>,
}

impl SerialLink {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, LinkError> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::Even)
            .stop_bits(StopBits::Two)
            .open_native_async()
            .map_err(|source| LinkError::Open {
                path: path.to_string(),
                source,
            })?;
        let (reader, writer) = tokio::io::split(port);

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let reader_task = tokio::spawn(read_into_queue(reader, tx));

        Ok(Self {
            writer,
            queue: rx,
            reader_task,
        })
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_into_queue(mut reader: ReadHalf<SerialStream>, tx: mpsc::Sender<u8>) {
    let mut buf = [0u8; 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::warn!("serial port closed by the device");
                return;
            }
            Ok(n) => {
                for &byte in &buf[..n] {
                    if tx.send(byte).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "serial read error, link reader task exiting");
                return;
            }
        }
    }
}

impl Transport for SerialLink {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.writer.write_all(bytes).await?;
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
            match tokio::time::timeout(remaining, self.queue.recv()).await {
                Ok(Some(byte)) => bytes.push(byte),
                Ok(None) => break,
                Err(_elapsed) => break,
            }
        }
        Ok(bytes)
    }

    async fn flush(&mut self) -> Result<(), LinkError> {
        while self.queue.try_recv().is_ok() {}
        Ok(())
    }
}
