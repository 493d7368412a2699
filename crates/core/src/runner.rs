//! Drives the KW framing state machine against a [`Transport`] and owns the
//! command queue. Callers never touch the link directly; they enqueue a
//! [`Command`] and await its [`oneshot`] completion slot.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::command::{Answer, Command, SESSION_START_BYTE, SYNC_BYTE};
use crate::error::CoreError;
use crate::link::Transport;

/// Bound on the number of commands allowed to queue up behind an in-flight session.
const QUEUE_CAPACITY: usize = 256;

/// In-session idle budget: with the queue empty this long, the session closes.
const SESSION_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

type CompletionSlot = oneshot::Sender<Result<Answer, CoreError>>;

struct QueuedCommand {
    command: Command,
    slot: CompletionSlot,
}

/// Handle callers enqueue commands through. Cloning shares the same queue; the
/// runner task itself is owned separately and stops once every handle (and the
/// runner's own copy of the receiver) is dropped.
#[derive(Clone)]
pub struct RunnerHandle {
    queue: mpsc::Sender<QueuedCommand>,
}

impl RunnerHandle {
    /// Enqueues `command` and awaits its resolution.
    pub async fn submit(&self, command: Command) -> Result<Answer, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.queue
            .send(QueuedCommand { command, slot: tx })
            .await
            .map_err(|_| CoreError::RunnerShutDown)?;
        rx.await.map_err(|_| CoreError::RunnerShutDown)?
    }
}

/// Owns the transport and the long-lived task that speaks the KW protocol over
/// it. Dropping the runner aborts that task and, with it, releases the
/// transport.
pub struct ProtocolRunner {
    handle: RunnerHandle,
    task: JoinHandle<()>,
}

impl ProtocolRunner {
    /// Spawns the runner task driving `transport`. The task starts in the
    /// *Unsynchronized* state and runs until the runner (and all its handles)
    /// are dropped.
    pub fn start<T>(transport: T) -> Self
    where
        T: Transport + 'static,
    {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let task = tokio::spawn(drive(transport, rx));
        Self {
            handle: RunnerHandle { queue: tx },
            task,
        }
    }

    /// A cloneable handle for submitting commands.
    pub fn handle(&self) -> RunnerHandle {
        self.handle.clone()
    }
}

impl Drop for ProtocolRunner {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Single-byte read used while hunting for the device's sync byte.
async fn read_one<T: Transport>(transport: &mut T, timeout: Duration) -> Option<u8> {
    transport.read(1, timeout).await.ok()?.first().copied()
}

async fn drive<T: Transport>(mut transport: T, mut queue: mpsc::Receiver<QueuedCommand>) {
    loop {
        // Unsynchronized: discard bytes until we see the device's sync byte.
        // A generous per-byte timeout keeps this loop from busy-spinning while
        // still reacting promptly once the link goes quiet and starts pulsing.
        match read_one(&mut transport, Duration::from_secs(5)).await {
            Some(SYNC_BYTE) => {}
            Some(_) => continue,
            None => continue,
        }

        if queue.is_empty() {
            // No work yet; stay unsynchronized rather than opening a session
            // no one needs.
            continue;
        }

        tracing::debug!("sync byte observed, opening session");
        if let Err(err) = transport.write(&[SESSION_START_BYTE]).await {
            tracing::warn!(error = %err, "failed to start session, resyncing");
            continue;
        }

        command_exchange_loop(&mut transport, &mut queue).await;
        tracing::debug!("session closed");
    }
}

/// Repeatedly drains the queue against the link until it falls idle for
/// [`SESSION_IDLE_TIMEOUT`] or the device signals resync with an all-sync reply.
async fn command_exchange_loop<T: Transport>(
    transport: &mut T,
    queue: &mut mpsc::Receiver<QueuedCommand>,
) {
    loop {
        let next = tokio::time::timeout(SESSION_IDLE_TIMEOUT, queue.recv()).await;
        let queued = match next {
            Ok(Some(queued)) => queued,
            Ok(None) => return, // all handles dropped, nothing left to ever serve
            Err(_elapsed) => return, // idle timeout: close the session, not an error
        };

        let QueuedCommand { command, slot } = queued;
        let result = exchange_one(transport, &command).await;
        let resync = matches!(result, Err(CoreError::ProtocolResync) | Err(CoreError::Link(_)));
        let _ = slot.send(result);
        if resync {
            return;
        }
    }
}

async fn exchange_one<T: Transport>(transport: &mut T, command: &Command) -> Result<Answer, CoreError> {
    transport.write(&command.wire_bytes()).await?;
    let reply = transport
        .read(command.expected_reply_size(), SESSION_IDLE_TIMEOUT)
        .await?;
    if crate::command::is_resync_reply(&reply) {
        tracing::warn!("device replied with sync bytes mid-session, resynchronizing");
        return Err(CoreError::ProtocolResync);
    }
    Ok(command.handle_reply(&reply)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::dummy::DummyDevice;

    #[tokio::test]
    async fn reads_and_writes_round_trip_through_the_dummy() {
        let device = DummyDevice::new();
        device.seed(0x0800, 0x2A);
        let runner = ProtocolRunner::start(device);
        let handle = runner.handle();

        let answer = handle.submit(Command::read(Address(0x0800), 1)).await.unwrap();
        assert_eq!(answer, Answer::Data(vec![0x2A]));

        let answer = handle
            .submit(Command::write(Address(0x0900), vec![0x07]))
            .await
            .unwrap();
        assert_eq!(answer, Answer::Success);
    }

    #[tokio::test]
    async fn commands_enqueued_together_complete_in_fifo_order() {
        let device = DummyDevice::new();
        for addr in 0u16..5 {
            device.seed(0x1000 + addr, addr as u8 + 1);
        }
        let runner = ProtocolRunner::start(device);
        let handle = runner.handle();

        let mut futures = Vec::new();
        for addr in 0u16..5 {
            let handle = handle.clone();
            futures.push(tokio::spawn(async move {
                handle.submit(Command::read(Address(0x1000 + addr), 1)).await
            }));
        }
        for (addr, fut) in futures.into_iter().enumerate() {
            let answer = fut.await.unwrap().unwrap();
            assert_eq!(answer, Answer::Data(vec![addr as u8 + 1]));
        }
    }

    #[tokio::test]
    async fn resync_fails_only_the_in_flight_command() {
        let device = DummyDevice::new();
        device.force_resync_on_read(0x2000);
        device.seed(0x2100, 0x09);
        let runner = ProtocolRunner::start(device);
        let handle = runner.handle();

        let first = handle.submit(Command::read(Address(0x2000), 4)).await;
        assert!(matches!(first, Err(CoreError::ProtocolResync)));

        let second = handle.submit(Command::read(Address(0x2100), 1)).await.unwrap();
        assert_eq!(second, Answer::Data(vec![0x09]));
    }
}
