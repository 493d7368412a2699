//! The KW wire protocol's two command shapes and the answers they produce.

use crate::address::Address;
use crate::error::DecodingError;

/// A result produced by resolving a [`Command`] against the bytes the device replied
/// with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Data(Vec<u8>),
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `0xF7 addr[2] size[1]`, expects `size` bytes back.
    Read { address: Address, size: u8 },
    /// `0xF4 addr[2] len[1] payload`, expects a single status byte back.
    Write { address: Address, payload: Vec<u8> },
}

impl Command {
    pub fn read(address: Address, size: u8) -> Self {
        Command::Read { address, size }
    }

    pub fn write(address: Address, payload: Vec<u8>) -> Self {
        Command::Write { address, payload }
    }

    /// The bytes to put on the wire to issue this command.
    pub fn wire_bytes(&self) -> Vec<u8> {
        match self {
            Command::Read { address, size } => {
                let mut bytes = Vec::with_capacity(4);
                bytes.push(0xF7);
                bytes.extend(address.to_bytes());
                bytes.push(*size);
                bytes
            }
            Command::Write { address, payload } => {
                let mut bytes = Vec::with_capacity(4 + payload.len());
                bytes.push(0xF4);
                bytes.extend(address.to_bytes());
                bytes.push(payload.len() as u8);
                bytes.extend(payload);
                bytes
            }
        }
    }

    /// Number of bytes the device is expected to answer with.
    pub fn expected_reply_size(&self) -> usize {
        match self {
            Command::Read { size, .. } => *size as usize,
            Command::Write { .. } => 1,
        }
    }

    /// Interprets a reply of exactly [`Command::expected_reply_size`] bytes.
    ///
    /// The runner is responsible for recognizing an all-`0x05` reply as a
    /// resynchronization signal before calling this.
    pub fn handle_reply(&self, reply: &[u8]) -> Result<Answer, DecodingError> {
        if reply.len() != self.expected_reply_size() {
            return Err(DecodingError::WrongLength {
                expected: self.expected_reply_size(),
                actual: reply.len(),
            });
        }
        match self {
            Command::Read { .. } => Ok(Answer::Data(reply.to_vec())),
            Command::Write { .. } => Ok(if reply[0] == 0x00 {
                Answer::Success
            } else {
                Answer::Failure
            }),
        }
    }
}

/// Device sync byte: emitted by the appliance to invite a new communication session.
pub const SYNC_BYTE: u8 = 0x05;
/// Session-start byte: written by the controller after observing a sync byte.
pub const SESSION_START_BYTE: u8 = 0x01;

pub fn is_resync_reply(reply: &[u8]) -> bool {
    !reply.is_empty() && reply.iter().all(|&b| b == SYNC_BYTE)
}
