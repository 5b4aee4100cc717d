// src/negotiator.rs
use log::{debug, info, warn};

use crate::error::TagError;
use crate::ndef::NdefMessage;
use crate::types::WriteOutcome;

/// What an attached tag reports about its NDEF area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdefCapability {
    pub is_writable: bool,
    pub max_size: usize,
}

/// An open session to one physical tag.
pub trait TagConnection {
    fn connect(&mut self) -> Result<(), TagError>;

    /// `Ok(None)` when the tag has no NDEF support at all.
    fn ndef_capability(&mut self) -> Result<Option<NdefCapability>, TagError>;

    /// Writes a serialized NDEF message to the tag's NDEF data area.
    fn write_ndef_message(&mut self, message: &[u8]) -> Result<(), TagError>;

    fn close(&mut self) -> Result<(), TagError>;
}

impl<T: TagConnection + ?Sized> TagConnection for &mut T {
    fn connect(&mut self) -> Result<(), TagError> {
        (**self).connect()
    }

    fn ndef_capability(&mut self) -> Result<Option<NdefCapability>, TagError> {
        (**self).ndef_capability()
    }

    fn write_ndef_message(&mut self, message: &[u8]) -> Result<(), TagError> {
        (**self).write_ndef_message(message)
    }

    fn close(&mut self) -> Result<(), TagError> {
        (**self).close()
    }
}

/// Runs one write attempt to a terminal outcome. The connection is closed exactly once
/// on every path before this returns.
pub fn negotiate<C: TagConnection>(mut connection: C, message: &NdefMessage) -> WriteOutcome {
    if let Err(err) = connection.connect() {
        warn!("Failed to attach to tag: {}", err);
        release(&mut connection);
        return WriteOutcome::TransportError {
            message: err.to_string(),
        };
    }
    debug!("Attached to tag");

    let capability = match connection.ndef_capability() {
        Ok(Some(capability)) => capability,
        Ok(None) => {
            warn!("Tag does not support NDEF");
            release(&mut connection);
            return WriteOutcome::NoNdefSupport;
        }
        Err(err @ TagError::Pcsc(_)) => {
            warn!("Lost tag during capability query: {}", err);
            release(&mut connection);
            return WriteOutcome::TransportError {
                message: err.to_string(),
            };
        }
        Err(err) => {
            warn!("NDEF capability query refused: {}", err);
            release(&mut connection);
            return WriteOutcome::NoNdefSupport;
        }
    };
    debug!("Capability checked: {:?}", capability);

    if !capability.is_writable {
        warn!("Tag is read-only");
        release(&mut connection);
        return WriteOutcome::NotWritable;
    }

    let needed = message.byte_len();
    if needed > capability.max_size {
        warn!(
            "Message needs {} bytes but tag holds {}",
            needed, capability.max_size
        );
        release(&mut connection);
        return WriteOutcome::InsufficientCapacity {
            needed,
            max: capability.max_size,
        };
    }
    debug!("Size checked: {} / {} bytes", needed, capability.max_size);

    let bytes = message.to_bytes();
    debug!("Writing NDEF message: {}", hex::encode(&bytes));
    let written = connection.write_ndef_message(&bytes);
    let closed = connection.close();

    match written.and(closed) {
        Ok(()) => {
            info!("Wrote {} byte NDEF message", needed);
            WriteOutcome::Success
        }
        Err(err) => {
            warn!("Write failed: {}", err);
            WriteOutcome::TransportError {
                message: err.to_string(),
            }
        }
    }
}

// Close on a non-write path; the classification already decided stands.
fn release<C: TagConnection>(connection: &mut C) {
    if let Err(err) = connection.close() {
        warn!("Failed to close tag connection: {}", err);
    }
}
