// src/types.rs
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ndef::UrlPayload;

/// Terminal result of one write attempt.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum WriteOutcome {
    Success,
    NotWritable,
    InsufficientCapacity { needed: usize, max: usize },
    NoNdefSupport,
    TransportError { message: String },
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Success => f.write_str("URL written to tag."),
            WriteOutcome::NotWritable => f.write_str("Tag is write-protected."),
            WriteOutcome::InsufficientCapacity { needed, max } => write!(
                f,
                "Insufficient capacity: needed {} / max {} bytes.",
                needed, max
            ),
            WriteOutcome::NoNdefSupport => f.write_str("Tag does not support NDEF."),
            WriteOutcome::TransportError { message } => write!(f, "Write error: {}", message),
        }
    }
}

// Messages sent TO the WebSocket client (Frontend)
#[allow(non_camel_case_types)]
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    READER_STATUS { success: bool },
    CARD_STATUS { success: bool, message: String },
    WRITE_WINDOW { open: bool },
    WRITE_OUTCOME { outcome: WriteOutcome, message: String },
    WRITE_REJECTED { error: String },
    READER_ERROR { error: String },
}

impl OutgoingMessage {
    pub fn outcome(outcome: WriteOutcome) -> Self {
        let message = outcome.to_string();
        OutgoingMessage::WRITE_OUTCOME { outcome, message }
    }
}

// Messages received FROM the WebSocket client
#[allow(non_camel_case_types)]
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    GET_READER_STATUS,
    WRITE_URL { url: String },
    CANCEL_WRITE,
}

// Internal commands sent from WS Server -> NFC Thread
#[derive(Debug)]
pub enum NfcCommand {
    OpenWriteWindow { url: UrlPayload },
    CancelWrite,
    CheckReaderStatus,
}
