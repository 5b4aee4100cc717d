// src/error.rs
use thiserror::Error;

/// Failures talking to a tag through the reader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    #[error("tag returned status {sw1:02X} {sw2:02X}")]
    Status { sw1: u8, sw2: u8 },

    #[error("short response from tag ({0} bytes)")]
    ShortResponse(usize),

    #[error("tag is not attached")]
    NotAttached,

    #[error("message of {needed} bytes does not fit a {available} byte data area")]
    DataAreaOverflow { needed: usize, available: usize },
}

/// Rejections of a URL before a write window is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("URL must not be empty")]
    Empty,
}

/// Refusals from the write window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a write is already pending for {pending}")]
    AlreadyOpen { pending: String },
}
