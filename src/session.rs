// src/session.rs
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::error::SessionError;
use crate::ndef::{self, NdefMessage, UrlPayload};
use crate::negotiator::{self, TagConnection};
use crate::types::WriteOutcome;

/// The "write requested" flag. Cloned handles observe the same value across threads.
#[derive(Debug, Clone, Default)]
pub struct WriteFlag(Arc<AtomicBool>);

impl WriteFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, requested: bool) {
        self.0.store(requested, Ordering::Release);
    }
}

struct PendingWrite {
    url: UrlPayload,
    message: NdefMessage,
}

/// Negotiation context for one write window, owned by the NFC thread.
pub struct WriteSession {
    requested: WriteFlag,
    pending: Option<PendingWrite>,
}

impl WriteSession {
    pub fn new(requested: WriteFlag) -> Self {
        Self {
            requested,
            pending: None,
        }
    }

    /// Opens the window for `url`. A pending write is never replaced.
    pub fn open(&mut self, url: UrlPayload) -> Result<(), SessionError> {
        if let Some(pending) = &self.pending {
            return Err(SessionError::AlreadyOpen {
                pending: pending.url.to_string(),
            });
        }

        let message = ndef::encode(&url);
        info!(
            "Write window opened for {} ({} bytes)",
            url,
            message.byte_len()
        );
        debug!("Encoded as {:?}", message.records());
        self.pending = Some(PendingWrite { url, message });
        self.requested.set(true);
        Ok(())
    }

    pub fn close(&mut self) {
        self.requested.set(false);
        if let Some(pending) = self.pending.take() {
            debug!("Write window closed for {}", pending.url);
        }
    }

    pub fn is_open(&self) -> bool {
        self.requested.is_set() && self.pending.is_some()
    }

    /// Handles one tag presentation. Outside the window the connection is left untouched
    /// and `deliver` is not called. Returns whether an attempt was made.
    pub fn on_tag_presented<C, F>(&mut self, connection: C, deliver: F) -> bool
    where
        C: TagConnection,
        F: FnOnce(WriteOutcome),
    {
        if !self.requested.is_set() {
            debug!("Tag presented outside write window, ignoring");
            return false;
        }
        let Some(pending) = &self.pending else {
            debug!("Write requested but no URL pending, ignoring");
            return false;
        };

        let outcome = negotiator::negotiate(connection, &pending.message);
        deliver(outcome);
        self.close();
        true
    }
}
