// src/config.rs
use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "nfc-url-writer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Writes URLs to NFC tags over PC/SC, driven by a WebSocket client")]
pub struct Config {
    /// WebSocket listen address
    #[arg(long, env = "NFC_WRITER_BIND", default_value = "127.0.0.1:3500")]
    pub bind: SocketAddr,

    /// How long each PC/SC status wait blocks before commands are checked (ms)
    #[arg(long, env = "NFC_WRITER_POLL_MS", default_value = "500")]
    pub poll_ms: u64,

    /// Capacity of the NFC -> WebSocket event channel
    #[arg(long, env = "NFC_WRITER_EVENT_CAPACITY", default_value = "100")]
    pub event_capacity: usize,

    /// Per-client broadcast buffer
    #[arg(long, env = "NFC_WRITER_CLIENT_CAPACITY", default_value = "32")]
    pub client_capacity: usize,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}
