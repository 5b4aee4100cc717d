mod apdu;
mod cards;
mod config;
mod error;
mod ndef;
mod negotiator;
mod nfc_service;
mod session;
mod types;
mod ws;

use clap::Parser;
use crossbeam_channel::unbounded;
use log::{error, info};
use tokio::sync::broadcast;

use crate::config::Config;
use crate::session::WriteFlag;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::parse();
    info!("Starting NFC URL writer on {}", config.bind);

    // Channel: WS -> NFC (Commands)
    // Crossbeam (Sync) because the NFC thread blocks on PC/SC
    let (cmd_tx, cmd_rx) = unbounded::<types::NfcCommand>();

    // Channel: NFC -> WS (Events), fanned out to WS clients
    let (event_tx, event_rx) = broadcast::channel::<types::OutgoingMessage>(config.event_capacity);

    // Shared with the WS server so it can refuse a second pending write
    let flag = WriteFlag::default();

    let (bridge_tx, bridge_rx) = unbounded::<types::OutgoingMessage>();

    let nfc_flag = flag.clone();
    let poll_interval = config.poll_interval();
    let spawned = std::thread::Builder::new()
        .name("nfc-service".into())
        .spawn(move || nfc_service::run(bridge_tx, cmd_rx, nfc_flag, poll_interval))
        .and_then(|_| {
            // Bridge: NFC thread -> broadcast
            std::thread::Builder::new()
                .name("nfc-bridge".into())
                .spawn(move || {
                    while let Ok(msg) = bridge_rx.recv() {
                        let _ = event_tx.send(msg);
                    }
                })
        });
    if let Err(err) = spawned {
        error!("Failed to start NFC threads: {}", err);
        return;
    }

    ws::start_server(
        config.bind,
        config.client_capacity,
        cmd_tx,
        event_rx,
        flag,
    )
    .await;
}
