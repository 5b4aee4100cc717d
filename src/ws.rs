// src/ws.rs
use std::net::SocketAddr;
use std::sync::Arc;

use crossbeam_channel::Sender;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::broadcast;
use warp::Filter;

use crate::ndef::UrlPayload;
use crate::session::WriteFlag;
use crate::types::{IncomingMessage, NfcCommand, OutgoingMessage};

pub async fn start_server(
    bind: SocketAddr,
    client_capacity: usize,
    nfc_cmd_tx: Sender<NfcCommand>,
    mut nfc_event_rx: broadcast::Receiver<OutgoingMessage>,
    flag: WriteFlag,
) {
    // Shared Broadcast Channel for WS Clients
    let (ws_tx, _) = broadcast::channel::<OutgoingMessage>(client_capacity);
    let ws_tx = Arc::new(ws_tx);

    // Forward NFC Events -> All WS Clients
    let ws_tx_clone = ws_tx.clone();
    tokio::spawn(async move {
        loop {
            match nfc_event_rx.recv().await {
                Ok(msg) => {
                    let _ = ws_tx_clone.send(msg);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event forwarder lagged, {} message(s) dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let ws_route = warp::path::end()
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let nfc_cmd_tx = nfc_cmd_tx.clone();
            let ws_tx = ws_tx.clone();
            let flag = flag.clone();

            ws.on_upgrade(move |socket| handle_connection(socket, nfc_cmd_tx, ws_tx, flag))
        });

    let routes = ws_route.with(warp::cors().allow_any_origin());

    info!("WebSocket server running on ws://{}", bind);
    warp::serve(routes).run(bind).await;
}

async fn handle_connection(
    ws: warp::ws::WebSocket,
    nfc_cmd_tx: Sender<NfcCommand>,
    ws_tx: Arc<broadcast::Sender<OutgoingMessage>>,
    flag: WriteFlag,
) {
    let (mut client_ws_tx, mut client_ws_rx) = ws.split();
    let mut rx_broadcast = ws_tx.subscribe();
    debug!("WebSocket client connected");

    // Broadcasts -> Client
    tokio::spawn(async move {
        while let Ok(msg) = rx_broadcast.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(err) => {
                    error!("Failed to serialize {:?}: {}", msg, err);
                    continue;
                }
            };
            if client_ws_tx
                .send(warp::ws::Message::text(json))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // Client -> NFC Thread
    while let Some(result) = client_ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(err) => {
                warn!("WebSocket error: {}", err);
                break;
            }
        };
        let Ok(text) = msg.to_str() else {
            continue;
        };
        let parsed = match serde_json::from_str::<IncomingMessage>(text) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Ignoring malformed message: {}", err);
                continue;
            }
        };

        match route_message(parsed, &flag) {
            Ok(cmd) => {
                if nfc_cmd_tx.send(cmd).is_err() {
                    error!("NFC Service is not running");
                    let _ = ws_tx.send(OutgoingMessage::READER_ERROR {
                        error: "NFC Service is not running".into(),
                    });
                }
            }
            Err(rejection) => {
                let _ = ws_tx.send(rejection);
            }
        }
    }
    debug!("WebSocket client disconnected");
}

/// Maps a client message to a worker command, or a rejection for the client.
fn route_message(msg: IncomingMessage, flag: &WriteFlag) -> Result<NfcCommand, OutgoingMessage> {
    match msg {
        IncomingMessage::GET_READER_STATUS => Ok(NfcCommand::CheckReaderStatus),
        IncomingMessage::CANCEL_WRITE => Ok(NfcCommand::CancelWrite),
        IncomingMessage::WRITE_URL { url } => {
            if flag.is_set() {
                return Err(OutgoingMessage::WRITE_REJECTED {
                    error: "A write is already pending".into(),
                });
            }
            let url = UrlPayload::new(url).map_err(|err| OutgoingMessage::WRITE_REJECTED {
                error: err.to_string(),
            })?;
            info!("Write requested for {}", url);
            Ok(NfcCommand::OpenWriteWindow { url })
        }
    }
}
