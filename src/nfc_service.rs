// src/nfc_service.rs
use std::ffi::{CStr, CString};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::{error, info, warn};
use pcsc::{Context, MAX_BUFFER_SIZE, PNP_NOTIFICATION, ReaderState, Scope, State};

use crate::cards::Type2Tag;
use crate::session::{WriteFlag, WriteSession};
use crate::types::{NfcCommand, OutgoingMessage};

pub fn run(
    tx: Sender<OutgoingMessage>,
    rx: Receiver<NfcCommand>,
    flag: WriteFlag,
    poll_interval: Duration,
) {
    info!("Starting NFC Service (Event Driven)...");

    let ctx = match Context::establish(Scope::User) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("Failed to establish context: {}", err);
            send(
                &tx,
                OutgoingMessage::READER_ERROR {
                    error: err.to_string(),
                },
            );
            return;
        }
    };

    let mut service = NfcService {
        ctx,
        tx,
        session: WriteSession::new(flag),
        reader_names: Vec::new(),
        // Index 0 tracks reader hot-plug; readers follow in reader_names order
        reader_states: vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)],
    };
    service.refresh_readers();

    loop {
        // 1. Wait for State Change
        if let Err(err) = service
            .ctx
            .get_status_change(poll_interval, &mut service.reader_states)
        {
            if err != pcsc::Error::Timeout {
                error!("PCSC Error: {}", err);
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        // 2. Check for commands
        loop {
            match rx.try_recv() {
                Ok(cmd) => service.handle_command(cmd),
                Err(crossbeam_channel::TryRecvError::Empty) => break,
                Err(crossbeam_channel::TryRecvError::Disconnected) => {
                    info!("Command channel closed, stopping NFC Service");
                    return;
                }
            }
        }

        // 3. Process events
        service.process_events();
    }
}

struct NfcService {
    ctx: Context,
    tx: Sender<OutgoingMessage>,
    session: WriteSession,
    reader_names: Vec<CString>,
    reader_states: Vec<ReaderState>,
}

impl NfcService {
    fn handle_command(&mut self, cmd: NfcCommand) {
        match cmd {
            NfcCommand::OpenWriteWindow { url } => match self.session.open(url) {
                Ok(()) => self.send(OutgoingMessage::WRITE_WINDOW { open: true }),
                Err(err) => {
                    warn!("Write request refused: {}", err);
                    self.send(OutgoingMessage::WRITE_REJECTED {
                        error: err.to_string(),
                    });
                }
            },
            NfcCommand::CancelWrite => {
                if self.session.is_open() {
                    info!("Write window cancelled");
                }
                self.session.close();
                self.send(OutgoingMessage::WRITE_WINDOW { open: false });
            }
            NfcCommand::CheckReaderStatus => self.refresh_readers(),
        }
    }

    fn process_events(&mut self) {
        if self.reader_states[0]
            .event_state()
            .intersects(State::CHANGED)
        {
            info!("Hardware change detected");
            self.reader_states[0].sync_current_state();
            self.refresh_readers();
            return;
        }

        for i in 1..self.reader_states.len() {
            let rs = &self.reader_states[i];
            if !rs.event_state().intersects(State::CHANGED) {
                continue;
            }

            let current = rs.event_state();
            let previous = rs.current_state();
            let name = self.reader_names[i - 1].clone();

            if current.intersects(State::PRESENT) && !previous.intersects(State::PRESENT) {
                info!("Card Inserted on {:?}", name);
                self.on_tag_presented(&name);
            }

            if current.intersects(State::EMPTY) && previous.intersects(State::PRESENT) {
                info!("Card Removed from {:?}", name);
                self.send(OutgoingMessage::CARD_STATUS {
                    success: false,
                    message: "Card removed!".into(),
                });
            }

            self.reader_states[i].sync_current_state();
        }
    }

    fn on_tag_presented(&mut self, reader: &CStr) {
        self.send(OutgoingMessage::CARD_STATUS {
            success: true,
            message: "Card detected!".into(),
        });

        let tag = Type2Tag::new(&self.ctx, reader);
        let tx = &self.tx;
        let attempted = self.session.on_tag_presented(tag, |outcome| {
            send(tx, OutgoingMessage::outcome(outcome));
        });
        if attempted {
            self.send(OutgoingMessage::WRITE_WINDOW { open: false });
        }
    }

    // Keeps reader_states[1..] aligned with reader_names
    fn refresh_readers(&mut self) {
        let mut readers_buf = [0; MAX_BUFFER_SIZE];

        let names: Vec<CString> = match self.ctx.list_readers(&mut readers_buf) {
            Ok(iter) => iter.map(CString::from).collect(),
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(err) => {
                warn!("Failed to list readers: {}", err);
                Vec::new()
            }
        };

        let previous_names = std::mem::take(&mut self.reader_names);
        let previous_states: Vec<ReaderState> = self.reader_states.drain(1..).collect();
        self.reader_states
            .extend(carry_reader_states(&previous_names, previous_states, &names));
        self.reader_names = names;

        info!("{} reader(s) available", self.reader_names.len());
        self.send(OutgoingMessage::READER_STATUS {
            success: !self.reader_names.is_empty(),
        });
    }

    fn send(&self, msg: OutgoingMessage) {
        send(&self.tx, msg);
    }
}

/// Reuses the state of readers that are still attached, so a card already resting on
/// one is not seen again as an insertion. New readers start UNAWARE.
fn carry_reader_states(
    previous_names: &[CString],
    previous_states: Vec<ReaderState>,
    names: &[CString],
) -> Vec<ReaderState> {
    let mut previous: Vec<Option<ReaderState>> = previous_states.into_iter().map(Some).collect();

    names
        .iter()
        .map(|name| {
            previous_names
                .iter()
                .position(|known| known == name)
                .and_then(|i| previous.get_mut(i).and_then(Option::take))
                .unwrap_or_else(|| ReaderState::new(name.clone(), State::UNAWARE))
        })
        .collect()
}

fn send(tx: &Sender<OutgoingMessage>, msg: OutgoingMessage) {
    if tx.send(msg).is_err() {
        warn!("Event channel closed, dropping message");
    }
}
