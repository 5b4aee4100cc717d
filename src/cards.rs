// src/cards.rs
use std::ffi::{CStr, CString};

use log::debug;
use pcsc::{Card, Context, Disposition, Protocols, ShareMode};

use crate::apdu;
use crate::error::TagError;
use crate::ndef;
use crate::negotiator::{NdefCapability, TagConnection};

const PAGE_SIZE: usize = 4;
const CC_PAGE: u8 = 3;
const FIRST_DATA_PAGE: u8 = 4;
const NDEF_MAGIC: u8 = 0xE1;

/// Capability Container of an NFC Forum Type 2 Tag (NTAG21x, Ultralight).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityContainer {
    pub version: u8,
    pub data_area: usize,
    pub write_access: u8,
}

impl CapabilityContainer {
    /// `None` when the NDEF magic number is absent.
    pub fn parse(cc: &[u8]) -> Option<Self> {
        match cc {
            [NDEF_MAGIC, version, size, access, ..] => Some(Self {
                version: *version,
                data_area: *size as usize * 8,
                write_access: access & 0x0F,
            }),
            _ => None,
        }
    }

    pub fn capability(&self) -> NdefCapability {
        NdefCapability {
            is_writable: self.write_access == 0x00,
            max_size: ndef::max_message_size(self.data_area),
        }
    }
}

/// Type 2 Tag on a PC/SC reader, reached through pseudo-APDUs.
pub struct Type2Tag<'a> {
    ctx: &'a Context,
    reader: CString,
    card: Option<Card>,
    data_area: usize,
}

impl<'a> Type2Tag<'a> {
    pub fn new(ctx: &'a Context, reader: &CStr) -> Self {
        Self {
            ctx,
            reader: reader.to_owned(),
            card: None,
            data_area: 0,
        }
    }

    fn card(&self) -> Result<&Card, TagError> {
        self.card.as_ref().ok_or(TagError::NotAttached)
    }
}

impl TagConnection for Type2Tag<'_> {
    fn connect(&mut self) -> Result<(), TagError> {
        let card = self
            .ctx
            .connect(&self.reader, ShareMode::Shared, Protocols::ANY)?;
        self.card = Some(card);
        Ok(())
    }

    fn ndef_capability(&mut self) -> Result<Option<NdefCapability>, TagError> {
        let cc = apdu::read_binary(self.card()?, CC_PAGE, PAGE_SIZE as u8)?;
        debug!("Capability container: {}", hex::encode(&cc));

        Ok(CapabilityContainer::parse(&cc).map(|cc| {
            debug!(
                "Type 2 Tag mapping {}.{}, {} byte data area",
                cc.version >> 4,
                cc.version & 0x0F,
                cc.data_area
            );
            self.data_area = cc.data_area;
            cc.capability()
        }))
    }

    fn write_ndef_message(&mut self, message: &[u8]) -> Result<(), TagError> {
        let card = self.card()?;

        let mut tlv = ndef::wrap_in_tlv(message)?;
        if tlv.len() > self.data_area {
            // Terminator is optional when the message fills the data area
            tlv.pop();
        }
        if tlv.len() > self.data_area {
            return Err(TagError::DataAreaOverflow {
                needed: tlv.len(),
                available: self.data_area,
            });
        }

        // NTAG writes 4 bytes (1 page) at a time
        tlv.resize(tlv.len().div_ceil(PAGE_SIZE) * PAGE_SIZE, 0x00);
        for (i, chunk) in tlv.chunks(PAGE_SIZE).enumerate() {
            let page = u8::try_from(FIRST_DATA_PAGE as usize + i).map_err(|_| {
                TagError::DataAreaOverflow {
                    needed: tlv.len(),
                    available: self.data_area,
                }
            })?;
            apdu::update_binary(card, page, chunk)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TagError> {
        match self.card.take() {
            Some(card) => card
                .disconnect(Disposition::LeaveCard)
                .map_err(|(_, err)| TagError::from(err)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_ntag215_container() {
        let cc = CapabilityContainer::parse(&[0xE1, 0x10, 0x3E, 0x00]).unwrap();
        assert_eq!(cc.data_area, 496);
        assert_eq!(
            cc.capability(),
            NdefCapability {
                is_writable: true,
                max_size: 492
            }
        );
    }

    #[test]
    fn locked_container_is_not_writable() {
        let cc = CapabilityContainer::parse(&[0xE1, 0x10, 0x12, 0x0F]).unwrap();
        assert!(!cc.capability().is_writable);
        assert_eq!(cc.capability().max_size, 142);
    }

    #[test]
    fn missing_magic_means_no_ndef() {
        assert_eq!(CapabilityContainer::parse(&[0x00, 0x00, 0x00, 0x00]), None);
        assert_eq!(CapabilityContainer::parse(&[0xE1, 0x10]), None);
    }
}
