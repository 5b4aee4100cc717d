// src/apdu.rs
use pcsc::{Card, MAX_BUFFER_SIZE};

use crate::error::TagError;

const SW_SUCCESS: [u8; 2] = [0x90, 0x00];

// Strips and checks the trailing status word
fn check_status(resp: &[u8]) -> Result<&[u8], TagError> {
    if resp.len() < 2 {
        return Err(TagError::ShortResponse(resp.len()));
    }
    let (data, sw) = resp.split_at(resp.len() - 2);
    if sw == SW_SUCCESS {
        Ok(data)
    } else {
        Err(TagError::Status {
            sw1: sw[0],
            sw2: sw[1],
        })
    }
}

pub fn read_binary(card: &Card, page: u8, length: u8) -> Result<Vec<u8>, TagError> {
    // Read: FF B0 00 Page Len
    let apdu = [0xFF, 0xB0, 0x00, page, length];
    let mut recv_buffer = [0u8; MAX_BUFFER_SIZE];

    let resp = card.transmit(&apdu, &mut recv_buffer)?;
    let data = check_status(resp)?;
    if data.len() < length as usize {
        return Err(TagError::ShortResponse(data.len()));
    }
    Ok(data[..length as usize].to_vec())
}

pub fn update_binary(card: &Card, page: u8, data: &[u8]) -> Result<(), TagError> {
    // Write: FF D6 00 Page Len [Data]
    let mut apdu = vec![0xFF, 0xD6, 0x00, page, data.len() as u8];
    apdu.extend_from_slice(data);

    let mut recv_buffer = [0u8; MAX_BUFFER_SIZE];
    let resp = card.transmit(&apdu, &mut recv_buffer)?;
    check_status(resp).map(|_| ())
}
