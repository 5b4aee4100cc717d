// src/ndef.rs
use std::fmt;

use crate::error::{PayloadError, TagError};

// Record header flag bits
const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_SR: u8 = 0x10;
const TNF_WELL_KNOWN: u8 = 0x01;

const URI_TYPE: &[u8] = b"U";

// TLV framing for Type 2 Tags
const TLV_NDEF: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0xFE;
const SHORT_TLV_HEADER: usize = 2;
const LONG_TLV_HEADER: usize = 4;

/// NFC Forum URI Record Type Definition abbreviation table, indexed by identifier code.
const URI_PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

/// A URL accepted for writing. Never empty; otherwise taken verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPayload(String);

impl UrlPayload {
    pub fn new(url: impl Into<String>) -> Result<Self, PayloadError> {
        let url = url.into();
        if url.is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UrlPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known "U" record: identifier code plus the URI with that prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefUriRecord {
    pub identifier: u8,
    pub remainder: String,
}

impl NdefUriRecord {
    /// Picks the longest matching abbreviation, or code 0x00 with the full URI.
    ///
    /// Android's `NdefRecord.createUri` instead lowercases the scheme and takes the first
    /// match in table order, so `urn:epc:id:...` encodes there as 0x13 ("urn:") with
    /// "epc:id:..." left in the payload, where this gives 0x1E and a 7 byte shorter record.
    /// Mixed-case schemes ("HTTPS://") also differ: they stay verbatim under 0x00 here.
    pub fn from_uri(uri: &str) -> Self {
        let (identifier, prefix) = URI_PREFIXES
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, prefix)| uri.starts_with(*prefix))
            .max_by_key(|(_, prefix)| prefix.len())
            .map(|(code, prefix)| (code as u8, *prefix))
            .unwrap_or((0x00, ""));

        Self {
            identifier,
            remainder: uri[prefix.len()..].to_string(),
        }
    }

    pub fn payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(1 + self.remainder.len());
        payload.push(self.identifier);
        payload.extend_from_slice(self.remainder.as_bytes());
        payload
    }

    fn payload_len(&self) -> usize {
        1 + self.remainder.len()
    }

    fn is_short(&self) -> bool {
        self.payload_len() <= u8::MAX as usize
    }

    pub fn byte_len(&self) -> usize {
        let length_field = if self.is_short() { 1 } else { 4 };
        // header + type length + payload length + type + payload
        1 + 1 + length_field + URI_TYPE.len() + self.payload_len()
    }

    pub fn to_bytes(&self, mb: bool, me: bool) -> Vec<u8> {
        let mut header = TNF_WELL_KNOWN;
        if mb {
            header |= FLAG_MB;
        }
        if me {
            header |= FLAG_ME;
        }
        if self.is_short() {
            header |= FLAG_SR;
        }

        let mut record = Vec::with_capacity(self.byte_len());
        record.push(header);
        record.push(URI_TYPE.len() as u8);
        if self.is_short() {
            record.push(self.payload_len() as u8);
        } else {
            debug_assert!(self.payload_len() <= u32::MAX as usize);
            record.extend_from_slice(&(self.payload_len() as u32).to_be_bytes());
        }
        record.extend_from_slice(URI_TYPE);
        record.extend(self.payload());
        record
    }
}

/// Ordered records; this service always builds exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefMessage {
    records: Vec<NdefUriRecord>,
}

impl NdefMessage {
    pub fn records(&self) -> &[NdefUriRecord] {
        &self.records
    }

    pub fn byte_len(&self) -> usize {
        self.records.iter().map(NdefUriRecord::byte_len).sum()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let last = self.records.len().saturating_sub(1);
        let mut message = Vec::with_capacity(self.byte_len());
        for (i, record) in self.records.iter().enumerate() {
            message.extend(record.to_bytes(i == 0, i == last));
        }
        message
    }
}

pub fn encode(url: &UrlPayload) -> NdefMessage {
    encode_uri(url.as_str())
}

/// Encodes any string, empty included. Callers go through `UrlPayload` to keep empty URLs out.
pub fn encode_uri(uri: &str) -> NdefMessage {
    NdefMessage {
        records: vec![NdefUriRecord::from_uri(uri)],
    }
}

/// Frames a message as an NDEF TLV followed by a terminator TLV.
/// The TLV length field tops out at 0xFFFF bytes.
pub fn wrap_in_tlv(ndef_bytes: &[u8]) -> Result<Vec<u8>, TagError> {
    let mut tlv = Vec::with_capacity(ndef_bytes.len() + LONG_TLV_HEADER + 1);
    tlv.push(TLV_NDEF);

    if ndef_bytes.len() < 0xFF {
        tlv.push(ndef_bytes.len() as u8);
    } else {
        let len = u16::try_from(ndef_bytes.len()).map_err(|_| TagError::DataAreaOverflow {
            needed: ndef_bytes.len(),
            available: u16::MAX as usize,
        })?;
        tlv.push(0xFF);
        tlv.extend_from_slice(&len.to_be_bytes());
    }

    tlv.extend_from_slice(ndef_bytes);
    tlv.push(TLV_TERMINATOR);
    Ok(tlv)
}

/// Largest message that fits a data area once TLV-framed. The terminator is optional.
pub fn max_message_size(data_area: usize) -> usize {
    let short = data_area.saturating_sub(SHORT_TLV_HEADER);
    if short < 0xFF {
        short
    } else {
        data_area.saturating_sub(LONG_TLV_HEADER).min(u16::MAX as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn https_url_uses_abbreviation() {
        let url = UrlPayload::new("https://example.com").unwrap();
        let message = encode(&url);

        assert_eq!(message.records().len(), 1);
        let record = &message.records()[0];
        assert_eq!(record.identifier, 0x04);
        assert_eq!(record.remainder, "example.com");

        let mut expected = vec![0xD1, 0x01, 0x0C, b'U', 0x04];
        expected.extend_from_slice(b"example.com");
        assert_eq!(message.to_bytes(), expected);
        assert_eq!(message.byte_len(), 16);
    }

    #[test]
    fn encoding_is_deterministic() {
        let url = UrlPayload::new("http://www.rust-lang.org/learn").unwrap();
        assert_eq!(encode(&url).to_bytes(), encode(&url).to_bytes());
    }

    #[test]
    fn length_is_overhead_plus_url_minus_prefix() {
        for (uri, prefix_len) in [
            ("https://example.com", 8),
            ("http://www.example.com/a?b=c", 11),
            ("mailto:someone@example.org", 7),
            ("tel:+81000000000", 4),
            ("gopher://old.example", 0),
            ("x", 0),
        ] {
            let message = encode_uri(uri);
            let expected = 5 + uri.len() - prefix_len;
            assert_eq!(message.byte_len(), expected, "{uri}");
            assert_eq!(message.to_bytes().len(), expected, "{uri}");
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let record = NdefUriRecord::from_uri("urn:epc:id:sgtin:0614141.107346.2017");
        assert_eq!(record.identifier, 0x1E);
        assert_eq!(record.remainder, "sgtin:0614141.107346.2017");

        let record = NdefUriRecord::from_uri("https://www.example.com");
        assert_eq!(record.identifier, 0x02);
        assert_eq!(record.remainder, "example.com");
    }

    #[test]
    fn unknown_scheme_is_verbatim() {
        let record = NdefUriRecord::from_uri("not a url at all");
        assert_eq!(record.identifier, 0x00);
        assert_eq!(record.remainder, "not a url at all");
    }

    #[test]
    fn prefix_match_is_case_sensitive() {
        let record = NdefUriRecord::from_uri("HTTPS://EXAMPLE.COM");
        assert_eq!(record.identifier, 0x00);
    }

    #[test]
    fn ftp_host_prefix_beats_bare_scheme() {
        let record = NdefUriRecord::from_uri("ftp://ftp.example.net/pub");
        assert_eq!(record.identifier, 0x08);
        assert_eq!(record.remainder, "example.net/pub");
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert_eq!(UrlPayload::new(""), Err(PayloadError::Empty));
    }

    #[test]
    fn empty_string_still_encodes() {
        let message = encode_uri("");
        assert_eq!(message.to_bytes(), vec![0xD1, 0x01, 0x01, b'U', 0x00]);
    }

    #[test]
    fn long_payload_uses_four_byte_length() {
        let uri = format!("https://example.com/{}", "a".repeat(300));
        let message = encode_uri(&uri);
        let bytes = message.to_bytes();

        let payload_len = 1 + uri.len() - "https://".len();
        assert_eq!(bytes[0], 0xC1);
        assert_eq!(bytes[1], 0x01);
        assert_eq!(&bytes[2..6], &(payload_len as u32).to_be_bytes());
        assert_eq!(bytes[6], b'U');
        assert_eq!(bytes[7], 0x04);
        assert_eq!(bytes.len(), message.byte_len());
        assert_eq!(message.byte_len(), 7 + payload_len);
    }

    #[test]
    fn tlv_short_form() {
        assert_eq!(
            wrap_in_tlv(&[0xAA, 0xBB]).unwrap(),
            vec![0x03, 0x02, 0xAA, 0xBB, 0xFE]
        );
    }

    #[test]
    fn tlv_long_form() {
        let data = vec![0x11; 0x1234];
        let tlv = wrap_in_tlv(&data).unwrap();
        assert_eq!(&tlv[..4], &[0x03, 0xFF, 0x12, 0x34]);
        assert_eq!(tlv.len(), 0x1234 + 5);
        assert_eq!(tlv.last(), Some(&0xFE));
    }

    #[test]
    fn tlv_rejects_length_beyond_u16() {
        let data = vec![0x11; 0x1_0000];
        assert_eq!(
            wrap_in_tlv(&data),
            Err(TagError::DataAreaOverflow {
                needed: 0x1_0000,
                available: 0xFFFF
            })
        );
        assert_eq!(wrap_in_tlv(&data[..0xFFFF]).unwrap().len(), 0xFFFF + 5);
    }

    #[test]
    fn max_message_size_accounts_for_tlv_header() {
        // NTAG213 / NTAG215 / NTAG216 data areas
        assert_eq!(max_message_size(144), 142);
        assert_eq!(max_message_size(496), 492);
        assert_eq!(max_message_size(872), 868);
        assert_eq!(max_message_size(0), 0);
    }
}
