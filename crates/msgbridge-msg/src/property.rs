//! MAPI property access on top of a compound document storage.
//!
//! Variable-length properties live in streams named
//! `__substg1.0_<ID><TYPE>`; fixed-length ones are packed in the
//! `__properties_version1.0` stream of the owning storage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::cfb::CompoundFile;
use crate::error::ParseError;

/// Property type: 32-bit integer.
pub const PT_LONG: u16 = 0x0003;
/// Property type: 8-bit string.
pub const PT_STRING8: u16 = 0x001E;
/// Property type: UTF-16LE string.
pub const PT_UNICODE: u16 = 0x001F;
/// Property type: FILETIME.
pub const PT_SYSTIME: u16 = 0x0040;
/// Property type: binary.
pub const PT_BINARY: u16 = 0x0102;

/// Property ids used by the parser.
pub mod tag {
    /// `PR_SUBJECT`
    pub const SUBJECT: u16 = 0x0037;
    /// `PR_CLIENT_SUBMIT_TIME`
    pub const CLIENT_SUBMIT_TIME: u16 = 0x0039;
    /// `PR_SENT_REPRESENTING_NAME`
    pub const SENT_REPRESENTING_NAME: u16 = 0x0042;
    /// `PR_SENT_REPRESENTING_EMAIL_ADDRESS`
    pub const SENT_REPRESENTING_EMAIL: u16 = 0x0065;
    /// `PR_TRANSPORT_MESSAGE_HEADERS`
    pub const TRANSPORT_HEADERS: u16 = 0x007D;
    /// `PR_SENDER_NAME`
    pub const SENDER_NAME: u16 = 0x0C1A;
    /// `PR_SENDER_EMAIL_ADDRESS`
    pub const SENDER_EMAIL: u16 = 0x0C1F;
    /// `PR_RECIPIENT_TYPE`
    pub const RECIPIENT_TYPE: u16 = 0x0C15;
    /// `PR_DISPLAY_CC`
    pub const DISPLAY_CC: u16 = 0x0E03;
    /// `PR_DISPLAY_TO`
    pub const DISPLAY_TO: u16 = 0x0E04;
    /// `PR_MESSAGE_DELIVERY_TIME`
    pub const DELIVERY_TIME: u16 = 0x0E06;
    /// `PR_BODY`
    pub const BODY: u16 = 0x1000;
    /// `PR_HTML`
    pub const HTML: u16 = 0x1013;
    /// `PR_INTERNET_MESSAGE_ID`
    pub const INTERNET_MESSAGE_ID: u16 = 0x1035;
    /// `PR_DISPLAY_NAME`
    pub const DISPLAY_NAME: u16 = 0x3001;
    /// `PR_EMAIL_ADDRESS`
    pub const EMAIL_ADDRESS: u16 = 0x3003;
    /// `PR_SMTP_ADDRESS`
    pub const SMTP_ADDRESS: u16 = 0x39FE;
    /// `PR_SENDER_SMTP_ADDRESS`
    pub const SENDER_SMTP_ADDRESS: u16 = 0x5D01;
    /// `PR_SENT_REPRESENTING_SMTP_ADDRESS`
    pub const SENT_REPRESENTING_SMTP_ADDRESS: u16 = 0x5D02;
}

/// Name of the fixed-length property stream.
pub const PROPERTIES_STREAM: &str = "__properties_version1.0";
/// Prefix of recipient storages.
pub const RECIPIENT_PREFIX: &str = "__recip_version1.0_#";
/// Prefix of attachment storages.
pub const ATTACHMENT_PREFIX: &str = "__attach_version1.0_#";
/// Prefix of variable-length property streams.
pub const SUBSTG_PREFIX: &str = "__substg1.0_";

/// Header length of the top-level message property stream.
pub const MESSAGE_PROPERTIES_HEADER: usize = 32;
/// Header length of recipient and attachment property streams.
pub const CHILD_PROPERTIES_HEADER: usize = 8;

/// Seconds between 1601-01-01 and the Unix epoch.
const FILETIME_UNIX_OFFSET: i64 = 11_644_473_600;

/// Builds the stream name of a variable-length property.
#[must_use]
pub fn stream_name(id: u16, ty: u16) -> String {
    format!("{SUBSTG_PREFIX}{id:04X}{ty:04X}")
}

/// Decodes a UTF-16LE string, replacing invalid sequences with U+FFFD.
#[must_use]
pub fn decode_unicode(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string()
}

/// Decodes an 8-bit string: UTF-8 when valid, Latin-1 otherwise.
#[must_use]
pub fn decode_string8(bytes: &[u8]) -> String {
    let bytes = trim_nul(bytes);
    std::str::from_utf8(bytes).map_or_else(
        |_| bytes.iter().map(|&b| char::from(b)).collect(),
        str::to_string,
    )
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Converts a FILETIME (100 ns ticks since 1601) to UTC.
#[must_use]
pub fn filetime_to_utc(ticks: u64) -> Option<DateTime<Utc>> {
    if ticks == 0 {
        return None;
    }
    let secs = i64::try_from(ticks / 10_000_000).ok()? - FILETIME_UNIX_OFFSET;
    #[allow(clippy::cast_possible_truncation)]
    let nanos = ((ticks % 10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Fixed-length property values of one storage.
#[derive(Debug, Clone, Default)]
pub struct FixedProperties {
    values: HashMap<u16, (u16, [u8; 8])>,
}

impl FixedProperties {
    /// Parses a property stream, skipping its `header_len`-byte header.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is shorter than its header.
    pub fn parse(bytes: &[u8], header_len: usize) -> Result<Self, ParseError> {
        let records = bytes.get(header_len..).ok_or_else(|| {
            ParseError::Property(format!(
                "stream is {} bytes, header needs {header_len}",
                bytes.len()
            ))
        })?;

        let values = records
            .chunks_exact(16)
            .map(|rec| {
                let ty = u16::from_le_bytes([rec[0], rec[1]]);
                let id = u16::from_le_bytes([rec[2], rec[3]]);
                let mut value = [0u8; 8];
                value.copy_from_slice(&rec[8..16]);
                (id, (ty, value))
            })
            .collect();
        Ok(Self { values })
    }

    /// Returns a `PT_LONG` property.
    #[must_use]
    pub fn long(&self, id: u16) -> Option<u32> {
        match self.values.get(&id) {
            Some((PT_LONG, v)) => Some(u32::from_le_bytes([v[0], v[1], v[2], v[3]])),
            _ => None,
        }
    }

    /// Returns a `PT_SYSTIME` property.
    #[must_use]
    pub fn time(&self, id: u16) -> Option<DateTime<Utc>> {
        match self.values.get(&id) {
            Some((PT_SYSTIME, v)) => filetime_to_utc(u64::from_le_bytes(*v)),
            _ => None,
        }
    }
}

/// Property view over one storage (the message root, a recipient, ...).
#[derive(Debug)]
pub struct PropertyBag<'f, 'a> {
    file: &'f CompoundFile<'a>,
    streams: HashMap<String, usize>,
    storages: Vec<(String, usize)>,
    fixed: FixedProperties,
}

impl<'f, 'a> PropertyBag<'f, 'a> {
    /// Indexes the children of `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage or its property stream is malformed.
    pub fn open(
        file: &'f CompoundFile<'a>,
        storage: usize,
        header_len: usize,
    ) -> Result<Self, ParseError> {
        let mut streams = HashMap::new();
        let mut storages = Vec::new();
        for id in file.children(storage)? {
            let Some(entry) = file.entry(id) else { continue };
            if entry.is_stream() {
                streams.insert(entry.name.to_ascii_uppercase(), id);
            } else if entry.is_storage() {
                storages.push((entry.name.clone(), id));
            }
        }

        let fixed = match streams.get(&PROPERTIES_STREAM.to_ascii_uppercase()) {
            Some(&id) => FixedProperties::parse(&file.read_stream(id)?, header_len)?,
            None => FixedProperties::default(),
        };

        Ok(Self {
            file,
            streams,
            storages,
            fixed,
        })
    }

    /// Returns true if the storage carries any MAPI property.
    #[must_use]
    pub fn has_properties(&self) -> bool {
        !self.fixed.values.is_empty()
            || self
                .streams
                .keys()
                .any(|name| name.starts_with(&SUBSTG_PREFIX.to_ascii_uppercase()))
    }

    /// Fixed-length properties.
    #[must_use]
    pub const fn fixed(&self) -> &FixedProperties {
        &self.fixed
    }

    /// Child storages whose name starts with `prefix`, in directory order.
    pub fn storages_with_prefix<'s>(
        &'s self,
        prefix: &'s str,
    ) -> impl Iterator<Item = usize> + 's {
        self.storages
            .iter()
            .filter(move |(name, _)| {
                name.get(..prefix.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
            })
            .map(|(_, id)| *id)
    }

    /// Reads a raw property stream of the given type.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream exists but cannot be read.
    pub fn raw(&self, id: u16, ty: u16) -> Result<Option<Vec<u8>>, ParseError> {
        match self.streams.get(&stream_name(id, ty).to_ascii_uppercase()) {
            Some(&entry) => self.file.read_stream(entry).map(Some),
            None => Ok(None),
        }
    }

    /// Reads a string property stored as Unicode or 8-bit string.
    ///
    /// Empty strings are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream exists but cannot be read.
    pub fn string(&self, id: u16) -> Result<Option<String>, ParseError> {
        let value = if let Some(raw) = self.raw(id, PT_UNICODE)? {
            Some(decode_unicode(&raw))
        } else {
            self.raw(id, PT_STRING8)?.map(|raw| decode_string8(&raw))
        };
        Ok(value.filter(|s| !s.is_empty()))
    }

    /// Reads a property that may be stored as binary text or as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream exists but cannot be read.
    pub fn text_or_binary(&self, id: u16) -> Result<Option<String>, ParseError> {
        if let Some(raw) = self.raw(id, PT_BINARY)? {
            let text = String::from_utf8_lossy(trim_nul(&raw)).into_owned();
            return Ok(Some(text).filter(|s| !s.is_empty()));
        }
        self.string(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cfb::{CompoundWriter, ROOT_ID};

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn test_stream_name() {
        assert_eq!(stream_name(tag::SUBJECT, PT_UNICODE), "__substg1.0_0037001F");
        assert_eq!(stream_name(tag::HTML, PT_BINARY), "__substg1.0_10130102");
    }

    #[test]
    fn test_decode_unicode_lossy() {
        assert_eq!(decode_unicode(&utf16("Grüße\0")), "Grüße");
        // Lone surrogate becomes a replacement character
        assert_eq!(decode_unicode(&[0x00, 0xD8, 0x41, 0x00]), "\u{fffd}A");
    }

    #[test]
    fn test_decode_string8() {
        assert_eq!(decode_string8(b"plain\0\0"), "plain");
        assert_eq!(decode_string8(&[0x63, 0x61, 0x66, 0xE9]), "café");
    }

    #[test]
    fn test_filetime_conversion() {
        // 2024-01-01T00:00:00Z
        let ticks = (1_704_067_200 + 11_644_473_600) * 10_000_000_u64;
        let dt = filetime_to_utc(ticks).unwrap();
        assert_eq!(dt.to_rfc2822(), "Mon, 1 Jan 2024 00:00:00 +0000");
        assert!(filetime_to_utc(0).is_none());
    }

    #[test]
    fn test_fixed_properties() {
        let mut stream = vec![0u8; 8];
        stream.extend_from_slice(&PT_LONG.to_le_bytes());
        stream.extend_from_slice(&tag::RECIPIENT_TYPE.to_le_bytes());
        stream.extend_from_slice(&[0u8; 4]);
        stream.extend_from_slice(&2u64.to_le_bytes());
        let props = FixedProperties::parse(&stream, CHILD_PROPERTIES_HEADER).unwrap();
        assert_eq!(props.long(tag::RECIPIENT_TYPE), Some(2));
        assert!(props.time(tag::RECIPIENT_TYPE).is_none());
        assert!(FixedProperties::parse(&[0u8; 4], 8).is_err());
    }

    #[test]
    fn test_property_bag_strings() {
        let mut writer = CompoundWriter::new();
        writer.add_stream(&["__substg1.0_0037001F"], utf16("Hello"));
        writer.add_stream(&["__substg1.0_1000001E"], b"body\0".to_vec());
        writer.add_stream(&["__substg1.0_10130102"], b"<p>x</p>".to_vec());
        writer.add_stream(&["__substg1.0_0E04001F"], Vec::new());
        let data = writer.finish();
        let file = CompoundFile::open(&data).unwrap();
        let bag = PropertyBag::open(&file, ROOT_ID, MESSAGE_PROPERTIES_HEADER).unwrap();

        assert!(bag.has_properties());
        assert_eq!(bag.string(tag::SUBJECT).unwrap().as_deref(), Some("Hello"));
        assert_eq!(bag.string(tag::BODY).unwrap().as_deref(), Some("body"));
        assert_eq!(bag.text_or_binary(tag::HTML).unwrap().as_deref(), Some("<p>x</p>"));
        assert_eq!(bag.string(tag::DISPLAY_TO).unwrap(), None);
        assert_eq!(bag.string(tag::DISPLAY_CC).unwrap(), None);
    }
}
