//! Mail message extraction from a compound document.

use msgbridge_mime::Headers;

use crate::cfb::{CompoundFile, ROOT_ID};
use crate::error::{ParseError, Result};
use crate::property::{
    ATTACHMENT_PREFIX, CHILD_PROPERTIES_HEADER, MESSAGE_PROPERTIES_HEADER, PropertyBag,
    RECIPIENT_PREFIX, tag,
};
use crate::validate::FormatValidator;

/// Recipient type value for primary recipients.
const RECIPIENT_TO: u32 = 1;
/// Recipient type value for carbon-copy recipients.
const RECIPIENT_CC: u32 = 2;

/// Fields extracted from an MSG container.
///
/// Every field is optional: the container format does not guarantee that
/// any of them is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Sender, as `Name <address>` when both are known.
    pub sender: Option<String>,
    /// Primary recipients.
    pub to: Option<String>,
    /// Carbon-copy recipients.
    pub cc: Option<String>,
    /// Subject line.
    pub subject: Option<String>,
    /// Date in RFC 2822 form.
    pub date: Option<String>,
    /// Internet message id.
    pub message_id: Option<String>,
    /// Plain text body.
    pub plain_body: Option<String>,
    /// HTML body.
    pub html_body: Option<String>,
    /// Number of attachments found in the container. They are not extracted.
    pub attachment_count: usize,
}

/// Parses MSG containers into [`ParsedMessage`] records.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageParser {
    validator: FormatValidator,
}

impl MessageParser {
    /// Creates a parser that validates input with `validator` first.
    #[must_use]
    pub const fn new(validator: FormatValidator) -> Self {
        Self { validator }
    }

    /// Validates and parses an MSG container.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if the structural checks fail,
    /// [`crate::Error::Parse`] if the container cannot be interpreted.
    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedMessage> {
        self.validator.validate(bytes)?;

        let file = CompoundFile::open(bytes)?;
        let root = PropertyBag::open(&file, ROOT_ID, MESSAGE_PROPERTIES_HEADER)?;
        if !root.has_properties() {
            return Err(ParseError::NotAMessage(
                "container has no MAPI property streams".to_string(),
            )
            .into());
        }

        let transport = root
            .string(tag::TRANSPORT_HEADERS)?
            .map(|raw| Headers::parse(&raw))
            .unwrap_or_default();
        let from_transport = |name: &str| {
            transport
                .get(name)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let (to, cc) = recipients(&file, &root)?;

        let sender = match from_transport("From") {
            Some(from) => Some(from),
            None => sender(&root)?,
        };
        let to = match from_transport("To") {
            Some(value) => Some(value),
            None => to.or(root.string(tag::DISPLAY_TO)?),
        };
        let cc = match from_transport("Cc") {
            Some(value) => Some(value),
            None => cc.or(root.string(tag::DISPLAY_CC)?),
        };
        let date = from_transport("Date").or_else(|| {
            root.fixed()
                .time(tag::CLIENT_SUBMIT_TIME)
                .or_else(|| root.fixed().time(tag::DELIVERY_TIME))
                .map(|dt| dt.to_rfc2822())
        });
        let message_id = match from_transport("Message-ID") {
            Some(value) => Some(value),
            None => root.string(tag::INTERNET_MESSAGE_ID)?,
        };

        Ok(ParsedMessage {
            sender,
            to,
            cc,
            subject: root.string(tag::SUBJECT)?,
            date,
            message_id,
            plain_body: root.string(tag::BODY)?,
            html_body: root.text_or_binary(tag::HTML)?,
            attachment_count: root.storages_with_prefix(ATTACHMENT_PREFIX).count(),
        })
    }
}

fn format_address(name: Option<String>, address: Option<String>) -> Option<String> {
    match (name, address) {
        (Some(name), Some(address)) if name != address => Some(format!("{name} <{address}>")),
        (_, Some(address)) => Some(address),
        (name, None) => name,
    }
}

/// Exchange-internal addresses (`/O=...`) are not usable in a mail header.
fn smtp_like(address: Option<String>) -> Option<String> {
    address.filter(|a| a.contains('@'))
}

fn sender(root: &PropertyBag<'_, '_>) -> std::result::Result<Option<String>, ParseError> {
    let name = root
        .string(tag::SENDER_NAME)?
        .or(root.string(tag::SENT_REPRESENTING_NAME)?);
    let address = match root.string(tag::SENDER_SMTP_ADDRESS)? {
        Some(address) => Some(address),
        None => smtp_like(root.string(tag::SENDER_EMAIL)?)
            .or(root.string(tag::SENT_REPRESENTING_SMTP_ADDRESS)?)
            .or(smtp_like(root.string(tag::SENT_REPRESENTING_EMAIL)?)),
    };
    Ok(format_address(name, address))
}

fn recipients(
    file: &CompoundFile<'_>,
    root: &PropertyBag<'_, '_>,
) -> std::result::Result<(Option<String>, Option<String>), ParseError> {
    let mut to = Vec::new();
    let mut cc = Vec::new();

    for storage in root.storages_with_prefix(RECIPIENT_PREFIX) {
        let recipient = PropertyBag::open(file, storage, CHILD_PROPERTIES_HEADER)?;
        let address = match recipient.string(tag::SMTP_ADDRESS)? {
            Some(address) => Some(address),
            None => smtp_like(recipient.string(tag::EMAIL_ADDRESS)?),
        };
        let Some(formatted) = format_address(recipient.string(tag::DISPLAY_NAME)?, address)
        else {
            continue;
        };
        match recipient.fixed().long(tag::RECIPIENT_TYPE) {
            Some(RECIPIENT_CC) => cc.push(formatted),
            Some(RECIPIENT_TO) | None => to.push(formatted),
            // Blind copies never appear in headers
            Some(_) => {}
        }
    }

    let join = |list: Vec<String>| (!list.is_empty()).then(|| list.join(", "));
    Ok((join(to), join(cc)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::cfb::CompoundWriter;
    use crate::error::ValidationError;
    use crate::fixture::MsgFixture;

    #[test]
    fn test_minimal_message() {
        let bytes = MsgFixture::new().subject("Test").body("Hello").build();
        let parsed = MessageParser::default().parse(&bytes).unwrap();
        assert_eq!(parsed.subject.as_deref(), Some("Test"));
        assert_eq!(parsed.plain_body.as_deref(), Some("Hello"));
        assert!(parsed.sender.is_none());
        assert!(parsed.html_body.is_none());
        assert_eq!(parsed.attachment_count, 0);
    }

    #[test]
    fn test_sender_and_recipients_from_properties() {
        let bytes = MsgFixture::new()
            .sender("Alice", "alice@example.com")
            .recipient(1, "Bob", "bob@example.com")
            .recipient(2, "Carol", "carol@example.com")
            .recipient(1, "Dan", "dan@example.com")
            .recipient(3, "Eve", "eve@example.com")
            .build();
        let parsed = MessageParser::default().parse(&bytes).unwrap();
        assert_eq!(parsed.sender.as_deref(), Some("Alice <alice@example.com>"));
        assert_eq!(
            parsed.to.as_deref(),
            Some("Bob <bob@example.com>, Dan <dan@example.com>")
        );
        assert_eq!(parsed.cc.as_deref(), Some("Carol <carol@example.com>"));
    }

    #[test]
    fn test_transport_headers_win() {
        let bytes = MsgFixture::new()
            .sender("Alice", "alice@example.com")
            .transport_headers(concat!(
                "From: \"Alice A.\" <alice@example.com>\r\n",
                "To: bob@example.com,\r\n",
                " dan@example.com\r\n",
                "Date: Tue, 2 Jan 2024 09:30:00 +0100\r\n",
                "Message-ID: <abc@example.com>\r\n",
                "\r\n"
            ))
            .build();
        let parsed = MessageParser::default().parse(&bytes).unwrap();
        assert_eq!(parsed.sender.as_deref(), Some("\"Alice A.\" <alice@example.com>"));
        assert_eq!(parsed.to.as_deref(), Some("bob@example.com, dan@example.com"));
        assert_eq!(parsed.date.as_deref(), Some("Tue, 2 Jan 2024 09:30:00 +0100"));
        assert_eq!(parsed.message_id.as_deref(), Some("<abc@example.com>"));
    }

    #[test]
    fn test_date_from_submit_time() {
        let ticks = (1_704_067_200 + 11_644_473_600) * 10_000_000_u64;
        let bytes = MsgFixture::new().submit_time(ticks).build();
        let parsed = MessageParser::default().parse(&bytes).unwrap();
        assert_eq!(parsed.date.as_deref(), Some("Mon, 1 Jan 2024 00:00:00 +0000"));
    }

    #[test]
    fn test_html_and_attachments() {
        let bytes = MsgFixture::new()
            .body("plain")
            .html("<b>rich</b>")
            .attachment("report.pdf", vec![1, 2, 3])
            .attachment("photo.jpg", vec![4, 5])
            .build();
        let parsed = MessageParser::default().parse(&bytes).unwrap();
        assert_eq!(parsed.html_body.as_deref(), Some("<b>rich</b>"));
        assert_eq!(parsed.plain_body.as_deref(), Some("plain"));
        assert_eq!(parsed.attachment_count, 2);
    }

    #[test]
    fn test_exchange_address_is_ignored() {
        let bytes = MsgFixture::new()
            .sender("Alice", "/O=EXCHANGE/OU=GROUP/CN=ALICE")
            .build();
        let parsed = MessageParser::default().parse(&bytes).unwrap();
        assert_eq!(parsed.sender.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_validation_error_is_not_wrapped() {
        let err = MessageParser::default().parse(&[0x41; 50]).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_container_without_properties() {
        let mut writer = CompoundWriter::new();
        writer.add_stream(&["WordDocument"], vec![0; 32]);
        let err = MessageParser::default().parse(&writer.finish()).unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::NotAMessage(_))));
    }

    #[test]
    fn test_corrupt_container() {
        let mut bytes = crate::validate::SIGNATURE.to_vec();
        bytes.resize(600, 0xEE);
        let err = MessageParser::default().parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_huge_fat_count_is_a_parse_error() {
        let mut bytes = vec![0u8; 1024];
        bytes[..8].copy_from_slice(&crate::validate::SIGNATURE);
        bytes[26..28].copy_from_slice(&3u16.to_le_bytes());
        bytes[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
        bytes[30..32].copy_from_slice(&9u16.to_le_bytes());
        bytes[32..34].copy_from_slice(&6u16.to_le_bytes());
        bytes[44..48].copy_from_slice(&40_000_000u32.to_le_bytes());
        bytes[68..72].copy_from_slice(&0u32.to_le_bytes());
        bytes[72..76].copy_from_slice(&u32::MAX.to_le_bytes());

        let err = MessageParser::default().parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::Header(_))));
    }
}
