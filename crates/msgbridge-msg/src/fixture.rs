//! Builder for MSG fixture containers.

use crate::cfb::CompoundWriter;
use crate::property::{
    ATTACHMENT_PREFIX, CHILD_PROPERTIES_HEADER, MESSAGE_PROPERTIES_HEADER, PROPERTIES_STREAM,
    PT_BINARY, PT_LONG, PT_SYSTIME, PT_UNICODE, RECIPIENT_PREFIX, stream_name, tag,
};

/// `PR_MESSAGE_CLASS`
const MESSAGE_CLASS: u16 = 0x001A;
/// `PR_ATTACH_LONG_FILENAME`
const ATTACH_LONG_FILENAME: u16 = 0x3707;
/// `PR_ATTACH_DATA_BIN`
const ATTACH_DATA: u16 = 0x3701;

#[derive(Debug, Clone)]
struct Recipient {
    kind: u32,
    name: String,
    address: String,
}

/// Builds a minimal but well-formed MSG container.
///
/// Every container carries the `IPM.Note` message class, so an otherwise
/// empty builder still produces a parseable message.
#[derive(Debug, Clone, Default)]
pub struct MsgFixture {
    strings: Vec<(u16, String)>,
    html: Option<Vec<u8>>,
    submit_time: Option<u64>,
    recipients: Vec<Recipient>,
    attachments: Vec<(String, Vec<u8>)>,
}

impl MsgFixture {
    /// Creates an empty fixture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an arbitrary Unicode string property.
    #[must_use]
    pub fn string(mut self, id: u16, value: &str) -> Self {
        self.strings.push((id, value.to_string()));
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(self, subject: &str) -> Self {
        self.string(tag::SUBJECT, subject)
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn body(self, body: &str) -> Self {
        self.string(tag::BODY, body)
    }

    /// Sets the HTML body, stored as binary.
    #[must_use]
    pub fn html(mut self, html: &str) -> Self {
        self.html = Some(html.as_bytes().to_vec());
        self
    }

    /// Sets sender display name and SMTP address.
    #[must_use]
    pub fn sender(self, name: &str, address: &str) -> Self {
        let this = self.string(tag::SENDER_NAME, name);
        if address.contains('@') {
            this.string(tag::SENDER_SMTP_ADDRESS, address)
        } else {
            this.string(tag::SENDER_EMAIL, address)
        }
    }

    /// Sets the raw internet transport headers.
    #[must_use]
    pub fn transport_headers(self, headers: &str) -> Self {
        self.string(tag::TRANSPORT_HEADERS, headers)
    }

    /// Sets the client submit time as FILETIME ticks.
    #[must_use]
    pub const fn submit_time(mut self, ticks: u64) -> Self {
        self.submit_time = Some(ticks);
        self
    }

    /// Adds a recipient. `kind` is 1 for To, 2 for Cc, 3 for Bcc.
    #[must_use]
    pub fn recipient(mut self, kind: u32, name: &str, address: &str) -> Self {
        self.recipients.push(Recipient {
            kind,
            name: name.to_string(),
            address: address.to_string(),
        });
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attachment(mut self, filename: &str, data: Vec<u8>) -> Self {
        self.attachments.push((filename.to_string(), data));
        self
    }

    /// Serializes the container.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut writer = CompoundWriter::new();

        let mut root_props = vec![0u8; MESSAGE_PROPERTIES_HEADER];
        if let Some(ticks) = self.submit_time {
            push_record(&mut root_props, PT_SYSTIME, tag::CLIENT_SUBMIT_TIME, ticks);
        }
        writer.add_stream(&[PROPERTIES_STREAM], root_props);
        writer.add_stream(
            &[&stream_name(MESSAGE_CLASS, PT_UNICODE)],
            utf16("IPM.Note"),
        );
        for (id, value) in &self.strings {
            writer.add_stream(&[&stream_name(*id, PT_UNICODE)], utf16(value));
        }
        if let Some(html) = &self.html {
            writer.add_stream(&[&stream_name(tag::HTML, PT_BINARY)], html.clone());
        }

        for (i, recipient) in self.recipients.iter().enumerate() {
            let storage = format!("{RECIPIENT_PREFIX}{i:08X}");
            let mut props = vec![0u8; CHILD_PROPERTIES_HEADER];
            push_record(
                &mut props,
                PT_LONG,
                tag::RECIPIENT_TYPE,
                u64::from(recipient.kind),
            );
            writer.add_stream(&[&storage, PROPERTIES_STREAM], props);
            writer.add_stream(
                &[&storage, &stream_name(tag::DISPLAY_NAME, PT_UNICODE)],
                utf16(&recipient.name),
            );
            writer.add_stream(
                &[&storage, &stream_name(tag::SMTP_ADDRESS, PT_UNICODE)],
                utf16(&recipient.address),
            );
        }

        for (i, (filename, data)) in self.attachments.iter().enumerate() {
            let storage = format!("{ATTACHMENT_PREFIX}{i:08X}");
            writer.add_stream(
                &[&storage, PROPERTIES_STREAM],
                vec![0u8; CHILD_PROPERTIES_HEADER],
            );
            writer.add_stream(
                &[&storage, &stream_name(ATTACH_LONG_FILENAME, PT_UNICODE)],
                utf16(filename),
            );
            writer.add_stream(
                &[&storage, &stream_name(ATTACH_DATA, PT_BINARY)],
                data.clone(),
            );
        }

        writer.finish()
    }
}

fn utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn push_record(stream: &mut Vec<u8>, ty: u16, id: u16, value: u64) {
    stream.extend_from_slice(&ty.to_le_bytes());
    stream.extend_from_slice(&id.to_le_bytes());
    // Flags: readable | writable
    stream.extend_from_slice(&6u32.to_le_bytes());
    stream.extend_from_slice(&value.to_le_bytes());
}
