//! Single-part text message building.

use crate::content_type::ContentType;
use crate::document::RenderedDocument;
use crate::header::Headers;
use std::fmt;

/// Transfer encoding of a rendered body.
///
/// Bodies are written as UTF-8 text lines, so only 8bit is ever announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 8-bit text.
    EightBit,
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EightBit => write!(f, "8bit"),
        }
    }
}

/// Message body selected for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Body {
    /// HTML body.
    Html(String),
    /// Plain text body.
    Text(String),
    /// No body at all.
    #[default]
    Empty,
}

impl Body {
    /// Content type announced for this body.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Html(_) => ContentType::text_html(),
            Self::Text(_) | Self::Empty => ContentType::text_plain(),
        }
    }

    /// Transfer encoding announced for this body, if any.
    #[must_use]
    pub const fn transfer_encoding(&self) -> Option<TransferEncoding> {
        match self {
            Self::Html(_) | Self::Text(_) => Some(TransferEncoding::EightBit),
            Self::Empty => None,
        }
    }

    fn text(&self) -> &str {
        match self {
            Self::Html(text) | Self::Text(text) => text,
            Self::Empty => "",
        }
    }
}

/// Builder for a single-part text message.
///
/// Headers are emitted in a fixed order: `From`, `To`, `Cc`, `Subject`,
/// `Date`, `Message-ID`, `MIME-Version`, then the content headers. Absent
/// optional headers are omitted; `MIME-Version` is always present.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Option<String>,
    cc: Option<String>,
    subject: Option<String>,
    date: Option<String>,
    message_id: Option<String>,
    html_body: Option<String>,
    text_body: Option<String>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `From` header.
    #[must_use]
    pub fn from(mut self, value: Option<&str>) -> Self {
        self.from = value.map(str::to_string);
        self
    }

    /// Sets the `To` header.
    #[must_use]
    pub fn to(mut self, value: Option<&str>) -> Self {
        self.to = value.map(str::to_string);
        self
    }

    /// Sets the `Cc` header.
    #[must_use]
    pub fn cc(mut self, value: Option<&str>) -> Self {
        self.cc = value.map(str::to_string);
        self
    }

    /// Sets the `Subject` header.
    #[must_use]
    pub fn subject(mut self, value: Option<&str>) -> Self {
        self.subject = value.map(str::to_string);
        self
    }

    /// Sets the `Date` header.
    #[must_use]
    pub fn date(mut self, value: Option<&str>) -> Self {
        self.date = value.map(str::to_string);
        self
    }

    /// Sets the `Message-ID` header.
    #[must_use]
    pub fn message_id(mut self, value: Option<&str>) -> Self {
        self.message_id = value.map(str::to_string);
        self
    }

    /// Sets the HTML body. An HTML body wins over a text body.
    #[must_use]
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    /// Resolves which body will be rendered.
    #[must_use]
    pub fn selected_body(&self) -> Body {
        match (&self.html_body, &self.text_body) {
            (Some(html), _) => Body::Html(html.clone()),
            (None, Some(text)) => Body::Text(text.clone()),
            (None, None) => Body::Empty,
        }
    }

    /// Builds the ordered header collection.
    #[must_use]
    pub fn headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.add_opt("From", self.from.as_deref());
        headers.add_opt("To", self.to.as_deref());
        headers.add_opt("Cc", self.cc.as_deref());
        headers.add_opt("Subject", self.subject.as_deref());
        headers.add_opt("Date", self.date.as_deref());
        headers.add_opt("Message-ID", self.message_id.as_deref());
        headers.add("MIME-Version", "1.0");

        let body = self.selected_body();
        headers.add("Content-Type", &body.content_type().to_string());
        if let Some(encoding) = body.transfer_encoding() {
            headers.add("Content-Transfer-Encoding", &encoding.to_string());
        }
        headers
    }

    /// Renders the message.
    #[must_use]
    pub fn build(self) -> RenderedDocument {
        let headers = self.headers();
        let body = self.selected_body();
        RenderedDocument::new(headers.to_lines(), body.text())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_body_transfer_encoding() {
        assert_eq!(
            Body::Text("x".into()).transfer_encoding(),
            Some(TransferEncoding::EightBit)
        );
        assert_eq!(Body::Empty.transfer_encoding(), None);
        assert_eq!(TransferEncoding::EightBit.to_string(), "8bit");
    }

    #[test]
    fn test_full_header_order() {
        let doc = MessageBuilder::new()
            .from(Some("a@example.com"))
            .to(Some("b@example.com"))
            .cc(Some("c@example.com"))
            .subject(Some("Hello"))
            .date(Some("Mon, 1 Jan 2024 10:00:00 +0000"))
            .message_id(Some("<id@example.com>"))
            .text_body("Body")
            .build();

        assert_eq!(
            doc.header_lines(),
            &[
                "From: a@example.com",
                "To: b@example.com",
                "Cc: c@example.com",
                "Subject: Hello",
                "Date: Mon, 1 Jan 2024 10:00:00 +0000",
                "Message-ID: <id@example.com>",
                "MIME-Version: 1.0",
                "Content-Type: text/plain; charset=utf-8",
                "Content-Transfer-Encoding: 8bit",
            ]
        );
    }

    #[test]
    fn test_html_wins_over_text() {
        let doc = MessageBuilder::new()
            .text_body("plain")
            .html_body("<p>html</p>")
            .build();
        let text = doc.to_text();
        assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(text.ends_with("\r\n\r\n<p>html</p>"));
        assert!(!text.contains("plain\r\n"));
    }

    #[test]
    fn test_no_body() {
        let doc = MessageBuilder::new().build();
        assert_eq!(
            doc.to_text(),
            "MIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n"
        );
    }

    #[test]
    fn test_control_character_in_subject() {
        let doc = MessageBuilder::new().subject(Some("Ding\u{7}Dong")).build();
        assert!(doc.header_lines().contains(&"Subject: Ding Dong".to_string()));
    }

    proptest! {
        #[test]
        fn prop_single_separator_and_crlf(
            subject in any::<String>(),
            from in proptest::option::of(any::<String>()),
            body in proptest::option::of(any::<String>()),
            html in any::<bool>(),
        ) {
            let mut builder = MessageBuilder::new()
                .subject(Some(subject.as_str()))
                .from(from.as_deref());
            if let Some(body) = body {
                builder = if html { builder.html_body(body) } else { builder.text_body(body) };
            }
            let text = builder.build().to_text();

            // Header block ends at the first blank line and contains no other one
            let (head, _) = text.split_once("\r\n\r\n").unwrap();
            for line in head.split("\r\n") {
                prop_assert!(!line.is_empty());
                prop_assert!(!line.contains('\r') && !line.contains('\n'));
            }

            // No bare LF or CR anywhere
            let bytes = text.as_bytes();
            for (i, b) in bytes.iter().enumerate() {
                if *b == b'\n' {
                    prop_assert!(i > 0 && bytes[i - 1] == b'\r');
                }
                if *b == b'\r' {
                    prop_assert!(bytes.get(i + 1) == Some(&b'\n'));
                }
            }
        }
    }
}
