//! MSG to EML conversion.

use msgbridge_mime::{MessageBuilder, RenderedDocument};
use msgbridge_msg::{FormatValidator, MessageParser, ParsedMessage, ValidationError};

use crate::error::{ConversionError, PipelineError};

/// Renders a parsed message as a text mail.
///
/// Headers are emitted in the order From, To, Cc, Subject, Date,
/// Message-ID, MIME-Version; absent fields are skipped. The HTML body is
/// preferred over the plain one.
#[must_use]
pub fn render(message: &ParsedMessage) -> RenderedDocument {
    let mut builder = MessageBuilder::new()
        .from(message.sender.as_deref())
        .to(message.to.as_deref())
        .cc(message.cc.as_deref())
        .subject(message.subject.as_deref())
        .date(message.date.as_deref())
        .message_id(message.message_id.as_deref());

    if let Some(html) = &message.html_body {
        builder = builder.html_body(html.as_str());
    }
    if let Some(text) = &message.plain_body {
        builder = builder.text_body(text.as_str());
    }

    builder.build()
}

/// A converted message.
#[derive(Debug, Clone)]
pub struct Converted {
    /// Rendered document.
    pub document: RenderedDocument,
    /// Attachments present in the source and left out of the document.
    pub attachment_count: usize,
}

/// Validates, parses and renders MSG input.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageConverter {
    validator: FormatValidator,
    parser: MessageParser,
}

impl MessageConverter {
    /// Creates a converter using `validator` for the structural checks.
    #[must_use]
    pub const fn new(validator: FormatValidator) -> Self {
        Self {
            validator,
            parser: MessageParser::new(validator),
        }
    }

    /// Runs the structural checks only.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn validate(&self, bytes: &[u8]) -> Result<(), ValidationError> {
        self.validator.validate(bytes)
    }

    /// Parses MSG input.
    ///
    /// Validation failures found by the parser pass through unchanged;
    /// everything else is wrapped as a conversion failure.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] or [`PipelineError::Conversion`].
    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedMessage, PipelineError> {
        match self.parser.parse(bytes) {
            Ok(message) => Ok(message),
            Err(msgbridge_msg::Error::Validation(err)) => Err(PipelineError::Validation(err)),
            Err(msgbridge_msg::Error::Parse(err)) => {
                Err(PipelineError::Conversion(ConversionError::Parse(err)))
            }
        }
    }

    /// Parses and renders MSG input.
    ///
    /// # Errors
    ///
    /// See [`MessageConverter::parse`]. Rendering itself never fails.
    pub fn convert(&self, bytes: &[u8]) -> Result<Converted, PipelineError> {
        let message = self.parse(bytes)?;
        Ok(Converted {
            document: render(&message),
            attachment_count: message.attachment_count,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use msgbridge_msg::fixture::MsgFixture;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_render_header_order() {
        let message = ParsedMessage {
            sender: Some("Alice <alice@example.com>".into()),
            to: Some("bob@example.com".into()),
            cc: Some("carol@example.com".into()),
            subject: Some("Hi".into()),
            date: Some("Mon, 1 Jan 2024 00:00:00 +0000".into()),
            message_id: Some("<id@example.com>".into()),
            plain_body: Some("Body".into()),
            ..ParsedMessage::default()
        };
        let text = render(&message).to_text();
        assert_eq!(
            text,
            "From: Alice <alice@example.com>\r\n\
             To: bob@example.com\r\n\
             Cc: carol@example.com\r\n\
             Subject: Hi\r\n\
             Date: Mon, 1 Jan 2024 00:00:00 +0000\r\n\
             Message-ID: <id@example.com>\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             \r\n\
             Body"
        );
    }

    #[test]
    fn test_render_prefers_html() {
        let message = ParsedMessage {
            plain_body: Some("plain".into()),
            html_body: Some("<p>html</p>".into()),
            ..ParsedMessage::default()
        };
        let text = render(&message).to_text();
        assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(text.ends_with("\r\n\r\n<p>html</p>"));
        assert!(!text.contains("plain"));
    }

    #[test]
    fn test_render_without_body() {
        let text = render(&ParsedMessage::default()).to_text();
        assert_eq!(
            text,
            "MIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n"
        );
    }

    #[test]
    fn test_render_sanitizes_subject() {
        let message = ParsedMessage {
            subject: Some("bell\u{7}here\r\nInjected: yes".into()),
            ..ParsedMessage::default()
        };
        let text = render(&message).to_text();
        assert!(text.starts_with("Subject: bell here  Injected: yes\r\n"));
    }

    #[test]
    fn test_convert_minimal_message() {
        let bytes = MsgFixture::new().subject("Test").body("Hello").build();
        let converted = MessageConverter::default().convert(&bytes).unwrap();
        let text = converted.document.to_text();

        let lines: Vec<&str> = text.split("\r\n").collect();
        assert!(lines.contains(&"Subject: Test"));
        assert!(lines.contains(&"Content-Type: text/plain; charset=utf-8"));
        assert_eq!(lines.last(), Some(&"Hello"));
        assert!(!text.replace("\r\n", "").contains('\n'));
        assert_eq!(converted.attachment_count, 0);
    }

    #[test]
    fn test_validation_passes_through_unwrapped() {
        let err = MessageConverter::default().convert(&[0x41; 50]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::SignatureMismatch)
        ));
        assert_eq!(
            err.to_string(),
            "Invalid MSG file format: header does not match signature"
        );
    }

    #[test]
    fn test_parse_failure_is_wrapped() {
        let mut bytes = msgbridge_msg::SIGNATURE.to_vec();
        bytes.resize(1024, 0);
        let err = MessageConverter::default().convert(&bytes).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Conversion(ConversionError::Parse(_))
        ));
    }

    #[test]
    fn test_size_limit_applies_to_parser() {
        let bytes = MsgFixture::new().body(&"x".repeat(8192)).build();
        let converter = MessageConverter::new(FormatValidator::new(0));
        assert!(matches!(
            converter.convert(&bytes),
            Err(PipelineError::Validation(ValidationError::TooLarge { .. }))
        ));
    }

    proptest! {
        #[test]
        fn prop_render_single_separator(
            subject in ".*",
            sender in proptest::option::of(".*"),
            body in proptest::option::of(".*"),
        ) {
            let message = ParsedMessage {
                sender,
                subject: Some(subject),
                plain_body: body,
                ..ParsedMessage::default()
            };
            let document = render(&message);
            let text = document.to_text();

            prop_assert_eq!(document.lines().position(str::is_empty), Some(document.header_lines().len()));
            prop_assert!(document.header_lines().iter().all(|l| !l.is_empty() && !l.contains(['\r', '\n'])));
            prop_assert!(text.contains("\r\n\r\n"));
            prop_assert!(!text.replace("\r\n", "").contains(['\r', '\n']));
        }
    }
}
