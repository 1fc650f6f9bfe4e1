//! Rendered text mail documents.

/// Line terminator used between every line of a rendered document.
pub const CRLF: &str = "\r\n";

/// A text mail document: header lines, one blank separator, body lines.
///
/// No stored line contains CR or LF. The separator is not stored; it is
/// produced by [`RenderedDocument::lines`] exactly once between headers and
/// body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    headers: Vec<String>,
    body: Vec<String>,
}

impl RenderedDocument {
    /// Creates a document from header lines and raw body text.
    ///
    /// The body is split on CRLF, bare LF and bare CR so that the output
    /// never contains a bare line ending. An empty body yields a single
    /// empty body line.
    #[must_use]
    pub fn new(headers: Vec<String>, body: &str) -> Self {
        let headers = headers
            .into_iter()
            .map(|line| line.replace(['\r', '\n'], " "))
            .collect();
        Self {
            headers,
            body: split_lines(body),
        }
    }

    /// Header lines in emission order.
    #[must_use]
    pub fn header_lines(&self) -> &[String] {
        &self.headers
    }

    /// Body lines.
    #[must_use]
    pub fn body_lines(&self) -> &[String] {
        &self.body
    }

    /// Iterates over every line of the document, including the separator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.headers
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(""))
            .chain(self.body.iter().map(String::as_str))
    }

    /// Joins all lines with CRLF.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.lines().collect::<Vec<_>>().join(CRLF)
    }

    /// Encodes the document as UTF-8 bytes.
    ///
    /// Text reaching this point is already valid Unicode; characters that
    /// could not be decoded from the source were replaced with U+FFFD, so
    /// encoding cannot fail.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_text().into_bytes()
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(str::to_string)
        .collect()
}
