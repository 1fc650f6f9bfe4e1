//! Ordered header handling.

/// Replaces every control character below U+0020, except tab, with a space.
///
/// The result never contains CR or LF, so a sanitized value always fits on
/// a single header line.
#[must_use]
pub fn sanitize_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c < ' ' && c != '\t' { ' ' } else { c })
        .collect()
}

/// Collection of email headers in emission order.
///
/// Values are sanitized when they are added, names keep the casing they
/// were given. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header, sanitizing its value.
    pub fn add(&mut self, name: impl Into<String>, value: &str) {
        self.entries.push((name.into(), sanitize_value(value)));
    }

    /// Appends a header only when a value is present.
    pub fn add_opt(&mut self, name: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.add(name, value);
        }
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the number of header lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Renders each header as a `Name: value` line.
    #[must_use]
    pub fn to_lines(&self) -> Vec<String> {
        self.iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect()
    }

    /// Parses a raw header block.
    ///
    /// Parsing is lenient: lines without a colon are skipped, continuation
    /// lines (starting with space or tab) are unfolded into the previous
    /// header, and parsing stops at the first empty line.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current_name: Option<String> = None;
        let mut current_value = String::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if current_name.is_some() {
                    current_value.push(' ');
                    current_value.push_str(line.trim());
                }
                continue;
            }

            if let Some(name) = current_name.take() {
                headers.add(name, current_value.trim());
                current_value.clear();
            }

            if let Some((name, value)) = line.split_once(':') {
                current_name = Some(name.trim().to_string());
                current_value = value.trim().to_string();
            }
        }

        if let Some(name) = current_name {
            headers.add(name, current_value.trim());
        }

        headers
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

    #[test]
    fn test_sanitize_replaces_controls() {
        assert_eq!(sanitize_value("a\u{7}b"), "a b");
        assert_eq!(sanitize_value("line\r\nbreak"), "line  break");
        assert_eq!(sanitize_value("tab\tkept"), "tab\tkept");
        assert_eq!(sanitize_value("Grüße 你好"), "Grüße 你好");
    }

    #[test]
    fn test_headers_keep_order() {
        let mut headers = Headers::new();
        headers.add("To", "b@example.com");
        headers.add("From", "a@example.com");
        assert_eq!(
            headers.to_lines(),
            vec!["To: b@example.com", "From: a@example.com"]
        );
    }

    #[test]
    fn test_headers_add_opt() {
        let mut headers = Headers::new();
        headers.add_opt("Cc", None);
        headers.add_opt("Subject", Some("Hi"));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("subject"), Some("Hi"));
        assert!(headers.get("cc").is_none());
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(text);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("to"), Some("recipient@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(headers.get("Body").is_none());
    }

    #[test]
    fn test_headers_parse_repeated() {
        let headers = Headers::parse("Received: a\nReceived: b\n");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("received"), Some("a"));
    }

    #[test]
    fn test_headers_parse_skips_garbage() {
        let headers = Headers::parse("garbage line\nX-Id: 1\n");
        assert_eq!(headers.len(), 1);
        assert!(!headers.is_empty());
    }
}
