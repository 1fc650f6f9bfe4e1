//! Destination naming rules.

use chrono::{DateTime, Utc};

/// Extension assumed when a source name has none.
pub const DEFAULT_SOURCE_EXTENSION: &str = "msg";

/// Extension of rendered documents.
pub const OUTPUT_EXTENSION: &str = "eml";

/// Splits the final path component of `name` into base and extension.
///
/// A leading dot does not start an extension (`.hidden` has none).
#[must_use]
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && !ext.is_empty() => (base, Some(ext)),
        _ => (file, None),
    }
}

/// Output name: `<base>.eml`.
#[must_use]
pub fn eml_name(name: &str) -> String {
    let (base, _) = split_name(name);
    format!("{base}.{OUTPUT_EXTENSION}")
}

/// Output name after a collision: `<base>_<suffix>.eml`.
#[must_use]
pub fn suffixed_eml_name(name: &str, suffix: &str) -> String {
    let (base, _) = split_name(name);
    format!("{base}_{suffix}.{OUTPUT_EXTENSION}")
}

/// Eight random lowercase hex characters.
#[must_use]
pub fn random_suffix() -> String {
    format!("{:08x}", rand::random::<u32>())
}

/// Second-resolution timestamp used in archive and quarantine names.
#[must_use]
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Archive name: `<base>_<YYYYMMDD_HHMMSS>.<ext>`.
#[must_use]
pub fn archive_name(name: &str, now: DateTime<Utc>) -> String {
    let (base, ext) = split_name(name);
    let ext = ext.unwrap_or(DEFAULT_SOURCE_EXTENSION);
    format!("{base}_{}.{ext}", timestamp(now))
}

/// Quarantine name: `<base>_failed_<YYYYMMDD_HHMMSS>.<ext>`.
#[must_use]
pub fn quarantine_name(name: &str, now: DateTime<Utc>) -> String {
    let (base, ext) = split_name(name);
    let ext = ext.unwrap_or(DEFAULT_SOURCE_EXTENSION);
    format!("{base}_failed_{}.{ext}", timestamp(now))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap()
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("report.msg"), ("report", Some("msg")));
        assert_eq!(split_name("a.b.MSG"), ("a.b", Some("MSG")));
        assert_eq!(split_name("noext"), ("noext", None));
        assert_eq!(split_name(".hidden"), (".hidden", None));
        assert_eq!(split_name("dir/sub/file.msg"), ("file", Some("msg")));
        assert_eq!(split_name("trailing."), ("trailing.", None));
    }

    #[test]
    fn test_eml_names() {
        assert_eq!(eml_name("Quarterly Report.msg"), "Quarterly Report.eml");
        assert_eq!(suffixed_eml_name("x.msg", "0a1b2c3d"), "x_0a1b2c3d.eml");
    }

    #[test]
    fn test_random_suffix_shape() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_timestamped_names() {
        assert_eq!(archive_name("mail.msg", at()), "mail_20240307_140509.msg");
        assert_eq!(archive_name("mail", at()), "mail_20240307_140509.msg");
        assert_eq!(
            quarantine_name("mail.MSG", at()),
            "mail_failed_20240307_140509.MSG"
        );
    }
}
