//! `Content-Disposition` header values (RFC 6266).
//!
//! The header carries both a quoted ASCII `filename` for old clients and an
//! RFC 5987 `filename*` with the UTF-8 name.

use std::fmt::Write;

/// Disposition type of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

/// `inline; filename="..."; filename*=UTF-8''...`
pub fn inline(filename: &str) -> String {
    format(Disposition::Inline, Some(filename))
}

/// `attachment; filename="..."; filename*=UTF-8''...`
pub fn attachment(filename: &str) -> String {
    format(Disposition::Attachment, Some(filename))
}

pub fn format(disposition: Disposition, filename: Option<&str>) -> String {
    match filename {
        Some(filename) => format!(
            "{}; filename=\"{}\"; filename*=UTF-8''{}",
            disposition.as_str(),
            ascii_filename(filename),
            percent_escape(filename, is_rfc5987_safe)
        ),
        None => disposition.as_str().to_string(),
    }
}

/// Non-ASCII characters become `?` before escaping.
fn ascii_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect();
    percent_escape(&ascii, is_traditional_safe)
}

fn is_traditional_safe(c: char) -> bool {
    c == ' ' || c.is_ascii_alphanumeric() || "!#$+.^_`|~-".contains(c)
}

fn is_rfc5987_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$&+.^_`|~-".contains(c)
}

fn percent_escape(s: &str, safe: fn(char) -> bool) -> String {
    let mut out = String::with_capacity(s.len());
    let mut buf = [0u8; 4];
    for c in s.chars() {
        if safe(c) {
            out.push(c);
        } else {
            for byte in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}
