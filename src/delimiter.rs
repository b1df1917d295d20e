use crate::{IngestError, IngestResult};
use memchr::{memchr, memchr2};
use std::fmt;

/// Field separator of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Semicolon,
    Comma,
}

impl Delimiter {
    pub const fn as_byte(self) -> u8 {
        match self {
            Delimiter::Semicolon => b';',
            Delimiter::Comma => b',',
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}

/// Pick the delimiter from a single line: `;` wins over `,`.
///
/// Quoting is ignored, a separator inside a quoted field still counts.
pub fn detect_delimiter(line: &str) -> IngestResult<Delimiter> {
    let bytes = line.as_bytes();
    if memchr(b';', bytes).is_some() {
        Ok(Delimiter::Semicolon)
    } else if memchr(b',', bytes).is_some() {
        Ok(Delimiter::Comma)
    } else {
        Err(IngestError::UnknownDelimiter)
    }
}

/// Text up to the first line break (`\n` or `\r`).
pub fn first_line(text: &str) -> &str {
    match memchr2(b'\n', b'\r', text.as_bytes()) {
        Some(end) => &text[..end],
        None => text,
    }
}
