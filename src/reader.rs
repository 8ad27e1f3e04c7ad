use crate::{CharExt, SourceLocation};

/// Character encodings accepted on input and produced on output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    /// Detect the encoding from a byte order mark, defaulting to UTF-8.
    /// Returns the encoding and the length of the mark.
    pub fn detect(bytes: &[u8]) -> (Encoding, usize) {
        match bytes {
            [0xff, 0xfe, ..] => (Encoding::Utf16Le, 2),
            [0xfe, 0xff, ..] => (Encoding::Utf16Be, 2),
            [0xef, 0xbb, 0xbf, ..] => (Encoding::Utf8, 3),
            _ => (Encoding::Utf8, 0),
        }
    }

    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Utf16Le => std::iter::once(0xfeff)
                .chain(text.encode_utf16())
                .flat_map(u16::to_le_bytes)
                .collect(),
            Encoding::Utf16Be => std::iter::once(0xfeff)
                .chain(text.encode_utf16())
                .flat_map(u16::to_be_bytes)
                .collect(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum ReaderError {
    #[error("invalid UTF-8 data at byte {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("invalid UTF-16 data at byte {offset}")]
    InvalidUtf16 { offset: usize },
    #[error("odd number of bytes in UTF-16 data")]
    TruncatedUtf16,
    #[error("special characters are not allowed: {ch:?} at {location}")]
    NonPrintable { ch: char, location: SourceLocation },
}

impl ReaderError {
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            ReaderError::NonPrintable { location, .. } => Some(*location),
            _ => None,
        }
    }
}

/// Decode a byte stream into text, honoring a leading byte order mark.
pub fn decode(bytes: &[u8]) -> Result<String, ReaderError> {
    let (encoding, bom) = Encoding::detect(bytes);
    let body = &bytes[bom..];
    let text = match encoding {
        Encoding::Utf8 => match std::str::from_utf8(body) {
            Ok(s) => s.to_owned(),
            Err(err) => {
                return Err(ReaderError::InvalidUtf8 {
                    offset: bom + err.valid_up_to(),
                })
            }
        },
        Encoding::Utf16Le | Encoding::Utf16Be => {
            if body.len() % 2 != 0 {
                return Err(ReaderError::TruncatedUtf16);
            }
            let units = body.chunks_exact(2).map(|pair| {
                let pair = [pair[0], pair[1]];
                if encoding == Encoding::Utf16Le {
                    u16::from_le_bytes(pair)
                } else {
                    u16::from_be_bytes(pair)
                }
            });
            let mut text = String::with_capacity(body.len() / 2);
            for (i, decoded) in char::decode_utf16(units).enumerate() {
                match decoded {
                    Ok(ch) => text.push(ch),
                    Err(_) => {
                        return Err(ReaderError::InvalidUtf16 {
                            offset: bom + i * 2,
                        })
                    }
                }
            }
            text
        }
    };
    check_printable(&text)?;
    Ok(text)
}

/// Reject characters outside the printable set. A byte order mark is
/// allowed anywhere.
pub fn check_printable(text: &str) -> Result<(), ReaderError> {
    let mut location = SourceLocation::default();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if !ch.is_printable() && ch != '\u{feff}' {
            return Err(ReaderError::NonPrintable { ch, location });
        }
        location.advance(ch, chars.peek().copied().unwrap_or('\0'));
    }
    Ok(())
}
