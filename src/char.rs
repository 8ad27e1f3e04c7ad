/// Character classes of the YAML grammar.
///
/// The scanner uses `'\0'` as its end-of-input sentinel, so the "z" classes
/// (`is_blankz`, `is_breakz`) treat it as a terminator.
pub trait CharExt {
    fn is_break(self) -> bool;
    fn is_breakz(self) -> bool;
    fn is_blank(self) -> bool;
    fn is_blankz(self) -> bool;
    fn is_word(self) -> bool;
    fn is_uri_char(self) -> bool;
    fn is_printable(self) -> bool;
    fn is_flow_indicator(self) -> bool;
    fn escape_code(self) -> Option<char>;
}

impl CharExt for char {
    #[inline]
    fn is_break(self) -> bool {
        matches!(self, '\r' | '\n' | '\u{85}' | '\u{2028}' | '\u{2029}')
    }

    #[inline]
    fn is_breakz(self) -> bool {
        self == '\0' || self.is_break()
    }

    #[inline]
    fn is_blank(self) -> bool {
        self == ' ' || self == '\t'
    }

    #[inline]
    fn is_blankz(self) -> bool {
        self.is_blank() || self.is_breakz()
    }

    /// Characters allowed in anchors, aliases, directive names and tag
    /// handles.
    #[inline]
    fn is_word(self) -> bool {
        self.is_ascii_alphanumeric() || self == '-' || self == '_'
    }

    #[inline]
    fn is_uri_char(self) -> bool {
        self.is_word() || "-;/?:@&=+$,_.!~*'()[]%".contains(self)
    }

    /// The printable subset accepted by the reader and emitted unescaped.
    #[inline]
    fn is_printable(self) -> bool {
        matches!(self,
            '\t' | '\n' | '\r' | '\x20'..='\x7e' | '\u{85}'
            | '\u{a0}'..='\u{d7ff}' | '\u{e000}'..='\u{fffd}'
            | '\u{10000}'..='\u{10ffff}')
    }

    #[inline]
    fn is_flow_indicator(self) -> bool {
        matches!(self, ',' | '[' | ']' | '{' | '}')
    }

    /// The short escape written after `\` in a double-quoted scalar.
    fn escape_code(self) -> Option<char> {
        Some(match self {
            '\0' => '0',
            '\x07' => 'a',
            '\x08' => 'b',
            '\t' => 't',
            '\n' => 'n',
            '\x0b' => 'v',
            '\x0c' => 'f',
            '\r' => 'r',
            '\x1b' => 'e',
            '"' => '"',
            '\\' => '\\',
            '\u{85}' => 'N',
            '\u{a0}' => '_',
            '\u{2028}' => 'L',
            '\u{2029}' => 'P',
            _ => return None,
        })
    }
}

/// The character denoted by a one-letter escape in a double-quoted scalar.
pub(crate) fn unescape(code: char) -> Option<char> {
    Some(match code {
        '0' => '\0',
        'a' => '\x07',
        'b' => '\x08',
        't' | '\t' => '\t',
        'n' => '\n',
        'v' => '\x0b',
        'f' => '\x0c',
        'r' => '\r',
        'e' => '\x1b',
        ' ' => ' ',
        '"' => '"',
        '/' => '/',
        '\\' => '\\',
        'N' => '\u{85}',
        '_' => '\u{a0}',
        'L' => '\u{2028}',
        'P' => '\u{2029}',
        _ => return None,
    })
}
