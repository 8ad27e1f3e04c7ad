/// A position in the loaded text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// Offset in Unicode chars from the beginning of the stream.
    pub offset: usize,
    /// Line, counting from 0.
    pub line: usize,
    /// Column, counting from 0.
    pub column: usize,
}

impl PartialOrd for SourceLocation {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceLocation {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.offset.cmp(&other.offset)
    }
}

impl SourceLocation {
    /// Move past `ch`. `next` is the character following it, which decides
    /// whether a lone `\r` counts as a line break.
    #[inline]
    pub fn advance(&mut self, ch: char, next: char) {
        self.offset += 1;
        match ch {
            '\n' | '\u{85}' | '\u{2028}' | '\u{2029}' => {
                self.line += 1;
                self.column = 0;
            }
            '\r' if next != '\n' => {
                self.line += 1;
                self.column = 0;
            }
            '\u{feff}' => {}
            _ => self.column += 1,
        }
    }

    #[inline]
    pub fn until(self, end: Self) -> Span {
        Span { start: self, end }
    }

    /// 1-based line number, as shown in messages.
    #[inline]
    pub fn line_number(&self) -> usize {
        self.line + 1
    }

    /// 1-based column number, as shown in messages.
    #[inline]
    pub fn column_number(&self) -> usize {
        self.column + 1
    }
}

impl std::fmt::Display for SourceLocation {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}, column {}",
            self.line_number(),
            self.column_number()
        )
    }
}

#[derive(Debug, Clone, Copy, Hash)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn into_inner(self) -> T {
        self.value
    }

    #[inline]
    pub fn start(&self) -> SourceLocation {
        self.span.start
    }

    #[inline]
    pub fn end(&self) -> SourceLocation {
        self.span.end
    }
}

impl<T> std::ops::Deref for Spanned<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

// Positions never take part in comparisons, so tests can compare token and
// event streams without spelling out every location.
impl<T> PartialEq for Spanned<T>
where
    T: PartialEq,
{
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl Span {
    #[inline]
    pub fn empty(location: SourceLocation) -> Self {
        Self {
            start: location,
            end: location,
        }
    }
}

pub(crate) trait SpannedExt {
    fn in_span(self, span: Span) -> Spanned<Self>
    where
        Self: Sized,
    {
        Spanned { value: self, span }
    }
}

impl<T> SpannedExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn walk(input: &str) -> SourceLocation {
        let chars: Vec<char> = input.chars().collect();
        let mut location = SourceLocation::default();
        for (i, ch) in chars.iter().enumerate() {
            location.advance(*ch, chars.get(i + 1).copied().unwrap_or('\0'));
        }
        location
    }

    #[test]
    fn crlf_is_one_break() {
        let location = walk("a\r\nbc");
        assert_eq!(location.line, 1);
        assert_eq!(location.column, 2);
        assert_eq!(location.offset, 5);
    }

    #[test]
    fn lone_cr_and_unicode_breaks() {
        assert_eq!(walk("a\rb").line, 1);
        assert_eq!(walk("a\u{2028}b\u{85}c").line, 2);
    }

    #[test]
    fn bom_has_no_width() {
        let location = walk("\u{feff}ab");
        assert_eq!(location.column, 2);
        assert_eq!(location.offset, 3);
    }

    #[test]
    fn display_is_one_based() {
        let location = walk("ab\ncd");
        assert_eq!(location.to_string(), "line 2, column 3");
    }
}
