use crate::SourceLocation;

/// Decoded input with random lookahead.
///
/// Peeking past the end yields `'\0'`. The reader rejects NUL in the
/// stream itself, so the sentinel is unambiguous.
#[derive(Debug, Default)]
pub struct InputBuffer {
    chars: Vec<char>,
    pos: usize,
    current_location: SourceLocation,
}

impl InputBuffer {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            current_location: SourceLocation::default(),
        }
    }

    #[inline]
    pub fn peek(&self) -> char {
        self.peek_nth(0)
    }

    #[inline]
    pub fn peek_nth(&self, n: usize) -> char {
        self.chars.get(self.pos + n).copied().unwrap_or('\0')
    }

    /// The next `n` characters, truncated at the end of input.
    pub fn prefix(&self, n: usize) -> String {
        let end = (self.pos + n).min(self.chars.len());
        self.chars[self.pos..end].iter().collect()
    }

    #[inline]
    pub fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, ch)| self.peek_nth(i) == ch)
    }

    #[inline]
    pub fn pop(&mut self) -> char {
        let ch = self.peek();
        if self.pos < self.chars.len() {
            let next = self.peek_nth(1);
            self.current_location.advance(ch, next);
            self.pos += 1;
        }
        ch
    }

    #[inline]
    pub fn skip(&mut self, n: usize) {
        for _ in 0..n {
            self.pop();
        }
    }

    /// Consume `n` characters and return them.
    pub fn take(&mut self, n: usize) -> String {
        let s = self.prefix(n);
        self.skip(n);
        s
    }

    #[inline]
    pub fn current_location(&self) -> SourceLocation {
        self.current_location
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_past_end() {
        let mut input = InputBuffer::new("ab");
        assert_eq!(input.peek_nth(1), 'b');
        assert_eq!(input.peek_nth(2), '\0');
        assert_eq!(input.take(5), "ab");
        assert!(input.is_eof());
        assert_eq!(input.pop(), '\0');
        assert_eq!(input.current_location().offset, 2);
    }

    #[test]
    fn starts_with() {
        let input = InputBuffer::new("---\n");
        assert!(input.starts_with("---"));
        assert!(!input.starts_with("...."));
    }
}
