use std::collections::{BTreeMap, VecDeque};

use crate::{
    char::unescape, CharExt, InputBuffer, ScalarStyle, SourceLocation, Spanned, SpannedExt, Token,
};

/// Simple keys longer than this are no longer considered keys.
const MAX_SIMPLE_KEY_LENGTH: usize = 1024;

/// Turns text into a stream of tokens.
///
/// Block structure is made explicit here: indentation changes become
/// `BlockSequenceStart`/`BlockMappingStart`/`BlockEnd` tokens, and a `Key`
/// token is inserted in front of a simple key once its `:` is found.
pub struct Scanner {
    input: InputBuffer,
    tokens: VecDeque<Spanned<Token>>,
    tokens_taken: usize,
    done: bool,
    failed: bool,
    flow_level: usize,
    indent: isize,
    indents: Vec<isize>,
    allow_simple_key: bool,
    simple_keys: BTreeMap<usize, SimpleKey>,
}

#[derive(Clone, Copy, Debug)]
struct SimpleKey {
    token_number: usize,
    required: bool,
    location: SourceLocation,
}

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum ScannerError {
    #[error("found character {ch:?} that cannot start any token at {location}")]
    UnexpectedChar { ch: char, location: SourceLocation },
    #[error("could not find expected ':' for the simple key at {start}, at {location}")]
    SimpleKeyNotFound {
        start: SourceLocation,
        location: SourceLocation,
    },
    #[error("{what} are not allowed here at {location}")]
    NotAllowedHere {
        what: &'static str,
        location: SourceLocation,
    },
    #[error("found a tab character that violates indentation at {location}")]
    TabIndentation { location: SourceLocation },
    #[error("found unexpected end of stream while scanning {context} starting at {start}")]
    UnexpectedEof {
        context: &'static str,
        start: SourceLocation,
        location: SourceLocation,
    },
    #[error("found unknown escape character {ch:?} at {location}")]
    InvalidEscapeSequence { ch: char, location: SourceLocation },
    #[error("while scanning {context} at {start}: {problem} at {location}")]
    Malformed {
        context: &'static str,
        start: SourceLocation,
        problem: String,
        location: SourceLocation,
    },
}

impl ScannerError {
    /// Where the problem was found.
    pub fn location(&self) -> SourceLocation {
        match self {
            ScannerError::UnexpectedChar { location, .. }
            | ScannerError::SimpleKeyNotFound { location, .. }
            | ScannerError::NotAllowedHere { location, .. }
            | ScannerError::TabIndentation { location }
            | ScannerError::UnexpectedEof { location, .. }
            | ScannerError::InvalidEscapeSequence { location, .. }
            | ScannerError::Malformed { location, .. } => *location,
        }
    }

    /// Where the construct being scanned started, if that differs from
    /// [`ScannerError::location`].
    pub fn context_location(&self) -> Option<SourceLocation> {
        match self {
            ScannerError::SimpleKeyNotFound { start, .. }
            | ScannerError::UnexpectedEof { start, .. }
            | ScannerError::Malformed { start, .. } => Some(*start),
            _ => None,
        }
    }
}

fn malformed(
    context: &'static str,
    start: SourceLocation,
    problem: impl Into<String>,
    location: SourceLocation,
) -> ScannerError {
    ScannerError::Malformed {
        context,
        start,
        problem: problem.into(),
        location,
    }
}

impl Scanner {
    pub fn new(text: &str) -> Self {
        let input = InputBuffer::new(text);
        let start = input.current_location();
        let mut tokens = VecDeque::new();
        tokens.push_back(Token::StreamStart.in_span(start.until(start)));
        Self {
            input,
            tokens,
            tokens_taken: 0,
            done: false,
            failed: false,
            flow_level: 0,
            indent: -1,
            indents: Vec::new(),
            allow_simple_key: true,
            simple_keys: BTreeMap::new(),
        }
    }

    pub fn peek_token(&mut self) -> Result<Option<&Spanned<Token>>, ScannerError> {
        self.fill()?;
        Ok(self.tokens.front())
    }

    pub fn next_token(&mut self) -> Result<Option<Spanned<Token>>, ScannerError> {
        self.fill()?;
        let token = self.tokens.pop_front();
        if let Some(ref token) = token {
            self.tokens_taken += 1;
            log::trace!("token {:?} at {}", token.value, token.span.start);
        }
        Ok(token)
    }

    fn fill(&mut self) -> Result<(), ScannerError> {
        if self.failed {
            self.tokens.clear();
            return Ok(());
        }
        let result = loop {
            match self.need_more_tokens() {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(err) => break Err(err),
            }
            if let Err(err) = self.fetch_more_tokens() {
                break Err(err);
            }
        };
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    #[inline]
    fn mark(&self) -> SourceLocation {
        self.input.current_location()
    }

    #[inline]
    fn column(&self) -> usize {
        self.input.current_location().column
    }

    fn push(&mut self, token: Token, start: SourceLocation) {
        let end = self.mark();
        self.tokens.push_back(token.in_span(start.until(end)));
    }

    fn need_more_tokens(&mut self) -> Result<bool, ScannerError> {
        if self.done {
            return Ok(false);
        }
        if self.tokens.is_empty() {
            return Ok(true);
        }
        self.stale_simple_keys()?;
        let next_key = self.simple_keys.values().map(|key| key.token_number).min();
        Ok(next_key == Some(self.tokens_taken))
    }

    fn fetch_more_tokens(&mut self) -> Result<(), ScannerError> {
        self.scan_to_next_token();
        self.stale_simple_keys()?;
        self.unwind_indent(self.column() as isize);

        let ch = self.input.peek();
        let column = self.column();
        match ch {
            '\0' if self.input.is_eof() => self.fetch_stream_end(),
            '%' if column == 0 => self.fetch_directive(),
            '-' if column == 0 && self.at_document_indicator("---") => {
                self.fetch_document_indicator(Token::DocumentStart)
            }
            '.' if column == 0 && self.at_document_indicator("...") => {
                self.fetch_document_indicator(Token::DocumentEnd)
            }
            '[' => self.fetch_flow_collection_start(Token::FlowSequenceStart),
            '{' => self.fetch_flow_collection_start(Token::FlowMappingStart),
            ']' => self.fetch_flow_collection_end(Token::FlowSequenceEnd),
            '}' => self.fetch_flow_collection_end(Token::FlowMappingEnd),
            ',' => self.fetch_flow_entry(),
            '-' if self.input.peek_nth(1).is_blankz() => self.fetch_block_entry(),
            '?' if self.flow_level > 0 || self.input.peek_nth(1).is_blankz() => self.fetch_key(),
            ':' if self.flow_level > 0 || self.input.peek_nth(1).is_blankz() => {
                self.fetch_value()
            }
            '*' => self.fetch_anchor(true),
            '&' => self.fetch_anchor(false),
            '!' => self.fetch_tag(),
            '|' if self.flow_level == 0 => self.fetch_block_scalar(ScalarStyle::Literal),
            '>' if self.flow_level == 0 => self.fetch_block_scalar(ScalarStyle::Folded),
            '\'' => self.fetch_flow_scalar(ScalarStyle::SingleQuoted),
            '"' => self.fetch_flow_scalar(ScalarStyle::DoubleQuoted),
            _ if self.check_plain() => self.fetch_plain(),
            ch => Err(ScannerError::UnexpectedChar {
                ch,
                location: self.mark(),
            }),
        }
    }

    fn at_document_indicator(&self, indicator: &str) -> bool {
        self.column() == 0 && self.input.starts_with(indicator) && self.input.peek_nth(3).is_blankz()
    }

    fn check_plain(&self) -> bool {
        let ch = self.input.peek();
        let next = self.input.peek_nth(1);
        !(ch.is_blankz() || "-?:,[]{}#&*!|>'\"%@`".contains(ch))
            || (!next.is_blankz()
                && (ch == '-' || (self.flow_level == 0 && (ch == '?' || ch == ':'))))
    }

    // Simple keys

    fn stale_simple_keys(&mut self) -> Result<(), ScannerError> {
        let here = self.mark();
        let mut stale = Vec::new();
        for (level, key) in &self.simple_keys {
            if key.location.line != here.line
                || key.location.offset + MAX_SIMPLE_KEY_LENGTH < here.offset
            {
                if key.required {
                    return Err(ScannerError::SimpleKeyNotFound {
                        start: key.location,
                        location: here,
                    });
                }
                stale.push(*level);
            }
        }
        for level in stale {
            self.simple_keys.remove(&level);
        }
        Ok(())
    }

    fn save_simple_key(&mut self) -> Result<(), ScannerError> {
        let required = self.flow_level == 0 && self.indent == self.column() as isize;
        if self.allow_simple_key {
            self.remove_simple_key()?;
            let key = SimpleKey {
                token_number: self.tokens_taken + self.tokens.len(),
                required,
                location: self.mark(),
            };
            self.simple_keys.insert(self.flow_level, key);
        }
        Ok(())
    }

    fn remove_simple_key(&mut self) -> Result<(), ScannerError> {
        if let Some(key) = self.simple_keys.remove(&self.flow_level) {
            if key.required {
                return Err(ScannerError::SimpleKeyNotFound {
                    start: key.location,
                    location: self.mark(),
                });
            }
        }
        Ok(())
    }

    // Indentation

    fn unwind_indent(&mut self, column: isize) {
        if self.flow_level > 0 {
            return;
        }
        while self.indent > column {
            let here = self.mark();
            self.indent = self.indents.pop().unwrap_or(-1);
            self.tokens.push_back(Token::BlockEnd.in_span(here.until(here)));
        }
    }

    fn add_indent(&mut self, column: isize) -> bool {
        if self.indent < column {
            self.indents.push(self.indent);
            self.indent = column;
            true
        } else {
            false
        }
    }

    // Fetchers

    fn fetch_stream_end(&mut self) -> Result<(), ScannerError> {
        self.unwind_indent(-1);
        self.remove_simple_key()?;
        self.allow_simple_key = false;
        self.simple_keys.clear();
        let here = self.mark();
        self.push(Token::StreamEnd, here);
        self.done = true;
        Ok(())
    }

    fn fetch_directive(&mut self) -> Result<(), ScannerError> {
        self.unwind_indent(-1);
        self.remove_simple_key()?;
        self.allow_simple_key = false;
        if let Some(token) = self.scan_directive()? {
            self.tokens.push_back(token);
        }
        Ok(())
    }

    fn fetch_document_indicator(&mut self, token: Token) -> Result<(), ScannerError> {
        self.unwind_indent(-1);
        self.remove_simple_key()?;
        self.allow_simple_key = false;
        let start = self.mark();
        self.input.skip(3);
        self.push(token, start);
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, token: Token) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.flow_level += 1;
        self.allow_simple_key = true;
        let start = self.mark();
        self.input.pop();
        self.push(token, start);
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, token: Token) -> Result<(), ScannerError> {
        self.remove_simple_key()?;
        self.flow_level = self.flow_level.saturating_sub(1);
        self.allow_simple_key = false;
        let start = self.mark();
        self.input.pop();
        self.push(token, start);
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> Result<(), ScannerError> {
        self.allow_simple_key = true;
        self.remove_simple_key()?;
        let start = self.mark();
        self.input.pop();
        self.push(Token::FlowEntry, start);
        Ok(())
    }

    fn fetch_block_entry(&mut self) -> Result<(), ScannerError> {
        let start = self.mark();
        if self.flow_level == 0 {
            if !self.allow_simple_key {
                return Err(ScannerError::NotAllowedHere {
                    what: "sequence entries",
                    location: start,
                });
            }
            if self.add_indent(start.column as isize) {
                self.push(Token::BlockSequenceStart, start);
            }
        }
        self.allow_simple_key = true;
        self.remove_simple_key()?;
        self.input.pop();
        self.push(Token::BlockEntry, start);
        Ok(())
    }

    fn fetch_key(&mut self) -> Result<(), ScannerError> {
        let start = self.mark();
        if self.flow_level == 0 {
            if !self.allow_simple_key {
                return Err(ScannerError::NotAllowedHere {
                    what: "mapping keys",
                    location: start,
                });
            }
            if self.add_indent(start.column as isize) {
                self.push(Token::BlockMappingStart, start);
            }
        }
        self.allow_simple_key = self.flow_level == 0;
        self.remove_simple_key()?;
        self.input.pop();
        self.push(Token::Key, start);
        Ok(())
    }

    fn fetch_value(&mut self) -> Result<(), ScannerError> {
        let start = self.mark();
        if let Some(key) = self.simple_keys.remove(&self.flow_level) {
            let at = key.token_number - self.tokens_taken;
            let span = key.location.until(key.location);
            self.tokens.insert(at, Token::Key.in_span(span));
            if self.flow_level == 0 && self.add_indent(key.location.column as isize) {
                self.tokens.insert(at, Token::BlockMappingStart.in_span(span));
            }
            self.allow_simple_key = false;
        } else {
            if self.flow_level == 0 {
                if !self.allow_simple_key {
                    return Err(ScannerError::NotAllowedHere {
                        what: "mapping values",
                        location: start,
                    });
                }
                if self.add_indent(start.column as isize) {
                    self.push(Token::BlockMappingStart, start);
                }
            }
            self.allow_simple_key = self.flow_level == 0;
            self.remove_simple_key()?;
        }
        self.input.pop();
        self.push(Token::Value, start);
        Ok(())
    }

    fn fetch_anchor(&mut self, alias: bool) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_anchor(alias)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_tag()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, style: ScalarStyle) -> Result<(), ScannerError> {
        self.allow_simple_key = true;
        self.remove_simple_key()?;
        let token = self.scan_block_scalar(style)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, style: ScalarStyle) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_flow_scalar(style)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_plain(&mut self) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_plain()?;
        self.tokens.push_back(token);
        Ok(())
    }

    // Scanners

    fn scan_to_next_token(&mut self) {
        if self.mark().offset == 0 && self.input.peek() == '\u{feff}' {
            self.input.pop();
        }
        loop {
            // Tabs separate tokens, but never indent a new block line.
            loop {
                let ch = self.input.peek();
                if ch == ' ' || (ch == '\t' && (self.flow_level > 0 || !self.allow_simple_key)) {
                    self.input.pop();
                } else {
                    break;
                }
            }
            if self.input.peek() == '#' {
                while !self.input.peek().is_breakz() {
                    self.input.pop();
                }
            }
            if self.scan_line_break().is_some() {
                if self.flow_level == 0 {
                    self.allow_simple_key = true;
                }
            } else {
                break;
            }
        }
    }

    /// Consume one line break, normalizing `\r\n`, `\r` and NEL to `\n`.
    fn scan_line_break(&mut self) -> Option<char> {
        match self.input.peek() {
            '\r' if self.input.peek_nth(1) == '\n' => {
                self.input.skip(2);
                Some('\n')
            }
            '\r' | '\n' | '\u{85}' => {
                self.input.pop();
                Some('\n')
            }
            ch @ ('\u{2028}' | '\u{2029}') => {
                self.input.pop();
                Some(ch)
            }
            _ => None,
        }
    }

    fn scan_directive(&mut self) -> Result<Option<Spanned<Token>>, ScannerError> {
        let start = self.mark();
        self.input.pop();
        let name = self.scan_directive_name(start)?;
        let token = match name.as_str() {
            "YAML" => {
                let (major, minor) = self.scan_version_directive_value(start)?;
                Some(Token::VersionDirective(major, minor))
            }
            "TAG" => {
                let (handle, prefix) = self.scan_tag_directive_value(start)?;
                Some(Token::TagDirective { handle, prefix })
            }
            _ => {
                log::warn!("ignoring unknown directive %{name} at {start}");
                while !self.input.peek().is_breakz() {
                    self.input.pop();
                }
                None
            }
        };
        let end = self.mark();
        self.scan_directive_ignored_line(start)?;
        Ok(token.map(|token| token.in_span(start.until(end))))
    }

    fn scan_directive_name(&mut self, start: SourceLocation) -> Result<String, ScannerError> {
        let mut length = 0;
        while self.input.peek_nth(length).is_word() {
            length += 1;
        }
        if length == 0 {
            return Err(malformed(
                "a directive",
                start,
                format!(
                    "expected alphabetic or numeric character, but found {:?}",
                    self.input.peek()
                ),
                self.mark(),
            ));
        }
        let name = self.input.take(length);
        let ch = self.input.peek();
        if !ch.is_blankz() {
            return Err(malformed(
                "a directive",
                start,
                format!("expected alphabetic or numeric character, but found {ch:?}"),
                self.mark(),
            ));
        }
        Ok(name)
    }

    fn skip_blanks(&mut self) {
        while self.input.peek().is_blank() {
            self.input.pop();
        }
    }

    fn scan_version_directive_value(
        &mut self,
        start: SourceLocation,
    ) -> Result<(u32, u32), ScannerError> {
        self.skip_blanks();
        let major = self.scan_version_directive_number(start)?;
        if self.input.peek() != '.' {
            return Err(malformed(
                "a directive",
                start,
                format!("expected a digit or '.', but found {:?}", self.input.peek()),
                self.mark(),
            ));
        }
        self.input.pop();
        let minor = self.scan_version_directive_number(start)?;
        if !self.input.peek().is_blankz() {
            return Err(malformed(
                "a directive",
                start,
                format!("expected a digit or ' ', but found {:?}", self.input.peek()),
                self.mark(),
            ));
        }
        Ok((major, minor))
    }

    fn scan_version_directive_number(&mut self, start: SourceLocation) -> Result<u32, ScannerError> {
        let mut length = 0;
        while self.input.peek_nth(length).is_ascii_digit() {
            length += 1;
        }
        let digits = self.input.prefix(length);
        match digits.parse() {
            Ok(number) if length > 0 => {
                self.input.skip(length);
                Ok(number)
            }
            _ => Err(malformed(
                "a directive",
                start,
                format!("expected a digit, but found {:?}", self.input.peek()),
                self.mark(),
            )),
        }
    }

    fn scan_tag_directive_value(
        &mut self,
        start: SourceLocation,
    ) -> Result<(String, String), ScannerError> {
        self.skip_blanks();
        let handle = self.scan_tag_handle("a directive", start)?;
        if !self.input.peek().is_blank() {
            return Err(malformed(
                "a directive",
                start,
                format!("expected ' ', but found {:?}", self.input.peek()),
                self.mark(),
            ));
        }
        self.skip_blanks();
        let prefix = self.scan_tag_uri("a directive", start)?;
        if !self.input.peek().is_blankz() {
            return Err(malformed(
                "a directive",
                start,
                format!("expected ' ', but found {:?}", self.input.peek()),
                self.mark(),
            ));
        }
        Ok((handle, prefix))
    }

    fn scan_directive_ignored_line(&mut self, start: SourceLocation) -> Result<(), ScannerError> {
        self.skip_blanks();
        if self.input.peek() == '#' {
            while !self.input.peek().is_breakz() {
                self.input.pop();
            }
        }
        if self.scan_line_break().is_none() && !self.input.is_eof() {
            return Err(malformed(
                "a directive",
                start,
                format!(
                    "expected a comment or a line break, but found {:?}",
                    self.input.peek()
                ),
                self.mark(),
            ));
        }
        Ok(())
    }

    fn scan_anchor(&mut self, alias: bool) -> Result<Spanned<Token>, ScannerError> {
        let context = if alias { "an alias" } else { "an anchor" };
        let start = self.mark();
        self.input.pop();
        let mut length = 0;
        while self.input.peek_nth(length).is_word() {
            length += 1;
        }
        let terminator = self.input.peek_nth(length);
        if length == 0 || !(terminator.is_blankz() || "?:,]}%@`".contains(terminator)) {
            self.input.skip(length);
            return Err(malformed(
                context,
                start,
                format!("expected alphabetic or numeric character, but found {terminator:?}"),
                self.mark(),
            ));
        }
        let name = self.input.take(length);
        let token = if alias {
            Token::Alias(name)
        } else {
            Token::Anchor(name)
        };
        Ok(token.in_span(start.until(self.mark())))
    }

    fn scan_tag(&mut self) -> Result<Spanned<Token>, ScannerError> {
        let start = self.mark();
        let next = self.input.peek_nth(1);
        let (handle, suffix) = if next == '<' {
            self.input.skip(2);
            let suffix = self.scan_tag_uri("a tag", start)?;
            if self.input.peek() != '>' {
                return Err(malformed(
                    "a tag",
                    start,
                    format!("expected '>', but found {:?}", self.input.peek()),
                    self.mark(),
                ));
            }
            self.input.pop();
            (None, suffix)
        } else if next.is_blankz() {
            self.input.pop();
            (None, "!".to_owned())
        } else {
            let mut length = 1;
            let mut use_handle = false;
            loop {
                let ch = self.input.peek_nth(length);
                if ch.is_blankz() {
                    break;
                }
                if ch == '!' {
                    use_handle = true;
                    break;
                }
                length += 1;
            }
            let handle = if use_handle {
                self.scan_tag_handle("a tag", start)?
            } else {
                self.input.pop();
                "!".to_owned()
            };
            let suffix = self.scan_tag_uri("a tag", start)?;
            (Some(handle), suffix)
        };
        if !self.input.peek().is_blankz() {
            return Err(malformed(
                "a tag",
                start,
                format!("expected ' ', but found {:?}", self.input.peek()),
                self.mark(),
            ));
        }
        Ok(Token::Tag { handle, suffix }.in_span(start.until(self.mark())))
    }

    fn scan_tag_handle(
        &mut self,
        context: &'static str,
        start: SourceLocation,
    ) -> Result<String, ScannerError> {
        if self.input.peek() != '!' {
            return Err(malformed(
                context,
                start,
                format!("expected '!', but found {:?}", self.input.peek()),
                self.mark(),
            ));
        }
        let mut length = 1;
        if self.input.peek_nth(1) != ' ' {
            while self.input.peek_nth(length).is_word() {
                length += 1;
            }
            if self.input.peek_nth(length) != '!' {
                self.input.skip(length);
                return Err(malformed(
                    context,
                    start,
                    format!("expected '!', but found {:?}", self.input.peek()),
                    self.mark(),
                ));
            }
            length += 1;
        }
        Ok(self.input.take(length))
    }

    fn scan_tag_uri(
        &mut self,
        context: &'static str,
        start: SourceLocation,
    ) -> Result<String, ScannerError> {
        let mut uri = String::new();
        loop {
            let ch = self.input.peek();
            if ch == '%' {
                uri.push_str(&self.scan_uri_escapes(context, start)?);
            } else if ch.is_uri_char() {
                uri.push(self.input.pop());
            } else {
                break;
            }
        }
        if uri.is_empty() {
            return Err(malformed(
                context,
                start,
                format!("expected URI, but found {:?}", self.input.peek()),
                self.mark(),
            ));
        }
        Ok(uri)
    }

    fn scan_uri_escapes(
        &mut self,
        context: &'static str,
        start: SourceLocation,
    ) -> Result<String, ScannerError> {
        let location = self.mark();
        let mut bytes = Vec::new();
        while self.input.peek() == '%' {
            self.input.pop();
            let hex = self.input.prefix(2);
            match u8::from_str_radix(&hex, 16) {
                Ok(byte) if hex.len() == 2 && hex.chars().all(|ch| ch.is_ascii_hexdigit()) => {
                    bytes.push(byte);
                    self.input.skip(2);
                }
                _ => {
                    return Err(malformed(
                        context,
                        start,
                        format!("expected URI escape sequence of 2 hexadecimal numbers, but found {hex:?}"),
                        self.mark(),
                    ))
                }
            }
        }
        String::from_utf8(bytes)
            .map_err(|err| malformed(context, start, format!("invalid URI escape: {err}"), location))
    }

    fn scan_block_scalar(&mut self, style: ScalarStyle) -> Result<Spanned<Token>, ScannerError> {
        let folded = style == ScalarStyle::Folded;
        let start = self.mark();
        self.input.pop();
        let (chomping, increment) = self.scan_block_scalar_indicators(start)?;
        self.scan_block_scalar_ignored_line(start)?;

        let min_indent = (self.indent + 1).max(1) as usize;
        let (mut breaks, indent, mut end) = match increment {
            None => {
                let (breaks, max_indent, end) = self.scan_block_scalar_indentation();
                (breaks, min_indent.max(max_indent), end)
            }
            Some(increment) => {
                let indent = min_indent + increment - 1;
                let (breaks, end) = self.scan_block_scalar_breaks(indent);
                (breaks, indent, end)
            }
        };

        let mut value = String::new();
        let mut line_break = None;
        while self.column() == indent && !self.input.is_eof() {
            value.push_str(&breaks);
            let leading_non_space = !self.input.peek().is_blank();
            let mut length = 0;
            while !self.input.peek_nth(length).is_breakz() {
                length += 1;
            }
            value.push_str(&self.input.take(length));
            line_break = self.scan_line_break();
            (breaks, end) = self.scan_block_scalar_breaks(indent);
            if self.column() == indent && !self.input.is_eof() {
                if folded
                    && line_break == Some('\n')
                    && leading_non_space
                    && !self.input.peek().is_blank()
                {
                    if breaks.is_empty() {
                        value.push(' ');
                    }
                } else if let Some(line_break) = line_break {
                    value.push(line_break);
                }
            } else {
                break;
            }
        }

        // Chomping: `None` clips to one break, `Some(true)` keeps all of
        // them, `Some(false)` strips them.
        if chomping != Some(false) {
            if let Some(line_break) = line_break {
                value.push(line_break);
            }
        }
        if chomping == Some(true) {
            value.push_str(&breaks);
        }
        Ok(Token::Scalar { value, style }.in_span(start.until(end)))
    }

    fn scan_block_scalar_indicators(
        &mut self,
        start: SourceLocation,
    ) -> Result<(Option<bool>, Option<usize>), ScannerError> {
        let mut chomping = None;
        let mut increment = None;
        let mut ch = self.input.peek();
        if ch == '+' || ch == '-' {
            chomping = Some(ch == '+');
            self.input.pop();
            ch = self.input.peek();
            if let Some(digit) = ch.to_digit(10) {
                increment = Some(self.scan_indentation_indicator(digit, start)?);
            }
        } else if let Some(digit) = ch.to_digit(10) {
            increment = Some(self.scan_indentation_indicator(digit, start)?);
            ch = self.input.peek();
            if ch == '+' || ch == '-' {
                chomping = Some(ch == '+');
                self.input.pop();
            }
        }
        let ch = self.input.peek();
        if !ch.is_blankz() {
            return Err(malformed(
                "a block scalar",
                start,
                format!("expected chomping or indentation indicators, but found {ch:?}"),
                self.mark(),
            ));
        }
        Ok((chomping, increment))
    }

    fn scan_indentation_indicator(
        &mut self,
        digit: u32,
        start: SourceLocation,
    ) -> Result<usize, ScannerError> {
        if digit == 0 {
            return Err(malformed(
                "a block scalar",
                start,
                "expected indentation indicator in the range 1-9, but found 0",
                self.mark(),
            ));
        }
        self.input.pop();
        Ok(digit as usize)
    }

    fn scan_block_scalar_ignored_line(&mut self, start: SourceLocation) -> Result<(), ScannerError> {
        self.skip_blanks();
        if self.input.peek() == '#' {
            while !self.input.peek().is_breakz() {
                self.input.pop();
            }
        }
        if self.scan_line_break().is_none() && !self.input.is_eof() {
            return Err(malformed(
                "a block scalar",
                start,
                format!(
                    "expected a comment or a line break, but found {:?}",
                    self.input.peek()
                ),
                self.mark(),
            ));
        }
        Ok(())
    }

    fn scan_block_scalar_indentation(&mut self) -> (String, usize, SourceLocation) {
        let mut breaks = String::new();
        let mut max_indent = 0;
        let mut end = self.mark();
        loop {
            let ch = self.input.peek();
            if ch == ' ' {
                self.input.pop();
                max_indent = max_indent.max(self.column());
            } else if let Some(line_break) = self.scan_line_break() {
                breaks.push(line_break);
                end = self.mark();
            } else {
                break;
            }
        }
        (breaks, max_indent, end)
    }

    fn scan_block_scalar_breaks(&mut self, indent: usize) -> (String, SourceLocation) {
        let mut breaks = String::new();
        let mut end = self.mark();
        while self.column() < indent && self.input.peek() == ' ' {
            self.input.pop();
        }
        while let Some(line_break) = self.scan_line_break() {
            breaks.push(line_break);
            end = self.mark();
            while self.column() < indent && self.input.peek() == ' ' {
                self.input.pop();
            }
        }
        (breaks, end)
    }

    fn scan_flow_scalar(&mut self, style: ScalarStyle) -> Result<Spanned<Token>, ScannerError> {
        let double = style == ScalarStyle::DoubleQuoted;
        let start = self.mark();
        let quote = self.input.pop();
        let mut value = String::new();
        self.scan_flow_scalar_non_spaces(double, start, &mut value)?;
        while self.input.peek() != quote {
            self.scan_flow_scalar_spaces(start, &mut value)?;
            self.scan_flow_scalar_non_spaces(double, start, &mut value)?;
        }
        self.input.pop();
        Ok(Token::Scalar { value, style }.in_span(start.until(self.mark())))
    }

    fn scan_flow_scalar_non_spaces(
        &mut self,
        double: bool,
        start: SourceLocation,
        value: &mut String,
    ) -> Result<(), ScannerError> {
        loop {
            let mut length = 0;
            loop {
                let ch = self.input.peek_nth(length);
                if ch == '\'' || ch == '"' || ch == '\\' || ch.is_blankz() {
                    break;
                }
                length += 1;
            }
            value.push_str(&self.input.take(length));

            let ch = self.input.peek();
            if !double && ch == '\'' && self.input.peek_nth(1) == '\'' {
                value.push('\'');
                self.input.skip(2);
            } else if (double && ch == '\'') || (!double && (ch == '"' || ch == '\\')) {
                value.push(ch);
                self.input.pop();
            } else if double && ch == '\\' {
                self.input.pop();
                let code = self.input.peek();
                if let Some(unescaped) = unescape(code) {
                    value.push(unescaped);
                    self.input.pop();
                } else if let Some(width) = match code {
                    'x' => Some(2),
                    'u' => Some(4),
                    'U' => Some(8),
                    _ => None,
                } {
                    self.input.pop();
                    value.push(self.scan_hex_escape(width, start)?);
                } else if code.is_break() {
                    self.scan_line_break();
                    self.scan_flow_scalar_breaks(start, value)?;
                } else {
                    return Err(ScannerError::InvalidEscapeSequence {
                        ch: code,
                        location: self.mark(),
                    });
                }
            } else {
                return Ok(());
            }
        }
    }

    fn scan_hex_escape(&mut self, width: usize, start: SourceLocation) -> Result<char, ScannerError> {
        let digits = self.input.prefix(width);
        if digits.chars().count() != width || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(malformed(
                "a double-quoted scalar",
                start,
                format!("expected escape sequence of {width} hexadecimal numbers, but found {digits:?}"),
                self.mark(),
            ));
        }
        let location = self.mark();
        self.input.skip(width);
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| {
                malformed(
                    "a double-quoted scalar",
                    start,
                    format!("invalid Unicode code point {digits:?}"),
                    location,
                )
            })
    }

    fn scan_flow_scalar_spaces(
        &mut self,
        start: SourceLocation,
        value: &mut String,
    ) -> Result<(), ScannerError> {
        let mut length = 0;
        while self.input.peek_nth(length).is_blank() {
            length += 1;
        }
        let whitespace = self.input.take(length);
        if self.input.is_eof() {
            return Err(ScannerError::UnexpectedEof {
                context: "a quoted scalar",
                start,
                location: self.mark(),
            });
        }
        if let Some(line_break) = self.scan_line_break() {
            let mut breaks = String::new();
            self.scan_flow_scalar_breaks(start, &mut breaks)?;
            if line_break != '\n' {
                value.push(line_break);
            } else if breaks.is_empty() {
                value.push(' ');
            }
            value.push_str(&breaks);
        } else {
            value.push_str(&whitespace);
        }
        Ok(())
    }

    fn scan_flow_scalar_breaks(
        &mut self,
        start: SourceLocation,
        breaks: &mut String,
    ) -> Result<(), ScannerError> {
        loop {
            if self.at_document_indicator("---") || self.at_document_indicator("...") {
                return Err(malformed(
                    "a quoted scalar",
                    start,
                    "found unexpected document separator",
                    self.mark(),
                ));
            }
            self.skip_blanks();
            match self.scan_line_break() {
                Some(line_break) => breaks.push(line_break),
                None => return Ok(()),
            }
        }
    }

    fn scan_plain(&mut self) -> Result<Spanned<Token>, ScannerError> {
        let start = self.mark();
        let mut end = start;
        let indent = self.indent + 1;
        let mut value = String::new();
        let mut spaces = String::new();
        loop {
            if self.input.peek() == '#' {
                break;
            }
            let mut length = 0;
            loop {
                let ch = self.input.peek_nth(length);
                let next = self.input.peek_nth(length + 1);
                if ch.is_blankz()
                    || (ch == ':'
                        && (next.is_blankz() || (self.flow_level > 0 && next.is_flow_indicator())))
                    || (self.flow_level > 0 && ch.is_flow_indicator())
                {
                    break;
                }
                length += 1;
            }
            if length == 0 {
                break;
            }
            self.allow_simple_key = false;
            value.push_str(&spaces);
            value.push_str(&self.input.take(length));
            end = self.mark();
            spaces = match self.scan_plain_spaces(indent)? {
                Some(spaces) => spaces,
                None => break,
            };
            if spaces.is_empty()
                || self.input.peek() == '#'
                || (self.flow_level == 0 && (self.column() as isize) < indent)
            {
                break;
            }
        }
        Ok(Token::Scalar {
            value,
            style: ScalarStyle::Plain,
        }
        .in_span(start.until(end)))
    }

    /// Whitespace inside a plain scalar, folded. `None` ends the scalar at a
    /// document marker.
    fn scan_plain_spaces(&mut self, indent: isize) -> Result<Option<String>, ScannerError> {
        let mut length = 0;
        while self.input.peek_nth(length).is_blank() {
            length += 1;
        }
        let whitespace = self.input.take(length);
        let Some(line_break) = self.scan_line_break() else {
            return Ok(Some(whitespace));
        };
        self.allow_simple_key = true;
        if self.at_document_indicator("---") || self.at_document_indicator("...") {
            return Ok(None);
        }
        let mut breaks = String::new();
        loop {
            let ch = self.input.peek();
            if ch.is_blank() {
                if ch == '\t' && self.flow_level == 0 && (self.column() as isize) < indent {
                    return Err(ScannerError::TabIndentation {
                        location: self.mark(),
                    });
                }
                self.input.pop();
            } else if let Some(next_break) = self.scan_line_break() {
                breaks.push(next_break);
                if self.at_document_indicator("---") || self.at_document_indicator("...") {
                    return Ok(None);
                }
            } else {
                break;
            }
        }
        let mut folded = String::new();
        if line_break != '\n' {
            folded.push(line_break);
        } else if breaks.is_empty() {
            folded.push(' ');
        }
        folded.push_str(&breaks);
        Ok(Some(folded))
    }
}

impl Iterator for Scanner {
    type Item = Result<Spanned<Token>, ScannerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.next_token().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn assert_tokens_eq(input: &str, expected: &[Token]) {
        let tokens = Scanner::new(input)
            .map(|token| token.map(Spanned::into_inner))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let mut full = vec![Token::StreamStart];
        full.extend_from_slice(expected);
        full.push(Token::StreamEnd);
        assert_eq!(tokens, full);
    }

    #[track_caller]
    fn scan_err(input: &str) -> ScannerError {
        match Scanner::new(input).collect::<Result<Vec<_>, _>>() {
            Ok(tokens) => panic!("expected an error, got {tokens:?}"),
            Err(err) => err,
        }
    }

    #[track_caller]
    fn scalar_of(input: &str) -> (String, ScalarStyle) {
        for token in Scanner::new(input) {
            if let Token::Scalar { value, style } = token.unwrap().into_inner() {
                return (value, style);
            }
        }
        panic!("no scalar in {input:?}")
    }

    #[test]
    fn empty_stream() {
        assert_tokens_eq("", &[]);
        assert_tokens_eq("# only a comment\n", &[]);
    }

    #[test]
    fn block_mapping() {
        assert_tokens_eq(
            "a: 1\nb: 2",
            &[
                Token::BlockMappingStart,
                Token::Key,
                Token::plain("a"),
                Token::Value,
                Token::plain("1"),
                Token::Key,
                Token::plain("b"),
                Token::Value,
                Token::plain("2"),
                Token::BlockEnd,
            ],
        );
    }

    #[test]
    fn block_sequence() {
        assert_tokens_eq(
            "- a\n- b",
            &[
                Token::BlockSequenceStart,
                Token::BlockEntry,
                Token::plain("a"),
                Token::BlockEntry,
                Token::plain("b"),
                Token::BlockEnd,
            ],
        );
    }

    #[test]
    fn indentless_sequence_in_mapping() {
        assert_tokens_eq(
            "k:\n- a\n",
            &[
                Token::BlockMappingStart,
                Token::Key,
                Token::plain("k"),
                Token::Value,
                Token::BlockEntry,
                Token::plain("a"),
                Token::BlockEnd,
            ],
        );
    }

    #[test]
    fn flow_collections() {
        assert_tokens_eq(
            "[1, {a: b}]",
            &[
                Token::FlowSequenceStart,
                Token::plain("1"),
                Token::FlowEntry,
                Token::FlowMappingStart,
                Token::Key,
                Token::plain("a"),
                Token::Value,
                Token::plain("b"),
                Token::FlowMappingEnd,
                Token::FlowSequenceEnd,
            ],
        );
    }

    #[test]
    fn question_mark_inside_flow_plain() {
        assert_tokens_eq(
            "[a?b, http://x.y/?q=1]",
            &[
                Token::FlowSequenceStart,
                Token::plain("a?b"),
                Token::FlowEntry,
                Token::plain("http://x.y/?q=1"),
                Token::FlowSequenceEnd,
            ],
        );
        assert_tokens_eq(
            "{? a?b : c}",
            &[
                Token::FlowMappingStart,
                Token::Key,
                Token::plain("a?b"),
                Token::Value,
                Token::plain("c"),
                Token::FlowMappingEnd,
            ],
        );
    }

    #[test]
    fn properties() {
        assert_tokens_eq(
            "- &x !!int 1\n- *x",
            &[
                Token::BlockSequenceStart,
                Token::BlockEntry,
                Token::Anchor("x".into()),
                Token::tag("!!", "int"),
                Token::plain("1"),
                Token::BlockEntry,
                Token::Alias("x".into()),
                Token::BlockEnd,
            ],
        );
    }

    #[test]
    fn verbatim_and_non_specific_tags() {
        assert_tokens_eq(
            "!<tag:example.com,2000:x> a",
            &[
                Token::Tag {
                    handle: None,
                    suffix: "tag:example.com,2000:x".into(),
                },
                Token::plain("a"),
            ],
        );
        assert_tokens_eq(
            "! a",
            &[
                Token::Tag {
                    handle: None,
                    suffix: "!".into(),
                },
                Token::plain("a"),
            ],
        );
        assert_tokens_eq("!local a", &[Token::tag("!", "local"), Token::plain("a")]);
    }

    #[test]
    fn directives() {
        assert_tokens_eq(
            "%YAML 1.1\n%TAG !e! tag:example.com,2000:\n--- a\n...",
            &[
                Token::VersionDirective(1, 1),
                Token::TagDirective {
                    handle: "!e!".into(),
                    prefix: "tag:example.com,2000:".into(),
                },
                Token::DocumentStart,
                Token::plain("a"),
                Token::DocumentEnd,
            ],
        );
    }

    #[test]
    fn unknown_directive_is_skipped() {
        assert_tokens_eq("%FOO bar baz\n--- a", &[Token::DocumentStart, Token::plain("a")]);
    }

    #[test]
    fn literal_block() {
        assert_eq!(
            scalar_of("|\n  line1\n  line2\n"),
            ("line1\nline2\n".to_owned(), ScalarStyle::Literal)
        );
        assert_eq!(scalar_of("|-\n  a\n\n").0, "a");
        assert_eq!(scalar_of("|+\n  a\n\n").0, "a\n\n");
        assert_eq!(scalar_of("|2\n    indented\n").0, "  indented\n");
    }

    #[test]
    fn folded_block() {
        assert_eq!(
            scalar_of(">\n  a\n  b\n\n  c\n"),
            ("a b\nc\n".to_owned(), ScalarStyle::Folded)
        );
        assert_eq!(scalar_of(">-\n  a\n   b\n").0, "a\n b");
    }

    #[test]
    fn quoted_scalars() {
        assert_eq!(
            scalar_of("'it''s'"),
            ("it's".to_owned(), ScalarStyle::SingleQuoted)
        );
        assert_eq!(
            scalar_of(r#""a\tb\u263A\x41""#),
            ("a\tb\u{263a}A".to_owned(), ScalarStyle::DoubleQuoted)
        );
        assert_eq!(scalar_of("\"one\n  two\n\n  three\"").0, "one two\nthree");
        assert_eq!(scalar_of("\"joined\\\n  here\"").0, "joinedhere");
    }

    #[test]
    fn multiline_plain() {
        assert_eq!(scalar_of("- a\n  b\n"), ("a b".to_owned(), ScalarStyle::Plain));
        assert_eq!(scalar_of("a b # comment").0, "a b");
        assert_eq!(scalar_of("http://x.y/z").0, "http://x.y/z");
    }

    #[test]
    fn plain_stops_at_document_marker() {
        assert_tokens_eq(
            "a\n---\nb",
            &[
                Token::plain("a"),
                Token::DocumentStart,
                Token::plain("b"),
            ],
        );
    }

    #[test]
    fn tab_between_tokens() {
        assert_tokens_eq(
            "a:\tb",
            &[
                Token::BlockMappingStart,
                Token::Key,
                Token::plain("a"),
                Token::Value,
                Token::plain("b"),
                Token::BlockEnd,
            ],
        );
    }

    #[test]
    fn tab_indentation_is_an_error() {
        assert_eq!(
            scan_err("k:\n\t- a"),
            ScannerError::UnexpectedChar {
                ch: '\t',
                location: SourceLocation {
                    offset: 3,
                    line: 1,
                    column: 0
                }
            }
        );
        assert!(matches!(
            scan_err("k: a\n\tb"),
            ScannerError::TabIndentation { .. }
        ));
    }

    #[test]
    fn unterminated_quoted_scalar() {
        assert!(matches!(
            scan_err("\"abc"),
            ScannerError::UnexpectedEof {
                context: "a quoted scalar",
                ..
            }
        ));
    }

    #[test]
    fn invalid_escape() {
        assert!(matches!(
            scan_err(r#"k: "\q""#),
            ScannerError::InvalidEscapeSequence { ch: 'q', .. }
        ));
    }

    #[test]
    fn reserved_indicator() {
        assert!(matches!(
            scan_err("@x"),
            ScannerError::UnexpectedChar { ch: '@', .. }
        ));
    }

    #[test]
    fn nested_mapping_value_on_one_line() {
        assert!(matches!(
            scan_err("a: b: c"),
            ScannerError::NotAllowedHere {
                what: "mapping values",
                ..
            }
        ));
    }

    #[test]
    fn simple_key_length_limit() {
        let input = format!("{}: b", "a".repeat(1100));
        assert!(matches!(
            scan_err(&input),
            ScannerError::NotAllowedHere {
                what: "mapping values",
                ..
            }
        ));
    }

    #[test]
    fn required_simple_key_missing() {
        let err = scan_err("a: 1\nb\n");
        match err {
            ScannerError::SimpleKeyNotFound { start, .. } => {
                assert_eq!(start.line, 1);
                assert_eq!(start.column, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_block_indicator() {
        assert!(matches!(
            scan_err("|0\n a"),
            ScannerError::Malformed {
                context: "a block scalar",
                ..
            }
        ));
    }
}
