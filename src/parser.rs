use std::collections::HashMap;

use crate::{
    error::Error, CollectionEvent, CollectionStyle, Event, Implicit, ScalarEvent, ScalarStyle,
    Scanner, SourceLocation, Span, Spanned, SpannedExt, Token, TokenType,
};

/// Handles every document starts with, before its own `%TAG` directives.
const DEFAULT_TAG_HANDLES: [(&str, &str); 2] = [("!", "!"), ("!!", "tag:yaml.org,2002:")];

/// Turns tokens into events, one document after the other.
pub struct Parser {
    scanner: Scanner,
    state: ParserState,
    states: Vec<ParserState>,
    marks: Vec<SourceLocation>,
    tag_handles: HashMap<String, String>,
    peeked: Option<Spanned<Event>>,
    last: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    StreamStart,
    ImplicitDocumentStart,
    DocumentStart,
    DocumentEnd,
    DocumentContent,
    BlockNode,
    BlockSequenceFirstEntry,
    BlockSequenceEntry,
    IndentlessSequenceEntry,
    BlockMappingFirstKey,
    BlockMappingKey,
    BlockMappingValue,
    FlowSequenceFirstEntry,
    FlowSequenceEntry,
    FlowSequenceEntryMappingKey,
    FlowSequenceEntryMappingValue,
    FlowSequenceEntryMappingEnd,
    FlowMappingFirstKey,
    FlowMappingKey,
    FlowMappingValue,
    FlowMappingEmptyValue,
    End,
}

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum ParserError {
    #[error("while parsing {context} at {context_location}: expected {expected}, but found {found} at {location}")]
    UnexpectedToken {
        context: &'static str,
        context_location: SourceLocation,
        expected: &'static str,
        found: TokenType,
        location: SourceLocation,
    },
    #[error("expected '<document start>', but found {found} at {location}")]
    MissingDocumentStart {
        found: TokenType,
        location: SourceLocation,
    },
    #[error("while parsing a node at {context_location}: found undefined tag handle {handle:?} at {location}")]
    UndefinedTagHandle {
        handle: String,
        context_location: SourceLocation,
        location: SourceLocation,
    },
    #[error("found duplicate YAML directive at {location}")]
    DuplicateVersionDirective { location: SourceLocation },
    #[error("found incompatible YAML document (version 1.* is required, got {major}.{minor}) at {location}")]
    IncompatibleVersion {
        major: u32,
        minor: u32,
        location: SourceLocation,
    },
    #[error("found duplicate tag handle {handle:?} at {location}")]
    DuplicateTagHandle {
        handle: String,
        location: SourceLocation,
    },
    #[error("unexpected end of token stream at {location}")]
    UnexpectedEnd { location: SourceLocation },
}

impl ParserError {
    pub fn location(&self) -> SourceLocation {
        match self {
            ParserError::UnexpectedToken { location, .. }
            | ParserError::MissingDocumentStart { location, .. }
            | ParserError::UndefinedTagHandle { location, .. }
            | ParserError::DuplicateVersionDirective { location }
            | ParserError::IncompatibleVersion { location, .. }
            | ParserError::DuplicateTagHandle { location, .. }
            | ParserError::UnexpectedEnd { location } => *location,
        }
    }

    pub fn context_location(&self) -> Option<SourceLocation> {
        match self {
            ParserError::UnexpectedToken {
                context_location, ..
            }
            | ParserError::UndefinedTagHandle {
                context_location, ..
            } => Some(*context_location),
            _ => None,
        }
    }
}

fn empty_scalar(location: SourceLocation) -> Spanned<Event> {
    Event::Scalar(ScalarEvent {
        anchor: None,
        tag: None,
        implicit: Implicit {
            plain: true,
            quoted: false,
        },
        value: String::new(),
        style: Some(ScalarStyle::Plain),
    })
    .in_span(Span::empty(location))
}

impl Parser {
    pub fn new(text: &str) -> Self {
        Self {
            scanner: Scanner::new(text),
            state: ParserState::StreamStart,
            states: Vec::new(),
            marks: Vec::new(),
            tag_handles: HashMap::new(),
            peeked: None,
            last: SourceLocation::default(),
        }
    }

    /// The next event, or `None` after `StreamEnd`.
    pub fn next_event(&mut self) -> Result<Option<Spanned<Event>>, Error> {
        if let Some(event) = self.peeked.take() {
            return Ok(Some(event));
        }
        if self.state == ParserState::End {
            return Ok(None);
        }
        let event = self.state_machine()?;
        log::trace!("event {:?} at {}", event.value, event.span.start);
        Ok(Some(event))
    }

    pub fn peek_event(&mut self) -> Result<Option<&Spanned<Event>>, Error> {
        if self.peeked.is_none() {
            self.peeked = self.next_event()?;
        }
        Ok(self.peeked.as_ref())
    }

    fn peek_token(&mut self) -> Result<(TokenType, Span), Error> {
        match self.scanner.peek_token()? {
            Some(token) => Ok((token.ty(), token.span)),
            None => Ok((TokenType::StreamEnd, Span::empty(self.last))),
        }
    }

    fn next_token(&mut self) -> Result<Spanned<Token>, Error> {
        match self.scanner.next_token()? {
            Some(token) => {
                self.last = token.span.end;
                Ok(token)
            }
            None => Err(ParserError::UnexpectedEnd {
                location: self.last,
            }
            .into()),
        }
    }

    #[inline]
    fn check(&mut self, types: &[TokenType]) -> Result<bool, Error> {
        let (ty, _) = self.peek_token()?;
        Ok(types.contains(&ty))
    }

    #[inline]
    fn pop_state(&mut self) -> ParserState {
        self.states.pop().unwrap_or(ParserState::End)
    }

    fn state_machine(&mut self) -> Result<Spanned<Event>, Error> {
        match self.state {
            ParserState::StreamStart => self.parse_stream_start(),
            ParserState::ImplicitDocumentStart => self.parse_implicit_document_start(),
            ParserState::DocumentStart => self.parse_document_start(),
            ParserState::DocumentEnd => self.parse_document_end(),
            ParserState::DocumentContent => self.parse_document_content(),
            ParserState::BlockNode => self.parse_node(true, false),
            ParserState::BlockSequenceFirstEntry => {
                let token = self.next_token()?;
                self.marks.push(token.span.start);
                self.parse_block_sequence_entry()
            }
            ParserState::BlockSequenceEntry => self.parse_block_sequence_entry(),
            ParserState::IndentlessSequenceEntry => self.parse_indentless_sequence_entry(),
            ParserState::BlockMappingFirstKey => {
                let token = self.next_token()?;
                self.marks.push(token.span.start);
                self.parse_block_mapping_key()
            }
            ParserState::BlockMappingKey => self.parse_block_mapping_key(),
            ParserState::BlockMappingValue => self.parse_block_mapping_value(),
            ParserState::FlowSequenceFirstEntry => {
                let token = self.next_token()?;
                self.marks.push(token.span.start);
                self.parse_flow_sequence_entry(true)
            }
            ParserState::FlowSequenceEntry => self.parse_flow_sequence_entry(false),
            ParserState::FlowSequenceEntryMappingKey => self.parse_flow_sequence_entry_mapping_key(),
            ParserState::FlowSequenceEntryMappingValue => {
                self.parse_flow_sequence_entry_mapping_value()
            }
            ParserState::FlowSequenceEntryMappingEnd => {
                self.state = ParserState::FlowSequenceEntry;
                let (_, span) = self.peek_token()?;
                Ok(Event::MappingEnd.in_span(Span::empty(span.start)))
            }
            ParserState::FlowMappingFirstKey => {
                let token = self.next_token()?;
                self.marks.push(token.span.start);
                self.parse_flow_mapping_key(true)
            }
            ParserState::FlowMappingKey => self.parse_flow_mapping_key(false),
            ParserState::FlowMappingValue => self.parse_flow_mapping_value(),
            ParserState::FlowMappingEmptyValue => {
                self.state = ParserState::FlowMappingKey;
                let (_, span) = self.peek_token()?;
                Ok(empty_scalar(span.start))
            }
            ParserState::End => Err(ParserError::UnexpectedEnd {
                location: self.last,
            }
            .into()),
        }
    }

    fn parse_stream_start(&mut self) -> Result<Spanned<Event>, Error> {
        let token = self.next_token()?;
        self.state = ParserState::ImplicitDocumentStart;
        Ok(Event::StreamStart.in_span(token.span))
    }

    fn parse_implicit_document_start(&mut self) -> Result<Spanned<Event>, Error> {
        if self.check(&[
            TokenType::VersionDirective,
            TokenType::TagDirective,
            TokenType::DocumentStart,
            TokenType::StreamEnd,
        ])? {
            return self.parse_document_start();
        }
        self.reset_tag_handles();
        let (_, span) = self.peek_token()?;
        self.states.push(ParserState::DocumentEnd);
        self.state = ParserState::BlockNode;
        Ok(Event::document_start(false).in_span(Span::empty(span.start)))
    }

    fn parse_document_start(&mut self) -> Result<Spanned<Event>, Error> {
        while self.check(&[TokenType::DocumentEnd])? {
            self.next_token()?;
        }

        let (ty, span) = self.peek_token()?;
        if ty == TokenType::StreamEnd {
            let token = self.next_token()?;
            self.state = ParserState::End;
            return Ok(Event::StreamEnd.in_span(token.span));
        }

        let start = span.start;
        let (version, tags) = self.process_directives()?;
        let (ty, span) = self.peek_token()?;
        if ty != TokenType::DocumentStart {
            return Err(ParserError::MissingDocumentStart {
                found: ty,
                location: span.start,
            }
            .into());
        }
        let token = self.next_token()?;
        self.states.push(ParserState::DocumentEnd);
        self.state = ParserState::DocumentContent;
        Ok(Event::DocumentStart {
            explicit: true,
            version,
            tags,
        }
        .in_span(start.until(token.span.end)))
    }

    fn parse_document_end(&mut self) -> Result<Spanned<Event>, Error> {
        let (ty, span) = self.peek_token()?;
        let mut end = span.start;
        let explicit = ty == TokenType::DocumentEnd;
        if explicit {
            end = self.next_token()?.span.end;
        }
        self.state = ParserState::DocumentStart;
        Ok(Event::DocumentEnd { explicit }.in_span(span.start.until(end)))
    }

    fn parse_document_content(&mut self) -> Result<Spanned<Event>, Error> {
        if self.check(&[
            TokenType::VersionDirective,
            TokenType::TagDirective,
            TokenType::DocumentStart,
            TokenType::DocumentEnd,
            TokenType::StreamEnd,
        ])? {
            let (_, span) = self.peek_token()?;
            self.state = self.pop_state();
            return Ok(empty_scalar(span.start));
        }
        self.parse_node(true, false)
    }

    fn reset_tag_handles(&mut self) {
        self.tag_handles = DEFAULT_TAG_HANDLES
            .iter()
            .map(|(handle, prefix)| (handle.to_string(), prefix.to_string()))
            .collect();
    }

    #[allow(clippy::type_complexity)]
    fn process_directives(
        &mut self,
    ) -> Result<(Option<(u32, u32)>, Vec<(String, String)>), Error> {
        let mut version = None;
        let mut tags: Vec<(String, String)> = Vec::new();
        loop {
            let (ty, span) = self.peek_token()?;
            if ty != TokenType::VersionDirective && ty != TokenType::TagDirective {
                break;
            }
            match self.next_token()?.into_inner() {
                Token::VersionDirective(major, minor) => {
                    if version.is_some() {
                        return Err(ParserError::DuplicateVersionDirective {
                            location: span.start,
                        }
                        .into());
                    }
                    if major != 1 {
                        return Err(ParserError::IncompatibleVersion {
                            major,
                            minor,
                            location: span.start,
                        }
                        .into());
                    }
                    version = Some((major, minor));
                }
                Token::TagDirective { handle, prefix } => {
                    if tags.iter().any(|(existing, _)| *existing == handle) {
                        return Err(ParserError::DuplicateTagHandle {
                            handle,
                            location: span.start,
                        }
                        .into());
                    }
                    tags.push((handle, prefix));
                }
                _ => {}
            }
        }
        self.reset_tag_handles();
        for (handle, prefix) in &tags {
            self.tag_handles.insert(handle.clone(), prefix.clone());
        }
        Ok((version, tags))
    }

    fn parse_node(&mut self, block: bool, indentless_sequence: bool) -> Result<Spanned<Event>, Error> {
        let (ty, span) = self.peek_token()?;
        if ty == TokenType::Alias {
            let token = self.next_token()?;
            self.state = self.pop_state();
            let name = match token.value {
                Token::Alias(name) => name,
                _ => String::new(),
            };
            return Ok(Event::Alias(name).in_span(token.span));
        }

        let mut anchor = None;
        let mut tag = None;
        let mut start = None;
        let mut end = span.start;
        loop {
            let (ty, span) = self.peek_token()?;
            let wanted = match ty {
                TokenType::Anchor => anchor.is_none(),
                TokenType::Tag => tag.is_none(),
                _ => false,
            };
            if !wanted {
                break;
            }
            let token = self.next_token()?;
            start.get_or_insert(span.start);
            end = span.end;
            match token.value {
                Token::Anchor(name) => anchor = Some(name),
                Token::Tag { handle, suffix } => {
                    tag = Some(self.resolve_tag(handle, suffix, span.start, start)?);
                }
                _ => {}
            }
        }

        let (ty, span) = self.peek_token()?;
        let start = start.unwrap_or(span.start);
        let implicit = tag.is_none() || tag.as_deref() == Some("!");

        if indentless_sequence && ty == TokenType::BlockEntry {
            self.state = ParserState::IndentlessSequenceEntry;
            return Ok(Event::SequenceStart(CollectionEvent {
                anchor,
                tag,
                implicit,
                style: CollectionStyle::Block,
            })
            .in_span(start.until(span.end)));
        }

        match ty {
            TokenType::Scalar => {
                let token = self.next_token()?;
                let Token::Scalar { value, style } = token.value else {
                    return Err(ParserError::UnexpectedEnd { location: span.start }.into());
                };
                let implicit = if (style == ScalarStyle::Plain && tag.is_none())
                    || tag.as_deref() == Some("!")
                {
                    Implicit {
                        plain: true,
                        quoted: false,
                    }
                } else if tag.is_none() {
                    Implicit {
                        plain: false,
                        quoted: true,
                    }
                } else {
                    Implicit::default()
                };
                self.state = self.pop_state();
                Ok(Event::Scalar(ScalarEvent {
                    anchor,
                    tag,
                    implicit,
                    value,
                    style: Some(style),
                })
                .in_span(start.until(token.span.end)))
            }
            TokenType::FlowSequenceStart => {
                self.state = ParserState::FlowSequenceFirstEntry;
                Ok(Event::SequenceStart(CollectionEvent {
                    anchor,
                    tag,
                    implicit,
                    style: CollectionStyle::Flow,
                })
                    .in_span(start.until(span.end)))
            }
            TokenType::FlowMappingStart => {
                self.state = ParserState::FlowMappingFirstKey;
                Ok(Event::MappingStart(CollectionEvent {
                    anchor,
                    tag,
                    implicit,
                    style: CollectionStyle::Flow,
                })
                    .in_span(start.until(span.end)))
            }
            TokenType::BlockSequenceStart if block => {
                self.state = ParserState::BlockSequenceFirstEntry;
                Ok(Event::SequenceStart(CollectionEvent {
                    anchor,
                    tag,
                    implicit,
                    style: CollectionStyle::Block,
                })
                    .in_span(start.until(span.end)))
            }
            TokenType::BlockMappingStart if block => {
                self.state = ParserState::BlockMappingFirstKey;
                Ok(Event::MappingStart(CollectionEvent {
                    anchor,
                    tag,
                    implicit,
                    style: CollectionStyle::Block,
                })
                    .in_span(start.until(span.end)))
            }
            _ if anchor.is_some() || tag.is_some() => {
                // A node with properties but no content is an empty scalar.
                self.state = self.pop_state();
                Ok(Event::Scalar(ScalarEvent {
                    anchor,
                    tag,
                    implicit: Implicit {
                        plain: implicit,
                        quoted: false,
                    },
                    value: String::new(),
                    style: Some(ScalarStyle::Plain),
                })
                .in_span(start.until(end)))
            }
            _ => Err(ParserError::UnexpectedToken {
                context: if block { "a block node" } else { "a flow node" },
                context_location: start,
                expected: "the node content",
                found: ty,
                location: span.start,
            }
            .into()),
        }
    }

    fn resolve_tag(
        &self,
        handle: Option<String>,
        suffix: String,
        location: SourceLocation,
        node_start: Option<SourceLocation>,
    ) -> Result<String, Error> {
        let Some(handle) = handle else {
            return Ok(suffix);
        };
        match self.tag_handles.get(&handle) {
            Some(prefix) => Ok(format!("{prefix}{suffix}")),
            None => Err(ParserError::UndefinedTagHandle {
                handle,
                context_location: node_start.unwrap_or(location),
                location,
            }
            .into()),
        }
    }

    fn unexpected(
        &mut self,
        context: &'static str,
        expected: &'static str,
    ) -> Result<Spanned<Event>, Error> {
        let (found, span) = self.peek_token()?;
        Err(ParserError::UnexpectedToken {
            context,
            context_location: self.marks.last().copied().unwrap_or_default(),
            expected,
            found,
            location: span.start,
        }
        .into())
    }

    fn close_collection(&mut self, event: Event) -> Result<Spanned<Event>, Error> {
        let token = self.next_token()?;
        self.state = self.pop_state();
        self.marks.pop();
        Ok(event.in_span(token.span))
    }

    fn parse_block_sequence_entry(&mut self) -> Result<Spanned<Event>, Error> {
        if self.check(&[TokenType::BlockEntry])? {
            let token = self.next_token()?;
            if self.check(&[TokenType::BlockEntry, TokenType::BlockEnd])? {
                self.state = ParserState::BlockSequenceEntry;
                return Ok(empty_scalar(token.span.end));
            }
            self.states.push(ParserState::BlockSequenceEntry);
            return self.parse_node(true, false);
        }
        if !self.check(&[TokenType::BlockEnd])? {
            return self.unexpected("a block collection", "<block end>");
        }
        self.close_collection(Event::SequenceEnd)
    }

    fn parse_indentless_sequence_entry(&mut self) -> Result<Spanned<Event>, Error> {
        if self.check(&[TokenType::BlockEntry])? {
            let token = self.next_token()?;
            if self.check(&[
                TokenType::BlockEntry,
                TokenType::Key,
                TokenType::Value,
                TokenType::BlockEnd,
            ])? {
                self.state = ParserState::IndentlessSequenceEntry;
                return Ok(empty_scalar(token.span.end));
            }
            self.states.push(ParserState::IndentlessSequenceEntry);
            return self.parse_node(true, false);
        }
        let (_, span) = self.peek_token()?;
        self.state = self.pop_state();
        Ok(Event::SequenceEnd.in_span(Span::empty(span.start)))
    }

    fn parse_block_mapping_key(&mut self) -> Result<Spanned<Event>, Error> {
        if self.check(&[TokenType::Key])? {
            let token = self.next_token()?;
            if self.check(&[TokenType::Key, TokenType::Value, TokenType::BlockEnd])? {
                self.state = ParserState::BlockMappingValue;
                return Ok(empty_scalar(token.span.end));
            }
            self.states.push(ParserState::BlockMappingValue);
            return self.parse_node(true, true);
        }
        if !self.check(&[TokenType::BlockEnd])? {
            return self.unexpected("a block mapping", "<block end>");
        }
        self.close_collection(Event::MappingEnd)
    }

    fn parse_block_mapping_value(&mut self) -> Result<Spanned<Event>, Error> {
        if self.check(&[TokenType::Value])? {
            let token = self.next_token()?;
            if self.check(&[TokenType::Key, TokenType::Value, TokenType::BlockEnd])? {
                self.state = ParserState::BlockMappingKey;
                return Ok(empty_scalar(token.span.end));
            }
            self.states.push(ParserState::BlockMappingKey);
            return self.parse_node(true, true);
        }
        self.state = ParserState::BlockMappingKey;
        let (_, span) = self.peek_token()?;
        Ok(empty_scalar(span.start))
    }

    fn parse_flow_sequence_entry(&mut self, first: bool) -> Result<Spanned<Event>, Error> {
        if !self.check(&[TokenType::FlowSequenceEnd])? {
            if !first {
                if self.check(&[TokenType::FlowEntry])? {
                    self.next_token()?;
                } else {
                    return self.unexpected("a flow sequence", "',' or ']'");
                }
            }
            let (ty, span) = self.peek_token()?;
            if ty == TokenType::Key {
                self.state = ParserState::FlowSequenceEntryMappingKey;
                return Ok(Event::begin_mapping(CollectionStyle::Flow).in_span(span));
            }
            if ty != TokenType::FlowSequenceEnd {
                self.states.push(ParserState::FlowSequenceEntry);
                return self.parse_node(false, false);
            }
        }
        self.close_collection(Event::SequenceEnd)
    }

    fn parse_flow_sequence_entry_mapping_key(&mut self) -> Result<Spanned<Event>, Error> {
        let token = self.next_token()?;
        if self.check(&[
            TokenType::Value,
            TokenType::FlowEntry,
            TokenType::FlowSequenceEnd,
        ])? {
            self.state = ParserState::FlowSequenceEntryMappingValue;
            return Ok(empty_scalar(token.span.end));
        }
        self.states.push(ParserState::FlowSequenceEntryMappingValue);
        self.parse_node(false, false)
    }

    fn parse_flow_sequence_entry_mapping_value(&mut self) -> Result<Spanned<Event>, Error> {
        if self.check(&[TokenType::Value])? {
            let token = self.next_token()?;
            if self.check(&[TokenType::FlowEntry, TokenType::FlowSequenceEnd])? {
                self.state = ParserState::FlowSequenceEntryMappingEnd;
                return Ok(empty_scalar(token.span.end));
            }
            self.states.push(ParserState::FlowSequenceEntryMappingEnd);
            return self.parse_node(false, false);
        }
        self.state = ParserState::FlowSequenceEntryMappingEnd;
        let (_, span) = self.peek_token()?;
        Ok(empty_scalar(span.start))
    }

    fn parse_flow_mapping_key(&mut self, first: bool) -> Result<Spanned<Event>, Error> {
        if !self.check(&[TokenType::FlowMappingEnd])? {
            if !first {
                if self.check(&[TokenType::FlowEntry])? {
                    self.next_token()?;
                } else {
                    return self.unexpected("a flow mapping", "',' or '}'");
                }
            }
            let (ty, _) = self.peek_token()?;
            if ty == TokenType::Key {
                let token = self.next_token()?;
                if self.check(&[
                    TokenType::Value,
                    TokenType::FlowEntry,
                    TokenType::FlowMappingEnd,
                ])? {
                    self.state = ParserState::FlowMappingValue;
                    return Ok(empty_scalar(token.span.end));
                }
                self.states.push(ParserState::FlowMappingValue);
                return self.parse_node(false, false);
            }
            if ty != TokenType::FlowMappingEnd {
                self.states.push(ParserState::FlowMappingEmptyValue);
                return self.parse_node(false, false);
            }
        }
        self.close_collection(Event::MappingEnd)
    }

    fn parse_flow_mapping_value(&mut self) -> Result<Spanned<Event>, Error> {
        if self.check(&[TokenType::Value])? {
            let token = self.next_token()?;
            if self.check(&[TokenType::FlowEntry, TokenType::FlowMappingEnd])? {
                self.state = ParserState::FlowMappingKey;
                return Ok(empty_scalar(token.span.end));
            }
            self.states.push(ParserState::FlowMappingKey);
            return self.parse_node(false, false);
        }
        self.state = ParserState::FlowMappingKey;
        let (_, span) = self.peek_token()?;
        Ok(empty_scalar(span.start))
    }
}

impl Iterator for Parser {
    type Item = Result<Spanned<Event>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(event) => event.map(Ok),
            Err(err) => {
                self.state = ParserState::End;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn assert_events_eq(input: &str, expected: &[Event]) {
        let events = Parser::new(input)
            .map(|event| event.map(Spanned::into_inner))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(events, expected);
    }

    #[track_caller]
    fn parse_err(input: &str) -> ParserError {
        match Parser::new(input).collect::<Result<Vec<_>, _>>() {
            Ok(events) => panic!("expected an error, got {events:?}"),
            Err(Error::Parser(err)) => err,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    fn doc(explicit: bool, body: &[Event]) -> Vec<Event> {
        let mut events = vec![Event::document_start(explicit)];
        events.extend_from_slice(body);
        events.push(Event::DocumentEnd { explicit: false });
        events
    }

    fn stream(documents: &[Vec<Event>]) -> Vec<Event> {
        let mut events = vec![Event::StreamStart];
        for document in documents {
            events.extend_from_slice(document);
        }
        events.push(Event::StreamEnd);
        events
    }

    #[test]
    fn empty_stream() {
        assert_events_eq("", &stream(&[]));
    }

    #[test]
    fn block_mapping_with_sequence() {
        assert_events_eq(
            "a: 1\nb:\n- x\n- y\n",
            &stream(&[doc(
                false,
                &[
                    Event::begin_mapping(CollectionStyle::Block),
                    Event::plain("a"),
                    Event::plain("1"),
                    Event::plain("b"),
                    Event::begin_sequence(CollectionStyle::Block),
                    Event::plain("x"),
                    Event::plain("y"),
                    Event::SequenceEnd,
                    Event::MappingEnd,
                ],
            )]),
        );
    }

    #[test]
    fn flow_collections() {
        assert_events_eq(
            "[a, {b: c}, d: e]",
            &stream(&[doc(
                false,
                &[
                    Event::begin_sequence(CollectionStyle::Flow),
                    Event::plain("a"),
                    Event::begin_mapping(CollectionStyle::Flow),
                    Event::plain("b"),
                    Event::plain("c"),
                    Event::MappingEnd,
                    Event::begin_mapping(CollectionStyle::Flow),
                    Event::plain("d"),
                    Event::plain("e"),
                    Event::MappingEnd,
                    Event::SequenceEnd,
                ],
            )]),
        );
    }

    #[test]
    fn empty_values() {
        assert_events_eq(
            "a:\n? b\n",
            &stream(&[doc(
                false,
                &[
                    Event::begin_mapping(CollectionStyle::Block),
                    Event::plain("a"),
                    Event::plain(""),
                    Event::plain("b"),
                    Event::plain(""),
                    Event::MappingEnd,
                ],
            )]),
        );
    }

    #[test]
    fn anchors_tags_and_aliases() {
        assert_events_eq(
            "- &a !!str x\n- *a\n- !!null\n",
            &stream(&[doc(
                false,
                &[
                    Event::begin_sequence(CollectionStyle::Block),
                    Event::plain("x")
                        .with_anchor("a")
                        .with_tag("tag:yaml.org,2002:str"),
                    Event::alias("a"),
                    Event::plain("").with_tag("tag:yaml.org,2002:null"),
                    Event::SequenceEnd,
                ],
            )]),
        );
    }

    #[test]
    fn quoted_scalars_are_not_plain_implicit() {
        assert_events_eq(
            "'1'",
            &stream(&[doc(false, &[Event::scalar("1", ScalarStyle::SingleQuoted)])]),
        );
    }

    #[test]
    fn multiple_documents() {
        let mut second = doc(true, &[Event::plain("b")]);
        second[2] = Event::DocumentEnd { explicit: true };
        assert_events_eq(
            "a\n--- b\n...\n",
            &stream(&[doc(false, &[Event::plain("a")]), second]),
        );
    }

    #[test]
    fn tag_directive() {
        let events = Parser::new("%TAG !e! tag:example.com,2000:\n--- !e!foo bar")
            .map(|event| event.map(Spanned::into_inner))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(
            events[1],
            Event::DocumentStart {
                explicit: true,
                version: None,
                tags: vec![("!e!".into(), "tag:example.com,2000:".into())],
            }
        );
        assert_eq!(
            events[2],
            Event::plain("bar").with_tag("tag:example.com,2000:foo")
        );
    }

    #[test]
    fn unclosed_flow_sequence() {
        match parse_err("a: [1, 2") {
            ParserError::UnexpectedToken {
                context,
                context_location,
                found,
                ..
            } => {
                assert_eq!(context, "a flow sequence");
                assert_eq!(context_location.column, 3);
                assert_eq!(found, TokenType::StreamEnd);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn undefined_tag_handle() {
        assert!(matches!(
            parse_err("!x!y z"),
            ParserError::UndefinedTagHandle { .. }
        ));
    }

    #[test]
    fn directive_errors() {
        assert!(matches!(
            parse_err("%YAML 2.0\n--- a"),
            ParserError::IncompatibleVersion { major: 2, .. }
        ));
        assert!(matches!(
            parse_err("%YAML 1.1\n%YAML 1.1\n--- a"),
            ParserError::DuplicateVersionDirective { .. }
        ));
        assert!(matches!(
            parse_err("%TAG !a! x:\n%TAG !a! y:\n--- a"),
            ParserError::DuplicateTagHandle { .. }
        ));
    }

    #[test]
    fn content_after_document_end() {
        assert!(matches!(
            parse_err("a\n...\nb"),
            ParserError::MissingDocumentStart { .. }
        ));
    }

    #[test]
    fn bad_block_structure() {
        assert!(matches!(
            parse_err("- a\nb: c"),
            ParserError::UnexpectedToken { .. }
        ));
    }
}
