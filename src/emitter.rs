use std::collections::{BTreeMap, VecDeque};

use crate::{
    resolver::TAG_PREFIX, CollectionEvent, CollectionStyle, DumpConfig, Event, EventSink,
    ScalarAnalysis, ScalarEvent, ScalarFlags, ScalarStyle,
};

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum EmitterError {
    #[error("invalid dump configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported YAML version: {0}.{1}")]
    UnsupportedVersion(u32, u32),
    #[error("expected {expected}, but got {found}")]
    UnexpectedEvent {
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid anchor {0:?}: only alphanumerical characters, '-' and '_' are allowed")]
    InvalidAnchor(String),
    #[error("invalid tag handle {0:?}")]
    InvalidTagHandle(String),
    #[error("tag prefix must not be empty")]
    EmptyTagPrefix,
    #[error("tag must not be empty")]
    EmptyTag,
    #[error("tag is not specified")]
    MissingTag,
    #[error("failed to write output")]
    Write(#[from] std::fmt::Error),
}

/// Whether the output so far could be read as running on into the next
/// document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpenEnded {
    No,
    /// A document ended without `...`. Directives must not follow directly.
    Implicit,
    /// A keep-chomped block scalar was written, so the stream has to be
    /// closed with `...`.
    Kept,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    StreamStart,
    FirstDocumentStart,
    DocumentStart,
    DocumentRoot,
    DocumentEnd,
    FirstFlowSequenceItem,
    FlowSequenceItem,
    FirstFlowMappingKey,
    FlowMappingKey,
    FlowMappingSimpleValue,
    FlowMappingValue,
    FirstBlockSequenceItem,
    BlockSequenceItem,
    FirstBlockMappingKey,
    BlockMappingKey,
    BlockMappingSimpleValue,
    BlockMappingValue,
    End,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Context {
    Root,
    Sequence,
    Mapping,
    SimpleKey,
}

#[inline]
fn is_break(ch: char) -> bool {
    matches!(ch, '\n' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

fn escape_replacement(ch: char) -> Option<char> {
    Some(match ch {
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

fn percent_encode(ch: char, out: &mut String) {
    let mut buffer = [0; 4];
    for byte in ch.encode_utf8(&mut buffer).bytes() {
        out.push_str(&format!("%{byte:02X}"));
    }
}

fn default_tag_prefixes() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("!".to_owned(), "!".to_owned()),
        (TAG_PREFIX.to_owned(), "!!".to_owned()),
    ])
}

fn prepare_anchor(anchor: &str) -> Result<String, EmitterError> {
    if anchor.is_empty()
        || !anchor
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(EmitterError::InvalidAnchor(anchor.to_owned()));
    }
    Ok(anchor.to_owned())
}

fn prepare_tag_handle(handle: &str) -> Result<&str, EmitterError> {
    let inner = handle
        .strip_prefix('!')
        .and_then(|rest| if rest.is_empty() { Some(rest) } else { rest.strip_suffix('!') });
    match inner {
        Some(inner)
            if inner
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_') =>
        {
            Ok(handle)
        }
        _ => Err(EmitterError::InvalidTagHandle(handle.to_owned())),
    }
}

fn prepare_tag_prefix(prefix: &str) -> Result<String, EmitterError> {
    if prefix.is_empty() {
        return Err(EmitterError::EmptyTagPrefix);
    }
    let mut text = String::with_capacity(prefix.len());
    let rest = match prefix.strip_prefix('!') {
        Some(rest) => {
            text.push('!');
            rest
        }
        None => prefix,
    };
    for ch in rest.chars() {
        if ch.is_ascii_alphanumeric() || "-;/?!:@&=+$,_.~*'()[]".contains(ch) {
            text.push(ch);
        } else {
            percent_encode(ch, &mut text);
        }
    }
    Ok(text)
}

/// Writes events as YAML text.
///
/// Events are queued until enough of them are known to decide the layout:
/// one after a document start, two after a sequence start and three after
/// a mapping start, so empty collections and simple keys can be recognized.
pub struct Emitter<W> {
    writer: W,

    canonical: bool,
    allow_unicode: bool,
    best_indent: usize,
    best_width: usize,
    line_break: &'static str,

    state: State,
    states: Vec<State>,
    events: VecDeque<Event>,
    indent: Option<usize>,
    indents: Vec<Option<usize>>,
    flow_level: usize,

    mapping_context: bool,
    simple_key_context: bool,

    line: usize,
    column: usize,
    whitespace: bool,
    indention: bool,
    open_ended: OpenEnded,

    /// Tag prefix to handle.
    tag_prefixes: BTreeMap<String, String>,
    prepared_anchor: Option<String>,
    prepared_tag: Option<String>,
    analysis: Option<ScalarAnalysis>,
    style: Option<ScalarStyle>,
}

impl<W: std::fmt::Write> Emitter<W> {
    pub fn new(writer: W, config: &DumpConfig) -> Self {
        let best_indent = config.indent.clamp(1, 9);
        let best_width = match config.width {
            None => usize::MAX,
            Some(width) if width > best_indent * 2 => width,
            Some(_) => 80,
        };
        Self {
            writer,
            canonical: config.canonical,
            allow_unicode: config.allow_unicode,
            best_indent,
            best_width,
            line_break: config.line_break.as_str(),
            state: State::StreamStart,
            states: Vec::new(),
            events: VecDeque::new(),
            indent: None,
            indents: Vec::new(),
            flow_level: 0,
            mapping_context: false,
            simple_key_context: false,
            line: 0,
            column: 0,
            whitespace: true,
            indention: true,
            open_ended: OpenEnded::No,
            tag_prefixes: default_tag_prefixes(),
            prepared_anchor: None,
            prepared_tag: None,
            analysis: None,
            style: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Number of lines written so far.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn emit(&mut self, event: Event) -> Result<(), EmitterError> {
        log::trace!("emit {}", event.kind());
        self.events.push_back(event);
        while !self.need_more_events() {
            let Some(event) = self.events.pop_front() else {
                break;
            };
            self.step(&event)?;
        }
        Ok(())
    }

    fn need_more_events(&self) -> bool {
        match self.events.front() {
            None => true,
            Some(Event::DocumentStart { .. }) => self.need_events(1),
            Some(Event::SequenceStart(_)) => self.need_events(2),
            Some(Event::MappingStart(_)) => self.need_events(3),
            Some(_) => false,
        }
    }

    fn need_events(&self, count: usize) -> bool {
        let mut level = 0i32;
        for event in self.events.iter().skip(1) {
            match event {
                Event::DocumentStart { .. } | Event::SequenceStart(_) | Event::MappingStart(_) => {
                    level += 1
                }
                Event::DocumentEnd { .. } | Event::SequenceEnd | Event::MappingEnd => level -= 1,
                Event::StreamEnd => level = -1,
                _ => {}
            }
            if level < 0 {
                return false;
            }
        }
        self.events.len() < count + 1
    }

    fn pop_state(&mut self) {
        self.state = self.states.pop().unwrap_or(State::End);
    }

    fn pop_indent(&mut self) {
        self.indent = self.indents.pop().flatten();
    }

    fn increase_indent(&mut self, flow: bool, indentless: bool) {
        self.indents.push(self.indent);
        match self.indent {
            None => self.indent = Some(if flow { self.best_indent } else { 0 }),
            Some(indent) if !indentless => self.indent = Some(indent + self.best_indent),
            Some(_) => {}
        }
    }

    fn step(&mut self, event: &Event) -> Result<(), EmitterError> {
        match self.state {
            State::StreamStart => match event {
                Event::StreamStart => {
                    self.state = State::FirstDocumentStart;
                    Ok(())
                }
                other => Err(EmitterError::UnexpectedEvent {
                    expected: "StreamStart",
                    found: other.kind(),
                }),
            },
            State::FirstDocumentStart => self.expect_document_start(event, true),
            State::DocumentStart => self.expect_document_start(event, false),
            State::DocumentRoot => {
                self.states.push(State::DocumentEnd);
                self.expect_node(event, Context::Root)
            }
            State::DocumentEnd => self.expect_document_end(event),
            State::FirstFlowSequenceItem => self.expect_flow_sequence_item(event, true),
            State::FlowSequenceItem => self.expect_flow_sequence_item(event, false),
            State::FirstFlowMappingKey => self.expect_flow_mapping_key(event, true),
            State::FlowMappingKey => self.expect_flow_mapping_key(event, false),
            State::FlowMappingSimpleValue => {
                self.write_indicator(":", false, false, false)?;
                self.states.push(State::FlowMappingKey);
                self.expect_node(event, Context::Mapping)
            }
            State::FlowMappingValue => {
                if self.canonical || self.column > self.best_width {
                    self.write_indent()?;
                }
                self.write_indicator(":", true, false, false)?;
                self.states.push(State::FlowMappingKey);
                self.expect_node(event, Context::Mapping)
            }
            State::FirstBlockSequenceItem => self.expect_block_sequence_item(event, true),
            State::BlockSequenceItem => self.expect_block_sequence_item(event, false),
            State::FirstBlockMappingKey => self.expect_block_mapping_key(event, true),
            State::BlockMappingKey => self.expect_block_mapping_key(event, false),
            State::BlockMappingSimpleValue => {
                self.write_indicator(":", false, false, false)?;
                self.states.push(State::BlockMappingKey);
                self.expect_node(event, Context::Mapping)
            }
            State::BlockMappingValue => {
                self.write_indent()?;
                self.write_indicator(":", true, false, true)?;
                self.states.push(State::BlockMappingKey);
                self.expect_node(event, Context::Mapping)
            }
            State::End => Err(EmitterError::UnexpectedEvent {
                expected: "nothing",
                found: event.kind(),
            }),
        }
    }

    fn expect_document_start(&mut self, event: &Event, first: bool) -> Result<(), EmitterError> {
        match event {
            Event::DocumentStart {
                explicit,
                version,
                tags,
            } => {
                if (version.is_some() || !tags.is_empty()) && self.open_ended != OpenEnded::No {
                    self.write_indicator("...", true, false, false)?;
                    self.write_indent()?;
                }
                self.open_ended = OpenEnded::No;
                if let Some((major, minor)) = *version {
                    if major != 1 {
                        return Err(EmitterError::UnsupportedVersion(major, minor));
                    }
                    self.write_directive(&format!("%YAML {major}.{minor}"))?;
                }

                let has_tags = !tags.is_empty();
                self.tag_prefixes = default_tag_prefixes();
                let mut tags: Vec<_> = tags.iter().collect();
                tags.sort();
                for (handle, prefix) in tags {
                    self.tag_prefixes.insert(prefix.clone(), handle.clone());
                    let handle = prepare_tag_handle(handle)?;
                    let prefix = prepare_tag_prefix(prefix)?;
                    self.write_directive(&format!("%TAG {handle} {prefix}"))?;
                }

                let implicit = first
                    && !explicit
                    && !self.canonical
                    && version.is_none()
                    && !has_tags
                    && !self.check_empty_document();
                if !implicit {
                    self.write_indent()?;
                    self.write_indicator("---", true, false, false)?;
                    if self.canonical {
                        self.write_indent()?;
                    }
                }
                self.state = State::DocumentRoot;
                Ok(())
            }
            Event::StreamEnd => {
                if self.open_ended == OpenEnded::Kept {
                    self.write_indicator("...", true, false, false)?;
                    self.open_ended = OpenEnded::No;
                    self.write_indent()?;
                }
                self.state = State::End;
                Ok(())
            }
            other => Err(EmitterError::UnexpectedEvent {
                expected: "DocumentStart",
                found: other.kind(),
            }),
        }
    }

    fn expect_document_end(&mut self, event: &Event) -> Result<(), EmitterError> {
        let Event::DocumentEnd { explicit } = event else {
            return Err(EmitterError::UnexpectedEvent {
                expected: "DocumentEnd",
                found: event.kind(),
            });
        };
        self.write_indent()?;
        if *explicit {
            self.write_indicator("...", true, false, false)?;
            self.open_ended = OpenEnded::No;
            self.write_indent()?;
        } else if self.open_ended == OpenEnded::No {
            self.open_ended = OpenEnded::Implicit;
        }
        self.state = State::DocumentStart;
        Ok(())
    }

    fn expect_node(&mut self, event: &Event, context: Context) -> Result<(), EmitterError> {
        self.mapping_context = matches!(context, Context::Mapping | Context::SimpleKey);
        self.simple_key_context = context == Context::SimpleKey;

        match event {
            Event::Alias(name) => {
                self.process_anchor(Some(name.as_str()), '*')?;
                self.pop_state();
                Ok(())
            }
            Event::Scalar(scalar) => {
                self.process_anchor(scalar.anchor.as_deref(), '&')?;
                self.process_scalar_tag(scalar)?;
                self.increase_indent(true, false);
                self.process_scalar(scalar)?;
                self.pop_indent();
                self.pop_state();
                Ok(())
            }
            Event::SequenceStart(collection) => {
                self.process_anchor(collection.anchor.as_deref(), '&')?;
                self.process_collection_tag(collection)?;
                if self.flow_level > 0
                    || self.canonical
                    || collection.style == CollectionStyle::Flow
                    || self.check_empty_sequence()
                {
                    self.write_indicator("[", true, true, false)?;
                    self.flow_level += 1;
                    self.increase_indent(true, false);
                    self.state = State::FirstFlowSequenceItem;
                } else {
                    let indentless = self.mapping_context && !self.indention;
                    self.increase_indent(false, indentless);
                    self.state = State::FirstBlockSequenceItem;
                }
                Ok(())
            }
            Event::MappingStart(collection) => {
                self.process_anchor(collection.anchor.as_deref(), '&')?;
                self.process_collection_tag(collection)?;
                if self.flow_level > 0
                    || self.canonical
                    || collection.style == CollectionStyle::Flow
                    || self.check_empty_mapping()
                {
                    self.write_indicator("{", true, true, false)?;
                    self.flow_level += 1;
                    self.increase_indent(true, false);
                    self.state = State::FirstFlowMappingKey;
                } else {
                    self.increase_indent(false, false);
                    self.state = State::FirstBlockMappingKey;
                }
                Ok(())
            }
            other => Err(EmitterError::UnexpectedEvent {
                expected: "a node",
                found: other.kind(),
            }),
        }
    }

    fn expect_flow_sequence_item(&mut self, event: &Event, first: bool) -> Result<(), EmitterError> {
        if let Event::SequenceEnd = event {
            self.pop_indent();
            self.flow_level -= 1;
            if self.canonical && !first {
                self.write_indicator(",", false, false, false)?;
                self.write_indent()?;
            }
            self.write_indicator("]", false, false, false)?;
            self.pop_state();
            return Ok(());
        }

        if !first {
            self.write_indicator(",", false, false, false)?;
        }
        if self.canonical || self.column > self.best_width {
            self.write_indent()?;
        }
        self.states.push(State::FlowSequenceItem);
        self.expect_node(event, Context::Sequence)
    }

    fn expect_flow_mapping_key(&mut self, event: &Event, first: bool) -> Result<(), EmitterError> {
        if let Event::MappingEnd = event {
            self.pop_indent();
            self.flow_level -= 1;
            if self.canonical && !first {
                self.write_indicator(",", false, false, false)?;
                self.write_indent()?;
            }
            self.write_indicator("}", false, false, false)?;
            self.pop_state();
            return Ok(());
        }

        if !first {
            self.write_indicator(",", false, false, false)?;
        }
        if self.canonical || self.column > self.best_width {
            self.write_indent()?;
        }
        if !self.canonical && self.check_simple_key(event)? {
            self.states.push(State::FlowMappingSimpleValue);
            self.expect_node(event, Context::SimpleKey)
        } else {
            self.write_indicator("?", true, false, false)?;
            self.states.push(State::FlowMappingValue);
            self.expect_node(event, Context::Mapping)
        }
    }

    fn expect_block_sequence_item(&mut self, event: &Event, first: bool) -> Result<(), EmitterError> {
        if !first && matches!(event, Event::SequenceEnd) {
            self.pop_indent();
            self.pop_state();
            return Ok(());
        }
        self.write_indent()?;
        self.write_indicator("-", true, false, true)?;
        self.states.push(State::BlockSequenceItem);
        self.expect_node(event, Context::Sequence)
    }

    fn expect_block_mapping_key(&mut self, event: &Event, first: bool) -> Result<(), EmitterError> {
        if !first && matches!(event, Event::MappingEnd) {
            self.pop_indent();
            self.pop_state();
            return Ok(());
        }
        self.write_indent()?;
        if self.check_simple_key(event)? {
            self.states.push(State::BlockMappingSimpleValue);
            self.expect_node(event, Context::SimpleKey)
        } else {
            self.write_indicator("?", true, false, true)?;
            self.states.push(State::BlockMappingValue);
            self.expect_node(event, Context::Mapping)
        }
    }

    fn check_empty_sequence(&self) -> bool {
        matches!(self.events.front(), Some(Event::SequenceEnd))
    }

    fn check_empty_mapping(&self) -> bool {
        matches!(self.events.front(), Some(Event::MappingEnd))
    }

    fn check_empty_document(&self) -> bool {
        matches!(
            self.events.front(),
            Some(Event::Scalar(ScalarEvent {
                anchor: None,
                tag: None,
                value,
                ..
            })) if value.is_empty()
        )
    }

    /// Whether `event` can be written as a `key:` on one line.
    fn check_simple_key(&mut self, event: &Event) -> Result<bool, EmitterError> {
        let mut length = 0;
        if let Some(anchor) = event.anchor() {
            if self.prepared_anchor.is_none() {
                self.prepared_anchor = Some(prepare_anchor(anchor)?);
            }
            length += self.prepared_anchor.as_ref().map_or(0, |a| a.chars().count());
        }

        let tag = match event {
            Event::Scalar(scalar) => scalar.tag.as_deref(),
            Event::SequenceStart(collection) | Event::MappingStart(collection) => {
                collection.tag.as_deref()
            }
            _ => None,
        };
        if let Some(tag) = tag {
            if self.prepared_tag.is_none() {
                self.prepared_tag = Some(self.prepare_tag(tag)?);
            }
            length += self.prepared_tag.as_ref().map_or(0, |t| t.chars().count());
        }

        let simple = match event {
            Event::Alias(_) => true,
            Event::Scalar(scalar) => {
                length += scalar.value.chars().count();
                let analysis = self.analyze(&scalar.value);
                !analysis.is_empty() && !analysis.is_multiline()
            }
            Event::SequenceStart(_) => self.check_empty_sequence(),
            Event::MappingStart(_) => self.check_empty_mapping(),
            _ => false,
        };
        Ok(length < 128 && simple)
    }

    fn analyze(&mut self, value: &str) -> ScalarAnalysis {
        let allow_unicode = self.allow_unicode;
        *self
            .analysis
            .get_or_insert_with(|| ScalarAnalysis::analyze(value, allow_unicode))
    }

    fn process_anchor(&mut self, anchor: Option<&str>, indicator: char) -> Result<(), EmitterError> {
        let Some(anchor) = anchor else {
            self.prepared_anchor = None;
            return Ok(());
        };
        let prepared = match self.prepared_anchor.take() {
            Some(prepared) => prepared,
            None => prepare_anchor(anchor)?,
        };
        self.write_indicator(&format!("{indicator}{prepared}"), true, false, false)
    }

    fn process_scalar_tag(&mut self, scalar: &ScalarEvent) -> Result<(), EmitterError> {
        let style = match self.style {
            Some(style) => style,
            None => {
                let style = self.choose_scalar_style(scalar);
                self.style = Some(style);
                style
            }
        };

        let mut tag = scalar.tag.as_deref();
        let implicit = if style == ScalarStyle::Plain {
            scalar.implicit.plain
        } else {
            scalar.implicit.quoted
        };
        if (!self.canonical || tag.is_none()) && implicit {
            self.prepared_tag = None;
            return Ok(());
        }
        if scalar.implicit.plain && tag.is_none() {
            tag = Some("!");
            self.prepared_tag = None;
        }
        self.write_tag(tag)
    }

    fn process_collection_tag(&mut self, collection: &CollectionEvent) -> Result<(), EmitterError> {
        if (!self.canonical || collection.tag.is_none()) && collection.implicit {
            self.prepared_tag = None;
            return Ok(());
        }
        self.write_tag(collection.tag.as_deref())
    }

    fn write_tag(&mut self, tag: Option<&str>) -> Result<(), EmitterError> {
        let Some(tag) = tag else {
            return Err(EmitterError::MissingTag);
        };
        let prepared = match self.prepared_tag.take() {
            Some(prepared) => prepared,
            None => self.prepare_tag(tag)?,
        };
        if !prepared.is_empty() {
            self.write_indicator(&prepared, true, false, false)?;
        }
        Ok(())
    }

    /// The shortest form of `tag` under the current `%TAG` handles, or a
    /// verbatim `!<...>` tag.
    fn prepare_tag(&self, tag: &str) -> Result<String, EmitterError> {
        if tag.is_empty() {
            return Err(EmitterError::EmptyTag);
        }
        if tag == "!" {
            return Ok(tag.to_owned());
        }

        let mut handle = None;
        let mut suffix = tag;
        for (prefix, prefix_handle) in &self.tag_prefixes {
            if tag.starts_with(prefix.as_str()) && (prefix == "!" || prefix.len() < tag.len()) {
                handle = Some(prefix_handle.as_str());
                suffix = &tag[prefix.len()..];
            }
        }

        let mut text = String::with_capacity(suffix.len());
        for ch in suffix.chars() {
            if ch.is_ascii_alphanumeric()
                || "-;/?:@&=+$,_.~*'()[]".contains(ch)
                || (ch == '!' && handle != Some("!"))
            {
                text.push(ch);
            } else {
                percent_encode(ch, &mut text);
            }
        }

        Ok(match handle {
            Some(handle) => format!("{handle}{text}"),
            None => format!("!<{text}>"),
        })
    }

    fn choose_scalar_style(&mut self, scalar: &ScalarEvent) -> ScalarStyle {
        let analysis = self.analyze(&scalar.value);
        let requested = scalar.style;
        let unstyled = matches!(requested, None | Some(ScalarStyle::Plain));

        if requested == Some(ScalarStyle::DoubleQuoted) || self.canonical {
            return ScalarStyle::DoubleQuoted;
        }
        if unstyled
            && scalar.implicit.plain
            && !(self.simple_key_context && (analysis.is_empty() || analysis.is_multiline()))
            && ((self.flow_level > 0 && analysis.allows(ScalarFlags::ALLOW_FLOW_PLAIN))
                || (self.flow_level == 0 && analysis.allows(ScalarFlags::ALLOW_BLOCK_PLAIN)))
        {
            return ScalarStyle::Plain;
        }
        if let Some(block @ (ScalarStyle::Literal | ScalarStyle::Folded)) = requested {
            if self.flow_level == 0
                && !self.simple_key_context
                && analysis.allows(ScalarFlags::ALLOW_BLOCK)
            {
                return block;
            }
        }
        if (unstyled || requested == Some(ScalarStyle::SingleQuoted))
            && analysis.allows(ScalarFlags::ALLOW_SINGLE_QUOTED)
            && !(self.simple_key_context && analysis.is_multiline())
        {
            return ScalarStyle::SingleQuoted;
        }
        ScalarStyle::DoubleQuoted
    }

    fn process_scalar(&mut self, scalar: &ScalarEvent) -> Result<(), EmitterError> {
        let style = match self.style {
            Some(style) => style,
            None => self.choose_scalar_style(scalar),
        };
        let text: Vec<char> = scalar.value.chars().collect();
        let split = !self.simple_key_context;
        match style {
            ScalarStyle::DoubleQuoted => self.write_double_quoted(&text, split)?,
            ScalarStyle::SingleQuoted => self.write_single_quoted(&text, split)?,
            ScalarStyle::Folded => self.write_folded(&text)?,
            ScalarStyle::Literal => self.write_literal(&text)?,
            ScalarStyle::Plain => self.write_plain(&text, split)?,
        }
        self.analysis = None;
        self.style = None;
        Ok(())
    }

    // Writers

    fn write_chars(&mut self, text: &[char]) -> Result<(), EmitterError> {
        for &ch in text {
            self.writer.write_char(ch)?;
        }
        self.column += text.len();
        Ok(())
    }

    fn write_counted(&mut self, data: &str) -> Result<(), EmitterError> {
        self.writer.write_str(data)?;
        self.column += data.chars().count();
        Ok(())
    }

    fn write_indicator(
        &mut self,
        indicator: &str,
        need_whitespace: bool,
        whitespace: bool,
        indention: bool,
    ) -> Result<(), EmitterError> {
        if !self.whitespace && need_whitespace {
            self.write_counted(" ")?;
        }
        self.write_counted(indicator)?;
        self.whitespace = whitespace;
        self.indention = self.indention && indention;
        Ok(())
    }

    fn write_indent(&mut self) -> Result<(), EmitterError> {
        let indent = self.indent.unwrap_or(0);
        if !self.indention
            || self.column > indent
            || (self.column == indent && !self.whitespace)
        {
            self.write_line_break(None)?;
        }
        if self.column < indent {
            self.whitespace = true;
            for _ in self.column..indent {
                self.writer.write_char(' ')?;
            }
            self.column = indent;
        }
        Ok(())
    }

    /// Write a line break: the configured one, or `br` itself for the
    /// Unicode line and paragraph separators.
    fn write_line_break(&mut self, br: Option<char>) -> Result<(), EmitterError> {
        match br {
            Some(br) if br != '\n' => self.writer.write_char(br)?,
            _ => self.writer.write_str(self.line_break)?,
        }
        self.whitespace = true;
        self.indention = true;
        self.line += 1;
        self.column = 0;
        Ok(())
    }

    fn write_breaks(&mut self, breaks: &[char]) -> Result<(), EmitterError> {
        for &br in breaks {
            self.write_line_break(Some(br))?;
        }
        Ok(())
    }

    fn write_directive(&mut self, directive: &str) -> Result<(), EmitterError> {
        self.writer.write_str(directive)?;
        self.write_line_break(None)
    }

    fn write_plain(&mut self, text: &[char], split: bool) -> Result<(), EmitterError> {
        if text.is_empty() {
            return Ok(());
        }
        if !self.whitespace {
            self.write_counted(" ")?;
        }
        self.whitespace = false;
        self.indention = false;

        let mut spaces = false;
        let mut breaks = false;
        let mut start = 0;
        for end in 0..=text.len() {
            let ch = text.get(end).copied();
            if spaces {
                if ch != Some(' ') {
                    if start + 1 == end && self.column > self.best_width && split {
                        self.write_indent()?;
                        self.whitespace = false;
                        self.indention = false;
                    } else {
                        self.write_chars(&text[start..end])?;
                    }
                    start = end;
                }
            } else if breaks {
                if !ch.is_some_and(is_break) {
                    if text[start] == '\n' {
                        self.write_line_break(None)?;
                    }
                    self.write_breaks(&text[start..end])?;
                    self.write_indent()?;
                    self.whitespace = false;
                    self.indention = false;
                    start = end;
                }
            } else if ch.map_or(true, |ch| ch == ' ' || is_break(ch)) {
                self.write_chars(&text[start..end])?;
                start = end;
            }
            if let Some(ch) = ch {
                spaces = ch == ' ';
                breaks = is_break(ch);
            }
        }
        Ok(())
    }

    fn write_single_quoted(&mut self, text: &[char], split: bool) -> Result<(), EmitterError> {
        self.write_indicator("'", true, false, false)?;
        let mut spaces = false;
        let mut breaks = false;
        let mut start = 0;
        for end in 0..=text.len() {
            let ch = text.get(end).copied();
            if spaces {
                if ch != Some(' ') {
                    if start + 1 == end
                        && self.column > self.best_width
                        && split
                        && start != 0
                        && end != text.len()
                    {
                        self.write_indent()?;
                    } else {
                        self.write_chars(&text[start..end])?;
                    }
                    start = end;
                }
            } else if breaks {
                if !ch.is_some_and(is_break) {
                    if text[start] == '\n' {
                        self.write_line_break(None)?;
                    }
                    self.write_breaks(&text[start..end])?;
                    self.write_indent()?;
                    start = end;
                }
            } else if ch.map_or(true, |ch| ch == ' ' || ch == '\'' || is_break(ch)) && start < end {
                self.write_chars(&text[start..end])?;
                start = end;
            }
            if ch == Some('\'') {
                self.write_counted("''")?;
                start = end + 1;
            }
            if let Some(ch) = ch {
                spaces = ch == ' ';
                breaks = is_break(ch);
            }
        }
        self.write_indicator("'", false, false, false)
    }

    fn must_escape(&self, ch: char) -> bool {
        let printable = ('\x20'..='\x7e').contains(&ch)
            || (self.allow_unicode && matches!(ch, '\u{a0}'..='\u{d7ff}' | '\u{e000}'..='\u{fffd}'));
        !printable || matches!(ch, '"' | '\\' | '\u{2028}' | '\u{2029}' | '\u{feff}')
    }

    /// Long lines are folded at a single space once past the width; a space
    /// following the fold is escaped so it survives.
    fn write_double_quoted(&mut self, text: &[char], split: bool) -> Result<(), EmitterError> {
        self.write_indicator("\"", true, false, false)?;
        let mut spaces = false;
        for (index, &ch) in text.iter().enumerate() {
            if self.must_escape(ch) {
                let escaped = match escape_replacement(ch) {
                    Some(short) => format!("\\{short}"),
                    None if ch <= '\u{ff}' => format!("\\x{:02X}", ch as u32),
                    None if ch <= '\u{ffff}' => format!("\\u{:04X}", ch as u32),
                    None => format!("\\U{:08X}", ch as u32),
                };
                self.write_counted(&escaped)?;
                spaces = false;
            } else if ch == ' ' {
                if split
                    && !spaces
                    && self.column > self.best_width
                    && index != 0
                    && index + 1 != text.len()
                {
                    self.write_indent()?;
                    if text.get(index + 1) == Some(&' ') {
                        self.write_counted("\\")?;
                    }
                } else {
                    self.write_chars(&text[index..=index])?;
                }
                spaces = true;
            } else {
                self.write_chars(&text[index..=index])?;
                spaces = false;
            }
        }
        self.write_indicator("\"", false, false, false)
    }

    fn block_hints(&self, text: &[char]) -> String {
        let mut hints = String::new();
        if let (Some(&first), Some(&last)) = (text.first(), text.last()) {
            if first == ' ' || is_break(first) {
                hints.push_str(itoa::Buffer::new().format(self.best_indent));
            }
            if !is_break(last) {
                hints.push('-');
            } else if text.len() == 1 || is_break(text[text.len() - 2]) {
                hints.push('+');
            }
        }
        hints
    }

    fn write_folded(&mut self, text: &[char]) -> Result<(), EmitterError> {
        let hints = self.block_hints(text);
        self.write_indicator(&format!(">{hints}"), true, false, false)?;
        self.open_ended = if hints.ends_with('+') {
            OpenEnded::Kept
        } else {
            OpenEnded::No
        };
        self.write_line_break(None)?;

        let mut leading_space = true;
        let mut spaces = false;
        let mut breaks = true;
        let mut start = 0;
        for end in 0..=text.len() {
            let ch = text.get(end).copied();
            if breaks {
                if !ch.is_some_and(is_break) {
                    if !leading_space && ch.is_some_and(|ch| ch != ' ') && text[start] == '\n' {
                        self.write_line_break(None)?;
                    }
                    leading_space = ch == Some(' ');
                    self.write_breaks(&text[start..end])?;
                    if ch.is_some() {
                        self.write_indent()?;
                    }
                    start = end;
                }
            } else if spaces {
                if ch != Some(' ') {
                    if start + 1 == end && self.column > self.best_width {
                        self.write_indent()?;
                    } else {
                        self.write_chars(&text[start..end])?;
                    }
                    start = end;
                }
            } else if ch.map_or(true, |ch| ch == ' ' || is_break(ch)) {
                self.write_chars(&text[start..end])?;
                if ch.is_none() {
                    self.write_line_break(None)?;
                }
                start = end;
            }
            if let Some(ch) = ch {
                breaks = is_break(ch);
                spaces = ch == ' ';
            }
        }
        Ok(())
    }

    fn write_literal(&mut self, text: &[char]) -> Result<(), EmitterError> {
        let hints = self.block_hints(text);
        self.write_indicator(&format!("|{hints}"), true, false, false)?;
        self.open_ended = if hints.ends_with('+') {
            OpenEnded::Kept
        } else {
            OpenEnded::No
        };
        self.write_line_break(None)?;

        let mut breaks = true;
        let mut start = 0;
        for end in 0..=text.len() {
            let ch = text.get(end).copied();
            if breaks {
                if !ch.is_some_and(is_break) {
                    self.write_breaks(&text[start..end])?;
                    if ch.is_some() {
                        self.write_indent()?;
                    }
                    start = end;
                }
            } else if ch.map_or(true, is_break) {
                self.write_chars(&text[start..end])?;
                if ch.is_none() {
                    self.write_line_break(None)?;
                }
                start = end;
            }
            if let Some(ch) = ch {
                breaks = is_break(ch);
            }
        }
        Ok(())
    }
}

impl<W: std::fmt::Write> EventSink for Emitter<W> {
    #[inline]
    fn emit(&mut self, event: Event) -> Result<(), EmitterError> {
        Emitter::emit(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolver, Implicit};

    #[track_caller]
    fn emit_with(config: &DumpConfig, events: impl IntoIterator<Item = Event>) -> String {
        let mut emitter = Emitter::new(String::new(), config);
        emitter.emit(Event::StreamStart).unwrap();
        for event in events {
            emitter.emit(event).unwrap();
        }
        emitter.emit(Event::StreamEnd).unwrap();
        emitter.into_inner()
    }

    #[track_caller]
    fn emit_doc(events: impl IntoIterator<Item = Event>) -> String {
        emit_with(&DumpConfig::default(), document(events))
    }

    fn document(events: impl IntoIterator<Item = Event>) -> Vec<Event> {
        let mut all = vec![Event::document_start(false)];
        all.extend(events);
        all.push(Event::DocumentEnd { explicit: false });
        all
    }

    fn string(value: &str) -> Event {
        Event::Scalar(ScalarEvent {
            anchor: None,
            tag: Some(resolver::STR_TAG.to_owned()),
            implicit: Implicit {
                plain: false,
                quoted: true,
            },
            value: value.to_owned(),
            style: None,
        })
    }

    #[test]
    fn block_mapping_with_sequence() {
        assert_eq!(
            emit_doc([
                Event::begin_mapping(CollectionStyle::Block),
                Event::plain("a"),
                Event::begin_sequence(CollectionStyle::Block),
                Event::plain("1"),
                Event::plain("2"),
                Event::SequenceEnd,
                Event::plain("b"),
                Event::plain("x"),
                Event::MappingEnd,
            ]),
            "a:\n- 1\n- 2\nb: x\n"
        );
    }

    #[test]
    fn nested_sequences() {
        assert_eq!(
            emit_doc([
                Event::begin_sequence(CollectionStyle::Block),
                Event::plain("1"),
                Event::begin_sequence(CollectionStyle::Block),
                Event::plain("2"),
                Event::plain("3"),
                Event::SequenceEnd,
                Event::SequenceEnd,
            ]),
            "- 1\n- - 2\n  - 3\n"
        );
    }

    #[test]
    fn flow_collections() {
        assert_eq!(
            emit_doc([
                Event::begin_sequence(CollectionStyle::Flow),
                Event::plain("1"),
                Event::begin_mapping(CollectionStyle::Flow),
                Event::plain("a"),
                Event::plain("b"),
                Event::MappingEnd,
                Event::SequenceEnd,
            ]),
            "[1, {a: b}]\n"
        );
    }

    #[test]
    fn empty_collections() {
        assert_eq!(
            emit_doc([
                Event::begin_mapping(CollectionStyle::Block),
                Event::plain("a"),
                Event::begin_sequence(CollectionStyle::Block),
                Event::SequenceEnd,
                Event::plain("b"),
                Event::begin_mapping(CollectionStyle::Block),
                Event::MappingEnd,
                Event::MappingEnd,
            ]),
            "a: []\nb: {}\n"
        );
    }

    #[test]
    fn open_ended_documents() {
        assert_eq!(emit_doc([Event::plain("abc")]), "abc\n");
        assert_eq!(emit_doc([string("123")]), "'123'\n");
        assert_eq!(emit_doc([string("")]), "''\n");
        assert_eq!(
            emit_doc([Event::scalar("x\n\n", ScalarStyle::Literal)]),
            "|+\n  x\n\n...\n"
        );
        assert_eq!(
            emit_doc([
                Event::begin_sequence(CollectionStyle::Block),
                Event::scalar("x\n\n", ScalarStyle::Literal),
                Event::scalar("y\n", ScalarStyle::Folded),
                Event::SequenceEnd,
            ]),
            "- |+\n  x\n\n- >\n  y\n"
        );

        let mut events = document([Event::plain("a")]);
        events.extend([
            Event::DocumentStart {
                explicit: false,
                version: Some((1, 1)),
                tags: Vec::new(),
            },
            Event::plain("b"),
            Event::DocumentEnd { explicit: false },
        ]);
        assert_eq!(
            emit_with(&DumpConfig::default(), events),
            "a\n...\n%YAML 1.1\n--- b\n"
        );
    }

    #[test]
    fn quoting() {
        assert_eq!(
            emit_doc([Event::scalar("a\tb", ScalarStyle::DoubleQuoted)]),
            "\"a\\tb\"\n"
        );
        assert_eq!(emit_doc([string("it's")]), "'it''s'\n");
        assert_eq!(emit_doc([string("caf\u{e9}")]), "\"caf\\xE9\"\n");
        assert_eq!(
            emit_with(
                &DumpConfig::new().with_allow_unicode(true),
                document([Event::plain("caf\u{e9}")])
            ),
            "caf\u{e9}\n"
        );
    }

    #[test]
    fn double_quoted_folding() {
        let config = DumpConfig::new().with_width(Some(20));
        let quoted = |text: &str| document([Event::scalar(text, ScalarStyle::DoubleQuoted)]);
        assert_eq!(
            emit_with(&config, quoted(&"a  b ".repeat(10))),
            "\"a  b a  b a  b a  b a\n  \\ b a  b a  b a  b a\n  \\ b a  b \"\n"
        );
        assert_eq!(
            emit_with(&config, quoted(&" a".repeat(30))),
            "\" a a a a a a a a a a\n  a a a a a a a a a a\n  a a a a a a a a a a\"\n"
        );
        let long = format!("{} {} z", "x".repeat(30), "y".repeat(10));
        assert_eq!(
            emit_with(&config, quoted(&long)),
            format!("\"{}\n  {} z\"\n", "x".repeat(30), "y".repeat(10))
        );
    }

    #[test]
    fn non_bmp_is_escaped() {
        let config = DumpConfig::new().with_allow_unicode(true);
        assert_eq!(
            emit_with(&config, document([Event::plain("\u{1f600}x")])),
            "\"\\U0001F600x\"\n"
        );
        assert_eq!(
            emit_with(&config, document([Event::plain("a\u{85}b")])),
            "\"a\\Nb\"\n"
        );
    }

    #[test]
    fn literal_block() {
        assert_eq!(
            emit_doc([
                Event::begin_mapping(CollectionStyle::Block),
                Event::plain("k"),
                Event::scalar("a\nb\n", ScalarStyle::Literal),
                Event::MappingEnd,
            ]),
            "k: |\n  a\n  b\n"
        );
        assert_eq!(
            emit_doc([
                Event::begin_mapping(CollectionStyle::Block),
                Event::plain("k"),
                Event::scalar("a", ScalarStyle::Literal),
                Event::MappingEnd,
            ]),
            "k: |-\n  a\n"
        );
    }

    #[test]
    fn anchors_and_aliases() {
        assert_eq!(
            emit_doc([
                Event::begin_sequence(CollectionStyle::Block),
                Event::begin_sequence(CollectionStyle::Flow).with_anchor("id001"),
                Event::plain("1"),
                Event::SequenceEnd,
                Event::alias("id001"),
                Event::SequenceEnd,
            ]),
            "- &id001 [1]\n- *id001\n"
        );
    }

    #[test]
    fn indentation() {
        let config = DumpConfig::new().with_indent(4);
        assert_eq!(
            emit_with(
                &config,
                document([
                    Event::begin_mapping(CollectionStyle::Block),
                    Event::plain("a"),
                    Event::begin_mapping(CollectionStyle::Block),
                    Event::plain("b"),
                    Event::plain("1"),
                    Event::MappingEnd,
                    Event::MappingEnd,
                ])
            ),
            "a:\n    b: 1\n"
        );
    }

    #[test]
    fn explicit_markers() {
        assert_eq!(
            emit_with(
                &DumpConfig::default(),
                [
                    Event::document_start(true),
                    Event::begin_mapping(CollectionStyle::Block),
                    Event::plain("a"),
                    Event::plain("x"),
                    Event::MappingEnd,
                    Event::DocumentEnd { explicit: true },
                ]
            ),
            "---\na: x\n...\n"
        );
    }

    #[test]
    fn multiple_documents() {
        let mut events = document([Event::plain("a")]);
        events.extend(document([Event::plain("b")]));
        assert_eq!(
            emit_with(&DumpConfig::default(), events),
            "a\n--- b\n"
        );
    }

    #[test]
    fn version_directive() {
        assert_eq!(
            emit_with(
                &DumpConfig::default(),
                [
                    Event::DocumentStart {
                        explicit: false,
                        version: Some((1, 1)),
                        tags: Vec::new(),
                    },
                    Event::plain("x"),
                    Event::DocumentEnd { explicit: false },
                ]
            ),
            "%YAML 1.1\n--- x\n"
        );
    }

    #[test]
    fn canonical() {
        assert_eq!(
            emit_with(
                &DumpConfig::new().with_canonical(true),
                document([
                    Event::begin_mapping(CollectionStyle::Block).with_tag(resolver::MAP_TAG),
                    Event::plain("a").with_tag(resolver::STR_TAG),
                    Event::plain("1").with_tag(resolver::INT_TAG),
                    Event::MappingEnd,
                ])
            ),
            "---\n!!map {\n  ? !!str \"a\"\n  : !!int \"1\",\n}\n"
        );
    }

    #[test]
    fn tags() {
        assert_eq!(
            emit_doc([Event::plain("x").with_tag("tag:yaml.org,2002:binary")]),
            "!!binary 'x'\n"
        );
        assert_eq!(
            emit_doc([Event::plain("x").with_tag("tag:example.com,2000:app/foo")]),
            "!<tag:example.com,2000:app/foo> 'x'\n"
        );
    }

    #[test]
    fn tag_directives() {
        let start = Event::DocumentStart {
            explicit: false,
            version: None,
            tags: vec![("!e!".to_owned(), "tag:example.com,2000:".to_owned())],
        };
        assert_eq!(
            emit_with(
                &DumpConfig::default(),
                [
                    start,
                    Event::plain("x").with_tag("tag:example.com,2000:foo"),
                    Event::DocumentEnd { explicit: false },
                ]
            ),
            "%TAG !e! tag:example.com,2000:\n--- !e!foo 'x'\n"
        );
    }

    #[test]
    fn errors() {
        let mut emitter = Emitter::new(String::new(), &DumpConfig::default());
        assert_eq!(
            emitter.emit(Event::plain("x")),
            Err(EmitterError::UnexpectedEvent {
                expected: "StreamStart",
                found: "Scalar",
            })
        );

        let mut emitter = Emitter::new(String::new(), &DumpConfig::default());
        emitter.emit(Event::StreamStart).unwrap();
        emitter.emit(Event::document_start(false)).unwrap();
        assert_eq!(
            emitter.emit(Event::plain("x").with_anchor("bad anchor")),
            Err(EmitterError::InvalidAnchor("bad anchor".to_owned()))
        );
        assert_eq!(prepare_tag_handle("!a!"), Ok("!a!"));
        assert_eq!(prepare_tag_handle("!"), Ok("!"));
        assert!(prepare_tag_handle("a!").is_err());
        assert!(prepare_tag_handle("!a b!").is_err());
        assert_eq!(prepare_tag_prefix("!foo bar").unwrap(), "!foo%20bar");
    }
}
