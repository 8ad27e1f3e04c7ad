use crate::{CollectionStyle, ScalarStyle};

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    StreamStart,
    StreamEnd,
    DocumentStart {
        /// The document was opened with `---`.
        explicit: bool,
        version: Option<(u32, u32)>,
        /// `%TAG` directives, as `(handle, prefix)` pairs.
        tags: Vec<(String, String)>,
    },
    DocumentEnd {
        /// The document was closed with `...`.
        explicit: bool,
    },
    /// `*name`
    Alias(String),
    Scalar(ScalarEvent),
    SequenceStart(CollectionEvent),
    SequenceEnd,
    MappingStart(CollectionEvent),
    MappingEnd,
}

/// Whether a scalar's tag may be left out when written.
///
/// `plain` allows omitting the tag in plain style, `quoted` in any other
/// style. The parser sets `plain` for untagged plain scalars and `quoted`
/// for other untagged scalars.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Implicit {
    pub plain: bool,
    pub quoted: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScalarEvent {
    pub anchor: Option<String>,
    pub tag: Option<String>,
    pub implicit: Implicit,
    pub value: String,
    /// `None` leaves the choice to the emitter.
    pub style: Option<ScalarStyle>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CollectionEvent {
    pub anchor: Option<String>,
    pub tag: Option<String>,
    pub implicit: bool,
    pub style: CollectionStyle,
}

impl Event {
    #[inline]
    pub fn plain(value: &str) -> Self {
        Self::scalar(value, ScalarStyle::Plain)
    }

    pub fn scalar(value: &str, style: ScalarStyle) -> Self {
        Self::Scalar(ScalarEvent {
            anchor: None,
            tag: None,
            implicit: Implicit {
                plain: style == ScalarStyle::Plain,
                quoted: style != ScalarStyle::Plain,
            },
            value: value.to_owned(),
            style: Some(style),
        })
    }

    #[inline]
    pub fn alias(name: &str) -> Self {
        Self::Alias(name.to_owned())
    }

    #[inline]
    pub fn begin_sequence(style: CollectionStyle) -> Self {
        Self::SequenceStart(CollectionEvent::untagged(style))
    }

    #[inline]
    pub fn begin_mapping(style: CollectionStyle) -> Self {
        Self::MappingStart(CollectionEvent::untagged(style))
    }

    #[inline]
    pub fn document_start(explicit: bool) -> Self {
        Self::DocumentStart {
            explicit,
            version: None,
            tags: Vec::new(),
        }
    }

    /// The anchor carried by a node event.
    pub fn anchor(&self) -> Option<&str> {
        match self {
            Event::Scalar(scalar) => scalar.anchor.as_deref(),
            Event::SequenceStart(collection) | Event::MappingStart(collection) => {
                collection.anchor.as_deref()
            }
            Event::Alias(name) => Some(name),
            _ => None,
        }
    }

    pub fn with_anchor(mut self, name: &str) -> Self {
        match &mut self {
            Event::Scalar(scalar) => scalar.anchor = Some(name.to_owned()),
            Event::SequenceStart(collection) | Event::MappingStart(collection) => {
                collection.anchor = Some(name.to_owned())
            }
            _ => {}
        }
        self
    }

    /// Attach an explicit tag, which makes the tag non-implicit.
    pub fn with_tag(mut self, tag: &str) -> Self {
        match &mut self {
            Event::Scalar(scalar) => {
                scalar.tag = Some(tag.to_owned());
                scalar.implicit = Implicit::default();
            }
            Event::SequenceStart(collection) | Event::MappingStart(collection) => {
                collection.tag = Some(tag.to_owned());
                collection.implicit = false;
            }
            _ => {}
        }
        self
    }

    /// Short human-readable name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::StreamStart => "StreamStart",
            Event::StreamEnd => "StreamEnd",
            Event::DocumentStart { .. } => "DocumentStart",
            Event::DocumentEnd { .. } => "DocumentEnd",
            Event::Alias(_) => "Alias",
            Event::Scalar(_) => "Scalar",
            Event::SequenceStart(_) => "SequenceStart",
            Event::SequenceEnd => "SequenceEnd",
            Event::MappingStart(_) => "MappingStart",
            Event::MappingEnd => "MappingEnd",
        }
    }
}

impl CollectionEvent {
    pub fn untagged(style: CollectionStyle) -> Self {
        Self {
            anchor: None,
            tag: None,
            implicit: true,
            style,
        }
    }
}
