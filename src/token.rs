use crate::ScalarStyle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StreamStart,
    StreamEnd,
    /// `%YAML major.minor`
    VersionDirective(u32, u32),
    /// `%TAG handle prefix`
    TagDirective { handle: String, prefix: String },
    /// `---`
    DocumentStart,
    /// `...`
    DocumentEnd,
    /// Synthesized when a block sequence opens at a deeper indentation.
    BlockSequenceStart,
    /// Synthesized when a block mapping opens at a deeper indentation.
    BlockMappingStart,
    /// Synthesized when the indentation drops back.
    BlockEnd,
    FlowSequenceStart,
    FlowSequenceEnd,
    FlowMappingStart,
    FlowMappingEnd,
    /// `-` in a block sequence.
    BlockEntry,
    /// `,` in a flow collection.
    FlowEntry,
    /// `?`, or synthesized before a simple key.
    Key,
    /// `:`
    Value,
    Alias(String),
    Anchor(String),
    /// A tag property. `handle` is `None` for verbatim tags and for the
    /// lone `!`.
    Tag {
        handle: Option<String>,
        suffix: String,
    },
    Scalar { value: String, style: ScalarStyle },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    StreamStart,
    StreamEnd,
    VersionDirective,
    TagDirective,
    DocumentStart,
    DocumentEnd,
    BlockSequenceStart,
    BlockMappingStart,
    BlockEnd,
    FlowSequenceStart,
    FlowSequenceEnd,
    FlowMappingStart,
    FlowMappingEnd,
    BlockEntry,
    FlowEntry,
    Key,
    Value,
    Alias,
    Anchor,
    Tag,
    Scalar,
}

impl Token {
    #[inline]
    pub fn plain(value: &str) -> Self {
        Self::Scalar {
            value: value.to_owned(),
            style: ScalarStyle::Plain,
        }
    }

    #[inline]
    pub fn scalar(value: &str, style: ScalarStyle) -> Self {
        Self::Scalar {
            value: value.to_owned(),
            style,
        }
    }

    #[inline]
    pub fn tag(handle: &str, suffix: &str) -> Self {
        Self::Tag {
            handle: Some(handle.to_owned()),
            suffix: suffix.to_owned(),
        }
    }

    pub fn ty(&self) -> TokenType {
        match self {
            Token::StreamStart => TokenType::StreamStart,
            Token::StreamEnd => TokenType::StreamEnd,
            Token::VersionDirective(..) => TokenType::VersionDirective,
            Token::TagDirective { .. } => TokenType::TagDirective,
            Token::DocumentStart => TokenType::DocumentStart,
            Token::DocumentEnd => TokenType::DocumentEnd,
            Token::BlockSequenceStart => TokenType::BlockSequenceStart,
            Token::BlockMappingStart => TokenType::BlockMappingStart,
            Token::BlockEnd => TokenType::BlockEnd,
            Token::FlowSequenceStart => TokenType::FlowSequenceStart,
            Token::FlowSequenceEnd => TokenType::FlowSequenceEnd,
            Token::FlowMappingStart => TokenType::FlowMappingStart,
            Token::FlowMappingEnd => TokenType::FlowMappingEnd,
            Token::BlockEntry => TokenType::BlockEntry,
            Token::FlowEntry => TokenType::FlowEntry,
            Token::Key => TokenType::Key,
            Token::Value => TokenType::Value,
            Token::Alias(_) => TokenType::Alias,
            Token::Anchor(_) => TokenType::Anchor,
            Token::Tag { .. } => TokenType::Tag,
            Token::Scalar { .. } => TokenType::Scalar,
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TokenType::StreamStart => "<stream start>",
            TokenType::StreamEnd => "<stream end>",
            TokenType::VersionDirective | TokenType::TagDirective => "<directive>",
            TokenType::DocumentStart => "'---'",
            TokenType::DocumentEnd => "'...'",
            TokenType::BlockSequenceStart => "<block sequence start>",
            TokenType::BlockMappingStart => "<block mapping start>",
            TokenType::BlockEnd => "<block end>",
            TokenType::FlowSequenceStart => "'['",
            TokenType::FlowSequenceEnd => "']'",
            TokenType::FlowMappingStart => "'{'",
            TokenType::FlowMappingEnd => "'}'",
            TokenType::BlockEntry => "'-'",
            TokenType::FlowEntry => "','",
            TokenType::Key => "'?'",
            TokenType::Value => "':'",
            TokenType::Alias => "<alias>",
            TokenType::Anchor => "<anchor>",
            TokenType::Tag => "<tag>",
            TokenType::Scalar => "<scalar>",
        })
    }
}
