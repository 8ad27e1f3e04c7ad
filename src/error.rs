use crate::{
    BuilderError, ComposerError, ConstructorError, EmitterError, ParserError, ReaderError,
    RepresenterError, ScannerError, SerializerError, SourceLocation,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Scanner(#[from] ScannerError),
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error(transparent)]
    Composer(#[from] ComposerError),
    #[error(transparent)]
    Constructor(#[from] ConstructorError),
    #[error(transparent)]
    Representer(#[from] RepresenterError),
    #[error(transparent)]
    Serializer(#[from] SerializerError),
    #[error(transparent)]
    Emitter(#[from] EmitterError),
    #[error(transparent)]
    Builder(#[from] BuilderError),
}

/// The pipeline stage an [`Error`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Reader,
    Scanner,
    Parser,
    Composer,
    Constructor,
    Representer,
    Serializer,
    Emitter,
    Builder,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Reader(_) => ErrorKind::Reader,
            Error::Scanner(_) => ErrorKind::Scanner,
            Error::Parser(_) => ErrorKind::Parser,
            Error::Composer(_) => ErrorKind::Composer,
            Error::Constructor(_) => ErrorKind::Constructor,
            Error::Representer(_) => ErrorKind::Representer,
            Error::Serializer(_) => ErrorKind::Serializer,
            Error::Emitter(_) => ErrorKind::Emitter,
            Error::Builder(_) => ErrorKind::Builder,
        }
    }

    /// Where in the input the problem was found. Only load errors carry a
    /// position.
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Error::Reader(err) => err.location(),
            Error::Scanner(err) => Some(err.location()),
            Error::Parser(err) => Some(err.location()),
            Error::Composer(err) => Some(err.location()),
            Error::Constructor(err) => err.location(),
            _ => None,
        }
    }

    /// Where the construct containing the problem started, e.g. the `[` of
    /// an unclosed flow sequence.
    pub fn context_location(&self) -> Option<SourceLocation> {
        match self {
            Error::Scanner(err) => err.context_location(),
            Error::Parser(err) => err.context_location(),
            Error::Composer(err) => err.context_location(),
            Error::Constructor(err) => err.context_location(),
            _ => None,
        }
    }

    /// 1-based line of [`Error::location`].
    pub fn line(&self) -> Option<usize> {
        self.location().map(|location| location.line_number())
    }

    /// 1-based column of [`Error::location`].
    pub fn column(&self) -> Option<usize> {
        self.location().map(|location| location.column_number())
    }
}

impl PartialEq<ScannerError> for Error {
    fn eq(&self, other: &ScannerError) -> bool {
        if let Error::Scanner(err) = self {
            *err == *other
        } else {
            false
        }
    }
}

impl PartialEq<ParserError> for Error {
    fn eq(&self, other: &ParserError) -> bool {
        if let Error::Parser(err) = self {
            *err == *other
        } else {
            false
        }
    }
}
