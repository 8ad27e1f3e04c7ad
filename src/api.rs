use crate::{
    check_printable, construct_document, decode, represent_document, Composer, Document,
    DumpConfig, Emitter, EmitterError, Error, EventSink, Parser, Serializer, Value,
};

/// Loads documents one at a time from a stream.
///
/// Iteration stops after the first error.
pub struct Loader {
    composer: Composer,
    failed: bool,
}

impl Loader {
    pub fn new(text: &str) -> Self {
        Self {
            composer: Composer::new(Parser::new(text)),
            failed: false,
        }
    }

    fn next_document(&mut self) -> Result<Option<Document>, Error> {
        let Some(graph) = self.composer.next_graph()? else {
            return Ok(None);
        };
        Ok(Some(construct_document(&graph)?))
    }
}

impl Iterator for Loader {
    type Item = Result<Document, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.next_document().transpose();
        if let Some(Err(_)) = next {
            self.failed = true;
        }
        next
    }
}

/// Load the single document in `text`.
///
/// An empty stream loads as null. A stream with more than one document is
/// an error.
pub fn loads(text: &str) -> Result<Document, Error> {
    check_printable(text)?;
    load_single(text)
}

/// Load every document in `text`.
pub fn loads_all(text: &str) -> Result<Vec<Document>, Error> {
    check_printable(text)?;
    load_all(text)
}

/// Like [`loads`], for UTF-8 or UTF-16 input with an optional byte order
/// mark.
pub fn loads_bytes(bytes: &[u8]) -> Result<Document, Error> {
    load_single(&decode(bytes)?)
}

/// Like [`loads_all`], for UTF-8 or UTF-16 input with an optional byte
/// order mark.
pub fn loads_all_bytes(bytes: &[u8]) -> Result<Vec<Document>, Error> {
    load_all(&decode(bytes)?)
}

fn load_single(text: &str) -> Result<Document, Error> {
    let mut composer = Composer::new(Parser::new(text));
    let doc = match composer.single_graph()? {
        Some(graph) => construct_document(&graph)?,
        None => Document::from_value(&Value::Null),
    };
    log::debug!("loaded document with {} values", doc.len());
    Ok(doc)
}

fn load_all(text: &str) -> Result<Vec<Document>, Error> {
    let docs = Loader::new(text).collect::<Result<Vec<_>, _>>()?;
    log::debug!("loaded {} documents", docs.len());
    Ok(docs)
}

/// Write one document as YAML text.
pub fn dumps(doc: &Document, config: &DumpConfig) -> Result<String, Error> {
    dumps_all(std::slice::from_ref(doc), config)
}

/// Write a stream of documents as YAML text.
pub fn dumps_all(docs: &[Document], config: &DumpConfig) -> Result<String, Error> {
    config.validate()?;
    let mut emitter = Emitter::new(String::new(), config);
    serialize_all(&mut emitter, docs, config)?;
    Ok(emitter.into_inner())
}

pub fn dumps_value(value: &Value, config: &DumpConfig) -> Result<String, Error> {
    dumps(&Document::from_value(value), config)
}

/// Write one document as bytes in `config.encoding` (UTF-8 by default).
pub fn dumps_encoded(doc: &Document, config: &DumpConfig) -> Result<Vec<u8>, Error> {
    let text = dumps(doc, config)?;
    Ok(config.encoding.unwrap_or_default().encode(&text))
}

/// Write a stream of documents to an [`std::io::Write`] writer, in
/// `config.encoding` (UTF-8 by default).
///
/// Nothing is written unless every document dumps. I/O failures are
/// reported as [`EmitterError::Write`](crate::EmitterError::Write).
pub fn dump_all<W: std::io::Write>(
    mut writer: W,
    docs: &[Document],
    config: &DumpConfig,
) -> Result<(), Error> {
    let text = dumps_all(docs, config)?;
    let bytes = config.encoding.unwrap_or_default().encode(&text);
    writer.write_all(&bytes).map_err(|err| {
        log::debug!("writing {} bytes failed: {err}", bytes.len());
        EmitterError::Write(std::fmt::Error).into()
    })
}

fn serialize_all<S: EventSink>(
    sink: S,
    docs: &[Document],
    config: &DumpConfig,
) -> Result<(), Error> {
    let mut serializer = Serializer::new(sink, config);
    serializer.open()?;
    for doc in docs {
        let graph = represent_document(doc, config)?;
        serializer.serialize(&graph)?;
    }
    serializer.close()?;
    log::debug!("dumped {} documents", docs.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComposerError, ErrorKind, ReaderError};

    #[test]
    fn empty_streams() {
        assert!(loads("").unwrap().root().is_null());
        assert!(loads("# only a comment\n").unwrap().root().is_null());
        assert!(loads_all("").unwrap().is_empty());
    }

    #[test]
    fn single_document_only() {
        let err = loads("a\n---\nb\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Composer(ComposerError::MultipleDocuments { .. })
        ));
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn loader_stops_after_error() {
        let mut loader = Loader::new("a: 1\n--- [\n--- b\n");
        assert!(loader.next().unwrap().is_ok());
        assert!(loader.next().unwrap().is_err());
        assert!(loader.next().is_none());
    }

    #[test]
    fn non_printable_input() {
        let err = loads("a: \x01").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reader);
        assert!(matches!(
            err,
            Error::Reader(ReaderError::NonPrintable { ch: '\x01', .. })
        ));
    }

    #[test]
    fn bytes() {
        let doc = loads_bytes(b"\xef\xbb\xbfa: 1\n").unwrap();
        assert_eq!(doc.root().get("a").and_then(|v| v.as_i64()), Some(1));

        let utf16 = crate::Encoding::Utf16Be.encode("--- 1\n--- 2\n");
        assert_eq!(loads_all_bytes(&utf16).unwrap().len(), 2);
    }

    #[test]
    fn dump_streams() {
        let docs = [
            Document::from_value(&Value::from("a")),
            Document::from_value(&Value::Int(1)),
        ];
        assert_eq!(
            dumps_all(&docs, &DumpConfig::default()).unwrap(),
            "a\n--- 1\n"
        );
        assert_eq!(dumps_all(&[], &DumpConfig::default()).unwrap(), "");

        let mut out = Vec::new();
        dump_all(&mut out, &docs, &DumpConfig::default()).unwrap();
        assert_eq!(out, b"a\n--- 1\n");
    }

    #[test]
    fn failed_dump_writes_nothing() {
        let mixed = Value::mapping([(Value::from("a"), 1), (Value::Int(1), 2)]);
        let docs = [
            Document::from_value(&Value::mapping([("a", 1)])),
            Document::from_value(&mixed),
        ];
        let mut out = Vec::new();
        let err = dump_all(&mut out, &docs, &DumpConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Representer);
        assert!(out.is_empty());

        let config = DumpConfig::new().with_encoding(Some(crate::Encoding::Utf16Be));
        dump_all(&mut out, &docs[..1], &config).unwrap();
        assert_eq!(&out[..4], &[0xfe, 0xff, 0, b'a']);
    }

    #[test]
    fn encoded_output() {
        let doc = Document::from_value(&Value::from("x"));
        let config = DumpConfig::new().with_encoding(Some(crate::Encoding::Utf16Le));
        let bytes = dumps_encoded(&doc, &config).unwrap();
        assert_eq!(&bytes[..4], &[0xff, 0xfe, b'x', 0]);
        assert_eq!(dumps_encoded(&doc, &DumpConfig::default()).unwrap(), b"x\n");
    }

    #[test]
    fn invalid_config() {
        let doc = Document::from_value(&Value::Null);
        let err = dumps(&doc, &DumpConfig::new().with_indent(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Emitter);
    }
}
