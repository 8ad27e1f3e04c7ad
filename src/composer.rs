use std::collections::HashMap;

use crate::{
    resolver, Error, Event, Node, NodeData, NodeGraph, NodeId, Parser, SourceLocation, Span,
    Spanned,
};

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum ComposerError {
    #[error("found undefined alias {name:?} at {location}")]
    UndefinedAlias {
        name: String,
        location: SourceLocation,
    },
    #[error("expected a single document in the stream, but found another document at {location} (the first document starts at {first})")]
    MultipleDocuments {
        first: SourceLocation,
        location: SourceLocation,
    },
    #[error("unexpected {found} event at {location}")]
    UnexpectedEvent {
        found: &'static str,
        location: SourceLocation,
    },
}

impl ComposerError {
    pub fn location(&self) -> SourceLocation {
        match self {
            ComposerError::UndefinedAlias { location, .. }
            | ComposerError::MultipleDocuments { location, .. }
            | ComposerError::UnexpectedEvent { location, .. } => *location,
        }
    }

    pub fn context_location(&self) -> Option<SourceLocation> {
        match self {
            ComposerError::MultipleDocuments { first, .. } => Some(*first),
            _ => None,
        }
    }
}

/// Builds one [`NodeGraph`] per document from the parser's events.
///
/// Aliases become references to the anchored node, so a graph can share
/// nodes and contain cycles. Anchors are forgotten between documents.
pub struct Composer {
    parser: Parser,
    anchors: HashMap<String, NodeId>,
    started: bool,
}

/// A collection that is still receiving children.
struct Frame {
    node: NodeId,
    pending_key: Option<NodeId>,
}

impl Composer {
    pub fn new(parser: Parser) -> Self {
        Self {
            parser,
            anchors: HashMap::new(),
            started: false,
        }
    }

    fn next_event(&mut self) -> Result<Spanned<Event>, Error> {
        match self.parser.next_event()? {
            Some(event) => Ok(event),
            None => Err(ComposerError::UnexpectedEvent {
                found: Event::StreamEnd.kind(),
                location: SourceLocation::default(),
            }
            .into()),
        }
    }

    fn skip_stream_start(&mut self) -> Result<(), Error> {
        if !self.started {
            self.started = true;
            if let Some(Spanned {
                value: Event::StreamStart,
                ..
            }) = self.parser.peek_event()?
            {
                self.parser.next_event()?;
            }
        }
        Ok(())
    }

    /// True if another document follows.
    pub fn check_graph(&mut self) -> Result<bool, Error> {
        self.skip_stream_start()?;
        Ok(!matches!(
            self.parser.peek_event()?,
            None | Some(Spanned {
                value: Event::StreamEnd,
                ..
            })
        ))
    }

    /// The next document's graph, or `None` at the end of the stream.
    pub fn next_graph(&mut self) -> Result<Option<NodeGraph>, Error> {
        if !self.check_graph()? {
            // Consume `StreamEnd`.
            self.parser.next_event()?;
            return Ok(None);
        }
        self.compose_document().map(Some)
    }

    /// The graph of the only document in the stream, or `None` for an
    /// empty stream. A second document is an error.
    pub fn single_graph(&mut self) -> Result<Option<NodeGraph>, Error> {
        if !self.check_graph()? {
            return Ok(None);
        }
        let first = self
            .parser
            .peek_event()?
            .map(Spanned::start)
            .unwrap_or_default();
        let graph = self.compose_document()?;
        if self.check_graph()? {
            let location = self
                .parser
                .peek_event()?
                .map(Spanned::start)
                .unwrap_or_default();
            return Err(ComposerError::MultipleDocuments { first, location }.into());
        }
        Ok(Some(graph))
    }

    fn compose_document(&mut self) -> Result<NodeGraph, Error> {
        let start = self.next_event()?;
        if !matches!(start.value, Event::DocumentStart { .. }) {
            return Err(ComposerError::UnexpectedEvent {
                found: start.value.kind(),
                location: start.start(),
            }
            .into());
        }

        let graph = self.compose_root()?;

        let end = self.next_event()?;
        if !matches!(end.value, Event::DocumentEnd { .. }) {
            return Err(ComposerError::UnexpectedEvent {
                found: end.value.kind(),
                location: end.start(),
            }
            .into());
        }

        self.anchors.clear();
        log::debug!(
            "composed document at {} with {} nodes",
            start.start(),
            graph.len()
        );
        Ok(graph)
    }

    fn register_anchor(&mut self, anchor: Option<String>, id: NodeId) {
        if let Some(anchor) = anchor {
            if let Some(previous) = self.anchors.insert(anchor, id) {
                log::debug!("anchor redefined, replacing node {previous:?}");
            }
        }
    }

    fn compose_root(&mut self) -> Result<NodeGraph, Error> {
        let mut graph = NodeGraph::default();
        let mut stack: Vec<Frame> = Vec::new();

        loop {
            let event = self.next_event()?;
            let span = event.span;
            let kind = event.value.kind();

            let (id, opens) = match event.value {
                Event::Alias(name) => match self.anchors.get(&name) {
                    Some(&id) => (id, false),
                    None => {
                        return Err(ComposerError::UndefinedAlias {
                            name,
                            location: span.start,
                        }
                        .into())
                    }
                },
                Event::Scalar(scalar) => {
                    let tag = match scalar.tag {
                        Some(tag) if tag != "!" => tag,
                        _ => resolver::resolve_scalar(&scalar.value, scalar.implicit.plain)
                            .to_owned(),
                    };
                    let id = graph.add(Node {
                        tag,
                        data: NodeData::Scalar {
                            value: scalar.value,
                            style: scalar.style,
                        },
                        span,
                    });
                    self.register_anchor(scalar.anchor, id);
                    (id, false)
                }
                Event::SequenceStart(collection) => {
                    let tag = match collection.tag {
                        Some(tag) if tag != "!" => tag,
                        _ => resolver::DEFAULT_SEQUENCE_TAG.to_owned(),
                    };
                    let id = graph.add(Node {
                        tag,
                        data: NodeData::Sequence {
                            items: Vec::new(),
                            style: collection.style,
                        },
                        span,
                    });
                    self.register_anchor(collection.anchor, id);
                    (id, true)
                }
                Event::MappingStart(collection) => {
                    let tag = match collection.tag {
                        Some(tag) if tag != "!" => tag,
                        _ => resolver::DEFAULT_MAPPING_TAG.to_owned(),
                    };
                    let id = graph.add(Node {
                        tag,
                        data: NodeData::Mapping {
                            pairs: Vec::new(),
                            style: collection.style,
                        },
                        span,
                    });
                    self.register_anchor(collection.anchor, id);
                    (id, true)
                }
                Event::SequenceEnd | Event::MappingEnd => {
                    let Some(frame) = stack.pop() else {
                        return Err(ComposerError::UnexpectedEvent {
                            found: kind,
                            location: span.start,
                        }
                        .into());
                    };
                    if let Some(node) = graph.get_mut(frame.node) {
                        node.span = Span {
                            start: node.span.start,
                            end: span.end,
                        };
                    }
                    if stack.is_empty() {
                        return Ok(graph);
                    }
                    continue;
                }
                _ => {
                    return Err(ComposerError::UnexpectedEvent {
                        found: kind,
                        location: span.start,
                    }
                    .into())
                }
            };

            match stack.last_mut() {
                Some(parent) => graph.attach(parent.node, id, &mut parent.pending_key),
                None => graph.set_root(id),
            }

            if opens {
                stack.push(Frame {
                    node: id,
                    pending_key: None,
                });
            } else if stack.is_empty() {
                return Ok(graph);
            }
        }
    }
}

impl Iterator for Composer {
    type Item = Result<NodeGraph, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_graph().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScalarStyle;

    #[track_caller]
    fn compose(input: &str) -> NodeGraph {
        Composer::new(Parser::new(input))
            .single_graph()
            .unwrap()
            .expect("no document")
    }

    #[track_caller]
    fn compose_err(input: &str) -> ComposerError {
        match Composer::new(Parser::new(input)).collect::<Result<Vec<_>, _>>() {
            Ok(graphs) => panic!("expected an error, got {} documents", graphs.len()),
            Err(Error::Composer(err)) => err,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    fn scalar(graph: &NodeGraph, id: NodeId) -> (&str, &str) {
        match &graph[id].data {
            NodeData::Scalar { value, .. } => (graph[id].tag.as_str(), value.as_str()),
            other => panic!("expected a scalar, got {}", other.kind()),
        }
    }

    #[test]
    fn resolves_tags() {
        let graph = compose("- 1\n- '1'\n- !!str 2\n- ! 3\n- ~\n- !custom x\n");
        let root = graph.root().unwrap();
        assert_eq!(graph[root].tag, resolver::SEQ_TAG);
        let NodeData::Sequence { items, .. } = &graph[root].data else {
            panic!("expected a sequence")
        };
        let items: Vec<_> = items.iter().map(|&id| scalar(&graph, id)).collect();
        assert_eq!(
            items,
            [
                (resolver::INT_TAG, "1"),
                (resolver::STR_TAG, "1"),
                (resolver::STR_TAG, "2"),
                (resolver::INT_TAG, "3"),
                (resolver::NULL_TAG, "~"),
                ("!custom", "x"),
            ]
        );
    }

    #[test]
    fn aliases_share_nodes() {
        let graph = compose("a: &x [1, 2]\nb: *x\n");
        let root = graph.root().unwrap();
        let NodeData::Mapping { pairs, .. } = &graph[root].data else {
            panic!("expected a mapping")
        };
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1, pairs[1].1);
        assert_eq!(graph.len(), 6);
    }

    #[test]
    fn recursive_alias() {
        let graph = compose("&a [*a]");
        let root = graph.root().unwrap();
        let NodeData::Sequence { items, .. } = &graph[root].data else {
            panic!("expected a sequence")
        };
        assert_eq!(items, &[root]);
    }

    #[test]
    fn anchor_redefinition_overwrites() {
        let graph = compose("- &a one\n- &a two\n- *a\n");
        let root = graph.root().unwrap();
        let NodeData::Sequence { items, .. } = &graph[root].data else {
            panic!("expected a sequence")
        };
        assert_eq!(scalar(&graph, items[2]).1, "two");
    }

    #[test]
    fn undefined_alias() {
        let err = compose_err("a: *nope\n");
        assert_eq!(
            err,
            ComposerError::UndefinedAlias {
                name: "nope".to_owned(),
                location: SourceLocation {
                    offset: 3,
                    line: 0,
                    column: 3,
                },
            }
        );
    }

    #[test]
    fn anchors_do_not_cross_documents() {
        let err = compose_err("--- &a x\n--- *a\n");
        assert!(matches!(err, ComposerError::UndefinedAlias { .. }));
    }

    #[test]
    fn multiple_documents() {
        let mut composer = Composer::new(Parser::new("a\n---\nb\n"));
        let err = composer.single_graph().unwrap_err();
        let Error::Composer(ComposerError::MultipleDocuments { first, location }) = err else {
            panic!("unexpected error {err:?}")
        };
        assert_eq!(first.line, 0);
        assert_eq!(location.line, 1);
    }

    #[test]
    fn stream() {
        let graphs = Composer::new(Parser::new("--- a\n--- |\n  b\n---\n"))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(graphs.len(), 3);
        let root = graphs[1].root().unwrap();
        assert!(matches!(
            graphs[1][root].data,
            NodeData::Scalar {
                style: Some(ScalarStyle::Literal),
                ..
            }
        ));
        let root = graphs[2].root().unwrap();
        assert_eq!(scalar(&graphs[2], root), (resolver::NULL_TAG, ""));
    }

    #[test]
    fn empty_stream() {
        assert!(Composer::new(Parser::new("")).single_graph().unwrap().is_none());
        assert!(Composer::new(Parser::new("# comment\n"))
            .next_graph()
            .unwrap()
            .is_none());
    }
}
