use std::collections::{HashMap, HashSet};

use crate::{
    resolver, CollectionEvent, DumpConfig, EmitterError, Error, Event, Implicit, NodeData,
    NodeGraph, NodeId, ScalarEvent,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum SerializerError {
    #[error("serializer is not opened")]
    NotOpened,
    #[error("serializer is already opened")]
    AlreadyOpened,
    #[error("serializer is closed")]
    Closed,
}

/// Receives the events produced by a [`Serializer`].
pub trait EventSink {
    fn emit(&mut self, event: Event) -> Result<(), EmitterError>;
}

impl EventSink for Vec<Event> {
    #[inline]
    fn emit(&mut self, event: Event) -> Result<(), EmitterError> {
        self.push(event);
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    #[inline]
    fn emit(&mut self, event: Event) -> Result<(), EmitterError> {
        (**self).emit(event)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Status {
    New,
    Open,
    Closed,
}

/// Turns node graphs into events, one document per graph.
///
/// Collection nodes reached more than once are written in full the first
/// time with an anchor (`id001`, `id002`, ...) and as aliases afterwards.
pub struct Serializer<S> {
    sink: S,
    explicit_start: bool,
    explicit_end: bool,
    version: Option<(u32, u32)>,
    tags: Vec<(String, String)>,
    status: Status,
    anchors: HashMap<NodeId, Option<String>>,
    serialized: HashSet<NodeId>,
    last_anchor_id: usize,
}

enum Step {
    Node(NodeId),
    SequenceEnd,
    MappingEnd,
}

impl<S: EventSink> Serializer<S> {
    pub fn new(sink: S, config: &DumpConfig) -> Self {
        Self {
            sink,
            explicit_start: config.explicit_start,
            explicit_end: config.explicit_end,
            version: config.version,
            tags: config.tags.clone(),
            status: Status::New,
            anchors: HashMap::new(),
            serialized: HashSet::new(),
            last_anchor_id: 0,
        }
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    pub fn open(&mut self) -> Result<(), Error> {
        match self.status {
            Status::New => {
                self.sink.emit(Event::StreamStart)?;
                self.status = Status::Open;
                Ok(())
            }
            Status::Open => Err(SerializerError::AlreadyOpened.into()),
            Status::Closed => Err(SerializerError::Closed.into()),
        }
    }

    pub fn close(&mut self) -> Result<(), Error> {
        match self.status {
            Status::New => Err(SerializerError::NotOpened.into()),
            Status::Open => {
                self.sink.emit(Event::StreamEnd)?;
                self.status = Status::Closed;
                Ok(())
            }
            Status::Closed => Ok(()),
        }
    }

    /// Write one document.
    pub fn serialize(&mut self, graph: &NodeGraph) -> Result<(), Error> {
        match self.status {
            Status::New => return Err(SerializerError::NotOpened.into()),
            Status::Closed => return Err(SerializerError::Closed.into()),
            Status::Open => {}
        }

        self.sink.emit(Event::DocumentStart {
            explicit: self.explicit_start,
            version: self.version,
            tags: self.tags.clone(),
        })?;
        if let Some(root) = graph.root() {
            self.anchor_nodes(graph, root);
            self.serialize_nodes(graph, root)?;
        } else {
            self.sink.emit(Event::Scalar(ScalarEvent {
                anchor: None,
                tag: Some(resolver::NULL_TAG.to_owned()),
                implicit: Implicit {
                    plain: true,
                    quoted: false,
                },
                value: "null".to_owned(),
                style: None,
            }))?;
        }
        self.sink.emit(Event::DocumentEnd {
            explicit: self.explicit_end,
        })?;

        self.anchors.clear();
        self.serialized.clear();
        self.last_anchor_id = 0;
        Ok(())
    }

    /// Give an anchor to every node reachable more than once, numbered in
    /// the order the second reference is found.
    fn anchor_nodes(&mut self, graph: &NodeGraph, root: NodeId) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if let Some(anchor) = self.anchors.get_mut(&node) {
                if anchor.is_none() {
                    self.last_anchor_id += 1;
                    *anchor = Some(format!("id{:03}", self.last_anchor_id));
                }
                continue;
            }
            self.anchors.insert(node, None);
            match &graph[node].data {
                NodeData::Scalar { .. } => {}
                NodeData::Sequence { items, .. } => stack.extend(items.iter().rev()),
                NodeData::Mapping { pairs, .. } => {
                    for &(key, value) in pairs.iter().rev() {
                        stack.push(value);
                        stack.push(key);
                    }
                }
            }
        }
        if self.last_anchor_id > 0 {
            log::debug!("assigned {} anchors", self.last_anchor_id);
        }
    }

    fn serialize_nodes(&mut self, graph: &NodeGraph, root: NodeId) -> Result<(), Error> {
        let mut steps = vec![Step::Node(root)];
        while let Some(step) = steps.pop() {
            let node_id = match step {
                Step::Node(node_id) => node_id,
                Step::SequenceEnd => {
                    self.sink.emit(Event::SequenceEnd)?;
                    continue;
                }
                Step::MappingEnd => {
                    self.sink.emit(Event::MappingEnd)?;
                    continue;
                }
            };

            let anchor = self.anchors.get(&node_id).cloned().flatten();
            if !self.serialized.insert(node_id) {
                if let Some(anchor) = anchor {
                    self.sink.emit(Event::Alias(anchor))?;
                    continue;
                }
            }

            let node = &graph[node_id];
            let event = match &node.data {
                NodeData::Scalar { value, style } => Event::Scalar(ScalarEvent {
                    anchor,
                    tag: Some(node.tag.clone()),
                    implicit: Implicit {
                        plain: node.tag == resolver::resolve_scalar(value, true),
                        quoted: node.tag == resolver::resolve_scalar(value, false),
                    },
                    value: value.clone(),
                    style: *style,
                }),
                NodeData::Sequence { items, style } => {
                    steps.push(Step::SequenceEnd);
                    steps.extend(items.iter().rev().map(|&item| Step::Node(item)));
                    Event::SequenceStart(CollectionEvent {
                        anchor,
                        tag: Some(node.tag.clone()),
                        implicit: node.tag == resolver::DEFAULT_SEQUENCE_TAG,
                        style: *style,
                    })
                }
                NodeData::Mapping { pairs, style } => {
                    steps.push(Step::MappingEnd);
                    for &(key, value) in pairs.iter().rev() {
                        steps.push(Step::Node(value));
                        steps.push(Step::Node(key));
                    }
                    Event::MappingStart(CollectionEvent {
                        anchor,
                        tag: Some(node.tag.clone()),
                        implicit: node.tag == resolver::DEFAULT_MAPPING_TAG,
                        style: *style,
                    })
                }
            };
            log::trace!("serialize {}", event.kind());
            self.sink.emit(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{represent_document, Builder, CollectionStyle, Document, Value};

    #[track_caller]
    fn serialize(doc: &Document, config: &DumpConfig) -> Vec<Event> {
        let graph = represent_document(doc, config).unwrap();
        let mut serializer = Serializer::new(Vec::new(), config);
        serializer.open().unwrap();
        serializer.serialize(&graph).unwrap();
        serializer.close().unwrap();
        serializer.into_inner()
    }

    fn scalar(value: &str, tag: &str, plain: bool) -> Event {
        Event::Scalar(ScalarEvent {
            anchor: None,
            tag: Some(tag.to_owned()),
            implicit: Implicit {
                plain,
                quoted: tag == resolver::STR_TAG,
            },
            value: value.to_owned(),
            style: None,
        })
    }

    #[test]
    fn implicit_flags() {
        let value = Value::seq([Value::Int(1), Value::from("1"), Value::from("a")]);
        let events = serialize(&Document::from_value(&value), &DumpConfig::default());
        assert_eq!(
            events,
            [
                Event::StreamStart,
                Event::document_start(false),
                Event::SequenceStart(CollectionEvent {
                    anchor: None,
                    tag: Some(resolver::SEQ_TAG.to_owned()),
                    implicit: true,
                    style: CollectionStyle::Block,
                }),
                scalar("1", resolver::INT_TAG, true),
                scalar("1", resolver::STR_TAG, false),
                scalar("a", resolver::STR_TAG, true),
                Event::SequenceEnd,
                Event::DocumentEnd { explicit: false },
                Event::StreamEnd,
            ]
        );
    }

    #[test]
    fn anchors_and_aliases() {
        let mut builder = Builder::new();
        let x = builder.share(vec![1]).unwrap();
        let y = builder.share(vec![2]).unwrap();
        let doc = builder.build(vec![x, y, y, x]).unwrap();
        let events = serialize(&doc, &DumpConfig::default());

        let anchors: Vec<_> = events.iter().filter_map(Event::anchor).collect();
        // `y` is found shared first, so it gets the first anchor.
        assert_eq!(anchors, ["id002", "id001", "id001", "id002"]);
        assert!(matches!(events[9], Event::Alias(ref name) if name == "id001"));
    }

    #[test]
    fn directives() {
        let config = DumpConfig::new()
            .with_explicit_start(true)
            .with_explicit_end(true)
            .with_version(Some((1, 1)))
            .with_tag("!e!", "tag:example.com,2000:");
        let events = serialize(&Document::from_value(&Value::Null), &config);
        assert_eq!(
            events[1],
            Event::DocumentStart {
                explicit: true,
                version: Some((1, 1)),
                tags: vec![("!e!".to_owned(), "tag:example.com,2000:".to_owned())],
            }
        );
        assert_eq!(events[3], Event::DocumentEnd { explicit: true });
    }

    #[test]
    fn status_errors() {
        let graph = NodeGraph::default();
        let mut serializer = Serializer::new(Vec::new(), &DumpConfig::default());
        assert!(matches!(
            serializer.serialize(&graph),
            Err(Error::Serializer(SerializerError::NotOpened))
        ));
        assert!(matches!(
            serializer.close(),
            Err(Error::Serializer(SerializerError::NotOpened))
        ));
        serializer.open().unwrap();
        assert!(matches!(
            serializer.open(),
            Err(Error::Serializer(SerializerError::AlreadyOpened))
        ));
        serializer.close().unwrap();
        assert!(matches!(
            serializer.serialize(&graph),
            Err(Error::Serializer(SerializerError::Closed))
        ));
        assert!(matches!(
            serializer.open(),
            Err(Error::Serializer(SerializerError::Closed))
        ));
    }
}
