use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    resolver::{self, short_tag},
    Document, NodeData, NodeGraph, NodeId, SourceLocation, Timestamp, ValueData, ValueId,
};

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum ConstructorError {
    #[error("while constructing a mapping at {context_location}: found duplicate key {key} at {location}")]
    DuplicateKey {
        key: String,
        context_location: SourceLocation,
        location: SourceLocation,
    },
    #[error("while constructing a mapping at {context_location}: found unhashable key at {location}")]
    UnhashableKey {
        context_location: SourceLocation,
        location: SourceLocation,
    },
    #[error("while constructing a mapping at {context_location}: expected a mapping or list of mappings for merging, but found {found} at {location}")]
    InvalidMerge {
        found: &'static str,
        context_location: SourceLocation,
        location: SourceLocation,
    },
    #[error("found a mapping that merges into itself at {location}")]
    RecursiveMerge { location: SourceLocation },
    #[error("invalid value for {tag}: {problem} at {location}")]
    InvalidScalar {
        tag: String,
        problem: String,
        location: SourceLocation,
    },
    #[error("integer {value} does not fit in 64 bits at {location}")]
    IntegerOverflow {
        value: String,
        location: SourceLocation,
    },
    #[error("could not determine a constructor for the tag {tag} at {location}")]
    UnknownTag {
        tag: String,
        location: SourceLocation,
    },
    #[error("expected {expected} for {tag}, but found {found} at {location}")]
    UnexpectedNodeKind {
        tag: String,
        expected: &'static str,
        found: &'static str,
        location: SourceLocation,
    },
    #[error("while constructing {tag} at {context_location}: expected a mapping of length 1, but found {found} at {location}")]
    InvalidPairs {
        tag: String,
        found: String,
        context_location: SourceLocation,
        location: SourceLocation,
    },
}

impl ConstructorError {
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            ConstructorError::DuplicateKey { location, .. }
            | ConstructorError::UnhashableKey { location, .. }
            | ConstructorError::InvalidMerge { location, .. }
            | ConstructorError::RecursiveMerge { location }
            | ConstructorError::InvalidScalar { location, .. }
            | ConstructorError::IntegerOverflow { location, .. }
            | ConstructorError::UnknownTag { location, .. }
            | ConstructorError::UnexpectedNodeKind { location, .. }
            | ConstructorError::InvalidPairs { location, .. } => Some(*location),
        }
    }

    pub fn context_location(&self) -> Option<SourceLocation> {
        match self {
            ConstructorError::DuplicateKey {
                context_location, ..
            }
            | ConstructorError::UnhashableKey {
                context_location, ..
            }
            | ConstructorError::InvalidMerge {
                context_location, ..
            }
            | ConstructorError::InvalidPairs {
                context_location, ..
            } => Some(*context_location),
            _ => None,
        }
    }
}

/// Turn a node graph into a [`Document`]. An empty graph gives a document
/// whose root is `null`.
pub fn construct_document(graph: &NodeGraph) -> Result<Document, ConstructorError> {
    let mut constructor = Constructor::new(graph);
    let root = match graph.root() {
        Some(root) => constructor.construct(root)?,
        None => constructor.doc.add(ValueData::Null),
    };
    let mut doc = constructor.doc;
    doc.set_root(root);
    log::debug!("constructed document with {} values", doc.len());
    Ok(doc)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Scalar,
    Sequence,
    Mapping,
}

impl NodeKind {
    fn of(data: &NodeData) -> Self {
        match data {
            NodeData::Scalar { .. } => NodeKind::Scalar,
            NodeData::Sequence { .. } => NodeKind::Sequence,
            NodeData::Mapping { .. } => NodeKind::Mapping,
        }
    }

    /// The node kind a tag applies to, for the tags the constructor knows.
    fn for_tag(tag: &str) -> Option<Self> {
        match tag {
            resolver::NULL_TAG
            | resolver::BOOL_TAG
            | resolver::INT_TAG
            | resolver::FLOAT_TAG
            | resolver::STR_TAG
            | resolver::BINARY_TAG
            | resolver::TIMESTAMP_TAG => Some(NodeKind::Scalar),
            resolver::SEQ_TAG | resolver::OMAP_TAG | resolver::PAIRS_TAG => {
                Some(NodeKind::Sequence)
            }
            resolver::MAP_TAG | resolver::SET_TAG => Some(NodeKind::Mapping),
            _ => None,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            NodeKind::Scalar => "a scalar node",
            NodeKind::Sequence => "a sequence node",
            NodeKind::Mapping => "a mapping node",
        }
    }
}

/// A mapping entry after merge keys are expanded.
#[derive(Clone, Copy)]
struct Entry {
    key: NodeId,
    value: NodeId,
    merged: bool,
}

enum Task {
    Enter(NodeId),
    /// A mapping key, where `=` stands for the string it spells.
    EnterKey(NodeId),
    FinishSequence {
        node: NodeId,
        id: ValueId,
    },
    FinishMapping {
        node: NodeId,
        id: ValueId,
        entries: Vec<Entry>,
        set: bool,
    },
    FinishPairs {
        node: NodeId,
        id: ValueId,
        pairs: Vec<(NodeId, NodeId)>,
        unique: bool,
    },
}

struct Constructor<'g> {
    graph: &'g NodeGraph,
    doc: Document,
    constructed: HashMap<NodeId, ValueId>,
}

impl<'g> Constructor<'g> {
    fn new(graph: &'g NodeGraph) -> Self {
        Self {
            graph,
            doc: Document::new(),
            constructed: HashMap::new(),
        }
    }

    fn value_of(&self, node: NodeId) -> ValueId {
        match self.constructed.get(&node) {
            Some(&id) => id,
            None => unreachable!("node {node:?} finished before its children"),
        }
    }

    fn construct(&mut self, root: NodeId) -> Result<ValueId, ConstructorError> {
        let mut tasks = vec![Task::Enter(root)];

        while let Some(task) = tasks.pop() {
            match task {
                Task::Enter(node) => self.enter(node, false, &mut tasks)?,
                Task::EnterKey(node) => self.enter(node, true, &mut tasks)?,
                Task::FinishSequence { node, id } => {
                    let NodeData::Sequence { items, .. } = &self.graph[node].data else {
                        unreachable!("sequence task for {node:?}")
                    };
                    let items = items.iter().map(|&item| self.value_of(item)).collect();
                    if let Some(data) = self.doc.get_mut(id) {
                        *data = ValueData::Sequence(items);
                    }
                }
                Task::FinishMapping {
                    node,
                    id,
                    entries,
                    set,
                } => self.finish_mapping(node, id, &entries, set)?,
                Task::FinishPairs {
                    node,
                    id,
                    pairs,
                    unique,
                } => self.finish_pairs(node, id, &pairs, unique)?,
            }
        }

        Ok(self.value_of(root))
    }

    fn enter(
        &mut self,
        node_id: NodeId,
        as_key: bool,
        tasks: &mut Vec<Task>,
    ) -> Result<(), ConstructorError> {
        if self.constructed.contains_key(&node_id) {
            return Ok(());
        }

        let graph = self.graph;
        let node = &graph[node_id];
        let location = node.span.start;
        let kind = NodeKind::of(&node.data);
        let tag = if as_key && node.tag == resolver::VALUE_TAG {
            resolver::STR_TAG
        } else {
            node.tag.as_str()
        };

        let Some(expected) = NodeKind::for_tag(tag) else {
            return Err(ConstructorError::UnknownTag {
                tag: short_tag(tag).into_owned(),
                location,
            });
        };
        if expected != kind {
            return Err(ConstructorError::UnexpectedNodeKind {
                tag: short_tag(tag).into_owned(),
                expected: expected.describe(),
                found: node.data.kind(),
                location,
            });
        }

        match &node.data {
            NodeData::Scalar { value, .. } => {
                let data = construct_scalar(tag, value, location)?;
                let id = self.doc.add(data);
                self.constructed.insert(node_id, id);
            }
            NodeData::Sequence { items, .. } => {
                let id = self.doc.add(ValueData::Sequence(Vec::new()));
                self.constructed.insert(node_id, id);
                if node.tag == resolver::SEQ_TAG {
                    tasks.push(Task::FinishSequence { node: node_id, id });
                    tasks.extend(items.iter().rev().map(|&item| Task::Enter(item)));
                } else {
                    let pairs = self.collect_pairs(node_id)?;
                    tasks.push(Task::FinishPairs {
                        node: node_id,
                        id,
                        pairs: pairs.clone(),
                        unique: node.tag == resolver::OMAP_TAG,
                    });
                    for (key, value) in pairs.into_iter().rev() {
                        tasks.push(Task::Enter(value));
                        tasks.push(Task::Enter(key));
                    }
                }
            }
            NodeData::Mapping { .. } => {
                let id = self.doc.add(ValueData::Mapping(Vec::new()));
                self.constructed.insert(node_id, id);
                let entries = self.flatten(node_id, &mut vec![node_id])?;
                tasks.push(Task::FinishMapping {
                    node: node_id,
                    id,
                    entries: entries.clone(),
                    set: node.tag == resolver::SET_TAG,
                });
                for entry in entries.into_iter().rev() {
                    tasks.push(Task::Enter(entry.value));
                    tasks.push(Task::EnterKey(entry.key));
                }
            }
        }
        Ok(())
    }

    /// The entries of a mapping with `<<` keys replaced by the entries they
    /// merge in. Merged entries come first; among several merge sources,
    /// earlier ones take precedence.
    fn flatten(
        &self,
        node_id: NodeId,
        merging: &mut Vec<NodeId>,
    ) -> Result<Vec<Entry>, ConstructorError> {
        let node = &self.graph[node_id];
        let NodeData::Mapping { pairs, .. } = &node.data else {
            unreachable!("flattening {}", node.data.kind())
        };

        let mut merged = Vec::new();
        let mut explicit = Vec::new();
        for &(key, value) in pairs {
            if self.graph[key].tag != resolver::MERGE_TAG {
                explicit.push(Entry {
                    key,
                    value,
                    merged: false,
                });
                continue;
            }

            let source = &self.graph[value];
            match &source.data {
                NodeData::Mapping { .. } => {
                    merged.extend(self.flatten_source(value, merging)?);
                }
                NodeData::Sequence { items, .. } => {
                    let mut sources = Vec::with_capacity(items.len());
                    for &item in items {
                        let item_node = &self.graph[item];
                        if !matches!(item_node.data, NodeData::Mapping { .. }) {
                            return Err(ConstructorError::InvalidMerge {
                                found: item_node.data.kind(),
                                context_location: node.span.start,
                                location: item_node.span.start,
                            });
                        }
                        sources.push(self.flatten_source(item, merging)?);
                    }
                    for entries in sources.into_iter().rev() {
                        merged.extend(entries);
                    }
                }
                NodeData::Scalar { .. } => {
                    return Err(ConstructorError::InvalidMerge {
                        found: source.data.kind(),
                        context_location: node.span.start,
                        location: source.span.start,
                    });
                }
            }
        }

        merged.extend(explicit);
        Ok(merged)
    }

    fn flatten_source(
        &self,
        source: NodeId,
        merging: &mut Vec<NodeId>,
    ) -> Result<Vec<Entry>, ConstructorError> {
        if merging.contains(&source) {
            return Err(ConstructorError::RecursiveMerge {
                location: self.graph[source].span.start,
            });
        }
        merging.push(source);
        let mut entries = self.flatten(source, merging)?;
        merging.pop();
        for entry in &mut entries {
            entry.merged = true;
        }
        Ok(entries)
    }

    fn finish_mapping(
        &mut self,
        node: NodeId,
        id: ValueId,
        entries: &[Entry],
        set: bool,
    ) -> Result<(), ConstructorError> {
        let context_location = self.graph[node].span.start;
        let null = set.then(|| self.doc.add(ValueData::Null));

        let mut pairs: Vec<(ValueId, ValueId)> = Vec::with_capacity(entries.len());
        let mut explicit: Vec<bool> = Vec::with_capacity(entries.len());

        for entry in entries {
            let key = self.value_of(entry.key);
            let value = null.unwrap_or_else(|| self.value_of(entry.value));
            let location = self.graph[entry.key].span.start;

            let Some(key_data) = self.doc.get(key) else {
                unreachable!("constructed key {key:?} is missing")
            };
            if key_data.is_collection() {
                return Err(ConstructorError::UnhashableKey {
                    context_location,
                    location,
                });
            }

            let existing = pairs
                .iter()
                .position(|&(k, _)| self.doc.get(k) == Some(key_data));
            match existing {
                Some(index) => {
                    if !entry.merged && explicit[index] {
                        return Err(ConstructorError::DuplicateKey {
                            key: describe_key(key_data),
                            context_location,
                            location,
                        });
                    }
                    pairs[index].1 = value;
                    explicit[index] |= !entry.merged;
                }
                None => {
                    pairs.push((key, value));
                    explicit.push(!entry.merged);
                }
            }
        }

        if let Some(data) = self.doc.get_mut(id) {
            *data = ValueData::Mapping(pairs);
        }
        Ok(())
    }

    /// `!!omap` and `!!pairs`: a sequence of single-entry mappings.
    fn collect_pairs(&self, node_id: NodeId) -> Result<Vec<(NodeId, NodeId)>, ConstructorError> {
        let node = &self.graph[node_id];
        let NodeData::Sequence { items, .. } = &node.data else {
            unreachable!("collecting pairs from {}", node.data.kind())
        };

        items
            .iter()
            .map(|&item| {
                let item_node = &self.graph[item];
                match &item_node.data {
                    NodeData::Mapping { pairs, .. } if pairs.len() == 1 => Ok(pairs[0]),
                    NodeData::Mapping { pairs, .. } => Err(ConstructorError::InvalidPairs {
                        tag: short_tag(&node.tag).into_owned(),
                        found: format!("a mapping of length {}", pairs.len()),
                        context_location: node.span.start,
                        location: item_node.span.start,
                    }),
                    other => Err(ConstructorError::InvalidPairs {
                        tag: short_tag(&node.tag).into_owned(),
                        found: other.kind().to_owned(),
                        context_location: node.span.start,
                        location: item_node.span.start,
                    }),
                }
            })
            .collect()
    }

    fn finish_pairs(
        &mut self,
        node: NodeId,
        id: ValueId,
        pairs: &[(NodeId, NodeId)],
        unique: bool,
    ) -> Result<(), ConstructorError> {
        let mut keys: Vec<ValueId> = Vec::with_capacity(pairs.len());
        let mut items = Vec::with_capacity(pairs.len());

        for &(key_node, value_node) in pairs {
            let key = self.value_of(key_node);
            let value = self.value_of(value_node);
            if unique {
                let key_data = self.doc.get(key);
                if keys.iter().any(|&k| self.doc.get(k) == key_data) {
                    return Err(ConstructorError::DuplicateKey {
                        key: key_data.map(describe_key).unwrap_or_default(),
                        context_location: self.graph[node].span.start,
                        location: self.graph[key_node].span.start,
                    });
                }
                keys.push(key);
            }
            items.push(self.doc.add(ValueData::Sequence(vec![key, value])));
        }

        if let Some(data) = self.doc.get_mut(id) {
            *data = ValueData::Sequence(items);
        }
        Ok(())
    }
}

fn describe_key(data: &ValueData) -> String {
    match data {
        ValueData::Null => "null".to_owned(),
        ValueData::Bool(b) => b.to_string(),
        ValueData::Int(i) => i.to_string(),
        ValueData::Float(f) => f.to_string(),
        ValueData::String(s) => format!("{s:?}"),
        ValueData::Binary(b) => format!("<{} bytes>", b.len()),
        ValueData::Timestamp(ts) => ts.to_string(),
        ValueData::Sequence(_) | ValueData::Mapping(_) => data.kind().to_owned(),
    }
}

fn construct_scalar(
    tag: &str,
    value: &str,
    location: SourceLocation,
) -> Result<ValueData, ConstructorError> {
    let invalid = |problem: &str| ConstructorError::InvalidScalar {
        tag: short_tag(tag).into_owned(),
        problem: problem.to_owned(),
        location,
    };

    Ok(match tag {
        resolver::NULL_TAG => ValueData::Null,
        resolver::BOOL_TAG => match value.to_ascii_lowercase().as_str() {
            "yes" | "true" | "on" => ValueData::Bool(true),
            "no" | "false" | "off" => ValueData::Bool(false),
            _ => return Err(invalid(&format!("{value:?} is not a boolean"))),
        },
        resolver::INT_TAG => match construct_int(value) {
            Ok(i) => ValueData::Int(i),
            Err(IntError::Overflow) => {
                return Err(ConstructorError::IntegerOverflow {
                    value: value.to_owned(),
                    location,
                })
            }
            Err(IntError::Invalid) => {
                return Err(invalid(&format!("{value:?} is not an integer")))
            }
        },
        resolver::FLOAT_TAG => match construct_float(value) {
            Some(f) => ValueData::Float(f),
            None => return Err(invalid(&format!("{value:?} is not a number"))),
        },
        resolver::BINARY_TAG => {
            let encoded: String = value.chars().filter(|c| !c.is_whitespace()).collect();
            match STANDARD.decode(encoded) {
                Ok(bytes) => ValueData::Binary(bytes),
                Err(err) => return Err(invalid(&format!("failed to decode base64 data: {err}"))),
            }
        }
        resolver::TIMESTAMP_TAG => match value.parse::<Timestamp>() {
            Ok(ts) => ValueData::Timestamp(ts),
            Err(err) => return Err(invalid(&err.to_string())),
        },
        _ => ValueData::String(value.to_owned()),
    })
}

#[derive(Debug, PartialEq, Eq)]
enum IntError {
    Invalid,
    Overflow,
}

fn parse_radix(digits: &str, radix: u32) -> Result<i128, IntError> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(IntError::Invalid);
    }
    i128::from_str_radix(digits, radix).map_err(|_| IntError::Overflow)
}

fn construct_int(value: &str) -> Result<i64, IntError> {
    let cleaned: String = value.chars().filter(|&c| c != '_').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };

    let magnitude = if let Some(binary) = digits.strip_prefix("0b") {
        parse_radix(binary, 2)?
    } else if let Some(hex) = digits.strip_prefix("0x") {
        parse_radix(hex, 16)?
    } else if let Some(octal) = digits.strip_prefix("0o") {
        parse_radix(octal, 8)?
    } else if digits.len() > 1 && digits.starts_with('0') {
        parse_radix(&digits[1..], 8)?
    } else if digits.contains(':') {
        let mut total: i128 = 0;
        for part in digits.split(':') {
            total = total
                .checked_mul(60)
                .and_then(|total| total.checked_add(parse_radix(part, 10).ok()?))
                .ok_or(IntError::Invalid)?;
        }
        total
    } else {
        parse_radix(digits, 10)?
    };

    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).map_err(|_| IntError::Overflow)
}

fn construct_float(value: &str) -> Option<f64> {
    let cleaned = value.replace('_', "").to_ascii_lowercase();
    let (sign, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };

    let magnitude = match body {
        ".inf" => f64::INFINITY,
        ".nan" => return Some(f64::NAN),
        _ if body.contains(':') => {
            let mut total = 0.0;
            for part in body.split(':') {
                total = total * 60.0 + part.parse::<f64>().ok()?;
            }
            total
        }
        _ => body.parse::<f64>().ok()?,
    };
    Some(sign * magnitude)
}
