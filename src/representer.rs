use std::{cmp::Ordering, collections::HashMap};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    resolver, CollectionStyle, Document, DumpConfig, Node, NodeData, NodeGraph, NodeId,
    ScalarStyle, Span, ValueData, ValueId,
};

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum RepresenterError {
    #[error("cannot sort mapping keys: {left} and {right} are not comparable")]
    UnorderableKeys {
        left: &'static str,
        right: &'static str,
    },
    #[error("value {0:?} is not part of the document")]
    UndefinedValue(ValueId),
}

/// Turn a document into a node graph ready for serialization.
///
/// Collections reached more than once become the same node, so the
/// serializer can write them with anchors and aliases. Scalars always get
/// a node of their own.
pub fn represent_document(
    doc: &Document,
    config: &DumpConfig,
) -> Result<NodeGraph, RepresenterError> {
    let mut representer = Representer {
        config,
        doc,
        graph: NodeGraph::default(),
        represented: HashMap::new(),
        pending: Vec::new(),
    };

    let root = match doc.root_id() {
        Some(root) => representer.represent(root)?,
        None => representer.scalar(resolver::NULL_TAG, "null".to_owned(), None),
    };
    while let Some((value, node)) = representer.pending.pop() {
        representer.fill(value, node)?;
    }

    let mut graph = representer.graph;
    graph.set_root(root);
    log::debug!("represented document as {} nodes", graph.len());
    Ok(graph)
}

struct Representer<'a> {
    config: &'a DumpConfig,
    doc: &'a Document,
    graph: NodeGraph,
    represented: HashMap<ValueId, NodeId>,
    /// Collection nodes whose children are not added yet.
    pending: Vec<(ValueId, NodeId)>,
}

impl<'a> Representer<'a> {
    fn data(&self, id: ValueId) -> Result<&'a ValueData, RepresenterError> {
        let doc = self.doc;
        doc.get(id).ok_or(RepresenterError::UndefinedValue(id))
    }

    fn scalar(
        &mut self,
        tag: &str,
        value: String,
        style: Option<ScalarStyle>,
    ) -> NodeId {
        self.graph.add(Node {
            tag: tag.to_owned(),
            data: NodeData::Scalar {
                value,
                style: style.or(self.config.default_style),
            },
            span: Span::default(),
        })
    }

    /// The node for a value. Collections get an empty node that is filled
    /// in later.
    fn represent(&mut self, id: ValueId) -> Result<NodeId, RepresenterError> {
        if let Some(&node) = self.represented.get(&id) {
            return Ok(node);
        }

        let node = match self.data(id)? {
            ValueData::Null => self.scalar(resolver::NULL_TAG, "null".to_owned(), None),
            ValueData::Bool(b) => {
                let text = if *b { "true" } else { "false" };
                self.scalar(resolver::BOOL_TAG, text.to_owned(), None)
            }
            ValueData::Int(i) => {
                let text = itoa::Buffer::new().format(*i).to_owned();
                self.scalar(resolver::INT_TAG, text, None)
            }
            ValueData::Float(f) => self.scalar(resolver::FLOAT_TAG, format_float(*f), None),
            ValueData::String(s) => self.scalar(resolver::STR_TAG, s.clone(), None),
            ValueData::Binary(bytes) => self.scalar(
                resolver::BINARY_TAG,
                encode_binary(bytes),
                Some(ScalarStyle::Literal),
            ),
            ValueData::Timestamp(ts) => {
                self.scalar(resolver::TIMESTAMP_TAG, ts.to_string(), None)
            }
            ValueData::Sequence(_) => {
                let node = self.graph.add(Node {
                    tag: resolver::SEQ_TAG.to_owned(),
                    data: NodeData::Sequence {
                        items: Vec::new(),
                        style: CollectionStyle::Block,
                    },
                    span: Span::default(),
                });
                self.represented.insert(id, node);
                self.pending.push((id, node));
                node
            }
            ValueData::Mapping(_) => {
                let node = self.graph.add(Node {
                    tag: resolver::MAP_TAG.to_owned(),
                    data: NodeData::Mapping {
                        pairs: Vec::new(),
                        style: CollectionStyle::Block,
                    },
                    span: Span::default(),
                });
                self.represented.insert(id, node);
                self.pending.push((id, node));
                node
            }
        };
        Ok(node)
    }

    /// True for scalar nodes that leave the style to the emitter.
    fn is_unstyled_scalar(&self, node: NodeId) -> bool {
        matches!(self.graph[node].data, NodeData::Scalar { style: None, .. })
    }

    fn collection_style(&self, all_plain: bool) -> CollectionStyle {
        match self.config.default_flow_style.unwrap_or(all_plain) {
            true => CollectionStyle::Flow,
            false => CollectionStyle::Block,
        }
    }

    fn fill(&mut self, id: ValueId, node: NodeId) -> Result<(), RepresenterError> {
        let data = match self.data(id)? {
            ValueData::Sequence(items) => {
                let items = items
                    .iter()
                    .map(|&item| self.represent(item))
                    .collect::<Result<Vec<_>, _>>()?;
                let all_plain = items.iter().all(|&item| self.is_unstyled_scalar(item));
                NodeData::Sequence {
                    style: self.collection_style(all_plain),
                    items,
                }
            }
            ValueData::Mapping(entries) => {
                let mut entries = entries.clone();
                if self.config.sort_keys {
                    self.sort_entries(&mut entries)?;
                }
                let pairs = entries
                    .iter()
                    .map(|&(key, value)| Ok((self.represent(key)?, self.represent(value)?)))
                    .collect::<Result<Vec<_>, RepresenterError>>()?;
                let all_plain = pairs.iter().all(|&(key, value)| {
                    self.is_unstyled_scalar(key) && self.is_unstyled_scalar(value)
                });
                NodeData::Mapping {
                    style: self.collection_style(all_plain),
                    pairs,
                }
            }
            _ => return Ok(()),
        };

        if let Some(node) = self.graph.get_mut(node) {
            node.data = data;
        }
        Ok(())
    }

    fn sort_entries(&self, entries: &mut [(ValueId, ValueId)]) -> Result<(), RepresenterError> {
        let mut error = None;
        let doc = self.doc;
        entries.sort_by(|&(a, _), &(b, _)| {
            let (Some(a), Some(b)) = (doc.get(a), doc.get(b)) else {
                return Ordering::Equal;
            };
            match compare_keys(a, b) {
                Some(ordering) => ordering,
                None => {
                    error.get_or_insert(RepresenterError::UnorderableKeys {
                        left: a.kind(),
                        right: b.kind(),
                    });
                    Ordering::Equal
                }
            }
        });
        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn as_number(data: &ValueData) -> Option<f64> {
    match data {
        ValueData::Bool(b) => Some(f64::from(u8::from(*b))),
        ValueData::Int(i) => Some(*i as f64),
        ValueData::Float(f) => Some(*f),
        _ => None,
    }
}

/// Order two mapping keys. Numbers (including booleans) compare by value,
/// strings and byte strings lexicographically, timestamps chronologically.
/// Anything else has no order.
fn compare_keys(a: &ValueData, b: &ValueData) -> Option<Ordering> {
    match (a, b) {
        (ValueData::Int(a), ValueData::Int(b)) => Some(a.cmp(b)),
        (ValueData::String(a), ValueData::String(b)) => Some(a.cmp(b)),
        (ValueData::Binary(a), ValueData::Binary(b)) => Some(a.cmp(b)),
        (ValueData::Timestamp(a), ValueData::Timestamp(b)) => a.compare(b),
        _ => {
            let (a, b) = (as_number(a)?, as_number(b)?);
            Some(a.partial_cmp(&b).unwrap_or(Ordering::Equal))
        }
    }
}

/// Shortest text that reads back as the same float.
///
/// Decimal exponents from -4 to 15 are written positionally, others as
/// `d.ddde±XX`. Both forms always carry a dot so they resolve as floats.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        return ".nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { ".inf" } else { "-.inf" }.to_owned();
    }

    let mut buffer = ryu::Buffer::new();
    let shortest = buffer.format_finite(value);
    let (sign, shortest) = match shortest.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", shortest),
    };
    let (mantissa, exponent) = match shortest.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (shortest, 0),
    };
    let point = mantissa.find('.').unwrap_or(mantissa.len());
    let all_digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let leading_zeros = all_digits.len() - all_digits.trim_start_matches('0').len();
    let digits = all_digits[leading_zeros..].trim_end_matches('0');
    if digits.is_empty() {
        return format!("{sign}0.0");
    }
    let magnitude = point as i32 - leading_zeros as i32 - 1 + exponent;

    let mut text = String::from(sign);
    if (-4..16).contains(&magnitude) {
        if magnitude < 0 {
            text.push_str("0.");
            text.extend(std::iter::repeat('0').take((-magnitude - 1) as usize));
            text.push_str(digits);
        } else {
            let whole = magnitude as usize + 1;
            if digits.len() > whole {
                text.push_str(&digits[..whole]);
                text.push('.');
                text.push_str(&digits[whole..]);
            } else {
                text.push_str(digits);
                text.extend(std::iter::repeat('0').take(whole - digits.len()));
                text.push_str(".0");
            }
        }
    } else {
        text.push_str(&digits[..1]);
        text.push('.');
        text.push_str(if digits.len() > 1 { &digits[1..] } else { "0" });
        text.push('e');
        text.push(if magnitude < 0 { '-' } else { '+' });
        let magnitude = magnitude.unsigned_abs();
        if magnitude < 10 {
            text.push('0');
        }
        text.push_str(itoa::Buffer::new().format(magnitude));
    }
    text
}

/// Base64 in lines of 76 characters, each ending with a line break.
fn encode_binary(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut text = String::with_capacity(encoded.len() + encoded.len() / 76 + 1);
    let mut rest = encoded.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(76));
        text.push_str(line);
        text.push('\n');
        rest = tail;
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, Value};

    #[track_caller]
    fn represent(value: &Value, config: &DumpConfig) -> NodeGraph {
        represent_document(&Document::from_value(value), config).unwrap()
    }

    #[track_caller]
    fn root_scalar(value: Value) -> (String, String) {
        let graph = represent(&value, &DumpConfig::default());
        let root = &graph[graph.root().unwrap()];
        match &root.data {
            NodeData::Scalar { value, .. } => (root.tag.clone(), value.clone()),
            other => panic!("expected a scalar, got {}", other.kind()),
        }
    }

    #[test]
    fn floats() {
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(-0.0), "-0.0");
        assert_eq!(format_float(1e100), "1.0e+100");
        assert_eq!(format_float(1.5e-10), "1.5e-10");
        assert_eq!(format_float(1e-7), "1.0e-07");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(1e15), "1000000000000000.0");
        assert_eq!(format_float(1e16), "1.0e+16");
        assert_eq!(format_float(-123.25), "-123.25");
        assert_eq!(format_float(f64::MAX), "1.7976931348623157e+308");
        assert_eq!(format_float(5e-324), "5.0e-324");
        assert_eq!(format_float(f64::NAN), ".nan");
        assert_eq!(format_float(f64::INFINITY), ".inf");
        assert_eq!(format_float(f64::NEG_INFINITY), "-.inf");
        for value in [1e100, 1.5e-10, 12345.678, 0.1] {
            assert_eq!(resolver::resolve_scalar(&format_float(value), true), resolver::FLOAT_TAG);
        }
    }

    #[test]
    fn scalars() {
        assert_eq!(
            root_scalar(Value::Null),
            (resolver::NULL_TAG.to_owned(), "null".to_owned())
        );
        assert_eq!(
            root_scalar(Value::Bool(false)),
            (resolver::BOOL_TAG.to_owned(), "false".to_owned())
        );
        assert_eq!(
            root_scalar(Value::Int(-42)),
            (resolver::INT_TAG.to_owned(), "-42".to_owned())
        );
        assert_eq!(
            root_scalar(Value::from("yes")),
            (resolver::STR_TAG.to_owned(), "yes".to_owned())
        );
    }

    #[test]
    fn binary_lines() {
        let (tag, text) = root_scalar(Value::binary(vec![0u8; 100]));
        assert_eq!(tag, resolver::BINARY_TAG);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 76);
        assert!(text.ends_with('\n'));
        assert_eq!(encode_binary(b""), "");
    }

    #[test]
    fn flow_style_choice() {
        let value = Value::seq([Value::seq([1, 2]), Value::seq([Value::seq([3])])]);
        let graph = represent(&value, &DumpConfig::new().with_default_flow_style(None));
        let root = &graph[graph.root().unwrap()];
        let NodeData::Sequence { items, style } = &root.data else {
            panic!("expected a sequence");
        };
        assert_eq!(*style, CollectionStyle::Block);
        assert!(matches!(
            graph[items[0]].data,
            NodeData::Sequence {
                style: CollectionStyle::Flow,
                ..
            }
        ));
        assert!(matches!(
            graph[items[1]].data,
            NodeData::Sequence {
                style: CollectionStyle::Block,
                ..
            }
        ));
    }

    #[test]
    fn default_style_applies_to_scalars() {
        let graph = represent(
            &Value::seq([1]),
            &DumpConfig::new().with_default_style(Some(ScalarStyle::DoubleQuoted)),
        );
        let NodeData::Sequence { items, .. } = &graph[graph.root().unwrap()].data else {
            panic!("expected a sequence");
        };
        assert!(matches!(
            graph[items[0]].data,
            NodeData::Scalar {
                style: Some(ScalarStyle::DoubleQuoted),
                ..
            }
        ));
    }

    #[test]
    fn sorted_keys() {
        let value = Value::mapping([("b", 1), ("a", 2), ("c", 3)]);
        let graph = represent(&value, &DumpConfig::default());
        let NodeData::Mapping { pairs, .. } = &graph[graph.root().unwrap()].data else {
            panic!("expected a mapping");
        };
        let keys: Vec<_> = pairs
            .iter()
            .map(|&(key, _)| match &graph[key].data {
                NodeData::Scalar { value, .. } => value.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(keys, ["a", "b", "c"]);

        let graph = represent(&value, &DumpConfig::new().with_sort_keys(false));
        let NodeData::Mapping { pairs, .. } = &graph[graph.root().unwrap()].data else {
            panic!("expected a mapping");
        };
        assert!(matches!(&graph[pairs[0].0].data, NodeData::Scalar { value, .. } if value == "b"));
    }

    #[test]
    fn unorderable_keys() {
        let value = Value::mapping([(Value::from("a"), 1), (Value::Int(1), 2)]);
        let err = represent_document(&Document::from_value(&value), &DumpConfig::default())
            .unwrap_err();
        assert!(matches!(err, RepresenterError::UnorderableKeys { .. }));

        // Mixed numbers sort fine.
        let value = Value::mapping([(Value::Float(2.5), 1), (Value::Int(1), 2)]);
        assert!(represent_document(&Document::from_value(&value), &DumpConfig::default()).is_ok());
    }

    #[test]
    fn shared_collections_share_nodes() {
        let mut builder = Builder::new();
        let shared = builder.add(vec![1, 2]).unwrap();
        let doc = builder.build(vec![shared, shared]).unwrap();
        let graph = represent_document(&doc, &DumpConfig::default()).unwrap();
        let NodeData::Sequence { items, .. } = &graph[graph.root().unwrap()].data else {
            panic!("expected a sequence");
        };
        assert_eq!(items[0], items[1]);
    }

    #[test]
    fn cycles() {
        let mut builder = Builder::new();
        let list = builder.add(Vec::<i32>::new()).unwrap();
        builder.push(list, list).unwrap();
        let doc = builder.build(list).unwrap();
        let graph = represent_document(&doc, &DumpConfig::default()).unwrap();
        let root = graph.root().unwrap();
        assert!(matches!(&graph[root].data, NodeData::Sequence { items, .. } if items == &[root]));
    }
}
