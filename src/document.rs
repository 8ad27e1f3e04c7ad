use std::{collections::HashSet, num::NonZeroUsize};

use crate::{BuilderError, Mapping, Timestamp, Value};

/// A loaded document in arena form.
///
/// Values refer to each other by [`ValueId`], so a value reached through
/// several aliases is stored once, and self-referencing structures are
/// representable. This is what [`loads`](crate::loads) returns and what
/// [`dumps`](crate::dumps) consumes.
#[derive(Clone, Default)]
pub struct Document {
    pub(crate) values: Vec<ValueData>,
    pub(crate) root: Option<ValueId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub(crate) NonZeroUsize);

#[derive(Clone, Debug, Default, PartialEq)]
pub enum ValueData {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Timestamp(Timestamp),
    Sequence(Vec<ValueId>),
    Mapping(Vec<(ValueId, ValueId)>),
}

static NULL: ValueData = ValueData::Null;

impl ValueData {
    pub fn kind(&self) -> &'static str {
        match self {
            ValueData::Null => "null",
            ValueData::Bool(_) => "bool",
            ValueData::Int(_) => "int",
            ValueData::Float(_) => "float",
            ValueData::String(_) => "str",
            ValueData::Binary(_) => "binary",
            ValueData::Timestamp(_) => "timestamp",
            ValueData::Sequence(_) => "seq",
            ValueData::Mapping(_) => "map",
        }
    }

    #[inline]
    pub fn is_collection(&self) -> bool {
        matches!(self, ValueData::Sequence(_) | ValueData::Mapping(_))
    }

    /// Scalar equality; collections are never equal here.
    fn scalar_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueData::Float(a), ValueData::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (ValueData::Sequence(_) | ValueData::Mapping(_), _)
            | (_, ValueData::Sequence(_) | ValueData::Mapping(_)) => false,
            (a, b) => a == b,
        }
    }

    fn scalar_to_value(&self) -> Option<Value> {
        Some(match self {
            ValueData::Null => Value::Null,
            ValueData::Bool(b) => Value::Bool(*b),
            ValueData::Int(i) => Value::Int(*i),
            ValueData::Float(f) => Value::Float(*f),
            ValueData::String(s) => Value::String(s.clone()),
            ValueData::Binary(b) => Value::Binary(b.clone()),
            ValueData::Timestamp(ts) => Value::Timestamp(*ts),
            ValueData::Sequence(_) | ValueData::Mapping(_) => return None,
        })
    }
}

impl Document {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, data: ValueData) -> ValueId {
        self.values.push(data);
        ValueId(NonZeroUsize::MIN.saturating_add(self.values.len() - 1))
    }

    #[inline]
    pub fn get(&self, id: ValueId) -> Option<&ValueData> {
        self.values.get(id.0.get() - 1)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ValueId) -> Option<&mut ValueData> {
        self.values.get_mut(id.0.get() - 1)
    }

    #[inline]
    pub fn contains(&self, id: ValueId) -> bool {
        id.0.get() <= self.values.len()
    }

    #[inline]
    pub fn root_id(&self) -> Option<ValueId> {
        self.root
    }

    #[inline]
    pub fn set_root(&mut self, root: ValueId) {
        self.root = Some(root);
    }

    /// The document's root. An empty document's root is `null`.
    #[inline]
    pub fn root(&self) -> ValueRef<'_> {
        ValueRef {
            doc: self,
            id: self.root,
        }
    }

    #[inline]
    pub fn value(&self, id: ValueId) -> ValueRef<'_> {
        ValueRef { doc: self, id: Some(id) }
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Store a value tree.
    pub fn from_value(value: &Value) -> Self {
        let mut doc = Document::new();
        let root = doc.add_value(value);
        doc.set_root(root);
        doc
    }

    /// Store a value tree in this document and return its id.
    pub fn add_value(&mut self, value: &Value) -> ValueId {
        enum Task<'v> {
            Enter(&'v Value),
            Finish(ValueId, usize),
        }

        let mut tasks = vec![Task::Enter(value)];
        let mut results: Vec<ValueId> = Vec::new();

        while let Some(task) = tasks.pop() {
            match task {
                Task::Enter(value) => {
                    let data = match value {
                        Value::Null => ValueData::Null,
                        Value::Bool(b) => ValueData::Bool(*b),
                        Value::Int(i) => ValueData::Int(*i),
                        Value::Float(f) => ValueData::Float(*f),
                        Value::String(s) => ValueData::String(s.clone()),
                        Value::Binary(b) => ValueData::Binary(b.clone()),
                        Value::Timestamp(ts) => ValueData::Timestamp(*ts),
                        Value::Sequence(items) => {
                            let id = self.add(ValueData::Sequence(Vec::new()));
                            tasks.push(Task::Finish(id, items.len()));
                            tasks.extend(items.iter().rev().map(Task::Enter));
                            continue;
                        }
                        Value::Mapping(mapping) => {
                            let id = self.add(ValueData::Mapping(Vec::new()));
                            tasks.push(Task::Finish(id, mapping.len() * 2));
                            let entries: Vec<_> = mapping.iter().collect();
                            for (k, v) in entries.into_iter().rev() {
                                tasks.push(Task::Enter(v));
                                tasks.push(Task::Enter(k));
                            }
                            continue;
                        }
                    };
                    results.push(self.add(data));
                }
                Task::Finish(id, count) => {
                    let children = results.split_off(results.len() - count);
                    if let Some(data) = self.get_mut(id) {
                        match data {
                            ValueData::Sequence(items) => *items = children,
                            ValueData::Mapping(pairs) => {
                                *pairs = children.chunks(2).map(|kv| (kv[0], kv[1])).collect()
                            }
                            _ => {}
                        }
                    }
                    results.push(id);
                }
            }
        }

        debug_assert_eq!(results.len(), 1);
        results[0]
    }

    /// Expand the document into a value tree. Shared values are copied;
    /// cycles cannot be expanded and give [`BuilderError::RecursiveValue`].
    pub fn to_value(&self) -> Result<Value, BuilderError> {
        self.root().to_value()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_value() {
            Ok(value) => std::fmt::Debug::fmt(&value, f),
            Err(_) => f
                .debug_struct("Document")
                .field("values", &self.values)
                .field("root", &self.root)
                .finish(),
        }
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.root() == other.root()
    }
}

impl PartialEq<Value> for Document {
    fn eq(&self, other: &Value) -> bool {
        self.root() == *other
    }
}

impl From<&Value> for Document {
    #[inline]
    fn from(value: &Value) -> Self {
        Document::from_value(value)
    }
}

impl From<Value> for Document {
    #[inline]
    fn from(value: Value) -> Self {
        Document::from_value(&value)
    }
}

/// Borrowed view of one value in a [`Document`].
#[derive(Clone, Copy)]
pub struct ValueRef<'a> {
    doc: &'a Document,
    id: Option<ValueId>,
}

impl<'a> ValueRef<'a> {
    #[inline]
    pub fn id(&self) -> Option<ValueId> {
        self.id
    }

    #[inline]
    pub fn document(&self) -> &'a Document {
        self.doc
    }

    #[inline]
    pub fn data(&self) -> &'a ValueData {
        self.id.and_then(|id| self.doc.get(id)).unwrap_or(&NULL)
    }

    #[inline]
    fn at_id(&self, id: ValueId) -> ValueRef<'a> {
        ValueRef {
            doc: self.doc,
            id: Some(id),
        }
    }

    #[inline]
    pub fn kind(&self) -> &'static str {
        self.data().kind()
    }

    /// True if both refer to the same stored value.
    #[inline]
    pub fn is_same(&self, other: &ValueRef<'_>) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id.is_some() && self.id == other.id
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self.data(), ValueData::Null)
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self.data() {
            ValueData::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self.data() {
            ValueData::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self.data() {
            ValueData::Float(f) => Some(*f),
            ValueData::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&'a str> {
        match self.data() {
            ValueData::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self.data() {
            ValueData::Binary(b) => Some(b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_timestamp(&self) -> Option<&'a Timestamp> {
        match self.data() {
            ValueData::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    #[inline]
    pub fn is_sequence(&self) -> bool {
        matches!(self.data(), ValueData::Sequence(_))
    }

    #[inline]
    pub fn is_mapping(&self) -> bool {
        matches!(self.data(), ValueData::Mapping(_))
    }

    /// Number of items or entries; 0 for scalars.
    pub fn len(&self) -> usize {
        match self.data() {
            ValueData::Sequence(items) => items.len(),
            ValueData::Mapping(pairs) => pairs.len(),
            _ => 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence items. Empty for anything else.
    pub fn items(&self) -> impl Iterator<Item = ValueRef<'a>> + 'a {
        let this = *self;
        let items: &'a [ValueId] = match self.data() {
            ValueData::Sequence(items) => items,
            _ => &[],
        };
        items.iter().map(move |&id| this.at_id(id))
    }

    /// Mapping entries in order. Empty for anything else.
    pub fn entries(&self) -> impl Iterator<Item = (ValueRef<'a>, ValueRef<'a>)> + 'a {
        let this = *self;
        let pairs: &'a [(ValueId, ValueId)] = match self.data() {
            ValueData::Mapping(pairs) => pairs,
            _ => &[],
        };
        pairs
            .iter()
            .map(move |&(k, v)| (this.at_id(k), this.at_id(v)))
    }

    /// Look up a string key in a mapping.
    pub fn get(&self, key: &str) -> Option<ValueRef<'a>> {
        self.entries()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// The `index`th item of a sequence.
    pub fn at(&self, index: usize) -> Option<ValueRef<'a>> {
        match self.data() {
            ValueData::Sequence(items) => items.get(index).map(|&id| self.at_id(id)),
            _ => None,
        }
    }

    /// Copy into a value tree. Fails on cycles.
    pub fn to_value(&self) -> Result<Value, BuilderError> {
        enum Task<'a> {
            Enter(ValueRef<'a>),
            FinishSequence(ValueId, usize),
            FinishMapping(ValueId, usize),
        }

        let mut tasks = vec![Task::Enter(*self)];
        let mut results: Vec<Value> = Vec::new();
        let mut path: HashSet<ValueId> = HashSet::new();

        while let Some(task) = tasks.pop() {
            match task {
                Task::Enter(value) => {
                    if let Some(scalar) = value.data().scalar_to_value() {
                        results.push(scalar);
                        continue;
                    }
                    let Some(id) = value.id else {
                        results.push(Value::Null);
                        continue;
                    };
                    if !path.insert(id) {
                        return Err(BuilderError::RecursiveValue);
                    }
                    match value.data() {
                        ValueData::Sequence(items) => {
                            tasks.push(Task::FinishSequence(id, items.len()));
                            tasks.extend(items.iter().rev().map(|&id| Task::Enter(value.at_id(id))));
                        }
                        ValueData::Mapping(pairs) => {
                            tasks.push(Task::FinishMapping(id, pairs.len()));
                            for &(k, v) in pairs.iter().rev() {
                                tasks.push(Task::Enter(value.at_id(v)));
                                tasks.push(Task::Enter(value.at_id(k)));
                            }
                        }
                        _ => unreachable!("scalars are handled above"),
                    }
                }
                Task::FinishSequence(id, count) => {
                    let items = results.split_off(results.len() - count);
                    results.push(Value::Sequence(items));
                    path.remove(&id);
                }
                Task::FinishMapping(id, count) => {
                    let flat = results.split_off(results.len() - count * 2);
                    let mut mapping = Mapping::new();
                    let mut flat = flat.into_iter();
                    while let (Some(k), Some(v)) = (flat.next(), flat.next()) {
                        mapping.push(k, v);
                    }
                    results.push(Value::Mapping(mapping));
                    path.remove(&id);
                }
            }
        }

        Ok(results.pop().unwrap_or_default())
    }
}

impl std::fmt::Debug for ValueRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_value() {
            Ok(value) => std::fmt::Debug::fmt(&value, f),
            Err(_) => write!(f, "<recursive {} {:?}>", self.kind(), self.id),
        }
    }
}

/// Structural equality. Pairs of values already being compared are assumed
/// equal, so comparing cyclic structures terminates.
impl PartialEq<ValueRef<'_>> for ValueRef<'_> {
    fn eq(&self, other: &ValueRef<'_>) -> bool {
        let mut assumed: HashSet<(Option<ValueId>, Option<ValueId>)> = HashSet::new();
        let mut stack = vec![(*self, *other)];

        while let Some((a, b)) = stack.pop() {
            match (a.data(), b.data()) {
                (ValueData::Sequence(xs), ValueData::Sequence(ys)) => {
                    if !assumed.insert((a.id, b.id)) {
                        continue;
                    }
                    if xs.len() != ys.len() {
                        return false;
                    }
                    stack.extend(
                        xs.iter()
                            .zip(ys)
                            .map(|(&x, &y)| (a.at_id(x), b.at_id(y))),
                    );
                }
                (ValueData::Mapping(xs), ValueData::Mapping(ys)) => {
                    if !assumed.insert((a.id, b.id)) {
                        continue;
                    }
                    if xs.len() != ys.len() {
                        return false;
                    }
                    for &(xk, xv) in xs {
                        let key = a.at_id(xk);
                        let found = ys.iter().find(|&&(yk, _)| {
                            let other = b.at_id(yk);
                            key.data().scalar_eq(other.data())
                                || (key.data().is_collection() && key.is_same(&other))
                        });
                        match found {
                            Some(&(_, yv)) => stack.push((a.at_id(xv), b.at_id(yv))),
                            None => return false,
                        }
                    }
                }
                (x, y) => {
                    if !x.scalar_eq(y) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl PartialEq<Value> for ValueRef<'_> {
    fn eq(&self, other: &Value) -> bool {
        self.to_value().is_ok_and(|value| value == *other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cyclic() -> Document {
        let mut doc = Document::new();
        let seq = doc.add(ValueData::Sequence(Vec::new()));
        let one = doc.add(ValueData::Int(1));
        if let Some(ValueData::Sequence(items)) = doc.get_mut(seq) {
            items.push(one);
            items.push(seq);
        }
        doc.set_root(seq);
        doc
    }

    #[test]
    fn value_round_trip() {
        let value = Value::mapping([
            ("a", Value::seq([1, 2])),
            ("b", Value::mapping([("c", Value::Null)])),
            ("d", Value::from("text")),
        ]);
        let doc = Document::from_value(&value);
        assert_eq!(doc.to_value().unwrap(), value);
        assert_eq!(doc, value);
        assert_eq!(doc.len(), 11);
    }

    #[test]
    fn navigation() {
        let doc = Document::from_value(&Value::mapping([("list", Value::seq(["x", "y"]))]));
        let root = doc.root();
        assert!(root.is_mapping());
        let list = root.get("list").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.at(1).and_then(|v| v.as_str()), Some("y"));
        assert!(root.get("missing").is_none());
        assert!(list.at(2).is_none());
    }

    #[test]
    fn empty_document_is_null() {
        let doc = Document::new();
        assert!(doc.root().is_null());
        assert_eq!(doc.to_value().unwrap(), Value::Null);
    }

    #[test]
    fn cycles() {
        let doc = cyclic();
        assert!(matches!(doc.to_value(), Err(BuilderError::RecursiveValue)));
        let root = doc.root();
        let inner = root.at(1).unwrap();
        assert!(inner.is_same(&root));
        assert!(root == cyclic().root());
        assert!(root == doc.root());
    }

    #[test]
    fn shared_values_are_not_recursive() {
        let mut doc = Document::new();
        let shared = doc.add_value(&Value::seq([1]));
        let root = doc.add(ValueData::Sequence(vec![shared, shared]));
        doc.set_root(root);
        assert_eq!(
            doc.to_value().unwrap(),
            Value::seq([Value::seq([1]), Value::seq([1])])
        );
    }
}
