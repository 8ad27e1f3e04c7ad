use std::collections::BTreeMap;

use crate::{Document, Timestamp, Value, ValueData, ValueId};

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum BuilderError {
    /// A [`ValueId`] that does not belong to the document being built.
    #[error("undefined value: {0:?}")]
    UndefinedValue(ValueId),
    #[error("value is not a sequence: {0:?}")]
    NotASequence(ValueId),
    #[error("value is not a mapping: {0:?}")]
    NotAMapping(ValueId),
    /// The document refers to itself and cannot be expanded into a tree.
    #[error("cannot expand a recursive value into a tree")]
    RecursiveValue,
    #[error("integer {0} does not fit in 64 bits")]
    IntegerOutOfRange(String),
}

/// Document builder API.
///
/// Values added through the builder get a [`ValueId`], and passing that id
/// where a value is expected refers to the same value instead of a copy.
/// That is how shared values (and, with [`Builder::push`] or
/// [`Builder::insert`], cycles) are built; the dumper writes them as
/// anchors and aliases.
#[derive(Default)]
pub struct Builder {
    doc: Document,
}

impl Builder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value without making it the root.
    #[inline]
    pub fn add(&mut self, value: impl BuildValue) -> Result<ValueId, BuilderError> {
        value.build(self)
    }

    /// Add a value so it can be referenced more than once.
    #[inline]
    pub fn share(&mut self, value: impl BuildValue) -> Result<ValueId, BuilderError> {
        self.add(value)
    }

    #[inline]
    pub(crate) fn add_data(&mut self, data: ValueData) -> ValueId {
        self.doc.add(data)
    }

    /// Append `item` to the sequence `seq`.
    pub fn push(&mut self, seq: ValueId, item: impl BuildValue) -> Result<&mut Self, BuilderError> {
        let item = item.build(self)?;
        match self.doc.get_mut(seq) {
            Some(ValueData::Sequence(items)) => items.push(item),
            Some(_) => return Err(BuilderError::NotASequence(seq)),
            None => return Err(BuilderError::UndefinedValue(seq)),
        }
        Ok(self)
    }

    /// Append an entry to the mapping `map`.
    pub fn insert(
        &mut self,
        map: ValueId,
        key: impl BuildValue,
        value: impl BuildValue,
    ) -> Result<&mut Self, BuilderError> {
        let key = key.build(self)?;
        let value = value.build(self)?;
        match self.doc.get_mut(map) {
            Some(ValueData::Mapping(pairs)) => pairs.push((key, value)),
            Some(_) => return Err(BuilderError::NotAMapping(map)),
            None => return Err(BuilderError::UndefinedValue(map)),
        }
        Ok(self)
    }

    /// Finish the document with `root` as its root value.
    pub fn build(mut self, root: impl BuildValue) -> Result<Document, BuilderError> {
        let root = root.build(&mut self)?;
        self.doc.set_root(root);
        Ok(self.doc)
    }
}

pub struct SequenceBuilder<'b> {
    node: ValueId,
    builder: &'b mut Builder,
}

impl<'b> SequenceBuilder<'b> {
    #[inline]
    pub fn id(&self) -> ValueId {
        self.node
    }

    pub fn item(&mut self, value: impl BuildValue) -> Result<&mut Self, BuilderError> {
        self.builder.push(self.node, value)?;
        Ok(self)
    }
}

pub struct MappingBuilder<'b> {
    node: ValueId,
    builder: &'b mut Builder,
}

impl<'b> MappingBuilder<'b> {
    #[inline]
    pub fn id(&self) -> ValueId {
        self.node
    }

    pub fn entry(
        &mut self,
        key: impl BuildValue,
        value: impl BuildValue,
    ) -> Result<&mut Self, BuilderError> {
        self.builder.insert(self.node, key, value)?;
        Ok(self)
    }
}

pub trait BuildValue {
    #[doc(hidden)]
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError>;
}

impl BuildValue for ValueId {
    #[inline]
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        if builder.doc.contains(self) {
            Ok(self)
        } else {
            Err(BuilderError::UndefinedValue(self))
        }
    }
}

impl<'a> BuildValue for &'a str {
    #[inline]
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        Ok(builder.add_data(ValueData::String(self.to_owned())))
    }
}

impl BuildValue for String {
    #[inline]
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        Ok(builder.add_data(ValueData::String(self)))
    }
}

impl BuildValue for char {
    #[inline]
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        Ok(builder.add_data(ValueData::String(self.to_string())))
    }
}

impl BuildValue for Value {
    #[inline]
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        Ok(builder.doc.add_value(&self))
    }
}

impl<'a> BuildValue for &'a Value {
    #[inline]
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        Ok(builder.doc.add_value(self))
    }
}

impl BuildValue for Timestamp {
    #[inline]
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        Ok(builder.add_data(ValueData::Timestamp(self)))
    }
}

impl BuildValue for () {
    #[inline]
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        Ok(builder.add_data(ValueData::Null))
    }
}

impl<T: BuildValue> BuildValue for Option<T> {
    #[inline]
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        match self {
            Some(value) => value.build(builder),
            None => Ok(builder.add_data(ValueData::Null)),
        }
    }
}

macro_rules! impl_int {
    ($($t:ty,)+) => {
        $(
            impl_int!($t);
        )*
    };
    ($t:ty) => {
        impl BuildValue for $t {
            fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
                let value = i64::try_from(self).map_err(|_| {
                    BuilderError::IntegerOutOfRange(itoa::Buffer::new().format(self).to_owned())
                })?;
                Ok(builder.add_data(ValueData::Int(value)))
            }
        }
    };
}

impl_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,);

macro_rules! impl_float {
    ($($t:ty,)+) => {
        $(
            impl_float!($t);
        )*
    };
    ($t:ty) => {
        impl BuildValue for $t {
            fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
                Ok(builder.add_data(ValueData::Float(self.into())))
            }
        }
    };
}

impl_float!(f32, f64,);

impl BuildValue for bool {
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        Ok(builder.add_data(ValueData::Bool(self)))
    }
}

/// Build a `!!binary` value from bytes.
pub struct BuildAsBinary<B>(pub B);

impl<B: Into<Vec<u8>>> BuildValue for BuildAsBinary<B> {
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        Ok(builder.add_data(ValueData::Binary(self.0.into())))
    }
}

/// Build a sequence from an iterator.
pub struct BuildAsList<I>(pub I);

impl<I> BuildValue for BuildAsList<I>
where
    I: IntoIterator,
    I::Item: BuildValue,
{
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        let seq_id = builder.add_data(ValueData::Sequence(Vec::new()));
        let mut seq_builder = SequenceBuilder {
            node: seq_id,
            builder,
        };
        for item in self.0 {
            seq_builder.item(item)?;
        }
        Ok(seq_id)
    }
}

impl<T: BuildValue> BuildValue for Vec<T> {
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        BuildAsList(self).build(builder)
    }
}

impl<T: BuildValue, const N: usize> BuildValue for [T; N] {
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        BuildAsList(self).build(builder)
    }
}

impl<T: BuildValue + Clone> BuildValue for &[T] {
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        BuildAsList(self.iter().cloned()).build(builder)
    }
}

/// Build a mapping from an iterator of pairs.
pub struct BuildAsMapping<I>(pub I);

impl<I, A, B> BuildValue for BuildAsMapping<I>
where
    I: IntoIterator<Item = (A, B)>,
    A: BuildValue,
    B: BuildValue,
{
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        let map_id = builder.add_data(ValueData::Mapping(Vec::new()));
        let mut builder = MappingBuilder {
            node: map_id,
            builder,
        };
        for (key, value) in self.0 {
            builder.entry(key, value)?;
        }
        Ok(map_id)
    }
}

impl<K, V> BuildValue for BTreeMap<K, V>
where
    K: BuildValue,
    V: BuildValue,
{
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        BuildAsMapping(self).build(builder)
    }
}

macro_rules! impl_tuple {
    ($($t:ident),*) => {
        impl<$($t: BuildValue),*> BuildValue for ($($t,)*) {
            #[allow(non_snake_case, unused)]
            fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
                let ($($t,)*) = self;
                let seq_id = builder.add_data(ValueData::Sequence(Vec::new()));
                let mut seq_builder = SequenceBuilder {
                    node: seq_id,
                    builder,
                };
                $(
                    seq_builder.item($t)?;
                )*
                Ok(seq_id)
            }
        }
    };
}

impl_tuple!(A);
impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);
impl_tuple!(A, B, C, D, E);
impl_tuple!(A, B, C, D, E, F);
impl_tuple!(A, B, C, D, E, F, G);
impl_tuple!(A, B, C, D, E, F, G, H);

impl<F> BuildValue for F
where
    F: FnOnce(&mut MappingBuilder) -> Result<(), BuilderError>,
{
    fn build(self, builder: &mut Builder) -> Result<ValueId, BuilderError> {
        let map_id = builder.add_data(ValueData::Mapping(Vec::new()));
        let mut builder = MappingBuilder {
            node: map_id,
            builder,
        };
        self(&mut builder)?;
        Ok(map_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_basic() {
        let doc = Builder::new()
            .build(BuildAsMapping([
                ("name", Value::from("ryaml")),
                ("list", Value::seq([1, 2, 3])),
            ]))
            .unwrap();

        assert_eq!(
            doc,
            Value::mapping([
                ("name", Value::from("ryaml")),
                ("list", Value::seq([1, 2, 3])),
            ])
        );
    }

    #[test]
    fn build_with_closure() {
        let doc = Builder::new()
            .build(|map: &mut MappingBuilder| -> Result<(), BuilderError> {
                map.entry("a", 1)?
                    .entry("b", (true, 2.5, "x"))?
                    .entry("c", None::<i32>)?;
                Ok(())
            })
            .unwrap();

        assert_eq!(
            doc.to_value().unwrap(),
            Value::mapping([
                ("a", Value::Int(1)),
                (
                    "b",
                    Value::seq([Value::Bool(true), Value::Float(2.5), Value::from("x")])
                ),
                ("c", Value::Null),
            ])
        );
    }

    #[test]
    fn shared_values() {
        let mut builder = Builder::new();
        let shared = builder.share(vec!["a", "b"]).unwrap();
        let doc = builder
            .build(BuildAsMapping([("x", shared), ("y", shared)]))
            .unwrap();

        let root = doc.root();
        let x = root.get("x").unwrap();
        let y = root.get("y").unwrap();
        assert!(x.is_same(&y));
    }

    #[test]
    fn cycles() {
        let mut builder = Builder::new();
        let list = builder.add(BuildAsList(Vec::<i32>::new())).unwrap();
        builder.push(list, 1).unwrap().push(list, list).unwrap();
        let doc = builder.build(list).unwrap();

        assert_eq!(doc.to_value(), Err(BuilderError::RecursiveValue));
        let root = doc.root();
        assert!(root.at(1).unwrap().is_same(&root));
    }

    #[test]
    fn errors() {
        let mut builder = Builder::new();
        let scalar = builder.add("text").unwrap();
        assert_eq!(
            builder.push(scalar, 1).err(),
            Some(BuilderError::NotASequence(scalar))
        );
        assert_eq!(
            builder.insert(scalar, "k", 1).err(),
            Some(BuilderError::NotAMapping(scalar))
        );

        let mut other = Builder::new();
        other.add(()).unwrap();
        let foreign = other.add(()).unwrap();
        let mut small = Builder::new();
        assert_eq!(
            small.add(foreign).err(),
            Some(BuilderError::UndefinedValue(foreign))
        );

        assert_eq!(
            Builder::new().add(u64::MAX).err(),
            Some(BuilderError::IntegerOutOfRange(u64::MAX.to_string()))
        );
    }
}
