use serde::de::{value::StrDeserializer, Unexpected};

use crate::{Mapping, Value};

impl<'a> From<&'a Value> for Unexpected<'a> {
    #[inline]
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Unexpected::Unit,
            Value::Bool(b) => Unexpected::Bool(*b),
            Value::Int(i) => Unexpected::Signed(*i),
            Value::Float(f) => Unexpected::Float(*f),
            Value::String(s) => Unexpected::Str(s),
            Value::Binary(b) => Unexpected::Bytes(b),
            Value::Timestamp(_) => Unexpected::Other("timestamp"),
            Value::Sequence(_) => Unexpected::Seq,
            Value::Mapping(_) => Unexpected::Map,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializationError {
    #[error("{0}")]
    Custom(String),
    #[error(transparent)]
    Load(#[from] crate::Error),
}

impl serde::de::Error for DeserializationError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

impl<'de> serde::Deserializer<'de> for &'de Value {
    type Error = DeserializationError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: serde::de::Visitor<'de>,
    {
        match self {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Int(i) => visitor.visit_i64(*i),
            Value::Float(f) => visitor.visit_f64(*f),
            Value::String(s) => visitor.visit_borrowed_str(s),
            Value::Binary(b) => visitor.visit_borrowed_bytes(b),
            Value::Timestamp(ts) => visitor.visit_string(ts.to_string()),
            Value::Sequence(items) => visitor.visit_seq(SeqAccess { items, index: 0 }),
            Value::Mapping(mapping) => visitor.visit_map(MapAccess::new(mapping)),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: serde::de::Visitor<'de>,
    {
        match self {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: serde::de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    /// Unit variants are strings, the others single-entry mappings from
    /// the variant name to its content.
    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: serde::de::Visitor<'de>,
    {
        match self {
            Value::String(variant) => visitor.visit_enum(EnumAccess {
                variant,
                content: None,
            }),
            Value::Mapping(mapping) if mapping.len() == 1 => {
                let Some((Value::String(variant), content)) = mapping.iter().next() else {
                    return Err(serde::de::Error::invalid_type(self.into(), &"enum variant"));
                };
                visitor.visit_enum(EnumAccess {
                    variant,
                    content: Some(content),
                })
            }
            _ => Err(serde::de::Error::invalid_type(self.into(), &"enum variant")),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

struct SeqAccess<'de> {
    items: &'de [Value],
    index: usize,
}

impl<'de> serde::de::SeqAccess<'de> for SeqAccess<'de> {
    type Error = DeserializationError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: serde::de::DeserializeSeed<'de>,
    {
        let Some(item) = self.items.get(self.index) else {
            return Ok(None);
        };
        self.index += 1;
        seed.deserialize(item).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len() - self.index)
    }
}

struct MapAccess<'de> {
    entries: Vec<(&'de Value, &'de Value)>,
    index: usize,
}

impl<'de> MapAccess<'de> {
    fn new(mapping: &'de Mapping) -> Self {
        Self {
            entries: mapping.iter().collect(),
            index: 0,
        }
    }
}

impl<'de> serde::de::MapAccess<'de> for MapAccess<'de> {
    type Error = DeserializationError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: serde::de::DeserializeSeed<'de>,
    {
        let Some(&(key, _)) = self.entries.get(self.index) else {
            return Ok(None);
        };
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: serde::de::DeserializeSeed<'de>,
    {
        let Some(&(_, value)) = self.entries.get(self.index) else {
            return Err(serde::de::Error::custom(
                "next_value() called after the last entry",
            ));
        };
        self.index += 1;
        seed.deserialize(value)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len() - self.index)
    }
}

struct EnumAccess<'de> {
    variant: &'de str,
    content: Option<&'de Value>,
}

impl<'de> serde::de::EnumAccess<'de> for EnumAccess<'de> {
    type Error = DeserializationError;
    type Variant = VariantAccess<'de>;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
    where
        V: serde::de::DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(StrDeserializer::<DeserializationError>::new(
            self.variant,
        ))?;
        Ok((
            variant,
            VariantAccess {
                content: self.content,
            },
        ))
    }
}

struct VariantAccess<'de> {
    content: Option<&'de Value>,
}

impl<'de> VariantAccess<'de> {
    fn content(self, expected: &str) -> Result<&'de Value, DeserializationError> {
        self.content.ok_or_else(|| {
            serde::de::Error::invalid_type(Unexpected::UnitVariant, &expected)
        })
    }
}

impl<'de> serde::de::VariantAccess<'de> for VariantAccess<'de> {
    type Error = DeserializationError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        match self.content {
            None | Some(Value::Null) => Ok(()),
            Some(other) => Err(serde::de::Error::invalid_type(
                other.into(),
                &"unit variant",
            )),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
    where
        T: serde::de::DeserializeSeed<'de>,
    {
        seed.deserialize(self.content("newtype variant")?)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: serde::de::Visitor<'de>,
    {
        serde::Deserializer::deserialize_seq(self.content("tuple variant")?, visitor)
    }

    fn struct_variant<V>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: serde::de::Visitor<'de>,
    {
        serde::Deserializer::deserialize_map(self.content("struct variant")?, visitor)
    }
}
