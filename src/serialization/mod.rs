#![cfg(feature = "serde")]

mod de;
mod ser;

pub use de::*;
pub use ser::*;

use crate::{dumps_value, loads, DumpConfig, Error, Mapping, Value};

use serde::{
    de::{MapAccess, SeqAccess, Visitor},
    ser::{SerializeMap, SerializeSeq},
    Deserialize, Deserializer, Serialize, Serializer,
};

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Binary(b) => serializer.serialize_bytes(b),
            Value::Timestamp(ts) => serializer.collect_str(ts),
            Value::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Mapping(mapping) => {
                let mut map = serializer.serialize_map(Some(mapping.len()))?;
                for (key, value) in mapping.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("any YAML value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Value, E> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {v} does not fit in a 64-bit signed integer")))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Binary(v.to_vec()))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Binary(v))
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut mapping = Mapping::new();
        while let Some((key, value)) = map.next_entry::<Value, Value>()? {
            mapping.insert(key, value);
        }
        Ok(Value::Mapping(mapping))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

pub fn from_value<'de, T: Deserialize<'de>>(value: &'de Value) -> Result<T, DeserializationError> {
    T::deserialize(value)
}

pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, SerializationError> {
    value.serialize(ValueSerializer)
}

/// Load a single document and deserialize it.
pub fn from_str<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, DeserializationError> {
    let value = loads(text)?.to_value().map_err(Error::from)?;
    from_value(&value)
}

/// Serialize into YAML text.
pub fn to_string<T: Serialize + ?Sized>(
    value: &T,
    config: &DumpConfig,
) -> Result<String, SerializationError> {
    Ok(dumps_value(&to_value(value)?, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Basic {
        foo: i32,
        bar: String,
    }

    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    enum Shape {
        Empty,
        Circle(f64),
        Rect { w: u32, h: u32 },
    }

    #[test]
    fn structs() {
        let value = Basic {
            foo: 42,
            bar: "Hello, World!".into(),
        };
        assert_eq!(
            to_value(&value).unwrap(),
            Value::mapping([("foo", Value::Int(42)), ("bar", Value::from("Hello, World!"))])
        );
        assert_eq!(
            to_string(&value, &DumpConfig::default()).unwrap(),
            "bar: Hello, World!\nfoo: 42\n"
        );
        assert_eq!(from_str::<Basic>("foo: 42\nbar: Hello, World!\n").unwrap(), value);
    }

    #[test]
    fn enums() {
        let shapes = vec![Shape::Empty, Shape::Circle(1.5), Shape::Rect { w: 2, h: 3 }];
        let value = to_value(&shapes).unwrap();
        assert_eq!(value[0], Value::from("Empty"));
        assert_eq!(value[1]["Circle"], Value::Float(1.5));
        assert_eq!(value[2]["Rect"]["h"], Value::Int(3));
        assert_eq!(from_value::<Vec<Shape>>(&value).unwrap(), shapes);
    }

    #[test]
    fn options_and_bytes() {
        let loaded: Vec<Option<i64>> = from_str("[1, ~, 3]").unwrap();
        assert_eq!(loaded, [Some(1), None, Some(3)]);
        assert_eq!(
            to_value(&serde_bytes_like(b"ab")).unwrap(),
            Value::binary(*b"ab")
        );
        assert!(to_value(&u64::MAX).is_err());
    }

    fn serde_bytes_like(bytes: &[u8]) -> impl Serialize + '_ {
        struct Bytes<'a>(&'a [u8]);
        impl Serialize for Bytes<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_bytes(self.0)
            }
        }
        Bytes(bytes)
    }

    #[test]
    fn value_through_json() {
        let value = Value::mapping([
            ("a", Value::seq([Value::Int(1), Value::Null])),
            ("b", Value::Bool(true)),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"a":[1,null],"b":true}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn load_errors() {
        assert!(matches!(
            from_str::<Basic>("a: [1"),
            Err(DeserializationError::Load(_))
        ));
        assert!(matches!(
            from_str::<Basic>("foo: x\nbar: y\n"),
            Err(DeserializationError::Custom(_))
        ));
    }
}
