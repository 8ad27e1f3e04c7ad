use proptest::prelude::*;
use ryaml::*;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<f64>().prop_map(Value::Float),
        "[ -~]{0,30}".prop_map(Value::String),
        "[a-z]{1,8}( [a-z]{1,8}){0,3}\n?".prop_map(Value::String),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Sequence),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..6).prop_map(Value::from),
        ]
    })
}

#[track_caller]
fn reload(text: &str) -> Value {
    loads(text).unwrap().to_value().unwrap()
}

proptest! {
    #[test]
    fn block_roundtrip(value in value()) {
        let text = dumps_value(&value, &DumpConfig::default()).unwrap();
        prop_assert_eq!(reload(&text), value, "{}", text);
    }

    #[test]
    fn flow_roundtrip(value in value()) {
        let config = DumpConfig::new().with_default_flow_style(Some(true)).with_width(Some(20));
        let text = dumps_value(&value, &config).unwrap();
        prop_assert_eq!(reload(&text), value, "{}", text);
    }

    #[test]
    fn canonical_is_stable(value in value()) {
        let config = DumpConfig::new().with_canonical(true);
        let text = dumps_value(&value, &config).unwrap();
        let again = dumps(&loads(&text).unwrap(), &config).unwrap();
        prop_assert_eq!(again, text);
    }
}
