use ryaml::*;

#[track_caller]
fn load(input: &str) -> Value {
    loads(input).unwrap().to_value().unwrap()
}

#[track_caller]
fn load_err(input: &str) -> Error {
    match loads(input) {
        Ok(doc) => panic!("expected an error, loaded {:?}", doc.to_value()),
        Err(err) => err,
    }
}

#[test]
fn scalar_resolution() {
    assert_eq!(load("x: yes")["x"], Value::Bool(true));
    assert_eq!(load("x: Off")["x"], Value::Bool(false));
    assert_eq!(load("x: '123'")["x"], Value::from("123"));
    assert_eq!(load("x: 123")["x"], Value::Int(123));
    assert_eq!(load("x: 0x1F")["x"], Value::Int(31));
    assert_eq!(load("x: 017")["x"], Value::Int(15));
    assert_eq!(load("x: 190:20:30")["x"], Value::Int(685230));
    assert_eq!(load("x: ~")["x"], Value::Null);
    assert_eq!(load("x:")["x"], Value::Null);
    assert_eq!(load("x: 1.5e+3")["x"], Value::Float(1500.0));
    assert_eq!(load("x: -.inf")["x"], Value::Float(f64::NEG_INFINITY));
    assert_eq!(
        load("x: 2001-12-14")["x"],
        Value::Timestamp(Timestamp::date(2001, 12, 14))
    );
    assert_eq!(load("x: 1.2.3")["x"], Value::from("1.2.3"));
}

#[test]
fn multiple_documents() {
    let docs = loads_all("---\na: 1\n---\nb: 2\n").unwrap();
    let values: Vec<Value> = docs.iter().map(|doc| doc.to_value().unwrap()).collect();
    assert_eq!(
        values,
        [
            Value::mapping([("a", 1)]),
            Value::mapping([("b", 2)]),
        ]
    );
}

#[test]
fn aliases_share_values() {
    let doc = loads("a: &x [1,2]\nb: *x").unwrap();
    let root = doc.root();
    let (a, b) = (root.get("a").unwrap(), root.get("b").unwrap());
    assert!(a.is_same(&b));
    assert_eq!(b.len(), 2);
    assert_eq!(b.at(1).and_then(|v| v.as_i64()), Some(2));
}

#[test]
fn recursive_document() {
    let doc = loads("&a [*a, 1]").unwrap();
    let root = doc.root();
    assert!(root.at(0).unwrap().is_same(&root));
    assert_eq!(doc.to_value(), Err(BuilderError::RecursiveValue));
}

#[test]
fn duplicate_keys() {
    let err = load_err("a: 1\na: 2");
    assert_eq!(err.kind(), ErrorKind::Constructor);
    assert_eq!(err.line(), Some(2));
    assert_eq!(err.column(), Some(1));
    assert!(err.to_string().contains("duplicate"), "{err}");
}

#[test]
fn merge_keys() {
    assert_eq!(
        load("base: &b {x: 1}\nover: {<<: *b, x: 2}")["over"],
        Value::mapping([("x", 2)])
    );
    assert_eq!(
        load("a: &a {x: 1, y: 1}\nb: &b {y: 2, z: 2}\nc:\n  <<: [*a, *b]\n  w: 0\n")["c"],
        Value::mapping([("x", 1), ("y", 1), ("z", 2), ("w", 0)])
    );
}

#[test]
fn malformed_input() {
    let err = load_err("a: [1, 2");
    assert_eq!(err.kind(), ErrorKind::Parser);
    assert!(err.to_string().contains("flow sequence"), "{err}");
    assert_eq!(err.context_location().map(|l| l.column_number()), Some(4));

    assert_eq!(load_err("a: *missing").kind(), ErrorKind::Composer);
    assert_eq!(load_err("a: b: c").kind(), ErrorKind::Scanner);
    assert_eq!(load_err("[1, 2]: x").kind(), ErrorKind::Constructor);
}

#[test]
fn explicit_tags() {
    assert_eq!(load("!!str 123"), Value::from("123"));
    assert_eq!(load("!!float 1"), Value::Float(1.0));
    assert_eq!(load("!!binary aGVsbG8="), Value::binary(*b"hello"));
    assert_eq!(
        load("!!set {a, b}"),
        Value::mapping([("a", Value::Null), ("b", Value::Null)])
    );
    assert_eq!(
        load("!!omap [a: 1, b: 2]"),
        Value::seq([
            Value::seq([Value::from("a"), Value::Int(1)]),
            Value::seq([Value::from("b"), Value::Int(2)]),
        ])
    );
    assert_eq!(load_err("!!int abc").kind(), ErrorKind::Constructor);
    assert_eq!(load_err("!foo bar").kind(), ErrorKind::Constructor);
}

#[test]
fn value_and_merge_indicators() {
    assert_eq!(load("=: 1
b: '='
"), Value::mapping([("=", Value::Int(1)), ("b", Value::from("="))]));
    for input in ["a: =", "a: <<", "a: !!merge x", "a: [=]"] {
        let err = load_err(input);
        assert_eq!(err.kind(), ErrorKind::Constructor, "{input}");
        assert!(err.to_string().contains("could not determine a constructor"), "{err}");
    }
}

#[test]
fn block_scalars() {
    let value = load("lit: |\n  a\n  b\nfold: >\n  a\n  b\n\n  c\nkeep: |+\n  x\n\n");
    assert_eq!(value["lit"], Value::from("a\nb\n"));
    assert_eq!(value["fold"], Value::from("a b\nc\n"));
    assert_eq!(value["keep"], Value::from("x\n\n"));
}

#[test]
fn quoted_scalars() {
    let value = load("a: 'it''s'\nb: \"tab\\there\\x41\\u00e9\"\nc: \"folded\n  line\"\n");
    assert_eq!(value["a"], Value::from("it's"));
    assert_eq!(value["b"], Value::from("tab\thereA\u{e9}"));
    assert_eq!(value["c"], Value::from("folded line"));
}

#[test]
fn flow_plain_scalars() {
    assert_eq!(
        load("urls: [http://example.com/a?b=1]\n")["urls"],
        Value::seq(["http://example.com/a?b=1"])
    );
    assert_eq!(load("{? a?b : c}"), Value::mapping([("a?b", "c")]));
}
