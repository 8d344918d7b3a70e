use stratadb::value::{ObjectId, SAFE_INT_MAX, SAFE_INT_MIN, Value, decode, decode_at, encode, size_at};

fn sample_values() -> Vec<Value> {
    vec![
        Value::Null,
        Value::Bool(true),
        Value::Bool(false),
        Value::Int(0),
        Value::Int(SAFE_INT_MIN),
        Value::Int(SAFE_INT_MAX),
        Value::Float(std::f64::consts::PI),
        Value::Str(String::new()),
        Value::Str("hello, world".into()),
        Value::ObjectId(ObjectId::new()),
        Value::Date(1_700_000_000_000),
        Value::Pointer(4096),
        Value::Binary(vec![0xDE, 0xAD, 0xBE, 0xEF]),
        Value::Timestamp { secs: 1_700_000_000, ordinal: 3 },
        Value::Array(vec![Value::Int(1), Value::Str("two".into()), Value::Bool(true)]),
        Value::object(vec![("a".to_string(), Value::Int(1)), ("b".to_string(), Value::Str("x".into()))]),
    ]
}

#[test]
fn every_constructible_value_round_trips() {
    for v in sample_values() {
        let bytes = encode(&v);
        let (decoded, consumed) = decode_at(&bytes, 0).unwrap();
        assert_eq!(decoded, v);
        assert_eq!(consumed, bytes.len());
    }
}

#[test]
fn every_value_is_self_delimiting() {
    for v in sample_values() {
        let bytes = encode(&v);
        let reported = size_at(bytes.as_slice(), 0).unwrap();
        assert_eq!(reported as usize, bytes.len());
    }
}

#[test]
fn nested_composites_round_trip_through_a_shared_buffer() {
    let nested = Value::Array(vec![
        Value::object(vec![("k".to_string(), Value::Array(vec![Value::Int(1), Value::Int(2)]))]),
        Value::Null,
    ]);
    let bytes = encode(&nested);
    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded, nested);
}

#[test]
fn decode_rejects_a_truncated_buffer() {
    let bytes = encode(&Value::Str("truncate me".into()));
    let truncated = &bytes[..bytes.len() - 2];
    assert!(decode(truncated).is_err());
}
