use proptest::prelude::*;
use stratadb::value::{SAFE_INT_MAX, SAFE_INT_MIN, Value, decode_at, encode, size_at};

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (SAFE_INT_MIN..=SAFE_INT_MAX).prop_map(Value::Int),
        any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(Value::Float),
        ".*".prop_map(Value::Str),
        proptest::collection::vec(any::<u8>(), 0..64).prop_map(Value::Binary),
    ]
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        cases: 64,
        .. proptest::test_runner::Config::default()
    })]

    #[test]
    fn prop_scalar_round_trips(v in arb_scalar()) {
        let bytes = encode(&v);
        let (decoded, consumed) = decode_at(&bytes, 0).unwrap();
        prop_assert_eq!(decoded, v);
        prop_assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn prop_size_at_matches_encoded_length(v in arb_scalar()) {
        let bytes = encode(&v);
        let reported = size_at(bytes.as_slice(), 0).unwrap();
        prop_assert_eq!(reported as usize, bytes.len());
    }

    #[test]
    fn prop_array_of_scalars_round_trips(items in proptest::collection::vec(arb_scalar(), 0..16)) {
        let v = Value::Array(items.clone());
        let bytes = encode(&v);
        let (decoded, _) = decode_at(&bytes, 0).unwrap();
        prop_assert_eq!(decoded, Value::Array(items));
    }
}
