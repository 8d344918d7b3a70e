use proptest::prelude::*;
use stratadb::{BTree, Value};

fn tmp() -> std::path::PathBuf {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("index.bt");
    std::mem::forget(dir);
    p
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        cases: 24,
        .. proptest::test_runner::Config::default()
    })]

    #[test]
    fn prop_to_array_is_strictly_ascending(keys in proptest::collection::vec(0i64..500, 0..120)) {
        let path = tmp();
        let mut t = BTree::open(&path, 5).unwrap();
        for k in &keys {
            t.add(Value::Int(*k), Value::Int(*k)).unwrap();
        }
        let arr = t.to_array().unwrap();
        for w in arr.windows(2) {
            let a = w[0].0.as_int().unwrap();
            let b = w[1].0.as_int().unwrap();
            prop_assert!(a < b);
        }
    }

    #[test]
    fn prop_size_matches_distinct_key_count(keys in proptest::collection::vec(0i64..200, 0..150)) {
        use std::collections::BTreeSet;
        let path = tmp();
        let mut t = BTree::open(&path, 4).unwrap();
        for k in &keys {
            t.add(Value::Int(*k), Value::Int(*k)).unwrap();
        }
        let distinct: BTreeSet<i64> = keys.into_iter().collect();
        prop_assert_eq!(t.size(), distinct.len() as u64);
        prop_assert_eq!(t.to_array().unwrap().len(), distinct.len());
    }

    #[test]
    fn prop_deleted_keys_are_absent_and_others_survive(keys in proptest::collection::hash_set(0i64..200, 1..60)) {
        let path = tmp();
        let mut t = BTree::open(&path, 6).unwrap();
        let keys: Vec<i64> = keys.into_iter().collect();
        for k in &keys {
            t.add(Value::Int(*k), Value::Int(*k)).unwrap();
        }
        let (to_delete, to_keep): (Vec<i64>, Vec<i64>) =
            keys.iter().partition(|k| *k % 2 == 0);
        for k in &to_delete {
            t.delete(&Value::Int(*k)).unwrap();
        }
        for k in &to_delete {
            prop_assert_eq!(t.search(&Value::Int(*k)).unwrap(), None);
        }
        for k in &to_keep {
            prop_assert_eq!(t.search(&Value::Int(*k)).unwrap(), Some(Value::Int(*k)));
        }
    }
}
