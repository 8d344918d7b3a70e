use stratadb::{BTree, Value};

fn tmp() -> std::path::PathBuf {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("index.bt");
    std::mem::forget(dir);
    p
}

#[test]
fn btree_compaction_reclaims_space_and_preserves_contents() {
    let path = tmp();
    let dest = tmp();
    let mut t = BTree::open(&path, 8).unwrap();
    for i in 0..50 {
        t.add(Value::Int(i), Value::Int(i * 2)).unwrap();
    }
    for i in 0..20 {
        t.delete(&Value::Int(i)).unwrap();
    }
    for i in 50..80 {
        t.add(Value::Int(i), Value::Int(i * 2)).unwrap();
    }

    let before = t.to_array().unwrap();
    let report = t.compact(&dest).unwrap();
    assert!(report.old_size() > report.new_size());
    assert!(report.bytes_saved() > 0);

    let mut reopened = BTree::open(&dest, 8).unwrap();
    let after = reopened.to_array().unwrap();
    assert_eq!(before, after);
}
