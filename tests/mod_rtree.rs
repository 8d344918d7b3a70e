use stratadb::RTree;
use stratadb::rtree::BBox;
use stratadb::value::ObjectId;

fn tmp() -> std::path::PathBuf {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("index.rt");
    std::mem::forget(dir);
    p
}

#[test]
fn radius_query_matches_nyc_scenario() {
    let path = tmp();
    let mut t = RTree::open(&path, 9).unwrap();
    let nyc = ObjectId::new();
    let jersey_city = ObjectId::new();
    let princeton = ObjectId::new();
    t.insert(40.7128, -74.0060, nyc).unwrap();
    t.insert(40.7282, -74.1502, jersey_city).unwrap();
    t.insert(40.2206, -74.7597, princeton).unwrap();

    let hits = t.search_radius(40.7128, -74.0060, 25.0).unwrap();
    let ids: Vec<ObjectId> = hits.iter().map(|h| h.object_id).collect();
    assert!(ids.contains(&nyc));
    assert!(ids.contains(&jersey_city));
    assert!(!ids.contains(&princeton));
    for hit in &hits {
        assert!(hit.distance_km <= 25.0);
    }
}

#[test]
fn persists_fifty_points_across_reopen() {
    let path = tmp();
    {
        let mut t = RTree::open(&path, 9).unwrap();
        let mut lat = 25.0_f64;
        let mut lng = -125.0_f64;
        for _ in 0..50 {
            t.insert(lat, lng, ObjectId::new()).unwrap();
            lat += 0.4;
            lng += 1.0;
        }
        t.close().unwrap();
    }
    let mut t = RTree::open(&path, 9).unwrap();
    let hits = t.search_bbox(&BBox::world()).unwrap();
    assert_eq!(hits.len(), 50);
    assert_eq!(t.size(), 50);
}

#[test]
fn remove_drops_only_the_removed_object() {
    let path = tmp();
    let mut t = RTree::open(&path, 9).unwrap();
    let ids: Vec<ObjectId> = (0..20).map(|_| ObjectId::new()).collect();
    for (i, id) in ids.iter().enumerate() {
        t.insert(30.0 + i as f64 * 0.1, -90.0, *id).unwrap();
    }
    let removed = t.remove(&ids[5]).unwrap();
    assert!(removed);
    let again = t.remove(&ids[5]).unwrap();
    assert!(!again);

    let hits = t.search_bbox(&BBox::world()).unwrap();
    assert_eq!(hits.len(), 19);
    assert!(hits.iter().all(|h| h.object_id != ids[5]));
}

#[test]
fn compaction_preserves_the_entry_set() {
    let path = tmp();
    let dest = tmp();
    let mut t = RTree::open(&path, 9).unwrap();
    let ids: Vec<ObjectId> = (0..30).map(|_| ObjectId::new()).collect();
    for (i, id) in ids.iter().enumerate() {
        t.insert(10.0 + i as f64, 20.0 - i as f64, *id).unwrap();
    }
    for id in ids.iter().step_by(3) {
        t.remove(id).unwrap();
    }
    let report = t.compact(&dest).unwrap();
    assert!(report.bytes_saved() <= report.old_size());

    let mut reopened = RTree::open(&dest, 9).unwrap();
    let mut before: Vec<ObjectId> =
        t.search_bbox(&BBox::world()).unwrap().into_iter().map(|h| h.object_id).collect();
    let mut after: Vec<ObjectId> =
        reopened.search_bbox(&BBox::world()).unwrap().into_iter().map(|h| h.object_id).collect();
    before.sort();
    after.sort();
    assert_eq!(before, after);
}
