use stratadb::textindex::{QueryOptions, QueryResult, TextIndex};

fn tmp() -> std::path::PathBuf {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("index");
    std::mem::forget(dir);
    p
}

#[test]
fn tfidf_ranks_exact_match_above_partial_matches() {
    let base = tmp();
    let mut idx = TextIndex::open(&base, 16).unwrap();
    idx.add("d1", "lazy dog").unwrap();
    idx.add("d2", "quick brown dog").unwrap();
    idx.add("d3", "lazy cat").unwrap();

    let result = idx.query("lazy dog", QueryOptions::default()).unwrap();
    let QueryResult::Scored(ranked) = result else { panic!("expected scored results") };
    let rank_of = |doc: &str| ranked.iter().position(|(d, _)| d == doc).unwrap();
    assert!(rank_of("d1") < rank_of("d2"));
    assert!(rank_of("d1") < rank_of("d3"));
}

#[test]
fn recall_finds_every_tokenized_stem() {
    let base = tmp();
    let mut idx = TextIndex::open(&base, 16).unwrap();
    idx.add("doc-a", "The Running Foxes jump quickly").unwrap();

    for word in ["running", "foxes", "jump", "quickly"] {
        let opts = QueryOptions { scored: false, require_all: true };
        let QueryResult::Ids(ids) = idx.query(word, opts).unwrap() else { panic!("expected ids") };
        assert!(ids.contains(&"doc-a".to_string()), "missing recall for {word}");
    }
}

#[test]
fn require_all_needs_every_query_stem_present() {
    let base = tmp();
    let mut idx = TextIndex::open(&base, 16).unwrap();
    idx.add("d1", "red fox jumps").unwrap();
    idx.add("d2", "red fox sleeps").unwrap();

    let opts = QueryOptions { scored: false, require_all: true };
    let QueryResult::Ids(ids) = idx.query("red jumps", opts).unwrap() else { panic!("expected ids") };
    assert_eq!(ids, vec!["d1".to_string()]);
}

#[test]
fn removal_drops_document_from_every_query() {
    let base = tmp();
    let mut idx = TextIndex::open(&base, 16).unwrap();
    idx.add("d1", "lazy dog").unwrap();
    idx.add("d2", "lazy cat").unwrap();

    let removed = idx.remove("d1").unwrap();
    assert!(removed);
    let removed_again = idx.remove("d1").unwrap();
    assert!(!removed_again);

    let opts = QueryOptions { scored: false, require_all: false };
    let QueryResult::Ids(ids) = idx.query("lazy dog cat", opts).unwrap() else { panic!("expected ids") };
    assert!(!ids.contains(&"d1".to_string()));
    assert!(ids.contains(&"d2".to_string()));
}

#[test]
fn unscored_order_matches_the_coverage_boosted_scored_order() {
    // Query stems: alpha, beta, gamma. d1 only covers "alpha" (but with a
    // higher raw tf*idf sum); d2 covers all three stems. The coverage
    // boost must apply in both the scored and unscored paths, so d2
    // should outrank d1 in both — if coverage-boost were skipped when
    // `scored:false`, the unscored order would follow raw tf*idf instead
    // and rank d1 first.
    let base = tmp();
    let mut idx = TextIndex::open(&base, 16).unwrap();
    idx.add("d1", "alpha").unwrap();
    idx.add("d2", "alpha beta gamma").unwrap();
    idx.add("beta-filler-1", "beta").unwrap();
    idx.add("beta-filler-2", "beta").unwrap();
    idx.add("beta-filler-3", "beta").unwrap();
    idx.add("gamma-filler-1", "gamma").unwrap();
    idx.add("gamma-filler-2", "gamma").unwrap();

    let scored_opts = QueryOptions { scored: true, require_all: false };
    let QueryResult::Scored(scored) = idx.query("alpha beta gamma", scored_opts).unwrap() else {
        panic!("expected scored results")
    };
    let scored_order: Vec<String> = scored.into_iter().map(|(d, _)| d).collect();

    let unscored_opts = QueryOptions { scored: false, require_all: false };
    let QueryResult::Ids(unscored_order) = idx.query("alpha beta gamma", unscored_opts).unwrap() else {
        panic!("expected ids")
    };

    let d1_rank = |order: &[String]| order.iter().position(|d| d == "d1").unwrap();
    let d2_rank = |order: &[String]| order.iter().position(|d| d == "d2").unwrap();
    assert!(d2_rank(&scored_order) < d1_rank(&scored_order), "coverage boost should rank d2 above d1");
    assert_eq!(scored_order, unscored_order);
}

#[test]
fn compaction_preserves_query_results() {
    let base = tmp();
    let dest = tmp();
    let mut idx = TextIndex::open(&base, 16).unwrap();
    idx.add("d1", "the quick brown fox").unwrap();
    idx.add("d2", "the lazy dog sleeps").unwrap();
    idx.add("d3", "quick quick quick fox").unwrap();
    idx.remove("d2").unwrap();

    let before = idx.query("quick fox", QueryOptions::default()).unwrap();
    idx.compact(&dest).unwrap();
    let after = idx.query("quick fox", QueryOptions::default()).unwrap();
    assert_eq!(before, after);
}
