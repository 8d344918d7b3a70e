use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::tokenize::{stem, tokenize};
use crate::btree::BTree;
use crate::errors::Result;
use crate::value::Value;

/// Options controlling [`TextIndex::query`] (spec §4.5.2).
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub scored: bool,
    pub require_all: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { scored: true, require_all: false }
    }
}

/// A ranked or unranked query outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Scored(Vec<(String, f64)>),
    Ids(Vec<String>),
}

/// Stemmed inverted text index built over three cooperating B+Trees
/// (component C5): `terms`, `documents`, `lengths`.
pub struct TextIndex {
    terms: BTree,
    documents: BTree,
    lengths: BTree,
    base: PathBuf,
    order: u64,
}

fn posting_pairs(v: &Value) -> Vec<(String, i64)> {
    match v {
        Value::Object(pairs) => {
            pairs.iter().filter_map(|(k, v)| v.as_int().map(|i| (k.clone(), i))).collect()
        }
        _ => Vec::new(),
    }
}

fn pairs_to_object(pairs: &[(String, i64)]) -> Value {
    Value::object(pairs.iter().map(|(k, v)| (k.clone(), Value::Int(*v))))
}

impl TextIndex {
    /// Opens (or creates) the three backing trees at `{base}-terms`,
    /// `{base}-documents`, `{base}-lengths`.
    ///
    /// # Errors
    /// Returns an I/O or data error from any of the three files.
    pub fn open(base: impl AsRef<Path>, order: u64) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        log::info!("opening text index {}", base.display());
        let terms = BTree::open(Self::path_for(&base, "terms"), order)?;
        let documents = BTree::open(Self::path_for(&base, "documents"), order)?;
        let lengths = BTree::open(Self::path_for(&base, "lengths"), order)?;
        Ok(Self { terms, documents, lengths, base, order })
    }

    fn path_for(base: &Path, suffix: &str) -> PathBuf {
        let mut name = base.as_os_str().to_owned();
        name.push(format!("-{suffix}"));
        PathBuf::from(name)
    }

    /// # Errors
    /// Returns an error if any of the three backing trees fail to close.
    pub fn close(self) -> Result<()> {
        log::info!("closing text index {}", self.base.display());
        self.terms.close()?;
        self.documents.close()?;
        self.lengths.close()?;
        Ok(())
    }

    #[must_use]
    pub fn doc_count(&self) -> u64 {
        self.lengths.size()
    }

    /// Indexes `text` under `doc_id` (spec §4.5.2.1).
    ///
    /// # Errors
    /// Returns an I/O or data error from any of the three backing trees.
    pub fn add(&mut self, doc_id: &str, text: &str) -> Result<()> {
        let mut counts: Vec<(String, i64)> = Vec::new();
        for token in tokenize(text) {
            let s = stem(&token);
            if let Some(slot) = counts.iter_mut().find(|(k, _)| *k == s) {
                slot.1 += 1;
            } else {
                counts.push((s, 1));
            }
        }

        for (stem_key, freq) in &counts {
            let key = Value::Str(stem_key.clone());
            let existing = self.terms.search(&key)?;
            let mut pairs = existing.as_ref().map(posting_pairs).unwrap_or_default();
            if let Some(slot) = pairs.iter_mut().find(|(k, _)| k == doc_id) {
                slot.1 = *freq;
            } else {
                pairs.push((doc_id.to_string(), *freq));
            }
            self.terms.add(key, pairs_to_object(&pairs))?;
        }

        let doc_key = Value::Str(doc_id.to_string());
        let existing_doc = self.documents.search(&doc_key)?;
        let mut merged = existing_doc.as_ref().map(posting_pairs).unwrap_or_default();
        for (stem_key, freq) in &counts {
            if let Some(slot) = merged.iter_mut().find(|(k, _)| k == stem_key) {
                slot.1 = *freq;
            } else {
                merged.push((stem_key.clone(), *freq));
            }
        }
        self.documents.add(doc_key, pairs_to_object(&merged))?;

        let total: i64 = merged.iter().map(|(_, f)| f).sum();
        self.lengths.add(Value::Str(doc_id.to_string()), Value::Int(total))?;
        Ok(())
    }

    /// Removes `doc_id` from the index; `false` if it was absent.
    ///
    /// # Errors
    /// Returns an I/O or data error from any of the three backing trees.
    pub fn remove(&mut self, doc_id: &str) -> Result<bool> {
        let doc_key = Value::Str(doc_id.to_string());
        let Some(doc_val) = self.documents.search(&doc_key)? else { return Ok(false) };
        for (stem_key, _) in posting_pairs(&doc_val) {
            let term_key = Value::Str(stem_key.clone());
            let Some(posting_val) = self.terms.search(&term_key)? else { continue };
            let mut pairs = posting_pairs(&posting_val);
            pairs.retain(|(k, _)| k != doc_id);
            if pairs.is_empty() {
                self.terms.delete(&term_key)?;
            } else {
                self.terms.add(term_key, pairs_to_object(&pairs))?;
            }
        }
        self.documents.delete(&doc_key)?;
        self.lengths.delete(&doc_key)?;
        Ok(true)
    }

    /// Runs a query per `opts` (spec §4.5.2.3).
    ///
    /// # Errors
    /// Returns an I/O or data error from any of the three backing trees.
    pub fn query(&mut self, text: &str, opts: QueryOptions) -> Result<QueryResult> {
        let mut stems = Vec::new();
        for token in tokenize(text) {
            let s = stem(&token);
            if !stems.contains(&s) {
                stems.push(s);
            }
        }
        if stems.is_empty() {
            return Ok(if opts.scored { QueryResult::Scored(vec![]) } else { QueryResult::Ids(vec![]) });
        }

        if opts.require_all {
            let mut sets: Vec<HashSet<String>> = Vec::with_capacity(stems.len());
            for s in &stems {
                let posting = self.terms.search(&Value::Str(s.clone()))?;
                let Some(posting) = posting else { return Ok(QueryResult::Ids(vec![])) };
                sets.push(posting_pairs(&posting).into_iter().map(|(d, _)| d).collect());
            }
            let mut iter = sets.into_iter();
            let mut acc = iter.next().unwrap_or_default();
            for s in iter {
                acc.retain(|d| s.contains(d));
            }
            return Ok(QueryResult::Ids(acc.into_iter().collect()));
        }

        let total_docs = self.lengths.size() as f64;
        let mut order: Vec<String> = Vec::new();
        let mut scores: Vec<(String, f64)> = Vec::new();

        for s in &stems {
            let Some(posting_val) = self.terms.search(&Value::Str(s.clone()))? else { continue };
            let posting = posting_pairs(&posting_val);
            let df = posting.len() as f64;
            if df == 0.0 {
                continue;
            }
            let idf = (total_docs / df).ln();
            for (doc_id, tf_raw) in posting {
                let doc_len = self
                    .lengths
                    .search(&Value::Str(doc_id.clone()))?
                    .and_then(|v| v.as_int())
                    .filter(|&l| l != 0)
                    .unwrap_or(1) as f64;
                let tf = tf_raw as f64 / doc_len;
                let contribution = tf * idf;
                if let Some(slot) = scores.iter_mut().find(|(d, _)| *d == doc_id) {
                    slot.1 += contribution;
                } else {
                    order.push(doc_id.clone());
                    scores.push((doc_id, contribution));
                }
            }
        }

        let unique_query_stems = stems.len() as f64;
        for (doc_id, score) in &mut scores {
            let doc_stems = self
                .documents
                .search(&Value::Str(doc_id.clone()))?
                .map(|v| posting_pairs(&v).into_iter().map(|(k, _)| k).collect::<HashSet<_>>())
                .unwrap_or_default();
            let covered = stems.iter().filter(|s| doc_stems.contains(*s)).count() as f64;
            let coverage = covered / unique_query_stems;
            *score *= 1.0 + coverage;
        }

        let ranked = stable_sort_by_score(scores, &order);
        if opts.scored {
            Ok(QueryResult::Scored(ranked))
        } else {
            Ok(QueryResult::Ids(ranked.into_iter().map(|(d, _)| d).collect()))
        }
    }

    /// Rewrites the three backing trees into `{dest_base}-terms`,
    /// `-documents`, `-lengths`, then switches the index onto them
    /// (spec §4.5.4).
    ///
    /// # Errors
    /// Returns an I/O or data error from any of the three files.
    pub fn compact(&mut self, dest_base: impl AsRef<Path>) -> Result<()> {
        let dest_base = dest_base.as_ref().to_path_buf();
        log::info!("compacting text index {} -> {}", self.base.display(), dest_base.display());
        self.terms.compact(Self::path_for(&dest_base, "terms"))?;
        self.documents.compact(Self::path_for(&dest_base, "documents"))?;
        self.lengths.compact(Self::path_for(&dest_base, "lengths"))?;

        self.terms = BTree::open(Self::path_for(&dest_base, "terms"), self.order)?;
        self.documents = BTree::open(Self::path_for(&dest_base, "documents"), self.order)?;
        self.lengths = BTree::open(Self::path_for(&dest_base, "lengths"), self.order)?;
        self.base = dest_base;
        Ok(())
    }
}

/// Stable sort by descending score, ties broken by first-discovery order.
fn stable_sort_by_score(mut scores: Vec<(String, f64)>, order: &[String]) -> Vec<(String, f64)> {
    scores.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ia = order.iter().position(|o| o == &a.0).unwrap_or(usize::MAX);
                let ib = order.iter().position(|o| o == &b.0).unwrap_or(usize::MAX);
                ia.cmp(&ib)
            })
    });
    scores
}
