use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;

use super::meta::{BTreeMeta, META_SIZE};
use super::node::Node;
use crate::blockfile::{BlockFile, Mode};
use crate::compaction::CompactionReport;
use crate::config::StoreConfig;
use crate::errors::{Result, StoreError};
use crate::value::{Value, compare_keys, decode_at, encode, size_at};

enum InsertOutcome {
    Placed(u64),
    Split { left: u64, right: u64, split_key: Value },
}

/// An order-N, copy-on-write, persistent B+Tree (component C3).
pub struct BTree {
    file: BlockFile,
    meta: BTreeMeta,
    cache: LruCache<u64, Node>,
    path: PathBuf,
}

impl BTree {
    /// Opens or creates the tree at `path` with the given order
    /// (`N`, spec §4.3.1), using [`StoreConfig::default`]'s node-cache
    /// capacity.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidOrder` if `order < 3`, or any I/O /
    /// `CorruptMetadata` error surfaced while opening the backing file.
    pub fn open(path: impl AsRef<Path>, order: u64) -> Result<Self> {
        Self::open_with_cache_capacity(path, order, StoreConfig::default().node_cache_capacity)
    }

    /// Opens or creates the tree at `path`, sizing the in-memory decoded-
    /// node cache to `cache_capacity` entries (spec §9's "tiny in-memory
    /// cache from Pointer -> decoded node with bounded size").
    ///
    /// # Errors
    /// Returns `StoreError::InvalidOrder` if `order < 3`, or any I/O /
    /// `CorruptMetadata` error surfaced while opening the backing file.
    pub fn open_with_cache_capacity(path: impl AsRef<Path>, order: u64, cache_capacity: usize) -> Result<Self> {
        if order < 3 {
            return Err(StoreError::InvalidOrder(order as usize));
        }
        let path = path.as_ref().to_path_buf();
        log::info!("opening b+tree {}", path.display());
        let mut file = BlockFile::open(&path, Mode::ReadWrite)?;
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::new(1).expect("nonzero"));
        let cache = LruCache::new(capacity);
        let size = file.size()?;
        let meta = if size == 0 {
            let meta = BTreeMeta::new(order);
            let leaf = Node::Leaf { id: 0, keys: vec![], values: vec![], next: None };
            let leaf_ptr = file.append(&encode(&leaf.to_value()))?;
            let mut meta = meta;
            meta.root_pointer = Some(leaf_ptr);
            meta.next_id = 1;
            file.append(&meta.to_bytes())?;
            file.flush()?;
            meta
        } else {
            Self::read_tail_meta(&file, size)?
        };
        Ok(Self { file, meta, cache, path })
    }

    fn read_tail_meta(file: &BlockFile, size: u64) -> Result<BTreeMeta> {
        let meta_size = *META_SIZE;
        if size < meta_size {
            return Err(StoreError::CorruptMetadata);
        }
        let bytes = file.read_range(size - meta_size, meta_size as usize)?;
        BTreeMeta::from_bytes(&bytes)
    }

    /// Writes a final metadata record and releases the backing file.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn close(mut self) -> Result<()> {
        log::info!("closing b+tree {}", self.path.display());
        self.file.append(&self.meta.to_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.meta.size
    }

    #[must_use]
    pub fn order(&self) -> u64 {
        self.meta.max_entries
    }

    fn read_node(&mut self, ptr: u64) -> Result<Node> {
        if let Some(node) = self.cache.get(&ptr) {
            return Ok(node.clone());
        }
        let len = size_at(&self.file, ptr)? as usize;
        let bytes = self.file.read_range(ptr, len)?;
        let (value, _) = decode_at(&bytes, 0)?;
        let node = Node::from_value(&value)?;
        self.cache.put(ptr, node.clone());
        Ok(node)
    }

    fn write_node(&mut self, node: Node) -> Result<u64> {
        let bytes = encode(&node.to_value());
        let ptr = self.file.append(&bytes)?;
        self.cache.put(ptr, node);
        Ok(ptr)
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.meta.next_id;
        self.meta.next_id += 1;
        id
    }

    /// Child index to descend into for `key`: equal to a separator
    /// descends right (spec §4.3.3).
    fn child_index(keys: &[Value], key: &Value) -> usize {
        keys.partition_point(|k| compare_keys(k, key) != std::cmp::Ordering::Greater)
    }

    /// Inclusive/exclusive upsert. Looks up `key`; absent otherwise.
    ///
    /// # Errors
    /// Returns an I/O or data error from the backing file.
    pub fn search(&mut self, key: &Value) -> Result<Option<Value>> {
        let mut ptr = match self.meta.root_pointer {
            Some(p) => p,
            None => return Ok(None),
        };
        loop {
            match self.read_node(ptr)? {
                Node::Leaf { keys, values, .. } => {
                    return Ok(keys
                        .binary_search_by(|k| compare_keys(k, key))
                        .ok()
                        .map(|i| values[i].clone()));
                }
                Node::Internal { keys, children, .. } => {
                    let idx = Self::child_index(&keys, key);
                    ptr = children[idx];
                }
            }
        }
    }

    /// Upserts `(key, value)`. On an existing key, the new value replaces
    /// the old one via a fresh leaf image; `size()` only grows on a
    /// genuinely new key.
    ///
    /// # Errors
    /// Returns an I/O or data error from the backing file.
    pub fn add(&mut self, key: Value, value: Value) -> Result<()> {
        let root_ptr = match self.meta.root_pointer {
            Some(p) => p,
            None => {
                let leaf = Node::Leaf { id: self.alloc_id(), keys: vec![key], values: vec![value], next: None };
                let ptr = self.write_node(leaf)?;
                self.meta.root_pointer = Some(ptr);
                self.meta.size += 1;
                self.meta.version += 1;
                self.file.append(&self.meta.to_bytes())?;
                return Ok(());
            }
        };
        let (outcome, inserted_new) = self.insert_rec(root_ptr, key, value)?;
        let new_root_ptr = match outcome {
            InsertOutcome::Placed(ptr) => ptr,
            InsertOutcome::Split { left, right, split_key } => {
                let root = Node::Internal { id: self.alloc_id(), keys: vec![split_key], children: vec![left, right] };
                self.write_node(root)?
            }
        };
        self.meta.root_pointer = Some(new_root_ptr);
        if inserted_new {
            self.meta.size += 1;
        }
        self.meta.version += 1;
        self.file.append(&self.meta.to_bytes())?;
        Ok(())
    }

    fn insert_rec(&mut self, ptr: u64, key: Value, value: Value) -> Result<(InsertOutcome, bool)> {
        let node = self.read_node(ptr)?;
        match node {
            Node::Leaf { keys: mut ks, values: mut vs, next, .. } => {
                let (inserted_new, pos) = match ks.binary_search_by(|k| compare_keys(k, &key)) {
                    Ok(i) => {
                        vs[i] = value;
                        (false, i)
                    }
                    Err(i) => {
                        ks.insert(i, key);
                        vs.insert(i, value);
                        (true, i)
                    }
                };
                let _ = pos;
                let n = self.meta.max_entries as usize;
                if ks.len() >= n {
                    let mid = n.div_ceil(2);
                    let right_keys = ks.split_off(mid);
                    let right_values = vs.split_off(mid);
                    let split_key = right_keys[0].clone();
                    let right_id = self.alloc_id();
                    let right_ptr = self
                        .write_node(Node::Leaf { id: right_id, keys: right_keys, values: right_values, next })?;
                    let left_id = self.alloc_id();
                    let left_ptr =
                        self.write_node(Node::Leaf { id: left_id, keys: ks, values: vs, next: Some(right_ptr) })?;
                    Ok((InsertOutcome::Split { left: left_ptr, right: right_ptr, split_key }, inserted_new))
                } else {
                    let id = self.alloc_id();
                    let new_ptr = self.write_node(Node::Leaf { id, keys: ks, values: vs, next })?;
                    Ok((InsertOutcome::Placed(new_ptr), inserted_new))
                }
            }
            Node::Internal { keys: mut ks, children: mut cs, .. } => {
                let idx = Self::child_index(&ks, &key);
                let (child_outcome, inserted_new) = self.insert_rec(cs[idx], key, value)?;
                match child_outcome {
                    InsertOutcome::Placed(new_child) => {
                        cs[idx] = new_child;
                        let id = self.alloc_id();
                        let new_ptr = self.write_node(Node::Internal { id, keys: ks, children: cs })?;
                        Ok((InsertOutcome::Placed(new_ptr), inserted_new))
                    }
                    InsertOutcome::Split { left, right, split_key } => {
                        cs[idx] = left;
                        ks.insert(idx, split_key);
                        cs.insert(idx + 1, right);
                        let n = self.meta.max_entries as usize;
                        if ks.len() >= n {
                            let mid = n.div_ceil(2) - 1;
                            let mut right_keys = ks.split_off(mid + 1);
                            let right_children = cs.split_off(mid + 1);
                            let promoted = ks.pop().expect("mid < len after split_off");
                            let _ = &mut right_keys;
                            let right_id = self.alloc_id();
                            let right_ptr = self.write_node(Node::Internal {
                                id: right_id,
                                keys: right_keys,
                                children: right_children,
                            })?;
                            let left_id = self.alloc_id();
                            let left_ptr =
                                self.write_node(Node::Internal { id: left_id, keys: ks, children: cs })?;
                            Ok((
                                InsertOutcome::Split { left: left_ptr, right: right_ptr, split_key: promoted },
                                inserted_new,
                            ))
                        } else {
                            let id = self.alloc_id();
                            let new_ptr = self.write_node(Node::Internal { id, keys: ks, children: cs })?;
                            Ok((InsertOutcome::Placed(new_ptr), inserted_new))
                        }
                    }
                }
            }
        }
    }

    /// Removes `key` if present; a no-op (not an error) otherwise.
    ///
    /// # Errors
    /// Returns an I/O or data error from the backing file.
    pub fn delete(&mut self, key: &Value) -> Result<()> {
        let Some(root_ptr) = self.meta.root_pointer else { return Ok(()) };
        let Some(mut new_root) = self.delete_rec(root_ptr, key)? else { return Ok(()) };

        if let Node::Internal { children, .. } = self.read_node(new_root)?
            && children.len() == 1
        {
            new_root = children[0];
        }
        self.meta.root_pointer = Some(new_root);
        self.meta.size = self.meta.size.saturating_sub(1);
        self.meta.version += 1;
        self.file.append(&self.meta.to_bytes())?;
        Ok(())
    }

    fn delete_rec(&mut self, ptr: u64, key: &Value) -> Result<Option<u64>> {
        match self.read_node(ptr)? {
            Node::Leaf { id: _, mut keys, mut values, next } => {
                match keys.binary_search_by(|k| compare_keys(k, key)) {
                    Ok(i) => {
                        keys.remove(i);
                        values.remove(i);
                        let id = self.alloc_id();
                        let ptr = self.write_node(Node::Leaf { id, keys, values, next })?;
                        Ok(Some(ptr))
                    }
                    Err(_) => Ok(None),
                }
            }
            Node::Internal { keys, mut children, .. } => {
                let idx = Self::child_index(&keys, key);
                match self.delete_rec(children[idx], key)? {
                    None => Ok(None),
                    Some(new_child) => {
                        children[idx] = new_child;
                        let id = self.alloc_id();
                        let ptr = self.write_node(Node::Internal { id, keys, children })?;
                        Ok(Some(ptr))
                    }
                }
            }
        }
    }

    /// Returns all `(key, value)` pairs with `min <= key <= max`.
    ///
    /// # Errors
    /// Returns an I/O or data error from the backing file.
    pub fn range_search(&mut self, min: &Value, max: &Value) -> Result<Vec<(Value, Value)>> {
        let mut out = Vec::new();
        if let Some(root) = self.meta.root_pointer {
            self.range_search_rec(root, min, max, &mut out)?;
        }
        Ok(out)
    }

    fn range_search_rec(
        &mut self,
        ptr: u64,
        min: &Value,
        max: &Value,
        out: &mut Vec<(Value, Value)>,
    ) -> Result<()> {
        match self.read_node(ptr)? {
            Node::Leaf { keys, values, .. } => {
                for (k, v) in keys.into_iter().zip(values) {
                    if compare_keys(&k, min) != std::cmp::Ordering::Less
                        && compare_keys(&k, max) != std::cmp::Ordering::Greater
                    {
                        out.push((k, v));
                    }
                }
            }
            Node::Internal { keys, children, .. } => {
                let lo = Self::child_index(&keys, min);
                let hi = keys.partition_point(|k| compare_keys(k, max) != std::cmp::Ordering::Greater);
                for &child in &children[lo..=hi] {
                    self.range_search_rec(child, min, max, out)?;
                }
            }
        }
        Ok(())
    }

    /// Returns every `(key, value)` pair, strictly ascending by key.
    ///
    /// # Errors
    /// Returns an I/O or data error from the backing file.
    pub fn to_array(&mut self) -> Result<Vec<(Value, Value)>> {
        let mut out = Vec::new();
        if let Some(root) = self.meta.root_pointer {
            self.collect_ascending(root, &mut out)?;
        }
        Ok(out)
    }

    fn collect_ascending(&mut self, ptr: u64, out: &mut Vec<(Value, Value)>) -> Result<()> {
        match self.read_node(ptr)? {
            Node::Leaf { keys, values, .. } => {
                out.extend(keys.into_iter().zip(values));
            }
            Node::Internal { children, .. } => {
                for child in children {
                    self.collect_ascending(child, out)?;
                }
            }
        }
        Ok(())
    }

    /// Number of internal levels between the root and a leaf (0 if the
    /// root is itself a leaf).
    ///
    /// # Errors
    /// Returns an I/O or data error from the backing file.
    pub fn get_height(&mut self) -> Result<u64> {
        let Some(root) = self.meta.root_pointer else { return Ok(0) };
        let mut ptr = root;
        let mut height = 0u64;
        loop {
            match self.read_node(ptr)? {
                Node::Leaf { .. } => return Ok(height),
                Node::Internal { children, .. } => {
                    height += 1;
                    ptr = children[0];
                }
            }
        }
    }

    /// Rewrites this tree densely into a fresh file at `dest_path`
    /// (component C6).
    ///
    /// # Errors
    /// Returns an I/O or data error from either the source or destination
    /// file.
    pub fn compact(&mut self, dest_path: impl AsRef<Path>) -> Result<CompactionReport> {
        self.file.flush()?;
        let old_size = self.file.size()?;
        let order = self.meta.max_entries;
        let pairs = self.to_array()?;
        let dest_path = dest_path.as_ref().to_path_buf();
        {
            let mut dest = BTree::open(&dest_path, order)?;
            for (k, v) in pairs {
                dest.add(k, v)?;
            }
            dest.close()?;
        }
        let new_size = {
            let dest = BlockFile::open(&dest_path, Mode::Read)?;
            dest.size()?
        };
        log::info!("compacted b+tree {} -> {}", self.path.display(), dest_path.display());
        Ok(CompactionReport::new(old_size, new_size, dest_path))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("t.bt");
        std::mem::forget(dir);
        p
    }

    #[test]
    fn reload_after_close() {
        let path = tmp();
        {
            let mut t = BTree::open(&path, 3).unwrap();
            t.add(Value::Int(10), Value::Str("ten".into())).unwrap();
            t.add(Value::Int(20), Value::Str("twenty".into())).unwrap();
            t.add(Value::Int(5), Value::Str("five".into())).unwrap();
            t.close().unwrap();
        }
        let mut t = BTree::open(&path, 3).unwrap();
        assert_eq!(t.search(&Value::Int(10)).unwrap(), Some(Value::Str("ten".into())));
        assert_eq!(t.search(&Value::Int(5)).unwrap(), Some(Value::Str("five".into())));
        assert_eq!(t.search(&Value::Int(20)).unwrap(), Some(Value::Str("twenty".into())));
        assert_eq!(t.size(), 3);
    }

    #[test]
    fn splits_and_orders_ascending() {
        let path = tmp();
        let mut t = BTree::open(&path, 3).unwrap();
        for i in 1..=10 {
            t.add(Value::Int(i), Value::Int(i * 10)).unwrap();
        }
        assert!(t.get_height().unwrap() >= 1);
        let arr = t.to_array().unwrap();
        assert_eq!(arr.len(), 10);
        for (i, (k, v)) in arr.iter().enumerate() {
            assert_eq!(*k, Value::Int(i as i64 + 1));
            assert_eq!(*v, Value::Int((i as i64 + 1) * 10));
        }
    }

    #[test]
    fn delete_then_reopen() {
        let path = tmp();
        {
            let mut t = BTree::open(&path, 3).unwrap();
            for k in [5, 10, 15, 20] {
                t.add(Value::Int(k), Value::Int(k)).unwrap();
            }
            t.delete(&Value::Int(10)).unwrap();
            t.close().unwrap();
        }
        let mut t = BTree::open(&path, 3).unwrap();
        assert_eq!(t.search(&Value::Int(10)).unwrap(), None);
        assert_eq!(t.search(&Value::Int(5)).unwrap(), Some(Value::Int(5)));
        assert_eq!(t.search(&Value::Int(15)).unwrap(), Some(Value::Int(15)));
        assert_eq!(t.search(&Value::Int(20)).unwrap(), Some(Value::Int(20)));
        assert_eq!(t.size(), 3);
    }

    #[test]
    fn delete_missing_key_is_noop() {
        let path = tmp();
        let mut t = BTree::open(&path, 3).unwrap();
        t.add(Value::Int(1), Value::Int(1)).unwrap();
        let size_before = t.size();
        t.delete(&Value::Int(999)).unwrap();
        assert_eq!(t.size(), size_before);
    }

    #[test]
    fn replace_does_not_double_count_size() {
        let path = tmp();
        let mut t = BTree::open(&path, 4).unwrap();
        t.add(Value::Int(1), Value::Int(1)).unwrap();
        t.add(Value::Int(1), Value::Int(2)).unwrap();
        assert_eq!(t.size(), 1);
        assert_eq!(t.search(&Value::Int(1)).unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn range_search_is_inclusive() {
        let path = tmp();
        let mut t = BTree::open(&path, 4).unwrap();
        for i in 1..=20 {
            t.add(Value::Int(i), Value::Int(i)).unwrap();
        }
        let got = t.range_search(&Value::Int(5), &Value::Int(10)).unwrap();
        let keys: Vec<i64> = got.iter().map(|(k, _)| k.as_int().unwrap()).collect();
        assert_eq!(keys, (5..=10).collect::<Vec<_>>());
    }

    #[test]
    fn compaction_preserves_entries_and_reports_nonneg_savings() {
        let path = tmp();
        let dest = tmp();
        let mut t = BTree::open(&path, 4).unwrap();
        for i in 0..50 {
            t.add(Value::Int(i), Value::Int(i)).unwrap();
        }
        for i in 0..20 {
            t.delete(&Value::Int(i)).unwrap();
        }
        for i in 50..80 {
            t.add(Value::Int(i), Value::Int(i)).unwrap();
        }
        let before = t.to_array().unwrap();
        let report = t.compact(&dest).unwrap();
        assert!(report.bytes_saved() <= report.old_size());

        let mut reloaded = BTree::open(&dest, 4).unwrap();
        assert_eq!(reloaded.to_array().unwrap(), before);
    }
}
