use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;

use super::geo::{BBox, haversine_km, radius_bbox};
use super::meta::{META_SIZE, RTreeMeta};
use super::node::{LeafEntry, RNode};
use crate::blockfile::{BlockFile, Mode};
use crate::compaction::CompactionReport;
use crate::config::StoreConfig;
use crate::errors::{Result, StoreError};
use crate::value::{ObjectId, decode_at, encode, size_at};

/// A point returned by a spatial query.
#[derive(Debug, Clone, PartialEq)]
pub struct PointHit {
    pub object_id: ObjectId,
    pub lat: f64,
    pub lng: f64,
}

/// A point returned by [`RTree::search_radius`], with its distance from
/// the query center in kilometers.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusHit {
    pub object_id: ObjectId,
    pub lat: f64,
    pub lng: f64,
    pub distance_km: f64,
}

enum InsertOutcome {
    Placed { ptr: u64, bbox: BBox },
    Split { left: u64, left_bbox: BBox, right: u64, right_bbox: BBox },
}

struct RemovedNode {
    ptr: u64,
    count: usize,
}

/// Copy-on-write 2-D R-Tree over `(lat, lng)` points (component C4).
pub struct RTree {
    file: BlockFile,
    meta: RTreeMeta,
    cache: LruCache<u64, RNode>,
    path: PathBuf,
}

impl RTree {
    /// Opens or creates the tree at `path` with the given branching
    /// factor (default 9 per spec §4.4.1), using
    /// [`StoreConfig::default`]'s node-cache capacity.
    ///
    /// # Errors
    /// Returns I/O or `CorruptMetadata` errors surfaced while opening.
    pub fn open(path: impl AsRef<Path>, max_entries: u64) -> Result<Self> {
        Self::open_with_cache_capacity(path, max_entries, StoreConfig::default().node_cache_capacity)
    }

    /// Opens or creates the tree at `path`, sizing the in-memory decoded-
    /// node cache to `cache_capacity` entries.
    ///
    /// # Errors
    /// Returns I/O or `CorruptMetadata` errors surfaced while opening.
    pub fn open_with_cache_capacity(
        path: impl AsRef<Path>,
        max_entries: u64,
        cache_capacity: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        log::info!("opening r-tree {}", path.display());
        let mut file = BlockFile::open(&path, Mode::ReadWrite)?;
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::new(1).expect("nonzero"));
        let cache = LruCache::new(capacity);
        let size = file.size()?;
        let meta = if size == 0 {
            let leaf = RNode::Leaf { id: 0, bbox: None, entries: vec![] };
            let leaf_ptr = file.append(&encode(&leaf.to_value()))?;
            let mut meta = RTreeMeta::new(max_entries);
            meta.root_pointer = Some(leaf_ptr);
            meta.next_id = 1;
            file.append(&meta.to_bytes())?;
            file.flush()?;
            meta
        } else {
            let meta_size = *META_SIZE;
            if size < meta_size {
                return Err(StoreError::CorruptMetadata);
            }
            let bytes = file.read_range(size - meta_size, meta_size as usize)?;
            RTreeMeta::from_bytes(&bytes)?
        };
        Ok(Self { file, meta, cache, path })
    }

    /// # Errors
    /// Returns an error if the final flush fails.
    pub fn close(mut self) -> Result<()> {
        log::info!("closing r-tree {}", self.path.display());
        self.file.append(&self.meta.to_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.meta.size
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_node(&mut self, ptr: u64) -> Result<RNode> {
        if let Some(node) = self.cache.get(&ptr) {
            return Ok(node.clone());
        }
        let len = size_at(&self.file, ptr)? as usize;
        let bytes = self.file.read_range(ptr, len)?;
        let (value, _) = decode_at(&bytes, 0)?;
        let node = RNode::from_value(&value)?;
        self.cache.put(ptr, node.clone());
        Ok(node)
    }

    fn write_node(&mut self, node: RNode) -> Result<u64> {
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

    /// Inserts a point under `object_id`.
    ///
    /// # Errors
    /// Returns an I/O or data error from the backing file.
    pub fn insert(&mut self, lat: f64, lng: f64, object_id: ObjectId) -> Result<()> {
        let root_ptr = self.meta.root_pointer.expect("root always present after open");
        let outcome = self.insert_rec(root_ptr, lat, lng, object_id)?;
        let new_root = match outcome {
            InsertOutcome::Placed { ptr, .. } => ptr,
            InsertOutcome::Split { left, left_bbox, right, right_bbox } => {
                let id = self.alloc_id();
                self.write_node(RNode::Internal {
                    id,
                    bbox: Some(left_bbox.union(&right_bbox)),
                    children: vec![left, right],
                })?
            }
        };
        self.meta.root_pointer = Some(new_root);
        self.meta.size += 1;
        self.meta.version += 1;
        self.file.append(&self.meta.to_bytes())?;
        Ok(())
    }

    fn insert_rec(&mut self, ptr: u64, lat: f64, lng: f64, object_id: ObjectId) -> Result<InsertOutcome> {
        let node = self.read_node(ptr)?;
        let n = self.meta.max_entries as usize;
        match node {
            RNode::Leaf { mut entries, .. } => {
                entries.push(LeafEntry { lat, lng, object_id });
                if entries.len() > n {
                    let items: Vec<(BBox, LeafEntry)> = entries.into_iter().map(|e| (e.bbox(), e)).collect();
                    let (a, b) = quadratic_split(items);
                    let (left_bbox, left_entries) = unzip_group(a);
                    let (right_bbox, right_entries) = unzip_group(b);
                    let left_id = self.alloc_id();
                    let left = self.write_node(RNode::Leaf { id: left_id, bbox: Some(left_bbox), entries: left_entries })?;
                    let right_id = self.alloc_id();
                    let right =
                        self.write_node(RNode::Leaf { id: right_id, bbox: Some(right_bbox), entries: right_entries })?;
                    Ok(InsertOutcome::Split { left, left_bbox, right, right_bbox })
                } else {
                    let bbox = entries.iter().map(LeafEntry::bbox).reduce(|a, b| a.union(&b)).unwrap_or(BBox::point(lat, lng));
                    let id = self.alloc_id();
                    let ptr = self.write_node(RNode::Leaf { id, bbox: Some(bbox), entries })?;
                    Ok(InsertOutcome::Placed { ptr, bbox })
                }
            }
            RNode::Internal { mut children, .. } => {
                let mut child_bboxes = Vec::with_capacity(children.len());
                for &c in &children {
                    let cb = self.read_node(c)?.bbox().expect("non-empty child has a bbox");
                    child_bboxes.push(cb);
                }
                let point = BBox::point(lat, lng);
                let mut best = 0usize;
                let mut best_enlargement = child_bboxes[0].enlargement(&point);
                let mut best_area = child_bboxes[0].area();
                for (i, cb) in child_bboxes.iter().enumerate().skip(1) {
                    let enlargement = cb.enlargement(&point);
                    let area = cb.area();
                    if enlargement < best_enlargement || (enlargement == best_enlargement && area < best_area) {
                        best = i;
                        best_enlargement = enlargement;
                        best_area = area;
                    }
                }
                let child_outcome = self.insert_rec(children[best], lat, lng, object_id)?;
                match child_outcome {
                    InsertOutcome::Placed { ptr, bbox } => {
                        children[best] = ptr;
                        child_bboxes[best] = bbox;
                        let overall = child_bboxes.into_iter().reduce(|a, b| a.union(&b)).expect("non-empty");
                        let id = self.alloc_id();
                        let ptr = self.write_node(RNode::Internal { id, bbox: Some(overall), children })?;
                        Ok(InsertOutcome::Placed { ptr, bbox: overall })
                    }
                    InsertOutcome::Split { left, left_bbox, right, right_bbox } => {
                        children[best] = left;
                        child_bboxes[best] = left_bbox;
                        children.insert(best + 1, right);
                        child_bboxes.insert(best + 1, right_bbox);
                        if children.len() > n {
                            let items: Vec<(BBox, u64)> =
                                child_bboxes.into_iter().zip(children).collect();
                            let (a, b) = quadratic_split(items);
                            let (left_bbox, left_children) = unzip_group(a);
                            let (right_bbox, right_children) = unzip_group(b);
                            let left_id = self.alloc_id();
                            let left =
                                self.write_node(RNode::Internal { id: left_id, bbox: Some(left_bbox), children: left_children })?;
                            let right_id = self.alloc_id();
                            let right = self
                                .write_node(RNode::Internal { id: right_id, bbox: Some(right_bbox), children: right_children })?;
                            Ok(InsertOutcome::Split { left, left_bbox, right, right_bbox })
                        } else {
                            let overall = child_bboxes.into_iter().reduce(|a, b| a.union(&b)).expect("non-empty");
                            let id = self.alloc_id();
                            let ptr = self.write_node(RNode::Internal { id, bbox: Some(overall), children })?;
                            Ok(InsertOutcome::Placed { ptr, bbox: overall })
                        }
                    }
                }
            }
        }
    }

    /// Removes the entry tagged `object_id`, if present.
    ///
    /// # Errors
    /// Returns an I/O or data error from the backing file.
    pub fn remove(&mut self, object_id: &ObjectId) -> Result<bool> {
        let root = self.meta.root_pointer.expect("root always present after open");
        match self.remove_rec(root, object_id)? {
            None => Ok(false),
            Some(removed) => {
                let mut new_root = removed.ptr;
                if let RNode::Internal { children, .. } = self.read_node(new_root)? {
                    if children.len() == 1 {
                        new_root = children[0];
                    } else if children.is_empty() {
                        let id = self.alloc_id();
                        new_root = self.write_node(RNode::Leaf { id, bbox: None, entries: vec![] })?;
                    }
                }
                self.meta.root_pointer = Some(new_root);
                self.meta.size = self.meta.size.saturating_sub(1);
                self.meta.version += 1;
                self.file.append(&self.meta.to_bytes())?;
                Ok(true)
            }
        }
    }

    fn remove_rec(&mut self, ptr: u64, object_id: &ObjectId) -> Result<Option<RemovedNode>> {
        match self.read_node(ptr)? {
            RNode::Leaf { id: _, mut entries, .. } => {
                let Some(i) = entries.iter().position(|e| &e.object_id == object_id) else {
                    return Ok(None);
                };
                entries.remove(i);
                let bbox = entries.iter().map(LeafEntry::bbox).reduce(|a, b| a.union(&b));
                let id = self.alloc_id();
                let new_ptr = self.write_node(RNode::Leaf { id, bbox, entries: entries.clone() })?;
                Ok(Some(RemovedNode { ptr: new_ptr, count: entries.len() }))
            }
            RNode::Internal { id: _, mut children, .. } => {
                let mut found_idx = None;
                let mut removed_child: Option<RemovedNode> = None;
                for (i, &c) in children.iter().enumerate() {
                    if let Some(r) = self.remove_rec(c, object_id)? {
                        found_idx = Some(i);
                        removed_child = Some(r);
                        break;
                    }
                }
                let Some(idx) = found_idx else { return Ok(None) };
                let removed_child = removed_child.expect("found_idx implies removed_child");
                children[idx] = removed_child.ptr;

                if removed_child.count < self.meta.min_entries as usize && children.len() > 1 {
                    let sibling_idx = if idx + 1 < children.len() { idx + 1 } else { idx - 1 };
                    let sibling = self.read_node(children[sibling_idx])?;
                    let sibling_count = sibling.len();
                    if sibling_count > self.meta.min_entries as usize {
                        self.redistribute(&mut children, idx, sibling_idx)?;
                    } else {
                        self.merge(&mut children, idx, sibling_idx)?;
                    }
                }

                let mut bboxes = Vec::with_capacity(children.len());
                for &c in &children {
                    if let Some(b) = self.read_node(c)?.bbox() {
                        bboxes.push(b);
                    }
                }
                let overall = bboxes.into_iter().reduce(|a, b| a.union(&b));
                let new_id = self.alloc_id();
                let new_ptr = self.write_node(RNode::Internal { id: new_id, bbox: overall, children: children.clone() })?;
                Ok(Some(RemovedNode { ptr: new_ptr, count: children.len() }))
            }
        }
    }

    /// Moves one item from the sibling at `children[sibling_idx]` into
    /// the underflowed node at `children[idx]`, rewriting both.
    fn redistribute(&mut self, children: &mut [u64], idx: usize, sibling_idx: usize) -> Result<()> {
        let target = self.read_node(children[idx])?;
        let donor = self.read_node(children[sibling_idx])?;
        match (target, donor) {
            (RNode::Leaf { mut entries, .. }, RNode::Leaf { entries: mut donor_entries, .. }) => {
                let moved = donor_entries.pop().expect("donor has surplus entries");
                entries.push(moved);
                let new_target_bbox = entries.iter().map(LeafEntry::bbox).reduce(|a, b| a.union(&b));
                let new_donor_bbox = donor_entries.iter().map(LeafEntry::bbox).reduce(|a, b| a.union(&b));
                let tid = self.alloc_id();
                children[idx] = self.write_node(RNode::Leaf { id: tid, bbox: new_target_bbox, entries })?;
                let did = self.alloc_id();
                children[sibling_idx] =
                    self.write_node(RNode::Leaf { id: did, bbox: new_donor_bbox, entries: donor_entries })?;
            }
            (RNode::Internal { children: mut tc, .. }, RNode::Internal { children: mut dc, .. }) => {
                let moved = dc.pop().expect("donor has surplus children");
                tc.push(moved);
                let new_target_bbox = self.union_bboxes(&tc)?;
                let new_donor_bbox = self.union_bboxes(&dc)?;
                let tid = self.alloc_id();
                children[idx] = self.write_node(RNode::Internal { id: tid, bbox: new_target_bbox, children: tc })?;
                let did = self.alloc_id();
                children[sibling_idx] =
                    self.write_node(RNode::Internal { id: did, bbox: new_donor_bbox, children: dc })?;
            }
            _ => return Err(StoreError::Malformed(0, "r-tree sibling level mismatch".into())),
        }
        Ok(())
    }

    /// Merges the node at `children[idx]` into the sibling at
    /// `children[sibling_idx]`, dropping one slot from `children`.
    fn merge(&mut self, children: &mut Vec<u64>, idx: usize, sibling_idx: usize) -> Result<()> {
        let target = self.read_node(children[idx])?;
        let donor = self.read_node(children[sibling_idx])?;
        let merged_ptr = match (target, donor) {
            (RNode::Leaf { mut entries, .. }, RNode::Leaf { entries: donor_entries, .. }) => {
                entries.extend(donor_entries);
                let bbox = entries.iter().map(LeafEntry::bbox).reduce(|a, b| a.union(&b));
                let id = self.alloc_id();
                self.write_node(RNode::Leaf { id, bbox, entries })?
            }
            (RNode::Internal { children: mut tc, .. }, RNode::Internal { children: dc, .. }) => {
                tc.extend(dc);
                let bbox = self.union_bboxes(&tc)?;
                let id = self.alloc_id();
                self.write_node(RNode::Internal { id, bbox, children: tc })?
            }
            _ => return Err(StoreError::Malformed(0, "r-tree sibling level mismatch".into())),
        };
        let (keep, drop_idx) = if idx < sibling_idx { (idx, sibling_idx) } else { (sibling_idx, idx) };
        children.remove(drop_idx);
        children[keep] = merged_ptr;
        Ok(())
    }

    fn union_bboxes(&mut self, ptrs: &[u64]) -> Result<Option<BBox>> {
        let mut acc = None;
        for &p in ptrs {
            if let Some(b) = self.read_node(p)?.bbox() {
                acc = Some(match acc {
                    Some(a) => BBox::union(&a, &b),
                    None => b,
                });
            }
        }
        Ok(acc)
    }

    /// Every entry whose point falls inside `query` (inclusive).
    ///
    /// # Errors
    /// Returns an I/O or data error from the backing file.
    pub fn search_bbox(&mut self, query: &BBox) -> Result<Vec<PointHit>> {
        let mut out = Vec::new();
        let root = self.meta.root_pointer.expect("root always present after open");
        self.search_bbox_rec(root, query, &mut out)?;
        Ok(out)
    }

    fn search_bbox_rec(&mut self, ptr: u64, query: &BBox, out: &mut Vec<PointHit>) -> Result<()> {
        let node = self.read_node(ptr)?;
        let Some(bbox) = node.bbox() else { return Ok(()) };
        if !bbox.intersects(query) {
            return Ok(());
        }
        match node {
            RNode::Leaf { entries, .. } => {
                for e in entries {
                    if query.contains_point(e.lat, e.lng) {
                        out.push(PointHit { object_id: e.object_id, lat: e.lat, lng: e.lng });
                    }
                }
            }
            RNode::Internal { children, .. } => {
                for c in children {
                    self.search_bbox_rec(c, query, out)?;
                }
            }
        }
        Ok(())
    }

    /// Every entry within `radius_km` of `(lat, lng)`, with distance.
    ///
    /// # Errors
    /// Returns an I/O or data error from the backing file.
    pub fn search_radius(&mut self, lat: f64, lng: f64, radius_km: f64) -> Result<Vec<RadiusHit>> {
        let lat = lat.clamp(-90.0, 90.0);
        let lng = lng.clamp(-180.0, 180.0);
        let box_ = radius_bbox(lat, lng, radius_km);
        let candidates = self.search_bbox(&box_)?;
        Ok(candidates
            .into_iter()
            .filter_map(|p| {
                let d = haversine_km(lat, lng, p.lat, p.lng);
                (d <= radius_km).then_some(RadiusHit { object_id: p.object_id, lat: p.lat, lng: p.lng, distance_km: d })
            })
            .collect())
    }

    /// Destroys the backing file and reinitializes an empty tree.
    ///
    /// # Errors
    /// Returns an error if the file cannot be removed or recreated.
    pub fn clear(&mut self) -> Result<()> {
        let order = self.meta.max_entries;
        let path = self.path.clone();
        drop(std::mem::replace(&mut self.file, BlockFile::open(&path, Mode::ReadWrite)?));
        BlockFile::delete(&path)?;
        *self = RTree::open(&path, order)?;
        Ok(())
    }

    /// Rewrites this tree densely into a fresh file at `dest_path` via a
    /// post-order clone of the reachable node graph (component C6).
    ///
    /// # Errors
    /// Returns an I/O or data error from either file.
    pub fn compact(&mut self, dest_path: impl AsRef<Path>) -> Result<CompactionReport> {
        self.file.flush()?;
        let old_size = self.file.size()?;
        let dest_path = dest_path.as_ref().to_path_buf();
        let mut dest_file = BlockFile::open(&dest_path, Mode::ReadWrite)?;
        let mut memo: HashMap<u64, u64> = HashMap::new();
        let root = self.meta.root_pointer.expect("root always present after open");
        let new_root = self.clone_node(root, &mut memo, &mut dest_file)?;
        let mut dest_meta = RTreeMeta::new(self.meta.max_entries);
        dest_meta.root_pointer = Some(new_root);
        dest_meta.size = self.meta.size;
        dest_meta.next_id = self.meta.next_id;
        dest_file.append(&dest_meta.to_bytes())?;
        dest_file.flush()?;
        drop(dest_file);
        let new_size = {
            let f = BlockFile::open(&dest_path, Mode::Read)?;
            f.size()?
        };
        log::info!("compacted r-tree {} -> {}", self.path.display(), dest_path.display());
        Ok(CompactionReport::new(old_size, new_size, dest_path))
    }

    fn clone_node(&mut self, ptr: u64, memo: &mut HashMap<u64, u64>, dest: &mut BlockFile) -> Result<u64> {
        if let Some(&new_ptr) = memo.get(&ptr) {
            return Ok(new_ptr);
        }
        let node = self.read_node(ptr)?;
        let new_node = match node {
            RNode::Leaf { id, bbox, entries } => RNode::Leaf { id, bbox, entries },
            RNode::Internal { id, bbox, children } => {
                let mut new_children = Vec::with_capacity(children.len());
                for c in children {
                    new_children.push(self.clone_node(c, memo, dest)?);
                }
                RNode::Internal { id, bbox, children: new_children }
            }
        };
        let bytes = encode(&new_node.to_value());
        let new_ptr = dest.append(&bytes)?;
        memo.insert(ptr, new_ptr);
        Ok(new_ptr)
    }
}

type BBoxGroup<T> = Vec<(BBox, T)>;

fn quadratic_split<T: Clone>(items: BBoxGroup<T>) -> (BBoxGroup<T>, BBoxGroup<T>) {
    let mut pool = items;
    let mut best_pair = (0usize, 1usize);
    let mut best_area = f64::MIN;
    for i in 0..pool.len() {
        for j in (i + 1)..pool.len() {
            let area = pool[i].0.union(&pool[j].0).area();
            if area > best_area {
                best_area = area;
                best_pair = (i, j);
            }
        }
    }
    let (i, j) = best_pair;
    let (hi, lo) = if i > j { (i, j) } else { (j, i) };
    let seed_hi = pool.remove(hi);
    let seed_lo = pool.remove(lo);

    let mut bbox_a = seed_lo.0;
    let mut group_a = vec![seed_lo];
    let mut bbox_b = seed_hi.0;
    let mut group_b = vec![seed_hi];

    for item in pool {
        let enlargement_a = bbox_a.enlargement(&item.0);
        let enlargement_b = bbox_b.enlargement(&item.0);
        let put_in_a = enlargement_a < enlargement_b
            || (enlargement_a == enlargement_b && group_a.len() <= group_b.len());
        if put_in_a {
            bbox_a = bbox_a.union(&item.0);
            group_a.push(item);
        } else {
            bbox_b = bbox_b.union(&item.0);
            group_b.push(item);
        }
    }
    (group_a, group_b)
}

fn unzip_group<T>(group: BBoxGroup<T>) -> (BBox, Vec<T>) {
    let bbox = group.iter().map(|(b, _)| *b).reduce(|a, b| a.union(&b)).expect("non-empty group");
    let items = group.into_iter().map(|(_, t)| t).collect();
    (bbox, items)
}
