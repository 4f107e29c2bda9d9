//! In-memory B+ tree index, persisted through a row sidecar.
//!
//! The tree itself is never serialized. Each wrapper pairs an order-8 tree
//! with its own row store and persists `(slot, row)` entries to a data file
//! of CRC-protected, length-prefixed records:
//!
//! ```text
//! meta:  <column>_btree_meta.json   { order, key_column, entries, clustered }
//! data:  [len: u32][slot: u64][row bytes][crc32]  per entry
//! ```
//!
//! On load the tree is rebuilt from the data file, so the node structure
//! stays an implementation detail.
//!
//! Nodes live in an arena (`Vec<Node>`) and reference each other by id;
//! a split detaches the right sibling into a fresh arena entry and hands
//! its id back for the parent to adopt. Leaves are chained through
//! `next_leaf` for ordered range scans. A node splits when its key count
//! exceeds the order; internal splits promote the mid key and drop it from
//! the right sibling. Duplicate keys are allowed.
//!
//! Two flavors:
//!
//! - [`UnclusteredBPlus`] keeps rows in arrival order.
//! - [`ClusteredBPlus`] keeps its row vector sorted by key and acts as the
//!   ordered data file for its column.
//!
//! Both index the row's **heap slot** as the tree value, so index-manager
//! lookups resolve to heap positions like every other access path.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher as Crc32;
use serde::{Deserialize, Serialize};

use crate::index::{IndexError, Key, KeyCodec};
use crate::schema::{Column, Record, decode_record, encode_record};

/// Default fan-out of a B+ node.
pub const DEFAULT_ORDER: usize = 8;

// ------------------------------------------------------------------------------------------------
// Core tree
// ------------------------------------------------------------------------------------------------

#[derive(Debug)]
struct Node {
    is_leaf: bool,
    keys: Vec<Key>,
    /// Child node ids (internal nodes only).
    children: Vec<usize>,
    /// Heap slots (leaves only), parallel to `keys`.
    slots: Vec<u64>,
    /// Right neighbour in the leaf chain.
    next_leaf: Option<usize>,
}

impl Node {
    fn leaf() -> Self {
        Self {
            is_leaf: true,
            keys: Vec::new(),
            children: Vec::new(),
            slots: Vec::new(),
            next_leaf: None,
        }
    }

    fn internal() -> Self {
        Self {
            is_leaf: false,
            keys: Vec::new(),
            children: Vec::new(),
            slots: Vec::new(),
            next_leaf: None,
        }
    }
}

/// Arena-allocated B+ tree mapping keys to heap slots.
#[derive(Debug)]
pub(crate) struct BPlusTree {
    order: usize,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl BPlusTree {
    pub(crate) fn new(order: usize) -> Self {
        Self {
            order,
            nodes: Vec::new(),
            root: None,
        }
    }

    fn alloc(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub(crate) fn insert(&mut self, key: Key, slot: u64) {
        let Some(root) = self.root else {
            let mut leaf = Node::leaf();
            leaf.keys.push(key);
            leaf.slots.push(slot);
            let id = self.alloc(leaf);
            self.root = Some(id);
            return;
        };

        if let Some((sep, right)) = self.insert_at(root, key, slot) {
            let mut new_root = Node::internal();
            new_root.keys.push(sep);
            new_root.children.push(root);
            new_root.children.push(right);
            let id = self.alloc(new_root);
            self.root = Some(id);
        }
    }

    /// Insert below `id`; a split bubbles `(separator, right sibling id)`
    /// back up for the caller to adopt.
    fn insert_at(&mut self, id: usize, key: Key, slot: u64) -> Option<(Key, usize)> {
        if self.nodes[id].is_leaf {
            // Upper bound: duplicates land after their equals.
            let pos = self.nodes[id]
                .keys
                .iter()
                .position(|k| k.cmp_keys(&key) == Ordering::Greater)
                .unwrap_or(self.nodes[id].keys.len());
            self.nodes[id].keys.insert(pos, key);
            self.nodes[id].slots.insert(pos, slot);

            if self.nodes[id].keys.len() > self.order {
                return Some(self.split_leaf(id));
            }
            return None;
        }

        // Equal keys descend right of their separator.
        let pos = self.nodes[id]
            .keys
            .iter()
            .position(|k| key.cmp_keys(k) == Ordering::Less)
            .unwrap_or(self.nodes[id].keys.len());
        let child = self.nodes[id].children[pos];

        if let Some((sep, right)) = self.insert_at(child, key, slot) {
            self.nodes[id].keys.insert(pos, sep);
            self.nodes[id].children.insert(pos + 1, right);
            if self.nodes[id].keys.len() > self.order {
                return Some(self.split_internal(id));
            }
        }
        None
    }

    fn split_leaf(&mut self, id: usize) -> (Key, usize) {
        let mid = self.nodes[id].keys.len() / 2;
        let mut right = Node::leaf();
        right.keys = self.nodes[id].keys.split_off(mid);
        right.slots = self.nodes[id].slots.split_off(mid);
        right.next_leaf = self.nodes[id].next_leaf;
        let sep = right.keys[0].clone();

        let right_id = self.alloc(right);
        self.nodes[id].next_leaf = Some(right_id);
        (sep, right_id)
    }

    fn split_internal(&mut self, id: usize) -> (Key, usize) {
        let mid = self.nodes[id].keys.len() / 2;
        let sep = self.nodes[id].keys[mid].clone();

        let mut right = Node::internal();
        right.keys = self.nodes[id].keys.split_off(mid + 1);
        right.children = self.nodes[id].children.split_off(mid + 1);
        // The promoted key moves up, it does not stay in the right sibling.
        self.nodes[id].keys.truncate(mid);

        let right_id = self.alloc(right);
        (sep, right_id)
    }

    /// Leftmost leaf that can contain keys `>= key`.
    fn leaf_lower_bound(&self, key: &Key) -> Option<usize> {
        let mut id = self.root?;
        while !self.nodes[id].is_leaf {
            let node = &self.nodes[id];
            let pos = node
                .keys
                .iter()
                .position(|k| k.cmp_keys(key) != Ordering::Less)
                .unwrap_or(node.keys.len());
            id = node.children[pos];
        }
        Some(id)
    }

    /// All slots whose key equals `key` (duplicates allowed).
    pub(crate) fn search(&self, key: &Key) -> Vec<u64> {
        let mut out = Vec::new();
        let Some(mut id) = self.leaf_lower_bound(key) else {
            return out;
        };
        loop {
            let node = &self.nodes[id];
            for (k, slot) in node.keys.iter().zip(&node.slots) {
                match k.cmp_keys(key) {
                    Ordering::Less => {}
                    Ordering::Equal => out.push(*slot),
                    Ordering::Greater => return out,
                }
            }
            match node.next_leaf {
                Some(next) => id = next,
                None => return out,
            }
        }
    }

    /// `(key, slot)` pairs with `lo <= key <= hi`, in key order, via the
    /// leaf chain.
    pub(crate) fn range(&self, lo: &Key, hi: &Key) -> Vec<(Key, u64)> {
        let mut out = Vec::new();
        let Some(mut id) = self.leaf_lower_bound(lo) else {
            return out;
        };
        loop {
            let node = &self.nodes[id];
            for (k, slot) in node.keys.iter().zip(&node.slots) {
                if k.cmp_keys(lo) == Ordering::Less {
                    continue;
                }
                if k.cmp_keys(hi) == Ordering::Greater {
                    return out;
                }
                out.push((k.clone(), *slot));
            }
            match node.next_leaf {
                Some(next) => id = next,
                None => return out,
            }
        }
    }

    /// Every leaf key in chain order (test support).
    pub(crate) fn leaf_keys(&self) -> Vec<Key> {
        let mut out = Vec::new();
        let Some(mut id) = self.root else {
            return out;
        };
        while !self.nodes[id].is_leaf {
            id = self.nodes[id].children[0];
        }
        loop {
            out.extend(self.nodes[id].keys.iter().cloned());
            match self.nodes[id].next_leaf {
                Some(next) => id = next,
                None => return out,
            }
        }
    }

    /// Largest key count over all nodes (test support).
    pub(crate) fn max_node_keys(&self) -> usize {
        self.nodes.iter().map(|n| n.keys.len()).max().unwrap_or(0)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

// ------------------------------------------------------------------------------------------------
// Sidecar persistence
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct BPlusMeta {
    order: usize,
    key_column: String,
    entries: usize,
    clustered: bool,
}

fn write_sidecar(
    data_path: &Path,
    meta_path: &Path,
    meta: &BPlusMeta,
    columns: &[Column],
    entries: impl Iterator<Item = (u64, Record)>,
) -> Result<(), IndexError> {
    let mut data = Vec::new();
    for (slot, row) in entries {
        let mut payload = Vec::new();
        payload.extend_from_slice(&slot.to_le_bytes());
        payload.extend_from_slice(&encode_record(columns, &row)?);

        let mut hasher = Crc32::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&payload);
        data.extend_from_slice(&crc.to_le_bytes());
    }

    let mut f = File::create(data_path)?;
    f.write_all(&data)?;
    f.sync_all()?;

    let json = serde_json::to_vec_pretty(meta)
        .map_err(|e| IndexError::Corrupt(format!("meta serialization failed: {e}")))?;
    let mut f = File::create(meta_path)?;
    f.write_all(&json)?;
    Ok(())
}

fn read_sidecar(data_path: &Path, columns: &[Column]) -> Result<Vec<(u64, Record)>, IndexError> {
    let mut bytes = Vec::new();
    File::open(data_path)?.read_to_end(&mut bytes)?;

    let mut entries = Vec::new();
    let mut off = 0;
    while off + 4 <= bytes.len() {
        let len = u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
            as usize;
        off += 4;
        if off + len + 4 > bytes.len() {
            return Err(IndexError::Corrupt("truncated sidecar record".into()));
        }
        let payload = &bytes[off..off + len];
        off += len;
        let stored_crc =
            u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]]);
        off += 4;

        let mut hasher = Crc32::new();
        hasher.update(payload);
        if hasher.finalize() != stored_crc {
            return Err(IndexError::Corrupt("sidecar record checksum mismatch".into()));
        }

        if len < 8 {
            return Err(IndexError::Corrupt("sidecar record too short".into()));
        }
        let slot = u64::from_le_bytes(payload[..8].try_into().unwrap_or([0; 8]));
        let row = decode_record(columns, &payload[8..])?;
        entries.push((slot, row));
    }
    Ok(entries)
}

// ------------------------------------------------------------------------------------------------
// Unclustered flavor
// ------------------------------------------------------------------------------------------------

/// B+ index whose row store keeps arrival order; the tree maps keys to the
/// heap slots it was fed.
pub struct UnclusteredBPlus {
    tree: BPlusTree,
    rows: BTreeMap<u64, Record>,
    codec: KeyCodec,
    columns: Vec<Column>,
    key_column: String,
    data_path: PathBuf,
    meta_path: PathBuf,
}

impl UnclusteredBPlus {
    /// Open the index, loading the sidecar if one exists.
    pub fn open(
        data_path: impl AsRef<Path>,
        meta_path: impl AsRef<Path>,
        columns: Vec<Column>,
        key_column: impl Into<String>,
        codec: KeyCodec,
    ) -> Result<Self, IndexError> {
        let mut index = Self {
            tree: BPlusTree::new(DEFAULT_ORDER),
            rows: BTreeMap::new(),
            codec,
            columns,
            key_column: key_column.into(),
            data_path: data_path.as_ref().to_path_buf(),
            meta_path: meta_path.as_ref().to_path_buf(),
        };
        if index.data_path.exists() {
            for (slot, row) in read_sidecar(&index.data_path, &index.columns)? {
                index.add_loaded(slot, row)?;
            }
        }
        Ok(index)
    }

    fn add_loaded(&mut self, slot: u64, row: Record) -> Result<(), IndexError> {
        let value = row
            .get(&self.key_column)
            .ok_or_else(|| IndexError::Corrupt(format!("row missing key column '{}'", self.key_column)))?;
        let key = self.codec.key_from_value(value)?;
        self.tree.insert(key, slot);
        self.rows.insert(slot, row);
        Ok(())
    }

    /// Index a row under `key` at its heap slot.
    pub fn add(&mut self, key: Key, row: Record, slot: u64) {
        self.tree.insert(key, slot);
        self.rows.insert(slot, row);
    }

    /// Heap slots for `key` (duplicates allowed).
    pub fn search(&self, key: &Key) -> Vec<u64> {
        self.tree.search(key)
    }

    /// Rows for `key`, dereferenced from the row store.
    pub fn search_rows(&self, key: &Key) -> Vec<&Record> {
        self.tree
            .search(key)
            .into_iter()
            .filter_map(|slot| self.rows.get(&slot))
            .collect()
    }

    /// Heap slots with `lo <= key <= hi`, in key order.
    pub fn range(&self, lo: &Key, hi: &Key) -> Vec<u64> {
        self.tree.range(lo, hi).into_iter().map(|(_, s)| s).collect()
    }

    /// Rows with `lo <= key <= hi`, in key order.
    pub fn range_rows(&self, lo: &Key, hi: &Key) -> Vec<&Record> {
        self.tree
            .range(lo, hi)
            .into_iter()
            .filter_map(|(_, slot)| self.rows.get(&slot))
            .collect()
    }

    /// Number of indexed rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the index holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Persist the sidecar (meta document + row data file).
    pub fn save(&self) -> Result<(), IndexError> {
        let meta = BPlusMeta {
            order: DEFAULT_ORDER,
            key_column: self.key_column.clone(),
            entries: self.rows.len(),
            clustered: false,
        };
        write_sidecar(
            &self.data_path,
            &self.meta_path,
            &meta,
            &self.columns,
            self.rows.iter().map(|(s, r)| (*s, r.clone())),
        )
    }

    pub(crate) fn tree(&self) -> &BPlusTree {
        &self.tree
    }
}

// ------------------------------------------------------------------------------------------------
// Clustered flavor
// ------------------------------------------------------------------------------------------------

/// B+ index whose row vector is kept sorted by key — the ordered data file
/// for its (primary key) column. The tree still maps keys to heap slots.
pub struct ClusteredBPlus {
    tree: BPlusTree,
    /// `(key, slot, row)` sorted by key; equal keys in insertion order.
    rows: Vec<(Key, u64, Record)>,
    codec: KeyCodec,
    columns: Vec<Column>,
    key_column: String,
    data_path: PathBuf,
    meta_path: PathBuf,
}

impl ClusteredBPlus {
    /// Open the index, loading the sidecar if one exists. The sidecar was
    /// written in key order, so the rebuild re-sorts trivially.
    pub fn open(
        data_path: impl AsRef<Path>,
        meta_path: impl AsRef<Path>,
        columns: Vec<Column>,
        key_column: impl Into<String>,
        codec: KeyCodec,
    ) -> Result<Self, IndexError> {
        let mut index = Self {
            tree: BPlusTree::new(DEFAULT_ORDER),
            rows: Vec::new(),
            codec,
            columns,
            key_column: key_column.into(),
            data_path: data_path.as_ref().to_path_buf(),
            meta_path: meta_path.as_ref().to_path_buf(),
        };
        if index.data_path.exists() {
            for (slot, row) in read_sidecar(&index.data_path, &index.columns)? {
                let value = row.get(&index.key_column).ok_or_else(|| {
                    IndexError::Corrupt(format!("row missing key column '{}'", index.key_column))
                })?;
                let key = index.codec.key_from_value(value)?;
                index.add(key, row, slot);
            }
        }
        Ok(index)
    }

    /// Insert the row at its key-sorted position and index its heap slot.
    pub fn add(&mut self, key: Key, row: Record, slot: u64) {
        let pos = self
            .rows
            .partition_point(|(k, _, _)| k.cmp_keys(&key) != Ordering::Greater);
        self.rows.insert(pos, (key.clone(), slot, row));
        self.tree.insert(key, slot);
    }

    /// Heap slots for `key`.
    pub fn search(&self, key: &Key) -> Vec<u64> {
        self.tree.search(key)
    }

    /// Rows for `key`, straight from the sorted vector.
    pub fn search_rows(&self, key: &Key) -> Vec<&Record> {
        let start = self
            .rows
            .partition_point(|(k, _, _)| k.cmp_keys(key) == Ordering::Less);
        self.rows[start..]
            .iter()
            .take_while(|(k, _, _)| k.cmp_keys(key) == Ordering::Equal)
            .map(|(_, _, r)| r)
            .collect()
    }

    /// Heap slots with `lo <= key <= hi`.
    pub fn range(&self, lo: &Key, hi: &Key) -> Vec<u64> {
        self.tree.range(lo, hi).into_iter().map(|(_, s)| s).collect()
    }

    /// Rows with `lo <= key <= hi`, yielded directly from the sorted
    /// vector without a heap lookup.
    pub fn range_rows(&self, lo: &Key, hi: &Key) -> Vec<&Record> {
        let start = self
            .rows
            .partition_point(|(k, _, _)| k.cmp_keys(lo) == Ordering::Less);
        self.rows[start..]
            .iter()
            .take_while(|(k, _, _)| k.cmp_keys(hi) != Ordering::Greater)
            .map(|(_, _, r)| r)
            .collect()
    }

    /// Number of indexed rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the index holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Persist the sidecar in key order.
    pub fn save(&self) -> Result<(), IndexError> {
        let meta = BPlusMeta {
            order: DEFAULT_ORDER,
            key_column: self.key_column.clone(),
            entries: self.rows.len(),
            clustered: true,
        };
        write_sidecar(
            &self.data_path,
            &self.meta_path,
            &meta,
            &self.columns,
            self.rows.iter().map(|(_, s, r)| (*s, r.clone())),
        )
    }

    pub(crate) fn tree(&self) -> &BPlusTree {
        &self.tree
    }
}
