//! Spatial index over 2-D points, backed by an R* tree.
//!
//! Each entry is `(id, (x, y), slot)` — the id keeps entries distinct when
//! several rows share a coordinate. Radius search intersects the bounding
//! box `[x − r, y − r, x + r, y + r]` and then filters by Euclidean
//! distance; kNN walks the library's nearest-neighbour iterator.
//!
//! Persistence is a flat entry file plus a small metadata document:
//!
//! ```text
//! meta:  <column>_rtree_meta.json   { "num_entries": N }
//! data:  [count: u32][id: u64][x: f32][y: f32][slot: u64] ...
//! ```
//!
//! The tree is rebuilt from the entry file on open.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};

use crate::index::IndexError;

type Entry = GeomWithData<[f32; 2], (u64, u64)>;

#[derive(Serialize, Deserialize)]
struct RTreeMeta {
    num_entries: usize,
}

/// Point-indexed spatial access path with payload = heap slot.
pub struct RTreeIndex {
    tree: RTree<Entry>,
    data_path: PathBuf,
    meta_path: PathBuf,
}

impl RTreeIndex {
    /// Open the index, rebuilding the tree from the entry file if one
    /// exists.
    pub fn open(
        data_path: impl AsRef<Path>,
        meta_path: impl AsRef<Path>,
    ) -> Result<Self, IndexError> {
        let mut index = Self {
            tree: RTree::new(),
            data_path: data_path.as_ref().to_path_buf(),
            meta_path: meta_path.as_ref().to_path_buf(),
        };
        if index.data_path.exists() {
            index.load()?;
        }
        Ok(index)
    }

    /// Index a point under `id`, carrying the record's heap slot.
    pub fn add(&mut self, id: u64, point: (f32, f32), slot: u64) {
        self.tree
            .insert(Entry::new([point.0, point.1], (id, slot)));
    }

    /// Slots of all points within Euclidean distance `radius` of `point`.
    pub fn range(&self, point: (f32, f32), radius: f32) -> Vec<u64> {
        let (x, y) = point;
        let envelope = AABB::from_corners([x - radius, y - radius], [x + radius, y + radius]);
        let r2 = radius * radius;
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| {
                let [px, py] = *entry.geom();
                let (dx, dy) = (px - x, py - y);
                dx * dx + dy * dy <= r2
            })
            .map(|entry| entry.data.1)
            .collect()
    }

    /// Slots of the `k` points nearest to `point`, closest first.
    pub fn knn(&self, point: (f32, f32), k: usize) -> Vec<u64> {
        self.tree
            .nearest_neighbor_iter(&[point.0, point.1])
            .take(k)
            .map(|entry| entry.data.1)
            .collect()
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Persist the entry file and metadata document.
    pub fn save(&self) -> Result<(), IndexError> {
        let mut bytes = Vec::with_capacity(4 + self.tree.size() * 24);
        bytes.extend_from_slice(&(self.tree.size() as u32).to_le_bytes());
        for entry in self.tree.iter() {
            let [x, y] = *entry.geom();
            let (id, slot) = entry.data;
            bytes.extend_from_slice(&id.to_le_bytes());
            bytes.extend_from_slice(&x.to_le_bytes());
            bytes.extend_from_slice(&y.to_le_bytes());
            bytes.extend_from_slice(&slot.to_le_bytes());
        }
        let mut f = File::create(&self.data_path)?;
        f.write_all(&bytes)?;

        let meta = RTreeMeta {
            num_entries: self.tree.size(),
        };
        let json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| IndexError::Corrupt(format!("meta serialization failed: {e}")))?;
        let mut f = File::create(&self.meta_path)?;
        f.write_all(&json)?;
        Ok(())
    }

    fn load(&mut self) -> Result<(), IndexError> {
        let mut bytes = Vec::new();
        File::open(&self.data_path)?.read_to_end(&mut bytes)?;
        if bytes.len() < 4 {
            return Ok(());
        }
        let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let mut off = 4;
        for _ in 0..count {
            if off + 24 > bytes.len() {
                return Err(IndexError::Corrupt("truncated R-tree entry file".into()));
            }
            let id = u64::from_le_bytes(bytes[off..off + 8].try_into().unwrap_or([0; 8]));
            off += 8;
            let x = f32::from_le_bytes(bytes[off..off + 4].try_into().unwrap_or([0; 4]));
            off += 4;
            let y = f32::from_le_bytes(bytes[off..off + 4].try_into().unwrap_or([0; 4]));
            off += 4;
            let slot = u64::from_le_bytes(bytes[off..off + 8].try_into().unwrap_or([0; 8]));
            off += 8;
            self.add(id, (x, y), slot);
        }
        Ok(())
    }
}
