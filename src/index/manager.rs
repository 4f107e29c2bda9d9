//! Per-table index manager.
//!
//! One instance per table. Instantiates one index object per column with
//! `has_index`, names its files
//! `<table_dir>/indices/<column>_<type><suffix>`, and multiplexes
//! insert / search / range / spatial / delete across them.
//!
//! Fan-out failures on insert and delete are logged and skipped rather
//! than aborting the statement — one broken index must not block the
//! heap write that already happened.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::index::avl::AvlFile;
use crate::index::btree::{ClusteredBPlus, UnclusteredBPlus};
use crate::index::hash::{ExtendibleHash, HashConfig};
use crate::index::isam::IsamFile;
use crate::index::rtree::RTreeIndex;
use crate::index::{Index, IndexError, KeyCodec, KeyType};
use crate::schema::{Column, Record, Value};
use crate::sql::IndexKind;

/// One column's index, dispatched by kind.
pub enum ColumnIndex {
    /// Disk-resident AVL file.
    Avl(AvlFile),
    /// Clustered B+ tree (primary key columns).
    Clustered(ClusteredBPlus),
    /// Unclustered B+ tree.
    Unclustered(UnclusteredBPlus),
    /// Extendible hash.
    Hash(ExtendibleHash),
    /// Two-level ISAM.
    Isam(IsamFile),
    /// Spatial R-tree.
    RTree(RTreeIndex),
}

/// The per-table set of named secondary indices.
pub struct IndexManager {
    table_name: String,
    columns: Vec<Column>,
    indices_dir: PathBuf,
    indices: BTreeMap<String, ColumnIndex>,
}

impl IndexManager {
    /// Open the manager for a table, instantiating an index object for
    /// every indexed column. A column whose index fails to open is logged
    /// and left unindexed for this session.
    pub fn open(
        table_name: impl Into<String>,
        columns: Vec<Column>,
        table_dir: impl AsRef<Path>,
    ) -> Result<Self, IndexError> {
        let indices_dir = table_dir.as_ref().join("indices");
        fs::create_dir_all(&indices_dir)?;

        let mut manager = Self {
            table_name: table_name.into(),
            columns,
            indices_dir,
            indices: BTreeMap::new(),
        };

        let indexed: Vec<Column> = manager
            .columns
            .iter()
            .filter(|c| c.has_index && c.index_type.is_some())
            .cloned()
            .collect();
        for column in indexed {
            if let Err(e) = manager.load_index(&column) {
                warn!(
                    table = %manager.table_name,
                    column = %column.name,
                    error = %e,
                    "failed to open index, column left unindexed"
                );
            }
        }
        Ok(manager)
    }

    fn file_base(&self, column: &str, kind: &str) -> PathBuf {
        self.indices_dir.join(format!("{column}_{kind}"))
    }

    fn codec_for(&self, column: &Column) -> Result<KeyCodec, IndexError> {
        Ok(KeyCodec::new(KeyType::for_column(column)?))
    }

    fn load_index(&mut self, column: &Column) -> Result<(), IndexError> {
        let Some(kind) = column.index_type else {
            return Ok(());
        };
        let index = match kind {
            IndexKind::Avl => {
                let path = self.file_base(&column.name, "avl").with_extension("dat");
                ColumnIndex::Avl(AvlFile::open(path, self.codec_for(column)?)?)
            }
            IndexKind::BTree => {
                let base = self.file_base(&column.name, "btree");
                let data_path = base.with_extension("dat");
                let meta_path = self.indices_dir.join(format!("{}_btree_meta.json", column.name));
                let codec = self.codec_for(column)?;
                if column.is_primary_key {
                    ColumnIndex::Clustered(ClusteredBPlus::open(
                        data_path,
                        meta_path,
                        self.columns.clone(),
                        column.name.clone(),
                        codec,
                    )?)
                } else {
                    ColumnIndex::Unclustered(UnclusteredBPlus::open(
                        data_path,
                        meta_path,
                        self.columns.clone(),
                        column.name.clone(),
                        codec,
                    )?)
                }
            }
            IndexKind::Hash => {
                let dir_path = self.indices_dir.join(format!("{}_hash_dir.bin", column.name));
                let data_path = self.indices_dir.join(format!("{}_hash_data.bin", column.name));
                ColumnIndex::Hash(ExtendibleHash::open(
                    dir_path,
                    data_path,
                    self.codec_for(column)?,
                    HashConfig::default(),
                )?)
            }
            IndexKind::Isam => {
                let root = self.indices_dir.join(format!("{}_isam_index1.dat", column.name));
                let mid = self.indices_dir.join(format!("{}_isam_index2.dat", column.name));
                let data = self.indices_dir.join(format!("{}_isam_data.dat", column.name));
                ColumnIndex::Isam(IsamFile::open(root, mid, data, self.codec_for(column)?)?)
            }
            IndexKind::RTree => {
                if column.data_type != crate::schema::DataType::ArrayFloat {
                    return Err(IndexError::KeyMismatch {
                        expected: "array_float",
                        got: column.data_type.name().into(),
                    });
                }
                let data_path = self.file_base(&column.name, "rtree").with_extension("dat");
                let meta_path = self.indices_dir.join(format!("{}_rtree_meta.json", column.name));
                ColumnIndex::RTree(RTreeIndex::open(data_path, meta_path)?)
            }
            // Sequential "index" is just the heap scan; nothing to build.
            IndexKind::Seq => return Ok(()),
        };
        debug!(
            table = %self.table_name,
            column = %column.name,
            kind = %kind,
            "index opened"
        );
        self.indices.insert(column.name.clone(), index);
        Ok(())
    }

    /// Whether a usable index exists for `column`.
    pub fn has_index(&self, column: &str) -> bool {
        self.indices.contains_key(column)
    }

    /// The kind of index backing `column`, if one is open.
    pub fn index_kind(&self, column: &str) -> Option<IndexKind> {
        match self.indices.get(column)? {
            ColumnIndex::Avl(_) => Some(IndexKind::Avl),
            ColumnIndex::Clustered(_) | ColumnIndex::Unclustered(_) => Some(IndexKind::BTree),
            ColumnIndex::Hash(_) => Some(IndexKind::Hash),
            ColumnIndex::Isam(_) => Some(IndexKind::Isam),
            ColumnIndex::RTree(_) => Some(IndexKind::RTree),
        }
    }

    /// Fan a freshly heap-inserted record out to every indexed column.
    /// Null keys are skipped; per-index failures are logged and skipped.
    pub fn insert(&mut self, record: &Record, slot: u64) {
        let columns = self.columns.clone();
        for column in columns.iter().filter(|c| c.has_index) {
            let Some(value) = record.get(&column.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let Some(index) = self.indices.get_mut(&column.name) else {
                continue;
            };
            let result = match index {
                ColumnIndex::Avl(avl) => avl.insert(value, slot),
                ColumnIndex::Hash(hash) => hash.insert(value, slot),
                ColumnIndex::Isam(isam) => isam.insert(value, slot),
                ColumnIndex::Clustered(btree) => Self::btree_key(column, value)
                    .map(|key| btree.add(key, record.clone(), slot)),
                ColumnIndex::Unclustered(btree) => Self::btree_key(column, value)
                    .map(|key| btree.add(key, record.clone(), slot)),
                ColumnIndex::RTree(rtree) => match value.as_point() {
                    Some(point) => {
                        rtree.add(slot, point, slot);
                        Ok(())
                    }
                    None => Err(IndexError::KeyMismatch {
                        expected: "array_float",
                        got: value.to_string(),
                    }),
                },
            };
            if let Err(e) = result {
                warn!(
                    table = %self.table_name,
                    column = %column.name,
                    error = %e,
                    "index insert failed"
                );
            }
        }
    }

    /// Point lookup: the slot stored for `key` on `column`, if any.
    /// The R-tree answers spatial queries only.
    pub fn search(&mut self, column: &str, key: &Value) -> Result<Option<u64>, IndexError> {
        let codec = self.column_codec(column);
        match self.indices.get_mut(column) {
            None => Ok(None),
            Some(ColumnIndex::Avl(avl)) => avl.find(key),
            Some(ColumnIndex::Hash(hash)) => hash.find(key),
            Some(ColumnIndex::Isam(isam)) => isam.find(key),
            Some(ColumnIndex::Clustered(btree)) => {
                let key = codec?.key_from_value(key)?;
                Ok(btree.search(&key).into_iter().next())
            }
            Some(ColumnIndex::Unclustered(btree)) => {
                let key = codec?.key_from_value(key)?;
                Ok(btree.search(&key).into_iter().next())
            }
            Some(ColumnIndex::RTree(_)) => Ok(None),
        }
    }

    /// Ordered range lookup over `[lo, hi]`. The hash and R-tree are
    /// point/spatial structures and return the empty list.
    pub fn range_search(
        &mut self,
        column: &str,
        lo: &Value,
        hi: &Value,
    ) -> Result<Vec<u64>, IndexError> {
        let codec = self.column_codec(column);
        match self.indices.get_mut(column) {
            None => Ok(Vec::new()),
            Some(ColumnIndex::Avl(avl)) => avl.range(lo, hi),
            Some(ColumnIndex::Isam(isam)) => isam.range(lo, hi),
            Some(ColumnIndex::Clustered(btree)) => {
                let codec = codec?;
                let lo = codec.key_from_value(lo)?;
                let hi = codec.key_from_value(hi)?;
                Ok(btree.range(&lo, &hi))
            }
            Some(ColumnIndex::Unclustered(btree)) => {
                let codec = codec?;
                let lo = codec.key_from_value(lo)?;
                let hi = codec.key_from_value(hi)?;
                Ok(btree.range(&lo, &hi))
            }
            Some(ColumnIndex::Hash(_)) | Some(ColumnIndex::RTree(_)) => Ok(Vec::new()),
        }
    }

    /// Spatial radius lookup; empty unless `column` carries an R-tree.
    pub fn spatial_search(
        &mut self,
        column: &str,
        point: (f32, f32),
        radius: f32,
    ) -> Result<Vec<u64>, IndexError> {
        match self.indices.get_mut(column) {
            Some(ColumnIndex::RTree(rtree)) => Ok(rtree.range(point, radius)),
            _ => Ok(Vec::new()),
        }
    }

    /// Remove a deleted record's keys from the indices that support
    /// deletion (AVL, hash, ISAM). B+ and R-tree entries stay; readers
    /// filter them against heap tombstones.
    pub fn delete(&mut self, record: &Record) {
        let columns = self.columns.clone();
        for column in columns.iter().filter(|c| c.has_index) {
            let Some(value) = record.get(&column.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let Some(index) = self.indices.get_mut(&column.name) else {
                continue;
            };
            let result = match index {
                ColumnIndex::Avl(avl) => avl.remove(value).map(|_| ()),
                ColumnIndex::Hash(hash) => hash.remove(value).map(|_| ()),
                ColumnIndex::Isam(isam) => isam.remove(value).map(|_| ()),
                ColumnIndex::Clustered(_)
                | ColumnIndex::Unclustered(_)
                | ColumnIndex::RTree(_) => Ok(()),
            };
            if let Err(e) = result {
                warn!(
                    table = %self.table_name,
                    column = %column.name,
                    error = %e,
                    "index delete failed"
                );
            }
        }
    }

    /// Persist every index that buffers state (B+ sidecars, R-tree entry
    /// files). Failures are logged per index.
    pub fn save_all(&mut self) {
        for (column, index) in &mut self.indices {
            let result = match index {
                ColumnIndex::Avl(avl) => avl.save(),
                ColumnIndex::Hash(hash) => hash.save(),
                ColumnIndex::Isam(isam) => isam.save(),
                ColumnIndex::Clustered(btree) => btree.save(),
                ColumnIndex::Unclustered(btree) => btree.save(),
                ColumnIndex::RTree(rtree) => rtree.save(),
            };
            if let Err(e) = result {
                warn!(table = %self.table_name, column = %column, error = %e, "index save failed");
            }
        }
    }

    fn btree_key(
        column: &Column,
        value: &Value,
    ) -> Result<crate::index::Key, IndexError> {
        KeyCodec::new(KeyType::for_column(column)?).key_from_value(value)
    }

    fn column_codec(&self, column: &str) -> Result<KeyCodec, IndexError> {
        let col = self
            .columns
            .iter()
            .find(|c| c.name == column)
            .ok_or_else(|| IndexError::Corrupt(format!("unknown column '{column}'")))?;
        self.codec_for(col)
    }
}
