//! Table catalog: per-table metadata documents and directory lifecycle.
//!
//! Every table lives in its own directory under the data root:
//!
//! ```text
//! <data_dir>/<table_name>/
//!   metadata.json          name, columns, primary_key, primary_index_type, record_size
//!   <table>_data.dat       heap record file
//!   indices/               one file set per indexed column
//! ```
//!
//! The catalog loads every table document on open; creating a table writes
//! the document, dropping one removes the whole directory recursively.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::schema::{Column, SchemaError, record_size};
use crate::sql::IndexKind;

/// Errors raised by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A metadata document could not be read or written.
    #[error("metadata document error: {0}")]
    Document(String),

    /// Schema validation failed at CREATE.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The table already exists.
    #[error("table '{0}' already exists")]
    TableExists(String),

    /// No such table.
    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    /// The declared primary key is not one of the columns.
    #[error("primary key column '{0}' does not exist")]
    PrimaryKeyMissing(String),
}

// ------------------------------------------------------------------------------------------------
// Table
// ------------------------------------------------------------------------------------------------

/// The on-disk metadata document.
#[derive(Serialize, Deserialize)]
struct TableDocument {
    name: String,
    columns: Vec<Column>,
    primary_key: String,
    primary_index_type: IndexKind,
    record_size: usize,
}

/// A table's schema plus its directory layout.
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Ordered column list; record layout follows this order.
    pub columns: Vec<Column>,
    /// Name of the primary key column.
    pub primary_key: String,
    /// Index kind backing the primary key.
    pub primary_index_type: IndexKind,
    data_dir: PathBuf,
}

impl Table {
    /// Validate and normalize a table definition: the primary key column
    /// must exist, becomes `is_primary_key`, and is forced to carry an
    /// index (of `primary_index_type` when it declares none).
    pub fn new(
        name: impl Into<String>,
        mut columns: Vec<Column>,
        primary_key: impl Into<String>,
        primary_index_type: IndexKind,
        data_dir: impl AsRef<Path>,
    ) -> Result<Self, CatalogError> {
        let name = name.into();
        let primary_key = primary_key.into();

        if !columns.iter().any(|c| c.name == primary_key) {
            return Err(CatalogError::PrimaryKeyMissing(primary_key));
        }
        for col in &mut columns {
            if col.name == primary_key {
                col.is_primary_key = true;
                if !col.has_index {
                    col.has_index = true;
                    col.index_type = Some(primary_index_type);
                } else if col.index_type.is_none() {
                    col.index_type = Some(primary_index_type);
                }
            }
            col.validate()?;
        }

        Ok(Self {
            name,
            columns,
            primary_key,
            primary_index_type,
            data_dir: data_dir.as_ref().to_path_buf(),
        })
    }

    /// `<data_dir>/<name>`.
    pub fn table_dir(&self) -> PathBuf {
        self.data_dir.join(&self.name)
    }

    /// Path of the metadata document.
    pub fn metadata_path(&self) -> PathBuf {
        self.table_dir().join("metadata.json")
    }

    /// Path of the heap record file.
    pub fn data_file_path(&self) -> PathBuf {
        self.table_dir().join(format!("{}_data.dat", self.name))
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary key column.
    pub fn primary_key_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary_key)
    }

    /// Columns that carry an index.
    pub fn indexed_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.has_index).collect()
    }

    /// Fixed record width in bytes.
    pub fn record_size(&self) -> usize {
        record_size(&self.columns)
    }

    /// Byte offset of `column` within a record block.
    pub fn column_offset(&self, column: &str) -> Option<usize> {
        let mut offset = 0;
        for col in &self.columns {
            if col.name == column {
                return Some(offset);
            }
            offset += col.cell_size();
        }
        None
    }

    /// Write the metadata document, creating the table directory.
    pub fn save_metadata(&self) -> Result<(), CatalogError> {
        fs::create_dir_all(self.table_dir())?;
        let doc = TableDocument {
            name: self.name.clone(),
            columns: self.columns.clone(),
            primary_key: self.primary_key.clone(),
            primary_index_type: self.primary_index_type,
            record_size: self.record_size(),
        };
        let json = serde_json::to_vec_pretty(&doc)
            .map_err(|e| CatalogError::Document(e.to_string()))?;
        fs::write(self.metadata_path(), json)?;
        Ok(())
    }

    /// Load a table from its metadata document.
    pub fn load(name: &str, data_dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let data_dir = data_dir.as_ref();
        let metadata_path = data_dir.join(name).join("metadata.json");
        if !metadata_path.exists() {
            return Err(CatalogError::TableNotFound(name.to_string()));
        }
        let bytes = fs::read(&metadata_path)?;
        let doc: TableDocument = serde_json::from_slice(&bytes)
            .map_err(|e| CatalogError::Document(format!("{}: {e}", metadata_path.display())))?;
        Table::new(
            doc.name,
            doc.columns,
            doc.primary_key,
            doc.primary_index_type,
            data_dir,
        )
    }
}

// ------------------------------------------------------------------------------------------------
// Catalog
// ------------------------------------------------------------------------------------------------

/// The set of known tables under one data root.
pub struct Catalog {
    data_dir: PathBuf,
    tables: BTreeMap<String, Table>,
}

impl Catalog {
    /// Open the catalog, creating the data root if needed and loading
    /// every table directory that carries a metadata document. Tables
    /// whose document fails to load are skipped with a warning.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let mut tables = BTreeMap::new();
        for entry in fs::read_dir(&data_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !entry.path().join("metadata.json").exists() {
                continue;
            }
            match Table::load(&name, &data_dir) {
                Ok(table) => {
                    tables.insert(table.name.clone(), table);
                }
                Err(e) => {
                    warn!(table = %name, error = %e, "skipping unloadable table");
                }
            }
        }
        info!(data_dir = %data_dir.display(), tables = tables.len(), "catalog opened");
        Ok(Self { data_dir, tables })
    }

    /// The data root this catalog manages.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Create a table: validate, persist the metadata document, register.
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<Column>,
        primary_key: &str,
        primary_index_type: IndexKind,
    ) -> Result<&Table, CatalogError> {
        if self.tables.contains_key(name) {
            return Err(CatalogError::TableExists(name.to_string()));
        }
        let table = Table::new(name, columns, primary_key, primary_index_type, &self.data_dir)?;
        table.save_metadata()?;
        info!(table = %name, "table created");
        self.tables.insert(name.to_string(), table);
        Ok(&self.tables[name])
    }

    /// Drop a table, removing its directory recursively.
    pub fn drop_table(&mut self, name: &str) -> Result<(), CatalogError> {
        let table = self
            .tables
            .remove(name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))?;
        let dir = table.table_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        info!(table = %name, "table dropped");
        Ok(())
    }

    /// Table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Whether a table exists.
    pub fn exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// All table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}
