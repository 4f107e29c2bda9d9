//! Statement execution against the catalog, heap, and indices.
//!
//! The executor receives parsed statements and drives the data flow of the
//! engine: catalog lookup, access-path selection for predicated SELECT and
//! DELETE, index lookups yielding slot positions, and heap reads/writes.
//!
//! Every path returns a [`QueryOutcome`]; no error escapes as a panic.
//! Tombstoned heap slots read as absent everywhere, which also filters the
//! stale B+ tree and R-tree entries that deletion leaves behind.
//!
//! Files are opened per statement: the heap and index manager are
//! constructed from the catalog entry, used, saved, and dropped.

#[cfg(test)]
mod tests;

use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{Catalog, CatalogError, Table};
use crate::csv::{self, CsvError};
use crate::heap::{HeapError, RecordFile};
use crate::index::IndexError;
use crate::index::manager::IndexManager;
use crate::optimizer::{ExecutionPlan, Optimizer, PlanOperation};
use crate::schema::{Column, Record, SchemaError, Value, coerce};
use crate::sql::{
    Condition, CreateTableStatement, DeleteStatement, IndexKind, InsertStatement, SelectStatement,
    Statement,
};

/// Errors internal to statement execution; surfaced as
/// `QueryOutcome::error` text at the boundary.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Catalog failure.
    #[error("{0}")]
    Catalog(#[from] CatalogError),

    /// Heap failure.
    #[error("{0}")]
    Heap(#[from] HeapError),

    /// Index failure.
    #[error("{0}")]
    Index(#[from] IndexError),

    /// Value conversion failure.
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// CSV bulk-load failure.
    #[error("{0}")]
    Csv(#[from] CsvError),

    /// Statement-level validation failure.
    #[error("{0}")]
    Statement(String),
}

/// Plan (or operation) summary attached to a successful outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ExplainInfo {
    /// Operation name (`index_scan`, `sequential_scan`, `insert`, ...).
    pub operation: String,
    /// Static cost of the chosen access path; 0 for DDL and inserts.
    pub cost: u32,
    /// Index family used, if any.
    pub index_type: Option<IndexKind>,
    /// Driving indexed column, if any.
    pub index_column: Option<String>,
    /// Human-readable summary.
    pub description: String,
}

impl ExplainInfo {
    fn operation_only(operation: &str, description: String) -> Self {
        Self {
            operation: operation.to_string(),
            cost: 0,
            index_type: None,
            index_column: None,
            description,
        }
    }
}

impl From<&ExecutionPlan> for ExplainInfo {
    fn from(plan: &ExecutionPlan) -> Self {
        Self {
            operation: plan.operation.name().to_string(),
            cost: plan.estimated_cost,
            index_type: plan.index_type,
            index_column: plan.index_column.clone(),
            description: plan.description.clone(),
        }
    }
}

/// The result of executing one statement.
#[derive(Debug, Serialize)]
pub struct QueryOutcome {
    /// Whether the statement ran.
    pub success: bool,
    /// Rows produced (SELECT only).
    pub data: Option<Vec<Record>>,
    /// Rows returned, inserted, or deleted.
    pub count: usize,
    /// Wall-clock seconds spent in the executor.
    pub time: f64,
    /// Failure message, or accumulated row-level errors.
    pub error: Option<String>,
    /// Plan / operation summary.
    pub explain: Option<ExplainInfo>,
}

impl QueryOutcome {
    fn failure(error: String, time: f64) -> Self {
        Self {
            success: false,
            data: None,
            count: 0,
            time,
            error: Some(error),
            explain: None,
        }
    }
}

/// Executes parsed statements.
#[derive(Default)]
pub struct Executor {
    optimizer: Optimizer,
}

impl Executor {
    /// New executor.
    pub fn new() -> Self {
        Self {
            optimizer: Optimizer::new(),
        }
    }

    /// Execute a statement, timing it and converting every failure into a
    /// result object.
    pub fn execute(&self, catalog: &mut Catalog, statement: &Statement) -> QueryOutcome {
        let start = Instant::now();
        let result = match statement {
            Statement::CreateTable(stmt) => self.execute_create(catalog, stmt),
            Statement::Insert(stmt) => self.execute_insert(catalog, stmt),
            Statement::Delete(stmt) => self.execute_delete(catalog, stmt),
            Statement::Select(stmt) => self.execute_select(catalog, stmt),
        };
        let time = start.elapsed().as_secs_f64();
        match result {
            Ok(mut outcome) => {
                outcome.time = time;
                outcome
            }
            Err(e) => QueryOutcome::failure(e.to_string(), time),
        }
    }

    // -- CREATE TABLE ----------------------------------------------------

    fn execute_create(
        &self,
        catalog: &mut Catalog,
        stmt: &CreateTableStatement,
    ) -> Result<QueryOutcome, ExecError> {
        if catalog.exists(&stmt.table_name) {
            return Err(ExecError::Statement(format!(
                "table '{}' already exists",
                stmt.table_name
            )));
        }
        let table = catalog
            .create_table(
                &stmt.table_name,
                stmt.columns.clone(),
                &stmt.primary_key,
                stmt.primary_index_type,
            )?
            .clone();

        if let Some(csv_path) = &stmt.from_file {
            let mut heap = RecordFile::open(table.data_file_path(), table.columns.clone())?;
            let mut indices =
                IndexManager::open(table.name.clone(), table.columns.clone(), table.table_dir())?;
            let report = csv::load_csv(csv_path, &table, &mut heap, &mut indices)?;
            let error = if report.errors.is_empty() {
                None
            } else {
                Some(report.errors.join("; "))
            };
            return Ok(QueryOutcome {
                success: true,
                data: None,
                count: report.inserted_count,
                time: 0.0,
                error,
                explain: Some(ExplainInfo::operation_only(
                    "create_table",
                    format!(
                        "table '{}' created and loaded with {} records from CSV ({} rows failed)",
                        table.name, report.inserted_count, report.error_count
                    ),
                )),
            });
        }

        Ok(QueryOutcome {
            success: true,
            data: None,
            count: 0,
            time: 0.0,
            error: None,
            explain: Some(ExplainInfo::operation_only(
                "create_table",
                format!(
                    "table '{}' created with {} columns",
                    table.name,
                    table.columns.len()
                ),
            )),
        })
    }

    // -- INSERT ----------------------------------------------------------

    fn execute_insert(
        &self,
        catalog: &mut Catalog,
        stmt: &InsertStatement,
    ) -> Result<QueryOutcome, ExecError> {
        let table = self.require_table(catalog, &stmt.table_name)?;
        let mut heap = RecordFile::open(table.data_file_path(), table.columns.clone())?;
        let mut indices =
            IndexManager::open(table.name.clone(), table.columns.clone(), table.table_dir())?;

        let mut inserted = 0usize;
        let mut errors: Vec<String> = Vec::new();

        for values in &stmt.values {
            match build_record(values, &table.columns, stmt.columns.as_deref()) {
                Ok(record) => match heap.insert(&record) {
                    Ok(slot) => {
                        indices.insert(&record, slot);
                        inserted += 1;
                    }
                    Err(e) => errors.push(format!("row {values:?}: {e}")),
                },
                Err(e) => errors.push(format!("row {values:?}: {e}")),
            }
        }
        indices.save_all();

        debug!(table = %table.name, inserted, failed = errors.len(), "insert finished");
        Ok(QueryOutcome {
            success: true,
            data: None,
            count: inserted,
            time: 0.0,
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
            explain: Some(ExplainInfo::operation_only(
                "insert",
                format!("{inserted} records inserted into '{}'", table.name),
            )),
        })
    }

    // -- DELETE ----------------------------------------------------------

    fn execute_delete(
        &self,
        catalog: &mut Catalog,
        stmt: &DeleteStatement,
    ) -> Result<QueryOutcome, ExecError> {
        let table = self.require_table(catalog, &stmt.table_name)?;
        let plan = self.optimizer.optimize_delete(stmt, &table);
        let mut heap = RecordFile::open(table.data_file_path(), table.columns.clone())?;
        let mut indices =
            IndexManager::open(table.name.clone(), table.columns.clone(), table.table_dir())?;

        let deleted = match &stmt.condition {
            None => {
                // Tombstone every live slot. The deletion-capable indices
                // (AVL, hash, ISAM) drop their keys; B+ and R-tree entries
                // stay and readers filter against the heap.
                let mut deleted = 0usize;
                for position in 0..heap.count() {
                    let Some(record) = heap.read(position)? else {
                        continue;
                    };
                    if heap.delete(position)? {
                        indices.delete(&record);
                        deleted += 1;
                    }
                }
                deleted
            }
            Some(condition) => {
                self.delete_with_condition(condition, &table, &plan, &mut heap, &mut indices)?
            }
        };
        indices.save_all();

        Ok(QueryOutcome {
            success: true,
            data: None,
            count: deleted,
            time: 0.0,
            error: None,
            explain: Some(ExplainInfo::from(&plan)),
        })
    }

    fn delete_with_condition(
        &self,
        condition: &Condition,
        table: &Table,
        plan: &ExecutionPlan,
        heap: &mut RecordFile,
        indices: &mut IndexManager,
    ) -> Result<usize, ExecError> {
        let slots = self.slots_for_condition(condition, table, plan, heap, indices)?;
        let mut deleted = 0usize;
        for slot in slots {
            // Read before tombstoning so the deletion-capable indices can
            // drop their keys.
            let Some(record) = heap.read(slot)? else {
                continue;
            };
            if heap.delete(slot)? {
                indices.delete(&record);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    // -- SELECT ----------------------------------------------------------

    fn execute_select(
        &self,
        catalog: &mut Catalog,
        stmt: &SelectStatement,
    ) -> Result<QueryOutcome, ExecError> {
        let table = self.require_table(catalog, &stmt.table_name)?;
        let plan = self.optimizer.optimize_select(stmt, &table);
        let heap = RecordFile::open(table.data_file_path(), table.columns.clone())?;
        let mut indices =
            IndexManager::open(table.name.clone(), table.columns.clone(), table.table_dir())?;

        let rows = match &stmt.condition {
            None => {
                let mut rows = Vec::new();
                for entry in heap.scan_all()? {
                    rows.push(entry?.1);
                }
                rows
            }
            Some(condition) => {
                let mut heap = heap;
                let slots =
                    self.slots_for_condition(condition, &table, &plan, &mut heap, &mut indices)?;
                let mut rows = Vec::new();
                for slot in slots {
                    if let Some(record) = heap.read(slot)? {
                        rows.push(record);
                    }
                }
                rows
            }
        };

        let projected: Vec<Record> = rows
            .into_iter()
            .map(|record| project(record, &stmt.columns))
            .collect();

        Ok(QueryOutcome {
            success: true,
            count: projected.len(),
            data: Some(projected),
            time: 0.0,
            error: None,
            explain: Some(ExplainInfo::from(&plan)),
        })
    }

    // -- Shared dispatch -------------------------------------------------

    /// Resolve a predicate to candidate heap slots, following the chosen
    /// access path. Sequential plans scan and filter; index plans ask the
    /// index manager. Tombstone filtering happens at heap read time.
    fn slots_for_condition(
        &self,
        condition: &Condition,
        table: &Table,
        plan: &ExecutionPlan,
        heap: &mut RecordFile,
        indices: &mut IndexManager,
    ) -> Result<Vec<u64>, ExecError> {
        match condition {
            Condition::Equal { column, value } => {
                let data_type = self.column_type(table, column)?;
                let value = coerce(value.clone(), data_type)?;
                if plan.operation == PlanOperation::IndexScan {
                    Ok(indices.search(column, &value)?.into_iter().collect())
                } else {
                    let mut slots = Vec::new();
                    for entry in heap.scan_all()? {
                        let (slot, record) = entry?;
                        if record.get(column) == Some(&value) {
                            slots.push(slot);
                        }
                    }
                    Ok(slots)
                }
            }
            Condition::Between { column, low, high } => {
                let data_type = self.column_type(table, column)?;
                let low = coerce(low.clone(), data_type)?;
                let high = coerce(high.clone(), data_type)?;
                if plan.operation == PlanOperation::RangeScan {
                    Ok(indices.range_search(column, &low, &high)?)
                } else {
                    let mut slots = Vec::new();
                    for entry in heap.scan_all()? {
                        let (slot, record) = entry?;
                        let Some(value) = record.get(column) else {
                            continue;
                        };
                        let in_lower = value
                            .compare(&low)
                            .is_some_and(|o| o != std::cmp::Ordering::Less);
                        let in_upper = value
                            .compare(&high)
                            .is_some_and(|o| o != std::cmp::Ordering::Greater);
                        if in_lower && in_upper {
                            slots.push(slot);
                        }
                    }
                    Ok(slots)
                }
            }
            Condition::Spatial {
                column,
                point,
                radius,
            } => {
                if plan.operation == PlanOperation::SpatialScan {
                    Ok(indices.spatial_search(column, *point, *radius)?)
                } else {
                    // Linear filter on Euclidean distance.
                    let mut slots = Vec::new();
                    for entry in heap.scan_all()? {
                        let (slot, record) = entry?;
                        let Some(Value::Point(x, y)) = record.get(column) else {
                            continue;
                        };
                        let (dx, dy) = (x - point.0, y - point.1);
                        if (dx * dx + dy * dy).sqrt() <= *radius {
                            slots.push(slot);
                        }
                    }
                    Ok(slots)
                }
            }
        }
    }

    fn column_type(
        &self,
        table: &Table,
        column: &str,
    ) -> Result<crate::schema::DataType, ExecError> {
        table
            .column(column)
            .map(|c| c.data_type)
            .ok_or_else(|| {
                ExecError::Statement(format!(
                    "column '{column}' does not exist in table '{}'",
                    table.name
                ))
            })
    }

    fn require_table(&self, catalog: &Catalog, name: &str) -> Result<Table, ExecError> {
        catalog
            .table(name)
            .cloned()
            .ok_or_else(|| ExecError::Statement(format!("table '{name}' does not exist")))
    }
}

// ------------------------------------------------------------------------------------------------
// Row construction and projection
// ------------------------------------------------------------------------------------------------

/// Build a record from an INSERT's literal list. The positional form
/// requires one value per table column; the named form requires the named
/// columns to exist and match the value count, with unnamed columns set to
/// `Null`. Each literal is coerced to its column's type.
fn build_record(
    values: &[Value],
    columns: &[Column],
    named: Option<&[String]>,
) -> Result<Record, ExecError> {
    let mut record = Record::new();
    match named {
        Some(names) => {
            if values.len() != names.len() {
                return Err(ExecError::Statement(format!(
                    "value count ({}) does not match named columns ({})",
                    values.len(),
                    names.len()
                )));
            }
            for column in columns {
                record.insert(column.name.clone(), Value::Null);
            }
            for (name, value) in names.iter().zip(values) {
                let column = columns.iter().find(|c| &c.name == name).ok_or_else(|| {
                    ExecError::Statement(format!("column '{name}' does not exist"))
                })?;
                record.insert(name.clone(), coerce(value.clone(), column.data_type)?);
            }
        }
        None => {
            if values.len() != columns.len() {
                return Err(ExecError::Statement(format!(
                    "value count ({}) does not match table columns ({})",
                    values.len(),
                    columns.len()
                )));
            }
            for (column, value) in columns.iter().zip(values) {
                record.insert(column.name.clone(), coerce(value.clone(), column.data_type)?);
            }
        }
    }
    Ok(record)
}

/// Project a record onto the requested columns; `*` keeps everything.
fn project(record: Record, requested: &[String]) -> Record {
    if requested.iter().any(|c| c == "*") {
        return record;
    }
    let mut projected = Record::new();
    for name in requested {
        if let Some(value) = record.get(name) {
            projected.insert(name.clone(), value.clone());
        }
    }
    projected
}
