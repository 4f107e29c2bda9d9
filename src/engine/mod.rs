//! The [`Database`] facade and its wire-level response shapes.
//!
//! A `Database` is an explicitly constructed value over one data
//! directory — there is no global singleton. It wires the parser, catalog,
//! optimizer, and executor together and exposes the operations an external
//! HTTP facade consumes:
//!
//! | Operation | Response |
//! |---|---|
//! | [`Database::execute`] | [`QueryResponse`] |
//! | [`Database::explain`] | [`PlanResponse`] |
//! | [`Database::list_tables`] | [`TablesResponse`] |
//! | [`Database::table_info`] | [`TableResponse`] |
//! | [`Database::stats`] | [`StatsResponse`] |
//! | [`Database::drop_table`] | [`DropResponse`] |
//!
//! Every response is serde-serializable and carries `success` plus a
//! human-readable `error` on failure; nothing panics across this
//! boundary. The HTTP server itself is an external collaborator.
//!
//! The engine assumes exclusive access — one in-flight call per process.
//! I/O is synchronous; callers serialize.


use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::catalog::{Catalog, CatalogError};
use crate::executor::{Executor, QueryOutcome};
use crate::heap::RecordFile;
use crate::optimizer::Optimizer;
use crate::schema::{Column, Record};
use crate::sql::{self, IndexKind, SqlError, Statement};

/// Engine version, surfaced by the external facade's health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine construction errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The catalog could not be opened.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

// ------------------------------------------------------------------------------------------------
// Response shapes
// ------------------------------------------------------------------------------------------------

/// `POST /query` response body.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// Whether the statement ran.
    pub success: bool,
    /// Result rows, for SELECT.
    pub data: Option<Vec<Record>>,
    /// Rows returned / inserted / deleted.
    pub count: usize,
    /// Seconds spent parsing and executing.
    pub time: f64,
    /// Failure message or accumulated row errors.
    pub error: Option<String>,
    /// Plan or operation summary.
    pub explain: Option<crate::executor::ExplainInfo>,
}

/// The plan document inside a [`PlanResponse`].
#[derive(Debug, Serialize)]
pub struct PlanDescription {
    /// Access operation name.
    pub operation: String,
    /// Static cost estimate.
    pub cost: u32,
    /// Index family used, if any.
    pub index_type: Option<IndexKind>,
    /// Driving indexed column, if any.
    pub index_column: Option<String>,
    /// Human-readable summary.
    pub description: String,
}

/// `POST /explain` response body.
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    /// Whether a plan was produced.
    pub success: bool,
    /// The chosen plan.
    pub plan: Option<PlanDescription>,
    /// Failure message.
    pub error: Option<String>,
}

/// Table description inside [`TableResponse`] / [`TablesResponse`].
#[derive(Debug, Serialize)]
pub struct TableDescription {
    /// Table name.
    pub name: String,
    /// Ordered column list.
    pub columns: Vec<Column>,
    /// Primary key column name.
    pub primary_key: String,
    /// Index kind backing the primary key.
    pub primary_index_type: IndexKind,
    /// Fixed record width in bytes.
    pub record_size: usize,
    /// Total heap slots, tombstones included.
    pub total_records: u64,
    /// Live heap slots.
    pub active_records: u64,
    /// Names of indexed columns.
    pub indexed_columns: Vec<String>,
}

/// `GET /tables/{name}` response body.
#[derive(Debug, Serialize)]
pub struct TableResponse {
    /// Whether the table exists.
    pub success: bool,
    /// The description, on success.
    pub table: Option<TableDescription>,
    /// Failure message.
    pub error: Option<String>,
}

/// `GET /tables` response body.
#[derive(Debug, Serialize)]
pub struct TablesResponse {
    /// Always true.
    pub success: bool,
    /// One description per table.
    pub tables: Vec<TableDescription>,
    /// Number of tables.
    pub count: usize,
}

/// `GET /stats` response body.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Always true.
    pub success: bool,
    /// Number of tables.
    pub total_tables: usize,
    /// Live records across all tables.
    pub total_records: u64,
    /// `live records x record size`, summed.
    pub estimated_size_bytes: u64,
    /// The data root.
    pub data_directory: String,
}

/// `DELETE /tables/{name}` response body.
#[derive(Debug, Serialize)]
pub struct DropResponse {
    /// Whether the table was dropped.
    pub success: bool,
    /// Failure message.
    pub error: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// Database
// ------------------------------------------------------------------------------------------------

/// The engine facade: one value per data directory.
pub struct Database {
    data_dir: PathBuf,
    catalog: Catalog,
    optimizer: Optimizer,
    executor: Executor,
}

impl Database {
    /// Open a database rooted at the directory named by the `DATA_DIR`
    /// environment variable, defaulting to `data`.
    pub fn open_from_env() -> Result<Self, EngineError> {
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
        Self::open(data_dir)
    }

    /// Open (or create) a database rooted at `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let catalog = Catalog::open(&data_dir)?;
        info!(data_dir = %data_dir.display(), "database opened");
        Ok(Self {
            data_dir,
            catalog,
            optimizer: Optimizer::new(),
            executor: Executor::new(),
        })
    }

    /// Parse and execute one SQL statement.
    pub fn execute(&mut self, sql_text: &str) -> QueryResponse {
        let started = std::time::Instant::now();
        let statement = match sql::parse(sql_text) {
            Ok(statement) => statement,
            Err(e) => {
                return QueryResponse {
                    success: false,
                    data: None,
                    count: 0,
                    time: started.elapsed().as_secs_f64(),
                    error: Some(e.to_string()),
                    explain: None,
                };
            }
        };
        let outcome = self.executor.execute(&mut self.catalog, &statement);
        Self::outcome_to_response(outcome, started.elapsed().as_secs_f64())
    }

    fn outcome_to_response(outcome: QueryOutcome, time: f64) -> QueryResponse {
        QueryResponse {
            success: outcome.success,
            data: outcome.data,
            count: outcome.count,
            time,
            error: outcome.error,
            explain: outcome.explain,
        }
    }

    /// Produce the access-path plan for a SELECT or DELETE without
    /// executing it.
    pub fn explain(&self, sql_text: &str) -> PlanResponse {
        let statement = match sql::parse(sql_text) {
            Ok(statement) => statement,
            Err(e) => return Self::plan_failure(e),
        };
        let table_name = statement.table_name();
        let Some(table) = self.catalog.table(table_name) else {
            return PlanResponse {
                success: false,
                plan: None,
                error: Some(format!("table '{table_name}' does not exist")),
            };
        };
        let plan = match &statement {
            Statement::Select(stmt) => self.optimizer.optimize_select(stmt, table),
            Statement::Delete(stmt) => self.optimizer.optimize_delete(stmt, table),
            _ => {
                return PlanResponse {
                    success: false,
                    plan: None,
                    error: Some("EXPLAIN supports SELECT and DELETE statements".into()),
                };
            }
        };
        PlanResponse {
            success: true,
            plan: Some(PlanDescription {
                operation: plan.operation.name().to_string(),
                cost: plan.estimated_cost,
                index_type: plan.index_type,
                index_column: plan.index_column,
                description: plan.description,
            }),
            error: None,
        }
    }

    fn plan_failure(e: SqlError) -> PlanResponse {
        PlanResponse {
            success: false,
            plan: None,
            error: Some(e.to_string()),
        }
    }

    /// Describe one table, heap counters included.
    pub fn table_info(&self, name: &str) -> TableResponse {
        match self.describe_table(name) {
            Some(description) => TableResponse {
                success: true,
                table: Some(description),
                error: None,
            },
            None => TableResponse {
                success: false,
                table: None,
                error: Some(format!("table '{name}' does not exist")),
            },
        }
    }

    /// Describe every table.
    pub fn list_tables(&self) -> TablesResponse {
        let tables: Vec<TableDescription> = self
            .catalog
            .table_names()
            .iter()
            .filter_map(|name| self.describe_table(name))
            .collect();
        TablesResponse {
            success: true,
            count: tables.len(),
            tables,
        }
    }

    /// Aggregate counters across every table.
    pub fn stats(&self) -> StatsResponse {
        let mut total_records = 0u64;
        let mut estimated_size_bytes = 0u64;
        let names = self.catalog.table_names();
        for name in &names {
            if let Some(description) = self.describe_table(name) {
                total_records += description.active_records;
                estimated_size_bytes +=
                    description.active_records * description.record_size as u64;
            }
        }
        StatsResponse {
            success: true,
            total_tables: names.len(),
            total_records,
            estimated_size_bytes,
            data_directory: self.data_dir.display().to_string(),
        }
    }

    /// Drop a table and its directory.
    pub fn drop_table(&mut self, name: &str) -> DropResponse {
        match self.catalog.drop_table(name) {
            Ok(()) => DropResponse {
                success: true,
                error: None,
            },
            Err(e) => DropResponse {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }

    fn describe_table(&self, name: &str) -> Option<TableDescription> {
        let table = self.catalog.table(name)?;
        let (total_records, active_records) =
            match RecordFile::open(table.data_file_path(), table.columns.clone()) {
                Ok(heap) => (heap.count(), heap.active_count().unwrap_or(0)),
                Err(_) => (0, 0),
            };
        Some(TableDescription {
            name: table.name.clone(),
            columns: table.columns.clone(),
            primary_key: table.primary_key.clone(),
            primary_index_type: table.primary_index_type,
            record_size: table.record_size(),
            total_records,
            active_records,
            indexed_columns: table
                .indexed_columns()
                .iter()
                .map(|c| c.name.clone())
                .collect(),
        })
    }
}
