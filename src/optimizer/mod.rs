//! Cost-based access-path selection.
//!
//! The optimizer maps `(predicate kind, column index kind)` to a concrete
//! access path using a static cost table:
//!
//! | Access path | Cost |
//! |---|---|
//! | sequential_scan | 1000 |
//! | sequential_filter | 500 |
//! | hash_lookup | 1 |
//! | btree_lookup / avl_lookup | 3 |
//! | isam_lookup | 5 |
//! | btree_range / avl_range | 10 |
//! | isam_range | 15 |
//! | rtree_spatial | 20 |
//!
//! Equality on an indexed column prefers hash over the tree structures
//! over ISAM. BETWEEN uses the ordered structures; a hash-only column
//! falls back to a sequential filter (it is a point index). A spatial
//! predicate uses the R-tree when one exists. No WHERE clause is a plain
//! sequential scan.

#[cfg(test)]
mod tests;

use serde::Serialize;

use crate::catalog::Table;
use crate::schema::{DataType, Value};
use crate::sql::{Condition, DeleteStatement, IndexKind, SelectStatement};

// Static cost table (dimensionless).
pub(crate) const COST_SEQUENTIAL_SCAN: u32 = 1000;
pub(crate) const COST_SEQUENTIAL_FILTER: u32 = 500;
pub(crate) const COST_HASH_LOOKUP: u32 = 1;
pub(crate) const COST_BTREE_LOOKUP: u32 = 3;
pub(crate) const COST_AVL_LOOKUP: u32 = 3;
pub(crate) const COST_ISAM_LOOKUP: u32 = 5;
pub(crate) const COST_BTREE_RANGE: u32 = 10;
pub(crate) const COST_AVL_RANGE: u32 = 10;
pub(crate) const COST_ISAM_RANGE: u32 = 15;
pub(crate) const COST_RTREE_SPATIAL: u32 = 20;

/// How the executor will touch the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOperation {
    /// Full heap scan, no predicate.
    SequentialScan,
    /// Point lookup through an index.
    IndexScan,
    /// Ordered range through an index.
    RangeScan,
    /// Radius search through the R-tree.
    SpatialScan,
}

impl PlanOperation {
    /// Lowercase name as it appears in plan documents.
    pub fn name(self) -> &'static str {
        match self {
            PlanOperation::SequentialScan => "sequential_scan",
            PlanOperation::IndexScan => "index_scan",
            PlanOperation::RangeScan => "range_scan",
            PlanOperation::SpatialScan => "spatial_scan",
        }
    }
}

impl std::fmt::Display for PlanOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The chosen access path for one statement.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    /// Access operation.
    pub operation: PlanOperation,
    /// Index family used, when the plan goes through an index.
    pub index_type: Option<IndexKind>,
    /// The indexed column driving the plan.
    pub index_column: Option<String>,
    /// Static cost estimate.
    pub estimated_cost: u32,
    /// Human-readable summary.
    pub description: String,
}

impl ExecutionPlan {
    fn sequential(cost: u32, description: String) -> Self {
        Self {
            operation: PlanOperation::SequentialScan,
            index_type: None,
            index_column: None,
            estimated_cost: cost,
            description,
        }
    }
}

/// Stateless plan chooser over the static cost table.
#[derive(Debug, Default)]
pub struct Optimizer;

impl Optimizer {
    /// New optimizer.
    pub fn new() -> Self {
        Self
    }

    /// Choose the access path for a SELECT.
    pub fn optimize_select(&self, statement: &SelectStatement, table: &Table) -> ExecutionPlan {
        match &statement.condition {
            None => ExecutionPlan::sequential(
                COST_SEQUENTIAL_SCAN,
                format!(
                    "sequential scan of '{}' ({} bytes/record)",
                    table.name,
                    table.record_size()
                ),
            ),
            Some(condition) => self.optimize_condition(condition, table, true),
        }
    }

    /// Choose the access path for a DELETE. Spatial predicates are not
    /// part of the DELETE dialect and degrade to a filter scan.
    pub fn optimize_delete(&self, statement: &DeleteStatement, table: &Table) -> ExecutionPlan {
        match &statement.condition {
            None => ExecutionPlan::sequential(
                COST_SEQUENTIAL_SCAN,
                format!("delete every record of '{}'", table.name),
            ),
            Some(condition) => self.optimize_condition(condition, table, false),
        }
    }

    fn optimize_condition(
        &self,
        condition: &Condition,
        table: &Table,
        allow_spatial: bool,
    ) -> ExecutionPlan {
        let Some(column) = table.column(condition.column()) else {
            return ExecutionPlan::sequential(
                COST_SEQUENTIAL_SCAN,
                format!("sequential scan: column '{}' not found", condition.column()),
            );
        };

        match condition {
            Condition::Equal { value, .. } => self.equality_plan(column, value),
            Condition::Between { low, high, .. } => self.range_plan(column, low, high),
            Condition::Spatial { point, radius, .. } if allow_spatial => {
                self.spatial_plan(column, *point, *radius)
            }
            Condition::Spatial { .. } => ExecutionPlan::sequential(
                COST_SEQUENTIAL_FILTER,
                format!("filter scan: spatial predicate on '{}'", column.name),
            ),
        }
    }

    fn equality_plan(&self, column: &crate::schema::Column, value: &Value) -> ExecutionPlan {
        let Some(kind) = column.index_type.filter(|_| column.has_index) else {
            return ExecutionPlan::sequential(
                COST_SEQUENTIAL_FILTER,
                format!("filter scan on '{}' (no index)", column.name),
            );
        };
        let (cost, label) = match kind {
            IndexKind::Hash => (COST_HASH_LOOKUP, "hash"),
            IndexKind::BTree => (COST_BTREE_LOOKUP, "btree"),
            IndexKind::Avl => (COST_AVL_LOOKUP, "avl"),
            IndexKind::Isam => (COST_ISAM_LOOKUP, "isam"),
            IndexKind::RTree | IndexKind::Seq => {
                return ExecutionPlan::sequential(
                    COST_SEQUENTIAL_FILTER,
                    format!(
                        "filter scan: '{}' index on '{}' does not serve equality",
                        kind, column.name
                    ),
                );
            }
        };
        ExecutionPlan {
            operation: PlanOperation::IndexScan,
            index_type: Some(kind),
            index_column: Some(column.name.clone()),
            estimated_cost: cost,
            description: format!("{label} lookup on '{}' = {value}", column.name),
        }
    }

    fn range_plan(
        &self,
        column: &crate::schema::Column,
        low: &Value,
        high: &Value,
    ) -> ExecutionPlan {
        let Some(kind) = column.index_type.filter(|_| column.has_index) else {
            return ExecutionPlan::sequential(
                COST_SEQUENTIAL_FILTER,
                format!("filter scan on '{}' (no index)", column.name),
            );
        };
        let (cost, label) = match kind {
            IndexKind::BTree => (COST_BTREE_RANGE, "btree"),
            IndexKind::Avl => (COST_AVL_RANGE, "avl"),
            IndexKind::Isam => (COST_ISAM_RANGE, "isam"),
            // A hash is a point index; ranges degrade to a filter scan.
            IndexKind::Hash | IndexKind::RTree | IndexKind::Seq => {
                return ExecutionPlan::sequential(
                    COST_SEQUENTIAL_FILTER,
                    format!(
                        "filter scan: '{}' index on '{}' does not serve ranges",
                        kind, column.name
                    ),
                );
            }
        };
        ExecutionPlan {
            operation: PlanOperation::RangeScan,
            index_type: Some(kind),
            index_column: Some(column.name.clone()),
            estimated_cost: cost,
            description: format!(
                "{label} range scan on '{}' BETWEEN {low} AND {high}",
                column.name
            ),
        }
    }

    fn spatial_plan(
        &self,
        column: &crate::schema::Column,
        point: (f32, f32),
        radius: f32,
    ) -> ExecutionPlan {
        if !column.has_index || column.index_type != Some(IndexKind::RTree) {
            return ExecutionPlan::sequential(
                COST_SEQUENTIAL_FILTER,
                format!("filter scan: spatial predicate on '{}' (no R-tree)", column.name),
            );
        }
        ExecutionPlan {
            operation: PlanOperation::SpatialScan,
            index_type: Some(IndexKind::RTree),
            index_column: Some(column.name.clone()),
            estimated_cost: COST_RTREE_SPATIAL,
            description: format!(
                "rtree spatial scan on '{}' around ({}, {}) radius {radius}",
                column.name, point.0, point.1
            ),
        }
    }

    /// Static selectivity hint for a predicate: equality is rare, ranges
    /// scale with the numeric span, spatial with the radius.
    pub fn estimate_selectivity(&self, condition: Option<&Condition>, table: &Table) -> f64 {
        let Some(condition) = condition else {
            return 1.0;
        };
        match condition {
            Condition::Equal { .. } => 0.01,
            Condition::Between { column, low, high } => {
                let is_int = table
                    .column(column)
                    .is_some_and(|c| c.data_type == DataType::Int);
                if let (true, Value::Int(lo), Value::Int(hi)) = (is_int, low, high) {
                    let span = i64::from(*hi) - i64::from(*lo);
                    if span < 100 {
                        0.1
                    } else if span < 1000 {
                        0.3
                    } else {
                        0.5
                    }
                } else {
                    0.2
                }
            }
            Condition::Spatial { radius, .. } => {
                if *radius < 0.01 {
                    0.05
                } else if *radius < 0.1 {
                    0.15
                } else {
                    0.3
                }
            }
        }
    }
}
