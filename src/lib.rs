//! # VeloxDB
//!
//! An educational, embeddable **multi-index relational storage engine**.
//! It ingests a restricted SQL dialect, persists heap-organized record
//! files, and maintains a family of secondary indices — each backed by its
//! own on-disk file — behind a cost-based access-path optimizer.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Database                            │
//! │                                                            │
//! │  SQL text ──► parser ──► executor ──► optimizer            │
//! │                             │              │               │
//! │                             ▼              ▼               │
//! │                         ┌────────┐   ┌──────────────┐      │
//! │                         │ catalog│   │ access path  │      │
//! │                         └───┬────┘   └──────┬───────┘      │
//! │                             │               │              │
//! │              ┌──────────────┴───────────────┴──────────┐   │
//! │              │             index manager               │   │
//! │              │  AVL │ B+ tree │ ext. hash │ ISAM │ R*  │   │
//! │              └──────────────────┬──────────────────────┘   │
//! │                                 ▼                          │
//! │                       heap record file                     │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`encoding`] | Little-endian fixed-width binary primitives |
//! | [`schema`] | Data types, tagged values, columns, record codec |
//! | [`heap`] | Fixed-slot record file with tombstone deletion |
//! | [`index`] | Secondary indices (AVL, B+, hash, ISAM, R-tree) and their manager |
//! | [`catalog`] | Per-table metadata documents and directory lifecycle |
//! | [`sql`] | Statement AST and dialect parser |
//! | [`optimizer`] | Cost-based access-path selection |
//! | [`executor`] | CREATE / INSERT / DELETE / SELECT execution |
//! | [`csv`] | CSV bulk loading into heap + indices |
//! | [`engine`] | The [`Database`] facade and its wire-level response shapes |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use veloxdb::Database;
//!
//! let mut db = Database::open("/tmp/velox").unwrap();
//!
//! db.execute("CREATE TABLE products ( id INT KEY INDEX HASH, name VARCHAR[20] )");
//! db.execute("INSERT INTO products VALUES (1, \"espresso\"), (2, \"latte\")");
//!
//! let res = db.execute("SELECT * FROM products WHERE id = 2");
//! assert_eq!(res.count, 1);
//! ```
//!
//! ## What this engine is not
//!
//! No transactions, no concurrent writers, no crash recovery, no joins or
//! aggregation. The engine assumes exclusive access: at most one in-flight
//! call per process. Callers are responsible for serialization.

#![allow(dead_code)]

pub mod catalog;
pub mod csv;
pub mod encoding;
pub mod engine;
pub mod executor;
pub mod heap;
pub mod index;
pub mod optimizer;
pub mod schema;
pub mod sql;

pub use engine::{Database, PlanResponse, QueryResponse, StatsResponse};
pub use executor::QueryOutcome;
pub use schema::{Column, DataType, Record, Value};
