//! # slateorm
//!
//! A session-based relational mapper over `?`-placeholder SQL.
//!
//! ## Features
//!
//! - **Fluent sessions**: accumulate table, filter, join, order, limit and group clauses, then
//!   run one terminal operation (find, select, insert, update, delete, count)
//! - **Condition maps**: ordered key → value maps become parenthesized WHERE groups with
//!   positional arguments in placeholder order
//! - **Record metadata**: `#[derive(Record)]` describes how fields map to columns; mappings
//!   are resolved once per type and cached
//! - **Forgiving row mapping**: NULL and unparsable cells become the field's zero value
//! - **Pluggable execution**: any driver behind the [`Connector`] traits; SQLite is bundled
//!
//! ## Example
//!
//! ```ignore
//! use slateorm::prelude::*;
//! use slateorm::sqlite::SqliteConnector;
//!
//! #[derive(Debug, Default, Record)]
//! struct Bill {
//!     id: i64,
//!     user_id: i64,
//!     amount: f64,
//! }
//!
//! let engine = Engine::new(SqliteConnector::open("app.db")?);
//!
//! let id = engine.table("bill").insert(field_map! { "user_id" => 11, "amount" => 9.5 })?;
//! let bill: Option<Bill> = engine.where_(field_map! { "id" => id }).find()?;
//! let big: Vec<Bill> = engine
//!     .where_(field_map! { "amount" => vlist![">", 100] })
//!     .order("id DESC")
//!     .limit(10)
//!     .select()?;
//! ```

extern crate self as slateorm;

pub mod client;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod registry;
pub mod row;
pub mod session;
pub mod statement;
pub mod value;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use client::{Connector, ExecResult, Executor, RowCursor, Statement, TransactionHandle};
pub use condition::{Combinator, Filter, between, cmp, in_list};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{OrmError, OrmResult};
pub use registry::{ColumnMapping, FieldDef, Record, RecordRegistration, Registry, TableMapping};
pub use row::{FromCell, RawRecord, RawRow};
pub use session::Session;
pub use value::{FieldMap, Value};

#[cfg(feature = "derive")]
pub use slateorm_derive::Record;

// Re-export inventory for use by derive macros
pub use inventory;
