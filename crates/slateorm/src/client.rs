//! Execution adapter traits.
//!
//! The session never talks to a driver directly. It prepares statements through an
//! [`Executor`] (the shared connection, or a transaction bound to the session) and reads
//! rows through a [`RowCursor`]. Implementations decide how connections are pooled, how
//! deadlines are enforced and how placeholders are bound; the core only requires `?`
//! positional placeholders.

use crate::error::OrmResult;
use crate::row::RawRow;
use crate::value::Value;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Identifier generated by the last INSERT, when the driver reports one.
    pub last_insert_id: i64,
    /// Rows changed by the statement.
    pub rows_affected: u64,
}

/// Anything statements can be prepared against.
pub trait Executor {
    /// Prepare `sql` for execution.
    fn prepare(&self, sql: &str) -> OrmResult<Box<dyn Statement + '_>>;
}

/// A prepared statement.
pub trait Statement {
    /// Run a write statement.
    fn execute(&mut self, args: &[Value]) -> OrmResult<ExecResult>;

    /// Run a read statement.
    fn query(&mut self, args: &[Value]) -> OrmResult<Box<dyn RowCursor + '_>>;
}

/// Forward-only iteration over a result set.
pub trait RowCursor {
    /// Column labels, in result order.
    fn columns(&self) -> &[String];

    /// The next row, or `None` once the result set is exhausted.
    fn next_row(&mut self) -> OrmResult<Option<RawRow>>;
}

/// The shared connection provider.
pub trait Connector: Executor + Send + Sync {
    /// Start a transaction.
    fn begin(&self) -> OrmResult<Box<dyn TransactionHandle + '_>>;
}

/// An open transaction. Statements prepared against it run inside the transaction.
pub trait TransactionHandle: Executor {
    fn commit(self: Box<Self>) -> OrmResult<()>;

    fn rollback(self: Box<Self>) -> OrmResult<()>;
}

/// A cursor over rows that are already in memory.
#[derive(Debug, Clone, Default)]
pub struct BufferedRows {
    columns: Vec<String>,
    rows: std::collections::VecDeque<RawRow>,
}

impl BufferedRows {
    pub fn new(columns: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }
}

impl RowCursor for BufferedRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> OrmResult<Option<RawRow>> {
        Ok(self.rows.pop_front())
    }
}

/// Drain a cursor into memory.
pub fn collect_rows(cursor: &mut dyn RowCursor) -> OrmResult<(Vec<String>, Vec<RawRow>)> {
    let columns = cursor.columns().to_vec();
    let mut rows = Vec::new();
    while let Some(row) = cursor.next_row()? {
        rows.push(row);
    }
    Ok((columns, rows))
}
