//! SQLite execution adapter (feature `sqlite`).
//!
//! One [`rusqlite::Connection`] behind a mutex. Statements go through the connection's
//! prepared-statement cache and rows are buffered before the lock is released.
//!
//! A transaction runs `BEGIN`/`COMMIT`/`ROLLBACK` on that connection and holds the lock until
//! it ends. Statements issued through the connector meanwhile wait for the lock, so only the
//! handle's own statements run inside the transaction. Calling the connector from the thread
//! that owns an open handle deadlocks. An uncommitted transaction is rolled back when its
//! handle is dropped.

use crate::client::{
    BufferedRows, Connector, ExecResult, Executor, RowCursor, Statement, TransactionHandle,
};
use crate::error::{OrmError, OrmResult};
use crate::row::{DATETIME_FORMAT, RawRow};
use crate::value::Value;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, ToSql, params_from_iter};
use std::ops::Deref;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A [`Connector`] over a single SQLite connection.
#[derive(Debug)]
pub struct SqliteConnector {
    conn: Mutex<Connection>,
}

impl SqliteConnector {
    pub fn open(path: impl AsRef<Path>) -> OrmResult<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> OrmResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run one or more `;`-separated statements without arguments (schema setup and the like).
    pub fn execute_batch(&self, sql: &str) -> OrmResult<()> {
        self.lock().execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Compile `sql` once so syntax errors surface at prepare time; execution reuses the cached
/// statement.
fn prepare_on<'c, C>(conn: C, sql: &str) -> OrmResult<Box<dyn Statement + 'c>>
where
    C: Deref<Target = Connection> + 'c,
{
    conn.prepare_cached(sql)?;
    Ok(Box::new(SqliteStatement {
        conn,
        sql: sql.to_string(),
    }))
}

impl Executor for SqliteConnector {
    fn prepare(&self, sql: &str) -> OrmResult<Box<dyn Statement + '_>> {
        prepare_on(self.lock(), sql)
    }
}

impl Connector for SqliteConnector {
    fn begin(&self) -> OrmResult<Box<dyn TransactionHandle + '_>> {
        let conn = self.lock();
        conn.execute_batch("BEGIN")?;
        Ok(Box::new(SqliteTransaction { conn, done: false }))
    }
}

/// A statement over a locked connection: the connector's guard, or a transaction's borrow.
struct SqliteStatement<C> {
    conn: C,
    sql: String,
}

impl<C: Deref<Target = Connection>> Statement for SqliteStatement<C> {
    fn execute(&mut self, args: &[Value]) -> OrmResult<ExecResult> {
        let mut stmt = self.conn.prepare_cached(&self.sql)?;
        let changed = stmt.execute(params_from_iter(args.iter().map(Param)))?;
        Ok(ExecResult {
            last_insert_id: self.conn.last_insert_rowid(),
            rows_affected: changed as u64,
        })
    }

    fn query(&mut self, args: &[Value]) -> OrmResult<Box<dyn RowCursor + '_>> {
        let mut stmt = self.conn.prepare_cached(&self.sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = stmt.query(params_from_iter(args.iter().map(Param)))?;
        let mut buffered = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for idx in 0..width {
                cells.push(cell_bytes(row.get_ref(idx)?));
            }
            buffered.push(RawRow::new(cells));
        }

        Ok(Box::new(BufferedRows::new(columns, buffered)))
    }
}

/// Raw cell as text bytes; numbers are rendered the way SQLite prints them.
fn cell_bytes(value: ValueRef<'_>) -> Option<Vec<u8>> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(v) => Some(v.to_string().into_bytes()),
        ValueRef::Real(v) => Some(v.to_string().into_bytes()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(bytes.to_vec()),
    }
}

struct SqliteTransaction<'c> {
    conn: MutexGuard<'c, Connection>,
    done: bool,
}

impl SqliteTransaction<'_> {
    fn finish(&mut self, sql: &str) -> OrmResult<()> {
        self.conn.execute_batch(sql)?;
        self.done = true;
        Ok(())
    }
}

impl Executor for SqliteTransaction<'_> {
    fn prepare(&self, sql: &str) -> OrmResult<Box<dyn Statement + '_>> {
        prepare_on(&*self.conn, sql)
    }
}

impl TransactionHandle for SqliteTransaction<'_> {
    fn commit(mut self: Box<Self>) -> OrmResult<()> {
        self.finish("COMMIT")
    }

    fn rollback(mut self: Box<Self>) -> OrmResult<()> {
        self.finish("ROLLBACK")
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(err) = self.finish("ROLLBACK") {
            tracing::warn!(
                target: "slateorm::sqlite",
                error = %err,
                "rollback of abandoned transaction failed"
            );
        }
    }
}

/// Binds a [`Value`] as a SQLite parameter.
struct Param<'a>(&'a Value);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let out = match self.0 {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::UInt(v) => {
                let v = i64::try_from(*v).map_err(|e| {
                    rusqlite::Error::ToSqlConversionFailure(Box::new(e))
                })?;
                ToSqlOutput::Owned(SqlValue::Integer(v))
            }
            Value::Float(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Timestamp(ts) => {
                ToSqlOutput::Owned(SqlValue::Text(ts.format(DATETIME_FORMAT).to_string()))
            }
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::List(_) => {
                return Err(rusqlite::Error::ToSqlConversionFailure(Box::new(
                    OrmError::usage("a list cannot be bound as a parameter"),
                )));
            }
        };
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::collect_rows;

    fn connector() -> SqliteConnector {
        let c = SqliteConnector::open_in_memory().unwrap();
        c.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL)")
            .unwrap();
        c
    }

    #[test]
    fn test_execute_reports_rowid_and_changes() {
        let c = connector();
        let mut stmt = c.prepare("INSERT INTO t (name, score) VALUES (?, ?)").unwrap();
        let res = stmt
            .execute(&[Value::from("a"), Value::Float(1.5)])
            .unwrap();
        assert_eq!(res.last_insert_id, 1);
        assert_eq!(res.rows_affected, 1);
    }

    #[test]
    fn test_query_renders_cells_as_text() {
        let c = connector();
        c.execute_batch("INSERT INTO t (name, score) VALUES ('x', 2.5), (NULL, NULL)")
            .unwrap();

        let mut stmt = c.prepare("SELECT id, name, score FROM t ORDER BY id").unwrap();
        let mut cursor = stmt.query(&[]).unwrap();
        let (columns, rows) = collect_rows(cursor.as_mut()).unwrap();
        assert_eq!(columns, vec!["id", "name", "score"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text(0).as_deref(), Some("1"));
        assert_eq!(rows[0].text(1).as_deref(), Some("x"));
        assert_eq!(rows[0].text(2).as_deref(), Some("2.5"));
        assert_eq!(rows[1].cell(1), None);
    }

    #[test]
    fn test_prepare_surfaces_syntax_errors() {
        let c = connector();
        assert!(c.prepare("SELEC nothing").is_err_and(|e| e.is_driver()));
    }

    #[test]
    fn test_list_parameter_is_rejected() {
        let c = connector();
        let mut stmt = c.prepare("SELECT ?").unwrap();
        assert!(stmt.query(&[Value::List(vec![Value::Int(1)])]).is_err());
    }

    #[test]
    fn test_open_transaction_holds_the_connection() {
        let c = connector();
        let tx = c.begin().unwrap();
        assert!(c.conn.try_lock().is_err());
        tx.rollback().unwrap();
        assert!(c.conn.try_lock().is_ok());
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let c = connector();
        {
            let tx = c.begin().unwrap();
            tx.prepare("INSERT INTO t (name) VALUES ('gone')")
                .unwrap()
                .execute(&[])
                .unwrap();
        }
        let mut stmt = c.prepare("SELECT COUNT(*) FROM t").unwrap();
        let mut cursor = stmt.query(&[]).unwrap();
        let row = cursor.next_row().unwrap().unwrap();
        assert_eq!(row.text(0).as_deref(), Some("0"));
    }
}
