//! Query sessions: fluent clause accumulation and terminal operations.
//!
//! A [`Session`] collects clauses through `&mut self` builder calls and turns them into one
//! statement when a terminal operation (find, select, insert, update, delete, count, raw
//! query/exec) runs. The clause state is taken out of the session before anything fallible
//! happens, so the next operation always starts clean whether the previous one succeeded
//! or not.
//!
//! # Example
//!
//! ```ignore
//! use slateorm::{Engine, field_map, vlist};
//!
//! let engine = Engine::new(connector);
//! let total = engine.table("bill").where_(field_map! { "user_id" => 11 }).count()?;
//!
//! let mut session = engine.session();
//! let bills: Vec<Bill> = session
//!     .where_(field_map! { "amount" => vlist![">", 100] })
//!     .order("id DESC")
//!     .page(2, 20)
//!     .select()?;
//! ```

use crate::client::{ExecResult, Executor, TransactionHandle, collect_rows};
use crate::condition::Combinator;
use crate::engine::Engine;
use crate::error::{OrmError, OrmResult};
use crate::registry::Record;
use crate::row::{RawRecord, RawRow, map_row, map_rows, to_raw_record};
use crate::statement::{Assembled, QueryState};
use crate::value::{FieldMap, Value};

/// A per-caller query builder bound to an [`Engine`].
pub struct Session<'e> {
    engine: &'e Engine,
    state: QueryState,
    tx: Option<Box<dyn TransactionHandle + 'e>>,
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("in_transaction", &self.tx.is_some())
            .finish()
    }
}

impl<'e> Session<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            state: QueryState::default(),
            tx: None,
        }
    }

    // ==================== Builder ====================

    /// Target table. For reads it overrides the record's mapped table.
    pub fn table(&mut self, name: &str) -> &mut Self {
        self.state.target_table = name.to_string();
        self
    }

    /// Explicit select list, used verbatim instead of the mapped columns.
    pub fn fields(&mut self, list: &str) -> &mut Self {
        self.state.select_fields = list.to_string();
        self
    }

    /// Add a condition group joined with `AND`.
    ///
    /// A malformed condition is remembered and returned by the next terminal operation.
    pub fn where_(&mut self, conditions: impl Into<FieldMap>) -> &mut Self {
        self.state.apply_filter(&conditions.into(), Combinator::And);
        self
    }

    /// Add a condition group joined with `OR`.
    pub fn or_where(&mut self, conditions: impl Into<FieldMap>) -> &mut Self {
        self.state.apply_filter(&conditions.into(), Combinator::Or);
        self
    }

    /// Append a join fragment such as `LEFT JOIN user u ON u.id = b.user_id`.
    pub fn join(&mut self, fragment: &str) -> &mut Self {
        self.state.joins.push(fragment.to_string());
        self
    }

    /// Append a join fragment with its own `?` arguments.
    ///
    /// Join arguments are bound before any filter argument.
    pub fn join_with<V: Into<Value>>(
        &mut self,
        fragment: &str,
        args: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.state.joins.push(fragment.to_string());
        self.state.join_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn order(&mut self, expr: &str) -> &mut Self {
        self.state.order = expr.to_string();
        self
    }

    pub fn group(&mut self, expr: &str) -> &mut Self {
        self.state.group = expr.to_string();
        self
    }

    pub fn limit(&mut self, count: usize) -> &mut Self {
        self.state.limit = count.to_string();
        self
    }

    /// Zero-based page of `size` rows: renders `LIMIT page*size,size`.
    pub fn page(&mut self, page: usize, size: usize) -> &mut Self {
        self.state.limit = format!("{},{}", page.saturating_mul(size), size);
        self
    }

    /// Use `expr` verbatim as the LIMIT body.
    pub fn limit_raw(&mut self, expr: &str) -> &mut Self {
        self.state.limit = expr.to_string();
        self
    }

    /// Set a raw statement for [`query`](Self::query) or [`exec`](Self::exec).
    pub fn prepare(&mut self, sql: &str) -> &mut Self {
        self.state.raw_statement = sql.to_string();
        self
    }

    /// Whether no clause is pending.
    pub fn is_clear(&self) -> bool {
        self.state.is_clear()
    }

    // ==================== Transactions ====================

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Start a transaction; every statement runs inside it until commit or rollback.
    pub fn begin(&mut self) -> OrmResult<()> {
        if self.tx.is_some() {
            return Err(OrmError::usage("a transaction is already open"));
        }
        self.tx = Some(self.engine.connector().begin()?);
        tracing::debug!(target: "slateorm::session", "transaction started");
        Ok(())
    }

    pub fn commit(&mut self) -> OrmResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| OrmError::usage("commit without an open transaction"))?;
        tx.commit()?;
        tracing::debug!(target: "slateorm::session", "transaction committed");
        Ok(())
    }

    pub fn rollback(&mut self) -> OrmResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| OrmError::usage("rollback without an open transaction"))?;
        tx.rollback()?;
        tracing::debug!(target: "slateorm::session", "transaction rolled back");
        Ok(())
    }

    /// Run `body` inside a transaction.
    ///
    /// - Commits on `Ok(_)`.
    /// - Rolls back on `Err(_)`.
    pub fn transaction<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> OrmResult<T>,
    ) -> OrmResult<T> {
        self.begin()?;
        match body(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(error) => match self.rollback() {
                Ok(()) => Err(error),
                Err(rollback_err) => Err(OrmError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }

    // ==================== Terminal operations ====================

    /// Fetch at most one row into `target`. Returns whether a row was found.
    ///
    /// `target` is left untouched when no row matches.
    pub fn find_into<T: Record>(&mut self, target: &mut T) -> OrmResult<bool> {
        let mut state = std::mem::take(&mut self.state);
        state.check()?;
        let mapping = self.engine.registry().resolve::<T>()?;
        state.limit = "1".to_string();

        let (columns, rows) = self.fetch(&state.select(&mapping))?;
        match rows.first() {
            Some(row) => {
                map_row(&mapping, &columns, row, target);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fetch at most one row.
    pub fn find<T: Record>(&mut self) -> OrmResult<Option<T>> {
        let mut record = T::default();
        Ok(self.find_into(&mut record)?.then_some(record))
    }

    /// Fetch every matching row and append it to `dest` in arrival order.
    ///
    /// With no rows, `dest` becomes `Some(vec![])` when
    /// [`EngineConfig::empty_select_as_empty_vec`](crate::EngineConfig) is set and is left
    /// untouched otherwise.
    pub fn select_into<T: Record>(&mut self, dest: &mut Option<Vec<T>>) -> OrmResult<()> {
        let mut state = std::mem::take(&mut self.state);
        state.check()?;
        let mapping = self.engine.registry().resolve::<T>()?;

        let (columns, rows) = self.fetch(&state.select(&mapping))?;
        if rows.is_empty() {
            if self.engine.config().empty_select_as_empty_vec {
                *dest = Some(Vec::new());
            }
            return Ok(());
        }

        dest.get_or_insert_with(Vec::new)
            .extend(map_rows::<T>(&mapping, &columns, &rows));
        Ok(())
    }

    /// Fetch every matching row.
    pub fn select<T: Record>(&mut self) -> OrmResult<Vec<T>> {
        let mut out = None;
        self.select_into(&mut out)?;
        Ok(out.unwrap_or_default())
    }

    /// Insert one row. Returns the generated identifier reported by the driver.
    pub fn insert(&mut self, data: impl Into<FieldMap>) -> OrmResult<i64> {
        let mut state = std::mem::take(&mut self.state);
        state.check()?;
        let stmt = state.insert(&data.into())?;
        Ok(self.execute(&stmt)?.last_insert_id)
    }

    /// Update matching rows. Returns the number of rows changed.
    pub fn update(&mut self, data: impl Into<FieldMap>) -> OrmResult<u64> {
        let mut state = std::mem::take(&mut self.state);
        state.check()?;
        let stmt = state.update(&data.into())?;
        Ok(self.execute(&stmt)?.rows_affected)
    }

    /// Delete matching rows. A filter is required.
    pub fn delete(&mut self) -> OrmResult<u64> {
        let mut state = std::mem::take(&mut self.state);
        state.check()?;
        let stmt = state.delete()?;
        Ok(self.execute(&stmt)?.rows_affected)
    }

    /// Count matching rows.
    pub fn count(&mut self) -> OrmResult<i64> {
        let mut state = std::mem::take(&mut self.state);
        state.check()?;
        let stmt = state.count()?;

        let (_, rows) = self.fetch(&stmt)?;
        let row = rows
            .first()
            .ok_or_else(|| OrmError::usage("count returned no row"))?;
        let text = row.text(0).unwrap_or_default();
        text.trim()
            .parse::<i64>()
            .map_err(|_| OrmError::decode("c", format!("count is not an integer: '{text}'")))
    }

    /// Run the prepared raw statement and return its rows as column → text maps.
    pub fn query(&mut self, args: &[Value]) -> OrmResult<Vec<RawRecord>> {
        let stmt = self.take_raw(args)?;
        let (columns, rows) = self.fetch(&stmt)?;
        Ok(rows.iter().map(|row| to_raw_record(&columns, row)).collect())
    }

    /// Run the prepared raw statement as a write.
    pub fn exec(&mut self, args: &[Value]) -> OrmResult<ExecResult> {
        let stmt = self.take_raw(args)?;
        self.execute(&stmt)
    }

    // ==================== Execution ====================

    fn take_raw(&mut self, args: &[Value]) -> OrmResult<Assembled> {
        let state = std::mem::take(&mut self.state);
        if state.raw_statement.is_empty() {
            return Err(OrmError::usage("no statement prepared"));
        }
        Ok(Assembled {
            sql: state.raw_statement,
            args: args.to_vec(),
        })
    }

    fn executor(&self) -> &dyn Executor {
        if let Some(tx) = &self.tx {
            return &**tx;
        }
        self.engine.connector()
    }

    fn fetch(&self, stmt: &Assembled) -> OrmResult<(Vec<String>, Vec<RawRow>)> {
        self.engine.config().log_sql(&stmt.sql, &stmt.args);
        let mut prepared = self.executor().prepare(&stmt.sql)?;
        let mut cursor = prepared.query(&stmt.args)?;
        collect_rows(cursor.as_mut())
    }

    fn execute(&self, stmt: &Assembled) -> OrmResult<ExecResult> {
        self.engine.config().log_sql(&stmt.sql, &stmt.args);
        let mut prepared = self.executor().prepare(&stmt.sql)?;
        prepared.execute(&stmt.args)
    }
}
