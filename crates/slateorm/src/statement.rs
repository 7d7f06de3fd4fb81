//! Session clause state and statement assembly.
//!
//! Statements are built from an ordered list of clause tokens joined once at the end, so the
//! clause order (and with it the argument order) is fixed by construction:
//!
//! - SELECT: select list, FROM, joins, WHERE, ORDER BY, LIMIT, GROUP BY
//! - arguments: join arguments, then filter arguments (SELECT, COUNT);
//!   assignments, then filter arguments (UPDATE); filter arguments only (DELETE);
//!   values in field-map order (INSERT)

use crate::condition::{Combinator, Filter, render_key};
use crate::error::{OrmError, OrmResult};
use crate::registry::TableMapping;
use crate::value::{FieldMap, Value};

/// A finished statement and its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Ordered clause tokens, joined with single spaces.
#[derive(Debug, Default)]
struct Tokens {
    parts: Vec<String>,
    args: Vec<Value>,
}

impl Tokens {
    fn push(&mut self, token: impl Into<String>) -> &mut Self {
        self.parts.push(token.into());
        self
    }

    /// Push `keyword body` when `body` is non-empty.
    fn clause(&mut self, keyword: &str, body: &str) -> &mut Self {
        if !body.is_empty() {
            self.parts.push(keyword.to_string());
            self.parts.push(body.to_string());
        }
        self
    }

    fn args(&mut self, args: &[Value]) -> &mut Self {
        self.args.extend_from_slice(args);
        self
    }

    fn finish(self) -> Assembled {
        Assembled {
            sql: self.parts.join(" "),
            args: self.args,
        }
    }
}

/// Clause state accumulated by a session between terminal operations.
#[derive(Debug, Default)]
pub struct QueryState {
    pub target_table: String,
    pub select_fields: String,
    pub filter: Filter,
    pub joins: Vec<String>,
    pub join_args: Vec<Value>,
    pub order: String,
    pub group: String,
    pub limit: String,
    pub raw_statement: String,
    /// First malformed builder input, surfaced by the next terminal operation.
    pub build_error: Option<OrmError>,
}

impl QueryState {
    /// Whether no clause has been set.
    pub fn is_clear(&self) -> bool {
        self.target_table.is_empty()
            && self.select_fields.is_empty()
            && self.filter.is_empty()
            && self.joins.is_empty()
            && self.join_args.is_empty()
            && self.order.is_empty()
            && self.group.is_empty()
            && self.limit.is_empty()
            && self.raw_statement.is_empty()
            && self.build_error.is_none()
    }

    /// Add a filter group, remembering the first failure.
    pub fn apply_filter(&mut self, conditions: &FieldMap, combinator: Combinator) {
        if self.build_error.is_some() {
            return;
        }
        if let Err(err) = self.filter.apply(conditions, combinator) {
            self.build_error = Some(err);
        }
    }

    /// Fail with the deferred builder error, if any.
    pub fn check(&mut self) -> OrmResult<()> {
        match self.build_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn require_table(&self, operation: &str) -> OrmResult<&str> {
        if self.target_table.is_empty() {
            return Err(OrmError::usage(format!("{operation} requires a table name")));
        }
        Ok(&self.target_table)
    }

    fn push_joins(&self, tokens: &mut Tokens) {
        for join in &self.joins {
            tokens.push(join.as_str());
        }
        tokens.args(&self.join_args);
    }

    fn push_filter(&self, tokens: &mut Tokens) {
        tokens
            .clause("WHERE", self.filter.expr())
            .args(self.filter.args());
    }

    /// SELECT for a mapped record. The session table, when set, overrides the mapped one.
    pub fn select(&self, mapping: &TableMapping) -> Assembled {
        let table = if self.target_table.is_empty() {
            mapping.table_name.as_str()
        } else {
            self.target_table.as_str()
        };
        let list = if self.select_fields.is_empty() {
            mapping.select_list()
        } else {
            self.select_fields.clone()
        };

        let mut tokens = Tokens::default();
        tokens.push("SELECT").push(list).push("FROM").push(table);
        self.push_joins(&mut tokens);
        self.push_filter(&mut tokens);
        tokens
            .clause("ORDER BY", &self.order)
            .clause("LIMIT", &self.limit)
            .clause("GROUP BY", &self.group);
        tokens.finish()
    }

    /// `SELECT COUNT(*) c` over the table, joins and filter.
    pub fn count(&self) -> OrmResult<Assembled> {
        let table = self.require_table("count")?;
        let mut tokens = Tokens::default();
        tokens.push("SELECT COUNT(*) c").push(format!("FROM {table}"));
        self.push_joins(&mut tokens);
        self.push_filter(&mut tokens);
        Ok(tokens.finish())
    }

    pub fn insert(&self, data: &FieldMap) -> OrmResult<Assembled> {
        let table = self.require_table("insert")?;
        let args = bindable(data)?;

        let columns = data.keys().map(render_key).collect::<Vec<_>>().join(",");
        let placeholders = vec!["?"; data.len()].join(",");

        let mut tokens = Tokens::default();
        tokens
            .push("INSERT INTO")
            .push(table)
            .push(format!("({columns})"))
            .push("VALUES")
            .push(format!("({placeholders})"))
            .args(&args);
        Ok(tokens.finish())
    }

    pub fn update(&self, data: &FieldMap) -> OrmResult<Assembled> {
        let table = self.require_table("update")?;
        let args = bindable(data)?;

        let assignments = data
            .keys()
            .map(|k| format!("{}=?", render_key(k)))
            .collect::<Vec<_>>()
            .join(",");

        let mut tokens = Tokens::default();
        tokens
            .push("UPDATE")
            .push(table)
            .push("SET")
            .push(assignments)
            .args(&args);
        self.push_filter(&mut tokens);
        Ok(tokens.finish())
    }

    pub fn delete(&self) -> OrmResult<Assembled> {
        let table = self.require_table("delete")?;
        if self.filter.is_empty() {
            return Err(OrmError::usage(
                "delete requires a where clause; refusing to delete every row",
            ));
        }

        let mut tokens = Tokens::default();
        tokens.push("DELETE FROM").push(table);
        self.push_filter(&mut tokens);
        Ok(tokens.finish())
    }
}

/// Values of an insert/update payload, which must be non-empty and scalar.
fn bindable(data: &FieldMap) -> OrmResult<Vec<Value>> {
    if data.is_empty() {
        return Err(OrmError::usage("no data to write"));
    }
    data.iter()
        .map(|(key, value)| {
            if value.is_list() {
                Err(OrmError::usage(format!(
                    "field '{key}': a list cannot be bound as a column value"
                )))
            } else {
                Ok(value.clone())
            }
        })
        .collect()
}
