//! Predicate builder: condition maps to WHERE fragments.
//!
//! A condition map is an ordered [`FieldMap`] whose values are either scalars (equality) or
//! operator sequences:
//!
//! ```ignore
//! use slateorm::{field_map, vlist};
//!
//! field_map! {
//!     "user_id" => 11,                          // `user_id` =?
//!     "u.age" => vlist![">=", 18],              // u.`age`>= ?
//!     "status" => vlist!["IN", vec![1, 2, 3]],  // `status`IN (?,?,?)
//!     "score" => vlist!["BETWEEN", 10, 20],     // `score`BETWEEN ? and ?
//! }
//! ```
//!
//! Every [`Filter::apply`] call contributes one parenthesized group joined to what is already
//! there with `AND` or `OR`; groups never nest.

use crate::error::{OrmError, OrmResult};
use crate::value::{FieldMap, Value};

/// Comparison operators accepted as `[operator, value]`.
const COMPARISON_OPS: [&str; 8] = ["=", ">", ">=", "<", "<=", "<>", "!=", "LIKE"];

/// How a new group joins the existing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    fn keyword(self) -> &'static str {
        match self {
            Combinator::And => "AND",
            Combinator::Or => "OR",
        }
    }
}

/// A validated predicate for one key.
#[derive(Debug, PartialEq)]
enum Predicate<'a> {
    IsNull,
    Compare { op: &'static str, value: &'a Value },
    In(Vec<&'a Value>),
    Between(&'a Value, &'a Value),
}

fn scalar<'a>(key: &str, value: &'a Value) -> OrmResult<&'a Value> {
    if value.is_list() {
        return Err(OrmError::usage(format!(
            "condition '{key}': expected a scalar, got a nested list"
        )));
    }
    Ok(value)
}

fn parse_predicate<'a>(key: &str, value: &'a Value) -> OrmResult<Predicate<'a>> {
    let items = match value {
        Value::Null => return Ok(Predicate::IsNull),
        Value::List(items) => items,
        other => {
            return Ok(Predicate::Compare {
                op: "=",
                value: other,
            });
        }
    };

    if items.len() < 2 {
        return Err(OrmError::usage(format!(
            "condition '{key}': expected [operator, value], got {} element(s)",
            items.len()
        )));
    }

    let Some(op) = items[0].as_text() else {
        return Err(OrmError::usage(format!(
            "condition '{key}': operator must be text, got {}",
            items[0].kind()
        )));
    };
    let op = op.trim().to_uppercase();

    if let Some(op) = COMPARISON_OPS.iter().find(|candidate| **candidate == op) {
        if items.len() != 2 {
            return Err(OrmError::usage(format!(
                "condition '{key}': {op} takes exactly one value"
            )));
        }
        return Ok(Predicate::Compare {
            op: *op,
            value: scalar(key, &items[1])?,
        });
    }

    match op.as_str() {
        "IN" => {
            if items.len() != 2 {
                return Err(OrmError::usage(format!(
                    "condition '{key}': IN takes one scalar or one list"
                )));
            }
            match &items[1] {
                Value::List(values) => {
                    if values.is_empty() {
                        return Err(OrmError::usage(format!(
                            "condition '{key}': IN list is empty"
                        )));
                    }
                    let values = values
                        .iter()
                        .map(|v| scalar(key, v))
                        .collect::<OrmResult<Vec<_>>>()?;
                    Ok(Predicate::In(values))
                }
                single => Ok(Predicate::In(vec![single])),
            }
        }
        "BETWEEN" => match items.len() {
            3 => Ok(Predicate::Between(
                scalar(key, &items[1])?,
                scalar(key, &items[2])?,
            )),
            2 => match &items[1] {
                Value::List(pair) if pair.len() == 2 => Ok(Predicate::Between(
                    scalar(key, &pair[0])?,
                    scalar(key, &pair[1])?,
                )),
                _ => Err(OrmError::usage(format!(
                    "condition '{key}': BETWEEN needs [low, high]"
                ))),
            },
            n => Err(OrmError::usage(format!(
                "condition '{key}': BETWEEN takes two bounds, got {} value(s)",
                n - 1
            ))),
        },
        other => Err(OrmError::usage(format!(
            "condition '{key}': unsupported operator '{other}'"
        ))),
    }
}

/// Backtick a condition key; a `table.column` key keeps its qualifier outside the quotes.
pub fn render_key(key: &str) -> String {
    match key.find('.') {
        Some(idx) if idx > 0 => format!("{}.`{}`", &key[..idx], &key[idx + 1..]),
        _ => format!("`{key}`"),
    }
}

fn render(key: &str, predicate: Predicate<'_>, sql: &mut String, args: &mut Vec<Value>) {
    let col = render_key(key);
    match predicate {
        Predicate::IsNull => {
            sql.push_str(&col);
            sql.push_str(" IS NULL");
        }
        Predicate::Compare { op: "=", value } => {
            sql.push_str(&col);
            sql.push_str(" =?");
            args.push(value.clone());
        }
        Predicate::Compare { op, value } => {
            sql.push_str(&col);
            sql.push_str(op);
            sql.push_str(" ? ");
            args.push(value.clone());
        }
        Predicate::In(values) => {
            sql.push_str(&col);
            sql.push_str("IN (");
            for (i, value) in values.into_iter().enumerate() {
                if i > 0 {
                    sql.push(',');
                }
                sql.push('?');
                args.push(value.clone());
            }
            sql.push_str(") ");
        }
        Predicate::Between(low, high) => {
            sql.push_str(&col);
            sql.push_str("BETWEEN ? and ? ");
            args.push(low.clone());
            args.push(high.clone());
        }
    }
}

/// Build the fragment for one condition map (keys joined with `AND`).
///
/// Nothing is rendered unless every entry is valid.
pub fn build_group(conditions: &FieldMap) -> OrmResult<(String, Vec<Value>)> {
    let predicates = conditions
        .iter()
        .map(|(key, value)| parse_predicate(key, value).map(|p| (key, p)))
        .collect::<OrmResult<Vec<_>>>()?;

    let mut sql = String::new();
    let mut args = Vec::new();
    for (i, (key, predicate)) in predicates.into_iter().enumerate() {
        if i > 0 {
            sql.push_str(" AND ");
        }
        render(key, predicate, &mut sql, &mut args);
    }
    Ok((sql, args))
}

/// An accumulated filter expression and its positional arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    expr: String,
    args: Vec<Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one parenthesized group. An empty condition map is a no-op.
    pub fn apply(&mut self, conditions: &FieldMap, combinator: Combinator) -> OrmResult<()> {
        if conditions.is_empty() {
            return Ok(());
        }

        let (group, args) = build_group(conditions)?;
        if self.expr.is_empty() {
            self.expr.push_str(" (");
        } else {
            self.expr.push(' ');
            self.expr.push_str(combinator.keyword());
            self.expr.push_str(" (");
        }
        self.expr.push_str(&group);
        self.expr.push(')');
        self.args.extend(args);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.expr.is_empty()
    }

    /// The expression text, without the `WHERE` keyword.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.expr, self.args)
    }
}

/// `[op, value]` payload.
pub fn cmp(op: &str, value: impl Into<Value>) -> Value {
    Value::List(vec![Value::Text(op.to_string()), value.into()])
}

/// `["IN", [values...]]` payload.
pub fn in_list<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Value {
    Value::List(vec![
        Value::Text("IN".to_string()),
        Value::List(values.into_iter().map(Into::into).collect()),
    ])
}

/// `["BETWEEN", low, high]` payload.
pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Value {
    Value::List(vec![
        Value::Text("BETWEEN".to_string()),
        low.into(),
        high.into(),
    ])
}

#[cfg(test)]
mod tests;
