//! Row mapping: raw textual cells to typed record fields.

use crate::error::{OrmError, OrmResult};
use crate::registry::{Record, TableMapping};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;

/// Canonical date-time text format for cells and echoed arguments.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canonical date text format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One result row: nullable raw bytes per column, in cursor column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<Option<Vec<u8>>>,
}

impl RawRow {
    pub fn new(cells: Vec<Option<Vec<u8>>>) -> Self {
        Self { cells }
    }

    /// Convenience constructor from optional text cells.
    pub fn from_text<S: AsRef<str>>(cells: impl IntoIterator<Item = Option<S>>) -> Self {
        Self {
            cells: cells
                .into_iter()
                .map(|c| c.map(|s| s.as_ref().as_bytes().to_vec()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The raw bytes of column `idx`; `None` for SQL NULL or out-of-range.
    pub fn cell(&self, idx: usize) -> Option<&[u8]> {
        self.cells.get(idx).and_then(|c| c.as_deref())
    }

    /// The cell of column `idx` as lossy UTF-8 text.
    pub fn text(&self, idx: usize) -> Option<String> {
        self.cell(idx).map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

/// A raw-query result row keyed by column label; NULL cells are `None`.
pub type RawRecord = HashMap<String, Option<String>>;

/// Turn a cursor row into a [`RawRecord`].
pub fn to_raw_record(columns: &[String], row: &RawRow) -> RawRecord {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.clone(), row.text(i)))
        .collect()
}

/// Parse a non-null textual cell into a field type.
///
/// A NULL cell never reaches `from_cell`: it maps to `Default::default()`, the zero value.
pub trait FromCell: Default + Sized {
    fn from_cell(raw: &[u8]) -> Result<Self, String>;
}

fn cell_str(raw: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(raw).map_err(|e| format!("invalid utf-8: {e}"))
}

impl FromCell for String {
    fn from_cell(raw: &[u8]) -> Result<Self, String> {
        Ok(String::from_utf8_lossy(raw).into_owned())
    }
}

macro_rules! impl_from_cell_parse {
    ($($t:ty),*) => {
        $(impl FromCell for $t {
            fn from_cell(raw: &[u8]) -> Result<Self, String> {
                let text = cell_str(raw)?;
                text.trim()
                    .parse::<$t>()
                    .map_err(|e| format!("cannot parse '{text}' as {}: {e}", stringify!($t)))
            }
        })*
    };
}

impl_from_cell_parse!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl FromCell for bool {
    fn from_cell(raw: &[u8]) -> Result<Self, String> {
        match cell_str(raw)?.trim() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            other => Err(format!("cannot parse '{other}' as bool")),
        }
    }
}

impl FromCell for NaiveDateTime {
    fn from_cell(raw: &[u8]) -> Result<Self, String> {
        let text = cell_str(raw)?.trim();
        NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
            .map_err(|e| format!("cannot parse '{text}' as datetime: {e}"))
    }
}

impl FromCell for NaiveDate {
    fn from_cell(raw: &[u8]) -> Result<Self, String> {
        let text = cell_str(raw)?.trim();
        NaiveDate::parse_from_str(text, DATE_FORMAT)
            .map_err(|e| format!("cannot parse '{text}' as date: {e}"))
    }
}

impl FromCell for DateTime<Utc> {
    fn from_cell(raw: &[u8]) -> Result<Self, String> {
        NaiveDateTime::from_cell(raw).map(|naive| naive.and_utc())
    }
}

impl<T: FromCell> FromCell for Option<T> {
    fn from_cell(raw: &[u8]) -> Result<Self, String> {
        T::from_cell(raw).map(Some)
    }
}

/// Store `cell` into `slot`, falling back to the zero value.
///
/// Used by `#[derive(Record)]`. The error is returned for reporting only; `slot` already
/// holds the zero value when it is.
pub fn assign_cell<T: FromCell>(slot: &mut T, attr: &str, cell: Option<&[u8]>) -> OrmResult<()> {
    match cell {
        None => {
            *slot = T::default();
            Ok(())
        }
        Some(raw) => match T::from_cell(raw) {
            Ok(value) => {
                *slot = value;
                Ok(())
            }
            Err(message) => {
                *slot = T::default();
                Err(OrmError::decode(attr, message))
            }
        },
    }
}

/// Populate `target` from one row.
///
/// Columns without a mapping are ignored. Coercion failures are logged and leave the zero
/// value in place; they never abort the row.
pub fn map_row<T: Record>(
    mapping: &TableMapping,
    columns: &[String],
    row: &RawRow,
    target: &mut T,
) {
    for (idx, label) in columns.iter().enumerate() {
        let Some(column) = mapping.by_alias(label) else {
            continue;
        };

        match target.assign(&column.attribute_path, row.cell(idx)) {
            Some(Ok(())) => {}
            Some(Err(err)) => {
                tracing::warn!(
                    target: "slateorm::row",
                    record = T::TYPE_NAME,
                    column = %label,
                    error = %err,
                    "cell coerced to zero value"
                );
            }
            None => {
                tracing::warn!(
                    target: "slateorm::row",
                    record = T::TYPE_NAME,
                    attribute = %column.attribute_path,
                    "mapped attribute has no assignable field"
                );
            }
        }
    }
}

/// Map every row into a fresh `T`, in arrival order.
pub fn map_rows<T: Record>(
    mapping: &TableMapping,
    columns: &[String],
    rows: &[RawRow],
) -> Vec<T> {
    rows.iter()
        .map(|row| {
            let mut record = T::default();
            map_row(mapping, columns, row, &mut record);
            record
        })
        .collect()
}
