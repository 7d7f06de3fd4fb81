//! Record metadata: static field descriptors and the lazily filled table-mapping cache.
//!
//! Record types describe themselves through [`Record::fields`] (normally generated by
//! `#[derive(Record)]`). The [`Registry`] turns a descriptor into a [`TableMapping`] the first
//! time a type is used and keeps it for the registry's lifetime.

use crate::error::{OrmError, OrmResult};
use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

/// Flatten depth after which a descriptor is considered cyclic.
const MAX_NESTING: usize = 16;

/// Static description of one struct field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Rust field name.
    pub attr: &'static str,
    /// Explicit column name (`#[orm(column = "...")]`).
    pub column: Option<&'static str>,
    /// Explicit result alias (`#[orm(alias = "...")]`).
    pub alias: Option<&'static str>,
    /// Table qualification for joined queries (`#[orm(table = "...")]`).
    pub table: Option<&'static str>,
    /// Excluded from the mapping (`#[orm(skip)]`).
    pub skip: bool,
    /// This field's name is the table name (`#[orm(table_name)]`).
    pub table_name: bool,
    /// Descriptor of a flattened sub-record (`#[orm(flatten)]`).
    pub nested: Option<fn() -> &'static [FieldDef]>,
}

impl FieldDef {
    /// A plain column field with every marker unset.
    pub const fn new(attr: &'static str) -> Self {
        Self {
            attr,
            column: None,
            alias: None,
            table: None,
            skip: false,
            table_name: false,
            nested: None,
        }
    }
}

/// A type whose instances are persisted and fetched through a session.
///
/// This trait should typically be derived using `#[derive(Record)]`.
///
/// # Example
///
/// ```ignore
/// use slateorm::Record;
///
/// #[derive(Debug, Default, Record)]
/// struct Bill {
///     id: i64,
///     #[orm(column = "user_id")]
///     owner: i64,
///     #[orm(skip)]
///     cached_total: f64,
/// }
/// ```
pub trait Record: Default + 'static {
    /// The Rust type name; lower-cased it is the default table name.
    const TYPE_NAME: &'static str;

    /// Field descriptors in declaration order.
    fn fields() -> &'static [FieldDef];

    /// Assign a raw cell to the field at `path`.
    ///
    /// A path is a field name, or `field.rest` to reach into a flattened sub-record (see
    /// [`ColumnMapping::attribute_path`]). Returns `None` when nothing matches the path.
    /// `Some(Err(_))` means the cell could not be coerced; the field has already been reset to
    /// its zero value.
    fn assign(&mut self, path: &str, cell: Option<&[u8]>) -> Option<OrmResult<()>>;
}

/// How one result column maps onto a record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub attribute_name: String,
    /// `attribute_name` prefixed by the flattened fields leading to it (`owner.id`).
    pub attribute_path: String,
    pub column_name: String,
    pub alias_name: String,
    /// Empty for unqualified columns.
    pub qualified_table: String,
}

impl ColumnMapping {
    /// Render this column as a SELECT list item.
    pub fn select_item(&self) -> String {
        let mut item = String::new();
        if !self.qualified_table.is_empty() {
            item.push_str(&self.qualified_table);
            item.push('.');
        }
        item.push('`');
        item.push_str(&self.column_name);
        item.push('`');
        if self.alias_name != self.column_name {
            item.push_str(" `");
            item.push_str(&self.alias_name);
            item.push('`');
        }
        item
    }
}

/// The resolved mapping of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    pub table_name: String,
    columns: Vec<ColumnMapping>,
    by_alias: HashMap<String, usize>,
}

impl TableMapping {
    /// Build the mapping of `T` from its descriptor.
    pub fn build<T: Record>() -> OrmResult<Self> {
        Self::from_fields(T::TYPE_NAME, T::fields())
    }

    /// Build a mapping from a raw descriptor.
    ///
    /// Flattened sub-records are walked breadth-first, after the fields of their parent.
    pub fn from_fields(type_name: &str, fields: &'static [FieldDef]) -> OrmResult<Self> {
        let mut table_name = type_name.to_lowercase();
        let mut has_table_marker = false;
        let mut columns: Vec<ColumnMapping> = Vec::new();
        let mut by_alias = HashMap::new();

        let mut queue: VecDeque<(&'static [FieldDef], usize, String)> = VecDeque::new();
        queue.push_back((fields, 0, String::new()));

        while let Some((defs, depth, prefix)) = queue.pop_front() {
            if depth > MAX_NESTING {
                return Err(OrmError::metadata(format!(
                    "{type_name}: flattened records nest deeper than {MAX_NESTING} levels"
                )));
            }

            for def in defs {
                if let Some(nested) = def.nested {
                    queue.push_back((nested(), depth + 1, format!("{prefix}{}.", def.attr)));
                    continue;
                }

                if def.table_name {
                    if has_table_marker {
                        tracing::warn!(
                            target: "slateorm::registry",
                            record = type_name,
                            field = def.attr,
                            "more than one table_name marker; keeping the first"
                        );
                        continue;
                    }
                    has_table_marker = true;
                    table_name = def.attr.to_lowercase();
                    continue;
                }

                if def.skip {
                    continue;
                }

                let column_name = def
                    .column
                    .map_or_else(|| def.attr.to_lowercase(), str::to_string);
                let alias_name = def.alias.map_or_else(|| column_name.clone(), str::to_string);

                if by_alias.contains_key(&alias_name) {
                    return Err(OrmError::metadata(format!(
                        "{type_name}: result alias '{alias_name}' is mapped by more than one field"
                    )));
                }

                by_alias.insert(alias_name.clone(), columns.len());
                columns.push(ColumnMapping {
                    attribute_name: def.attr.to_string(),
                    attribute_path: format!("{prefix}{}", def.attr),
                    column_name,
                    alias_name,
                    qualified_table: def.table.unwrap_or_default().to_string(),
                });
            }
        }

        if columns.is_empty() {
            return Err(OrmError::metadata(format!(
                "{type_name} has no mappable fields"
            )));
        }

        Ok(Self {
            table_name,
            columns,
            by_alias,
        })
    }

    /// Columns in descriptor order.
    pub fn columns(&self) -> &[ColumnMapping] {
        &self.columns
    }

    /// Look up a column by its result alias.
    pub fn by_alias(&self, alias: &str) -> Option<&ColumnMapping> {
        self.by_alias.get(alias).map(|&i| &self.columns[i])
    }

    /// Comma-separated SELECT list.
    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(ColumnMapping::select_item)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Registration entry for eager resolution at startup.
///
/// `#[derive(Record)]` submits one entry per type; [`Registry::preload`] resolves them all.
pub struct RecordRegistration {
    /// The record's Rust type name (diagnostics only).
    pub type_name: &'static str,
    /// Resolves the record into the given registry.
    pub register_fn: fn(&Registry) -> OrmResult<()>,
}

inventory::collect!(RecordRegistration);

/// Concurrent cache of table mappings keyed by record type.
///
/// One reader/writer lock guards the whole map: lookups share it, first-time resolution
/// holds it exclusively for the descriptor walk and the insertion.
#[derive(Debug, Default)]
pub struct Registry {
    tables: RwLock<HashMap<TypeId, Arc<TableMapping>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the mapping of `T`, resolving it on first use.
    pub fn resolve<T: Record>(&self) -> OrmResult<Arc<TableMapping>> {
        let key = TypeId::of::<T>();
        {
            let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(mapping) = tables.get(&key) {
                return Ok(Arc::clone(mapping));
            }
        }

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have resolved it between the two locks.
        if let Some(mapping) = tables.get(&key) {
            return Ok(Arc::clone(mapping));
        }

        let mapping = Arc::new(TableMapping::build::<T>()?);
        tracing::debug!(
            target: "slateorm::registry",
            record = T::TYPE_NAME,
            table = %mapping.table_name,
            columns = mapping.columns().len(),
            "registered record"
        );
        tables.insert(key, Arc::clone(&mapping));
        Ok(mapping)
    }

    /// Resolve `T` eagerly, surfacing metadata errors early.
    pub fn register<T: Record>(&self) -> OrmResult<()> {
        self.resolve::<T>().map(|_| ())
    }

    /// Resolve every record submitted by `#[derive(Record)]`.
    pub fn preload(&self) -> OrmResult<usize> {
        let mut count = 0;
        for registration in inventory::iter::<RecordRegistration> {
            (registration.register_fn)(self).map_err(|e| {
                OrmError::metadata(format!("preloading {}: {e}", registration.type_name))
            })?;
            count += 1;
        }
        Ok(count)
    }

    /// Drop the cached mapping of `T`; the next use resolves it again.
    pub fn invalidate<T: Record>(&self) -> bool {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&TypeId::of::<T>())
            .is_some()
    }

    /// Whether `T` has been resolved.
    pub fn contains<T: Record>(&self) -> bool {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests;
