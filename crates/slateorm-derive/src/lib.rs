//! Derive macros for slateorm
//!
//! Provides `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod record;

/// Derive the `Record` trait for a struct.
///
/// # Example
///
/// ```ignore
/// use slateorm::Record;
///
/// #[derive(Default, Record)]
/// #[orm(table_name = "bill")]
/// struct Bill {
///     id: i64,
///     #[orm(column = "user_id")]
///     owner: i64,
///     #[orm(table = "u", column = "name", alias = "user_name")]
///     user_name: String,
///     #[orm(flatten)]
///     audit: Audit,
///     #[orm(skip)]
///     cached: Option<f64>,
/// }
/// ```
///
/// # Attributes
///
/// Struct level:
/// - `#[orm(table_name = "name")]` - Table name (default: lower-cased struct name)
///
/// Field level:
/// - `#[orm(column = "name")]` - Column name (default: lower-cased field name)
/// - `#[orm(alias = "name")]` - Result alias (default: the column name)
/// - `#[orm(table = "t")]` - Qualify the column with a joined table
/// - `#[orm(skip)]` - Not a column
/// - `#[orm(table_name)]` - This field's name is the table name; not a column
/// - `#[orm(flatten)]` - Merge the columns of a nested `Record`
#[proc_macro_derive(Record, attributes(orm))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
