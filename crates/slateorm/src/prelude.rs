//! Convenient imports for typical `slateorm` usage.
//!
//! ```ignore
//! use slateorm::prelude::*;
//! ```

pub use crate::{Engine, EngineConfig, FieldMap, OrmError, OrmResult, Record, Session, Value};
pub use crate::{between, cmp, field_map, in_list, vlist};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteConnector;
