//! Column catalog of an executed query.

mod schema;

pub use schema::{ColumnCatalog, ColumnDescriptor};
