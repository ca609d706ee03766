//! rowbind - bind query result rows into Rust destinations
//!
//! One fetched row can be spread over bare scalars (bound by position),
//! records (bound by field name, with embedded records flattened) and a map
//! that absorbs whatever columns are left.
//!
//! ```
//! use std::collections::HashMap;
//!
//! use rowbind::binder::{bind, Destination};
//! use rowbind::catalog::ColumnCatalog;
//! use rowbind::Value;
//!
//! #[derive(Default)]
//! struct Contact {
//!     email: Option<String>,
//! }
//! rowbind::record!(Contact { optional email });
//!
//! let catalog = ColumnCatalog::from_names(["id", "name", "email", "score"]).unwrap();
//! let row = vec![
//!     Value::Integer(7),
//!     Value::Text("ann".into()),
//!     Value::Null,
//!     Value::Float(0.5),
//! ];
//!
//! let (mut id, mut name) = (0i64, String::new());
//! let mut contact = Contact::default();
//! let mut rest: HashMap<String, Value> = HashMap::new();
//! bind(
//!     &catalog,
//!     &row,
//!     [
//!         Destination::scalar(&mut id),
//!         Destination::scalar(&mut name),
//!         Destination::record(&mut contact),
//!         Destination::map(&mut rest),
//!     ],
//! )
//! .unwrap();
//!
//! assert_eq!((id, name.as_str()), (7, "ann"));
//! assert_eq!(contact.email, None);
//! assert_eq!(rest["score"], Value::Float(0.5));
//! ```

mod macros;

pub mod binder;
pub mod catalog;
pub mod error;
pub mod rows;
pub mod types;

pub use binder::{bind, BindOptions, Binder, Destination, Field, MapSlot, Record, RecordSlot};
pub use catalog::{ColumnCatalog, ColumnDescriptor};
pub use error::{Result, RowbindError};
pub use rows::{MemorySource, RowSource, Rows};
pub use types::{Value, ValueKind};
