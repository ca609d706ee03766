//! Column descriptors for an executed query.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RowbindError};

/// Ordered column descriptors of one executed statement.
///
/// Built once per query execution and reused for every row it yields. The
/// catalog is read-only after construction, so it can be shared behind an
/// `Arc` by concurrent binds of different rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCatalog {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnCatalog {
    /// Creates a catalog from descriptors in result order.
    ///
    /// Indices are reassigned to match the position of each descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if any column name is empty.
    pub fn new(columns: Vec<ColumnDescriptor>) -> Result<Self> {
        let mut catalog = ColumnCatalog { columns };
        for (index, col) in catalog.columns.iter_mut().enumerate() {
            col.index = index;
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Creates a catalog of nullable, untyped columns from bare names.
    ///
    /// # Errors
    ///
    /// Returns an error if any column name is empty.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            names
                .into_iter()
                .map(|name| ColumnDescriptor::new(name, ""))
                .collect(),
        )
    }

    fn validate(&self) -> Result<()> {
        for col in &self.columns {
            if col.name.is_empty() {
                return Err(RowbindError::ArgumentShape(format!(
                    "Column {} has an empty name",
                    col.index
                )));
            }
        }
        Ok(())
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the catalog has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a column descriptor by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    /// Returns an iterator over the descriptors in column order.
    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter()
    }

    /// Returns all column names in column order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Groups column indices by a normalized name key.
    ///
    /// Indices inside each group are ascending. Used by the name resolver
    /// to find the lowest unclaimed column for a field.
    #[must_use]
    pub fn index_by<F>(&self, key: F) -> HashMap<String, Vec<usize>>
    where
        F: Fn(&str) -> String,
    {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for col in &self.columns {
            index.entry(key(&col.name)).or_default().push(col.index);
        }
        index
    }
}

/// Description of a single result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Position in the result, assigned by the catalog.
    pub index: usize,
    /// Column name as reported by the driver.
    pub name: String,
    /// Whether the driver reports the column as nullable.
    pub nullable: bool,
    /// Driver type name (e.g. `VARCHAR`).
    pub source_type: String,
}

impl ColumnDescriptor {
    /// Creates a nullable column descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, source_type: impl Into<String>) -> Self {
        ColumnDescriptor {
            index: 0,
            name: name.into(),
            nullable: true,
            source_type: source_type.into(),
        }
    }

    /// Sets the nullability flag.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}
