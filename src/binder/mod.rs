//! Binder module for row binding.
//!
//! The binder takes one fetched row and writes its values into the
//! caller's destinations:
//! - Destinations are classified into positional scalars, named records and a map
//! - Record fields claim columns by name, then bare scalars take the rest in order
//! - Leftover columns are absorbed by the map
//! - Each value is coerced into its destination's static type

mod coerce;
mod destination;
mod options;
mod resolve;

use log::trace;

use crate::catalog::ColumnCatalog;
use crate::error::{Result, RowbindError};
use crate::types::Value;

pub use coerce::{
    coerce, coerce_into, conversion, CoerceContext, CoerceError, Coerced, Conversion, Scannable,
    TargetKind, CONVERSIONS,
};
pub use destination::{Destination, Field, Leaf, MapSlot, Record, RecordSlot};
pub use options::{BindOptions, NameMatching};
pub use resolve::{Assignment, BindingPlan};

use destination::DestinationTree;

/// Binds rows of one executed query.
///
/// The binder only borrows the catalog, so one catalog can serve any number
/// of binders, including on different threads.
#[derive(Debug, Clone)]
pub struct Binder<'c> {
    catalog: &'c ColumnCatalog,
    options: BindOptions,
}

impl<'c> Binder<'c> {
    /// Creates a binder with default options.
    #[must_use]
    pub fn new(catalog: &'c ColumnCatalog) -> Self {
        Binder {
            catalog,
            options: BindOptions::default(),
        }
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: BindOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the catalog rows are bound against.
    #[must_use]
    pub fn catalog(&self) -> &ColumnCatalog {
        self.catalog
    }

    /// Returns the active options.
    #[must_use]
    pub fn options(&self) -> &BindOptions {
        &self.options
    }

    /// Builds the binding plan for a set of destinations without writing anything.
    ///
    /// # Errors
    ///
    /// Returns the same shape and resolution errors as [`Binder::bind`].
    pub fn plan<'d, I>(&self, destinations: I) -> Result<BindingPlan>
    where
        I: IntoIterator<Item = Destination<'d>>,
    {
        let tree = DestinationTree::classify(destinations, self.options.name_matching)?;
        BindingPlan::build(self.catalog, &tree, &self.options)
    }

    /// Binds one row into the destinations.
    ///
    /// Classification and resolution complete before the first write. A
    /// coercion failure stops the call; cells written before it keep their
    /// new values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The row length differs from the catalog
    /// - A destination has an invalid shape
    /// - A column cannot be matched to exactly one destination
    /// - A value cannot be coerced into its destination
    pub fn bind<'d, I>(&self, row: &[Value], destinations: I) -> Result<()>
    where
        I: IntoIterator<Item = Destination<'d>>,
    {
        if row.len() != self.catalog.len() {
            return Err(RowbindError::RowLength {
                expected: self.catalog.len(),
                actual: row.len(),
            });
        }

        let mut tree = DestinationTree::classify(destinations, self.options.name_matching)?;
        let plan = BindingPlan::build(self.catalog, &tree, &self.options)?;
        let format = self.options.timestamp_format.as_deref();

        for (index, assignment) in plan.iter() {
            let (Some(column), Some(value)) = (self.catalog.get(index), row.get(index)) else {
                continue;
            };
            trace!("Column {index} '{}' -> {assignment:?}", column.name);
            let written = match assignment {
                Assignment::Field { group, leaf } => {
                    tree.groups[group].leaves[leaf].leaf.write(value, format)
                }
                Assignment::Positional(n) => tree.positional[n].write(value, format),
                Assignment::Map => match tree.map.as_mut() {
                    Some(map) => map.insert(&column.name, value, format),
                    None => Ok(()),
                },
                Assignment::Discarded => Ok(()),
            };
            written.map_err(|e| e.at_column(&column.name))?;
        }
        Ok(())
    }
}

/// Binds one row with default options.
///
/// # Errors
///
/// See [`Binder::bind`].
pub fn bind<'d, I>(catalog: &ColumnCatalog, row: &[Value], destinations: I) -> Result<()>
where
    I: IntoIterator<Item = Destination<'d>>,
{
    Binder::new(catalog).bind(row, destinations)
}
