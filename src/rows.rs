//! Row cursor over a driver-provided [`RowSource`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::binder::{BindOptions, Binder, Destination};
use crate::catalog::{ColumnCatalog, ColumnDescriptor};
use crate::error::{Result, RowbindError};
use crate::types::Value;

/// Result cursor of one executed statement, implemented by the driver.
pub trait RowSource {
    /// Column descriptors, in result order.
    fn columns(&self) -> &[ColumnDescriptor];

    /// Fetches the next row, or `None` after the last one.
    ///
    /// # Errors
    ///
    /// Returns [`RowbindError::Driver`] on fetch failure.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>>;

    /// Releases the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`RowbindError::Driver`] if release fails.
    fn close(&mut self) -> Result<()>;
}

/// Fetch-and-bind cursor.
///
/// The source is closed when the last row has been read, on an explicit
/// [`Rows::close`], or when the cursor is dropped.
pub struct Rows<S: RowSource> {
    source: S,
    catalog: Arc<ColumnCatalog>,
    options: BindOptions,
    current: Option<Vec<Value>>,
    closed: bool,
}

impl<S: RowSource> Rows<S> {
    /// Opens a cursor, capturing the source's columns once.
    ///
    /// # Errors
    ///
    /// Returns an error if the source reports an empty column name.
    pub fn new(source: S) -> Result<Self> {
        let catalog = Arc::new(ColumnCatalog::new(source.columns().to_vec())?);
        debug!("Opened rows with {} column(s)", catalog.len());
        Ok(Rows {
            source,
            catalog,
            options: BindOptions::default(),
            current: None,
            closed: false,
        })
    }

    /// Replaces the options used by [`Rows::scan`].
    #[must_use]
    pub fn with_options(mut self, options: BindOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the shared column catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<ColumnCatalog> {
        &self.catalog
    }

    /// Moves to the next row. Returns false once the rows are exhausted.
    ///
    /// # Errors
    ///
    /// Returns the source's error if fetching fails.
    pub fn advance(&mut self) -> Result<bool> {
        if self.closed {
            self.current = None;
            return Ok(false);
        }
        match self.source.next_row() {
            Ok(Some(row)) => {
                self.current = Some(row);
                Ok(true)
            }
            Ok(None) => {
                self.current = None;
                self.close()?;
                Ok(false)
            }
            Err(e) => {
                self.current = None;
                Err(e)
            }
        }
    }

    /// Returns the values of the current row.
    #[must_use]
    pub fn current(&self) -> Option<&[Value]> {
        self.current.as_deref()
    }

    /// Binds the current row into the destinations.
    ///
    /// # Errors
    ///
    /// Returns [`RowbindError::NoCurrentRow`] before the first
    /// [`Rows::advance`] or after the last row, otherwise any error of
    /// [`Binder::bind`].
    pub fn scan<'d, I>(&self, destinations: I) -> Result<()>
    where
        I: IntoIterator<Item = Destination<'d>>,
    {
        let row = self.current.as_deref().ok_or(RowbindError::NoCurrentRow)?;
        Binder::new(&self.catalog)
            .with_options(self.options.clone())
            .bind(row, destinations)
    }

    /// Closes the source. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the source's error if release fails.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.current = None;
        self.source.close()
    }

    /// Returns true once the source has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<S: RowSource> Drop for Rows<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close rows: {e}");
        }
    }
}

/// In-memory [`RowSource`] over owned rows.
#[derive(Debug, Default)]
pub struct MemorySource {
    columns: Vec<ColumnDescriptor>,
    rows: VecDeque<Vec<Value>>,
    fail_after: Option<(usize, String)>,
    fetched: usize,
    closed: Arc<AtomicBool>,
}

impl MemorySource {
    /// Creates a source yielding `rows` in order.
    #[must_use]
    pub fn new(columns: Vec<ColumnDescriptor>, rows: Vec<Vec<Value>>) -> Self {
        MemorySource {
            columns,
            rows: rows.into(),
            fail_after: None,
            fetched: 0,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes the fetch after `rows` successful fetches fail with a driver error.
    #[must_use]
    pub fn with_failure_after(mut self, rows: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((rows, message.into()));
        self
    }

    /// Flag that turns true when the source is closed.
    #[must_use]
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl RowSource for MemorySource {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RowbindError::Driver("source is closed".into()));
        }
        if let Some((after, message)) = &self.fail_after {
            if self.fetched == *after {
                return Err(RowbindError::Driver(message.clone()));
            }
        }
        let row = self.rows.pop_front();
        if row.is_some() {
            self.fetched += 1;
        }
        Ok(row)
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MemorySource {
        MemorySource::new(
            vec![ColumnDescriptor::new("id", "BIGINT"), ColumnDescriptor::new("name", "TEXT")],
            vec![
                vec![Value::Integer(1), Value::Text("a".into())],
                vec![Value::Integer(2), Value::Text("b".into())],
            ],
        )
    }

    #[test]
    fn test_iterates_and_closes_at_end() {
        let src = source();
        let closed = src.closed_flag();
        let mut rows = Rows::new(src).unwrap();
        let mut ids = Vec::new();
        while rows.advance().unwrap() {
            let (mut id, mut name) = (0i64, String::new());
            rows.scan([Destination::scalar(&mut id), Destination::scalar(&mut name)])
                .unwrap();
            ids.push(id);
        }
        assert_eq!(ids, vec![1, 2]);
        assert!(rows.is_closed());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_scan_without_row() {
        let rows = Rows::new(source()).unwrap();
        let mut id = 0i64;
        let err = rows.scan([Destination::scalar(&mut id)]).unwrap_err();
        assert_eq!(err, RowbindError::NoCurrentRow);
    }

    #[test]
    fn test_drop_closes_source() {
        let src = source();
        let closed = src.closed_flag();
        {
            let mut rows = Rows::new(src).unwrap();
            assert!(rows.advance().unwrap());
        }
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_driver_failure_surfaces() {
        let mut rows = Rows::new(source().with_failure_after(1, "connection reset")).unwrap();
        assert!(rows.advance().unwrap());
        let err = rows.advance().unwrap_err();
        assert_eq!(err, RowbindError::Driver("connection reset".into()));
        assert!(rows.current().is_none());
    }
}
