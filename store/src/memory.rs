use crate::{Error, RecordStore, Result, Row, MAX_ROWS};
use oro_types::codec::ROW_WIDTH;
use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard},
};

/// Store primitive, used to inject failures into a [Memory] store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Append,
    Clear,
}

#[derive(Default)]
struct Inner {
    rows: Vec<Row>,
    failing: HashSet<Operation>,
}

/// In-process record store.
///
/// Reads see the same `A1:F1000` window as the sheet backend: at most
/// [MAX_ROWS] rows of at most six cells.
#[derive(Default)]
pub struct Memory {
    inner: Mutex<Inner>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `rows`.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        let store = Self::default();
        store.lock().rows = rows;
        store
    }

    /// Every stored row, ignoring the read window.
    pub fn rows(&self) -> Vec<Row> {
        self.lock().rows.clone()
    }

    /// Makes every subsequent `operation` fail until [Memory::recover] is called.
    pub fn fail(&self, operation: Operation) {
        self.lock().failing.insert(operation);
    }

    pub fn recover(&self) {
        self.lock().failing.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the rows half-written.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(inner: &Inner, operation: Operation) -> Result<()> {
        if inner.failing.contains(&operation) {
            return Err(Error::Unavailable(format!("{operation:?} failed")));
        }
        Ok(())
    }
}

impl RecordStore for Memory {
    async fn read_all(&self) -> Result<Vec<Row>> {
        let inner = self.lock();
        Self::check(&inner, Operation::Read)?;
        Ok(inner
            .rows
            .iter()
            .take(MAX_ROWS)
            .map(|row| row.iter().take(ROW_WIDTH).cloned().collect())
            .collect())
    }

    async fn append_rows(&self, rows: Vec<Row>) -> Result<()> {
        let mut inner = self.lock();
        Self::check(&inner, Operation::Append)?;
        inner.rows.extend(rows);
        Ok(())
    }

    async fn clear_range(&self) -> Result<()> {
        let mut inner = self.lock();
        Self::check(&inner, Operation::Clear)?;
        inner.rows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cell, ErrorKind};

    fn row(values: &[&str]) -> Row {
        values.iter().map(|v| Cell::text(*v)).collect()
    }

    #[tokio::test]
    async fn test_append_read_clear() {
        let store = Memory::new();
        assert!(store.read_all().await.unwrap().is_empty());

        store.append_rows(vec![row(&["a"]), row(&["b"])]).await.unwrap();
        store.append_rows(vec![row(&["c"])]).await.unwrap();
        assert_eq!(
            store.read_all().await.unwrap(),
            vec![row(&["a"]), row(&["b"]), row(&["c"])]
        );

        store.clear_range().await.unwrap();
        store.clear_range().await.unwrap();
        assert!(store.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_window() {
        let wide = row(&["1", "2", "3", "4", "5", "6", "7", "8"]);
        let store = Memory::with_rows(vec![wide; MAX_ROWS + 5]);
        let rows = store.read_all().await.unwrap();
        assert_eq!(rows.len(), MAX_ROWS);
        assert!(rows.iter().all(|r| r.len() == ROW_WIDTH));
        assert_eq!(store.rows().len(), MAX_ROWS + 5);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = Memory::with_rows(vec![row(&["kept"])]);
        store.fail(Operation::Clear);

        let err = store.clear_range().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(store.rows(), vec![row(&["kept"])]);

        // Other operations are unaffected.
        store.append_rows(vec![row(&["more"])]).await.unwrap();
        assert_eq!(store.read_all().await.unwrap().len(), 2);

        store.recover();
        store.clear_range().await.unwrap();
        assert!(store.rows().is_empty());
    }
}
