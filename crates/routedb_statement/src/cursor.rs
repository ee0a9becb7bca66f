//! Forward-only result cursors.

use routedb_common::datum::OwnedRow;
use routedb_common::error::{StatementError, StatementResult};

/// Column description reported by a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub type_name: String,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// The subset of a relational result-set the router needs: column metadata,
/// forward row iteration, and close.
pub trait Cursor: Send {
    fn columns(&self) -> &[ColumnDesc];

    /// Next row, or `None` once the cursor is exhausted.
    fn next_row(&mut self) -> StatementResult<Option<OwnedRow>>;

    fn close(&mut self) -> StatementResult<()>;

    fn is_closed(&self) -> bool;

    /// Number of shard cursors feeding this one.
    fn source_count(&self) -> usize {
        1
    }
}

/// Drain every remaining row of `cursor`.
pub fn collect_rows(cursor: &mut dyn Cursor) -> StatementResult<Vec<OwnedRow>> {
    let mut rows = Vec::new();
    while let Some(row) = cursor.next_row()? {
        rows.push(row);
    }
    Ok(rows)
}

/// Cursor over rows already held in memory.
#[derive(Debug, Clone)]
pub struct VecCursor {
    columns: Vec<ColumnDesc>,
    rows: std::vec::IntoIter<OwnedRow>,
    closed: bool,
}

impl VecCursor {
    pub fn new(columns: Vec<ColumnDesc>, rows: Vec<OwnedRow>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
            closed: false,
        }
    }

    /// Build column descriptions from the first row's value types.
    pub fn with_names(names: &[&str], rows: Vec<OwnedRow>) -> Self {
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let type_name = rows
                    .first()
                    .and_then(|r| r.get(i))
                    .map(|d| d.type_name())
                    .unwrap_or("null");
                ColumnDesc::new(*name, type_name)
            })
            .collect();
        Self::new(columns, rows)
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Cursor for VecCursor {
    fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    fn next_row(&mut self) -> StatementResult<Option<OwnedRow>> {
        if self.closed {
            return Err(StatementError::Closed);
        }
        Ok(self.rows.next())
    }

    fn close(&mut self) -> StatementResult<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
