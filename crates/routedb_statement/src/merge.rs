//! Result merger: presents N shard cursors as one.
//!
//! Without sort keys the sources are concatenated in input order. With sort
//! keys the cursor runs an online k-way merge over one frontier row per
//! source; equal keys go to the earlier source.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use routedb_common::datum::{compare_datums, OwnedRow};
use routedb_common::error::{StatementError, StatementResult};

use crate::cursor::{ColumnDesc, Cursor};
use crate::failure::FailureAggregator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Reference to a result column from an ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// 1-based column position.
    Index(usize),
    /// Column label, matched case-insensitively.
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            column: ColumnRef::Name(name.into()),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            column: ColumnRef::Name(name.into()),
            direction: SortDirection::Desc,
        }
    }

    pub fn position(index: usize, direction: SortDirection) -> Self {
        Self {
            column: ColumnRef::Index(index),
            direction,
        }
    }
}

/// Ordered sort keys derived from ORDER BY. Empty means no global order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSpec {
    keys: Vec<SortKey>,
}

impl MergeSpec {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    pub fn unordered() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Combine `sources` into one cursor. A single source is returned as is.
pub fn merge_cursors(
    mut sources: Vec<Box<dyn Cursor>>,
    spec: &MergeSpec,
) -> StatementResult<Box<dyn Cursor>> {
    match sources.len() {
        0 => Err(StatementError::Internal("merge requires at least one source cursor".into())),
        1 => Ok(sources.remove(0)),
        _ => Ok(Box::new(MergedCursor::new(sources, spec)?)),
    }
}

type ResolvedKeys = Arc<[(usize, SortDirection)]>;

fn resolve_keys(columns: &[ColumnDesc], spec: &MergeSpec) -> StatementResult<ResolvedKeys> {
    spec.keys()
        .iter()
        .map(|key| {
            let idx = match &key.column {
                ColumnRef::Index(pos) => {
                    if *pos == 0 || (!columns.is_empty() && *pos > columns.len()) {
                        return Err(StatementError::resolution(format!(
                            "ORDER BY position {} is out of range (1..={})",
                            pos,
                            columns.len()
                        )));
                    }
                    pos - 1
                }
                ColumnRef::Name(name) => columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| {
                        StatementError::resolution(format!(
                            "ORDER BY column '{}' not found in result columns",
                            name
                        ))
                    })?,
            };
            Ok((idx, key.direction))
        })
        .collect::<StatementResult<Vec<_>>>()
        .map(Arc::from)
}

/// Compare two rows by resolved sort keys.
pub(crate) fn compare_rows_by_keys(
    a: &OwnedRow,
    b: &OwnedRow,
    keys: &[(usize, SortDirection)],
) -> Ordering {
    for &(idx, direction) in keys {
        let ord = compare_datums(a.get(idx), b.get(idx));
        let ord = match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

struct FrontierEntry {
    row: OwnedRow,
    source: usize,
    keys: ResolvedKeys,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_rows_by_keys(&self.row, &other.row, &self.keys)
            .then_with(|| self.source.cmp(&other.source))
    }
}

enum MergeState {
    Concat {
        current: usize,
    },
    Ordered {
        keys: ResolvedKeys,
        heap: BinaryHeap<Reverse<FrontierEntry>>,
        /// Sources whose first row has been pulled into the heap.
        primed: usize,
        /// Source whose frontier row was just handed out.
        refill: Option<usize>,
    },
}

/// One logical cursor over several shard cursors.
pub struct MergedCursor {
    sources: Vec<Box<dyn Cursor>>,
    state: MergeState,
    closed: bool,
}

impl MergedCursor {
    /// On a key resolution failure the sources are closed before returning.
    pub fn new(mut sources: Vec<Box<dyn Cursor>>, spec: &MergeSpec) -> StatementResult<Self> {
        let first = sources
            .first()
            .ok_or_else(|| StatementError::Internal("merge requires at least one source cursor".into()))?;

        let state = if spec.is_empty() {
            MergeState::Concat { current: 0 }
        } else {
            let keys = match resolve_keys(first.columns(), spec) {
                Ok(keys) => keys,
                Err(e) => {
                    for source in &mut sources {
                        if let Err(close_err) = source.close() {
                            tracing::warn!(error = %close_err, "closing merge source failed");
                        }
                    }
                    return Err(e);
                }
            };
            MergeState::Ordered {
                keys,
                heap: BinaryHeap::with_capacity(sources.len()),
                primed: 0,
                refill: None,
            }
        };
        routedb_observability::record_merge_metrics(!spec.is_empty(), sources.len());

        Ok(Self {
            sources,
            state,
            closed: false,
        })
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self.state, MergeState::Ordered { .. })
    }
}

impl Cursor for MergedCursor {
    fn columns(&self) -> &[ColumnDesc] {
        self.sources.first().map(|c| c.columns()).unwrap_or(&[])
    }

    fn next_row(&mut self) -> StatementResult<Option<OwnedRow>> {
        if self.closed {
            return Err(StatementError::Closed);
        }
        match &mut self.state {
            MergeState::Concat { current } => {
                while let Some(source) = self.sources.get_mut(*current) {
                    if let Some(row) = source.next_row()? {
                        return Ok(Some(row));
                    }
                    *current += 1;
                }
                Ok(None)
            }
            MergeState::Ordered {
                keys,
                heap,
                primed,
                refill,
            } => {
                while *primed < self.sources.len() {
                    if let Some(row) = self.sources[*primed].next_row()? {
                        heap.push(Reverse(FrontierEntry {
                            row,
                            source: *primed,
                            keys: Arc::clone(keys),
                        }));
                    }
                    *primed += 1;
                }
                if let Some(source) = *refill {
                    if let Some(row) = self.sources[source].next_row()? {
                        heap.push(Reverse(FrontierEntry {
                            row,
                            source,
                            keys: Arc::clone(keys),
                        }));
                    }
                    *refill = None;
                }
                match heap.pop() {
                    Some(Reverse(entry)) => {
                        *refill = Some(entry.source);
                        Ok(Some(entry.row))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    /// Closes every source even when some fail; failures come back as one
    /// composite.
    fn close(&mut self) -> StatementResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut agg = FailureAggregator::new("close_cursor");
        for (i, source) in self.sources.iter_mut().enumerate() {
            agg.attempt(&format!("source[{i}]"), source.close());
        }
        agg.finish()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn source_count(&self) -> usize {
        self.sources.len()
    }
}
