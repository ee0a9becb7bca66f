#![allow(dead_code, unused_imports)]

pub use std::sync::Arc;

pub use parking_lot::Mutex;
pub use routedb_common::config::{ExecutionMode, RouteConfig};
pub use routedb_common::datum::{Datum, OwnedRow};
pub use routedb_common::error::{SqlWarning, StatementError, StatementResult};
pub use routedb_statement::*;

/// Every call any fake statement received, as `"<shard>:<op>[=<arg>]"`.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Journal entries of one shard, with the shard prefix stripped.
pub fn calls_of(journal: &Journal, shard: &str) -> Vec<String> {
    let prefix = format!("{shard}:");
    journal
        .lock()
        .iter()
        .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

pub fn count_op(journal: &Journal, op: &str) -> usize {
    journal
        .lock()
        .iter()
        .filter(|e| e.split(':').nth(1).map(|c| c.split('=').next() == Some(op)).unwrap_or(false))
        .count()
}

/// What a fake shard answers.
#[derive(Debug, Clone)]
pub struct Script {
    /// Rows returned by `execute_query`; `None` means "no cursor".
    pub rows: Option<Vec<OwnedRow>>,
    pub update_count: i32,
    pub execute_flag: bool,
    pub fail_create: bool,
    /// Operation names (e.g. `execute_query`, `cancel`, `set_max_rows`) that fail.
    pub fail_on: Vec<&'static str>,
    pub warnings: Vec<&'static str>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            rows: Some(Vec::new()),
            update_count: 0,
            execute_flag: true,
            fail_create: false,
            fail_on: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl Script {
    pub fn rows(ids: &[i64]) -> Self {
        Self {
            rows: Some(id_rows(ids)),
            ..Self::default()
        }
    }

    pub fn count(n: i32) -> Self {
        Self {
            update_count: n,
            ..Self::default()
        }
    }

    pub fn flag(produced: bool) -> Self {
        Self {
            execute_flag: produced,
            ..Self::default()
        }
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.fail_on.push(op);
        self
    }

    pub fn warning(mut self, message: &'static str) -> Self {
        self.warnings.push(message);
        self
    }

    pub fn uncreatable(mut self) -> Self {
        self.fail_create = true;
        self
    }
}

/// `(id, "r<id>")` rows.
pub fn id_rows(ids: &[i64]) -> Vec<OwnedRow> {
    ids.iter()
        .map(|id| OwnedRow::new(vec![Datum::Int64(*id), Datum::Text(format!("r{id}"))]))
        .collect()
}

pub fn ids_of(rows: &[OwnedRow]) -> Vec<i64> {
    rows.iter()
        .map(|r| r.get(0).and_then(|d| d.as_i64()).unwrap_or(i64::MIN))
        .collect()
}

/// The error a fake shard raises for `op`.
pub fn shard_error(shard: &str, op: &str) -> StatementError {
    StatementError::execution(shard, format!("{op} failed"))
}

pub struct FakeTarget {
    name: String,
    script: Script,
    journal: Journal,
}

impl FakeTarget {
    pub fn new(name: &str, script: Script, journal: &Journal) -> Arc<dyn TargetConnection> {
        Arc::new(Self {
            name: name.to_string(),
            script,
            journal: Arc::clone(journal),
        })
    }
}

impl TargetConnection for FakeTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_statement(&self, recipe: &CreationRecipe) -> StatementResult<Box<dyn NativeStatement>> {
        self.journal
            .lock()
            .push(format!("{}:create={:?}", self.name, recipe.holdability()));
        if self.script.fail_create {
            return Err(StatementError::unit_creation(self.name.clone(), "connection refused"));
        }
        Ok(Box::new(FakeStatement {
            name: self.name.clone(),
            script: self.script.clone(),
            journal: Arc::clone(&self.journal),
            last: Last::Nothing,
            warnings_cleared: false,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Last {
    Nothing,
    Query,
    Update,
    Execute,
}

pub struct FakeStatement {
    name: String,
    script: Script,
    journal: Journal,
    last: Last,
    warnings_cleared: bool,
}

impl FakeStatement {
    fn note(&self, op: &str, arg: Option<String>) -> StatementResult<()> {
        let entry = match arg {
            Some(arg) => format!("{}:{}={}", self.name, op, arg),
            None => format!("{}:{}", self.name, op),
        };
        self.journal.lock().push(entry);
        if self.script.fail_on.iter().any(|f| *f == op) {
            return Err(shard_error(&self.name, op));
        }
        Ok(())
    }

    fn cursor(&self) -> Option<Box<dyn Cursor>> {
        self.script
            .rows
            .clone()
            .map(|rows| Box::new(VecCursor::with_names(&["id", "label"], rows)) as Box<dyn Cursor>)
    }
}

impl NativeStatement for FakeStatement {
    fn set_max_rows(&mut self, max: i32) -> StatementResult<()> {
        self.note("set_max_rows", Some(max.to_string()))
    }

    fn set_max_field_size(&mut self, max: i32) -> StatementResult<()> {
        self.note("set_max_field_size", Some(max.to_string()))
    }

    fn set_query_timeout(&mut self, seconds: i32) -> StatementResult<()> {
        self.note("set_query_timeout", Some(seconds.to_string()))
    }

    fn set_fetch_size(&mut self, rows: i32) -> StatementResult<()> {
        self.note("set_fetch_size", Some(rows.to_string()))
    }

    fn set_escape_processing(&mut self, enable: bool) -> StatementResult<()> {
        self.note("set_escape_processing", Some(enable.to_string()))
    }

    fn set_poolable(&mut self, poolable: bool) -> StatementResult<()> {
        self.note("set_poolable", Some(poolable.to_string()))
    }

    fn execute_query(&mut self, sql: &str) -> StatementResult<Option<Box<dyn Cursor>>> {
        self.note("execute_query", Some(sql.to_string()))?;
        self.last = Last::Query;
        Ok(self.cursor())
    }

    fn execute_update(&mut self, _sql: &str, keys: &KeyRetrieval) -> StatementResult<i32> {
        self.note("execute_update", Some(format!("{keys:?}")))?;
        self.last = Last::Update;
        Ok(self.script.update_count)
    }

    fn execute(&mut self, _sql: &str, keys: &KeyRetrieval) -> StatementResult<bool> {
        self.note("execute", Some(format!("{keys:?}")))?;
        self.last = Last::Execute;
        Ok(self.script.execute_flag)
    }

    fn result_set(&mut self) -> StatementResult<Option<Box<dyn Cursor>>> {
        self.note("result_set", None)?;
        Ok(match self.last {
            Last::Query => self.cursor(),
            _ => None,
        })
    }

    fn update_count(&self) -> StatementResult<i32> {
        Ok(match self.last {
            Last::Update => self.script.update_count,
            _ => -1,
        })
    }

    fn warnings(&self) -> StatementResult<Vec<SqlWarning>> {
        if self.warnings_cleared {
            return Ok(Vec::new());
        }
        Ok(self
            .script
            .warnings
            .iter()
            .map(|w| SqlWarning::from_target(self.name.clone(), *w))
            .collect())
    }

    fn clear_warnings(&mut self) -> StatementResult<()> {
        self.note("clear_warnings", None)?;
        self.warnings_cleared = true;
        Ok(())
    }

    fn cancel(&self) -> StatementResult<()> {
        self.note("cancel", None)
    }

    fn close(&mut self) -> StatementResult<()> {
        self.note("close", None)
    }
}

/// A statement broadcasting to `targets` with default collaborators.
pub fn broadcast(targets: Vec<Arc<dyn TargetConnection>>) -> RoutingStatement {
    RoutingContext::new(Arc::new(BroadcastRouter::new(targets))).create_statement(CreationRecipe::Default)
}

/// An ORDER BY resolver that always reports `keys`.
pub fn order_by(keys: Vec<SortKey>) -> Arc<dyn OrderByResolver> {
    let spec = MergeSpec::new(keys);
    Arc::new(move |_sql: &str| -> StatementResult<MergeSpec> { Ok(spec.clone()) })
}
