//! Seams to the physical side: shard connections, the native statements they
//! create, and the execution unit pairing the two.

use std::fmt;
use std::sync::Arc;

use routedb_common::error::{SqlWarning, StatementResult};

use crate::cursor::Cursor;
use crate::factory::CreationRecipe;

/// Generated-key request attached to an update or generic execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoGeneratedKeys {
    Return,
    NoReturn,
}

/// Which overload of update/execute the caller used; forwarded verbatim to
/// every target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyRetrieval {
    #[default]
    Unspecified,
    Flag(AutoGeneratedKeys),
    ColumnIndexes(Vec<i32>),
    ColumnNames(Vec<String>),
}

/// One native statement handle on one physical shard.
///
/// Errors returned here reach the caller of a data operation unchanged.
pub trait NativeStatement: Send {
    fn set_max_rows(&mut self, max: i32) -> StatementResult<()>;
    fn set_max_field_size(&mut self, max: i32) -> StatementResult<()>;
    fn set_query_timeout(&mut self, seconds: i32) -> StatementResult<()>;
    fn set_fetch_size(&mut self, rows: i32) -> StatementResult<()>;
    fn set_escape_processing(&mut self, enable: bool) -> StatementResult<()>;
    fn set_poolable(&mut self, poolable: bool) -> StatementResult<()>;

    fn execute_query(&mut self, sql: &str) -> StatementResult<Option<Box<dyn Cursor>>>;
    fn execute_update(&mut self, sql: &str, keys: &KeyRetrieval) -> StatementResult<i32>;
    /// Returns true when the statement produced a result set.
    fn execute(&mut self, sql: &str, keys: &KeyRetrieval) -> StatementResult<bool>;

    /// Current result cursor of the last execution, if any.
    fn result_set(&mut self) -> StatementResult<Option<Box<dyn Cursor>>>;
    /// Update count of the last execution, -1 when there is none.
    fn update_count(&self) -> StatementResult<i32>;

    fn warnings(&self) -> StatementResult<Vec<SqlWarning>>;
    fn clear_warnings(&mut self) -> StatementResult<()>;

    fn cancel(&self) -> StatementResult<()>;
    fn close(&mut self) -> StatementResult<()>;
}

/// A physical shard connection. Owned by the router/pool; the statement core
/// only ever holds shared references to it.
pub trait TargetConnection: Send + Sync {
    /// Identity used in diagnostics and failure reports.
    fn name(&self) -> &str;

    fn create_statement(&self, recipe: &CreationRecipe) -> StatementResult<Box<dyn NativeStatement>>;
}

impl fmt::Debug for dyn TargetConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConnection").field("name", &self.name()).finish()
    }
}

/// A native statement created for one target during one execution call.
pub struct ExecutionUnit {
    target: Arc<dyn TargetConnection>,
    statement: Box<dyn NativeStatement>,
}

impl ExecutionUnit {
    pub fn new(target: Arc<dyn TargetConnection>, statement: Box<dyn NativeStatement>) -> Self {
        Self { target, statement }
    }

    pub fn target_name(&self) -> &str {
        self.target.name()
    }

    pub fn target(&self) -> &Arc<dyn TargetConnection> {
        &self.target
    }

    pub fn statement(&self) -> &dyn NativeStatement {
        self.statement.as_ref()
    }

    pub fn statement_mut(&mut self) -> &mut dyn NativeStatement {
        self.statement.as_mut()
    }
}

impl fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("target", &self.target_name())
            .finish_non_exhaustive()
    }
}
