//! Statement routing core: one logical statement fanned out across shard
//! targets, with results merged and failures aggregated.
//!
//! Data paths (query, update, execute) fail fast on the first target error.
//! Administrative paths (cancel, close) attempt every target and report a
//! composite failure.

pub mod command_log;
pub mod cursor;
pub mod diagnostics;
pub mod factory;
pub mod failure;
pub mod fanout;
pub mod merge;
pub mod resolver;
pub mod router;
pub mod statement;
pub mod target;

pub use command_log::{CommandLog, StatementSetting};
pub use cursor::{collect_rows, ColumnDesc, Cursor, VecCursor};
pub use diagnostics::{DiagnosticSink, DispatchEvent, MemorySink, TracingSink};
pub use factory::{
    CreationRecipe, ResultSetConcurrency, ResultSetHoldability, ResultSetType, UnitFactory,
};
pub use failure::FailureAggregator;
pub use fanout::FanoutSet;
pub use merge::{merge_cursors, ColumnRef, MergeSpec, MergedCursor, SortDirection, SortKey};
pub use resolver::{
    resolve_predicates, BoundParameterResolver, IdentityValueResolver, NoOrderBy,
    NoShardPredicates, OrderByResolver, ResolvedShardValues, ShardPredicateResolver,
    ShardPredicates, ShardValue, ShardValueResolver,
};
pub use router::{BroadcastRouter, HashRouter, Router};
pub use statement::{CurrentResult, RoutingContext, RoutingStatement, StatementState};
pub use target::{AutoGeneratedKeys, ExecutionUnit, KeyRetrieval, NativeStatement, TargetConnection};
