//! The routing statement: one logical statement handle fanned out over the
//! shard targets the router selects.
//!
//! # Failure disciplines
//!
//! - Data operations (query, update, execute) are fail-fast: the first target
//!   failure, by router order, aborts the call and is returned unchanged.
//! - Administrative operations (cancel, close) are fail-soft: every live unit
//!   is attempted and failures come back as one composite.
//!
//! # Lifecycle
//!
//! `Created` → `Executing` → `Open` → `Closed`. A new execution call first
//! closes the units of the previous one. `Closed` is terminal.

use std::sync::Arc;
use std::time::Instant;

use routedb_common::config::{ExecutionMode, RouteConfig, StatementDefaults};
use routedb_common::error::{SqlWarning, StatementError, StatementResult};

use crate::command_log::{CommandLog, StatementSetting};
use crate::cursor::Cursor;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::factory::{
    CreationRecipe, ResultSetConcurrency, ResultSetHoldability, ResultSetType, UnitFactory,
};
use crate::fanout::FanoutSet;
use crate::merge::{merge_cursors, MergeSpec};
use crate::resolver::{
    resolve_predicates, IdentityValueResolver, NoOrderBy, NoShardPredicates, OrderByResolver,
    ShardPredicateResolver, ShardValueResolver,
};
use crate::router::Router;
use crate::target::{AutoGeneratedKeys, ExecutionUnit, KeyRetrieval, NativeStatement, TargetConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// Configuration accepted and recorded; no units exist.
    Created,
    /// An execution call is creating, configuring and running units.
    Executing,
    /// Results of the last execution are available from live units.
    Open,
    Closed,
}

/// What to do with the current result when asking for more results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentResult {
    Close,
    Keep,
    CloseAll,
}

/// Collaborators shared by every statement created from one logical
/// connection.
#[derive(Clone)]
pub struct RoutingContext {
    router: Arc<dyn Router>,
    predicates: Arc<dyn ShardPredicateResolver>,
    order_by: Arc<dyn OrderByResolver>,
    sink: Arc<dyn DiagnosticSink>,
    config: Arc<RouteConfig>,
}

impl RoutingContext {
    pub fn new(router: Arc<dyn Router>) -> Self {
        Self {
            router,
            predicates: Arc::new(NoShardPredicates),
            order_by: Arc::new(NoOrderBy),
            sink: Arc::new(TracingSink),
            config: Arc::new(RouteConfig::default()),
        }
    }

    pub fn with_predicates(mut self, predicates: Arc<dyn ShardPredicateResolver>) -> Self {
        self.predicates = predicates;
        self
    }

    pub fn with_order_by(mut self, order_by: Arc<dyn OrderByResolver>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_config(mut self, config: RouteConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    pub fn create_statement(&self, recipe: CreationRecipe) -> RoutingStatement {
        RoutingStatement::new(self.clone(), recipe)
    }
}

/// Cached values reported by the getters.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StatementSettings {
    max_rows: i32,
    max_field_size: i32,
    query_timeout: i32,
    fetch_size: i32,
    escape_processing: bool,
    poolable: bool,
}

impl From<&StatementDefaults> for StatementSettings {
    fn from(d: &StatementDefaults) -> Self {
        Self {
            max_rows: d.max_rows,
            max_field_size: d.max_field_size,
            query_timeout: d.query_timeout_secs,
            fetch_size: d.fetch_size,
            escape_processing: d.escape_processing,
            poolable: d.poolable,
        }
    }
}

/// A logical statement routed across shard targets.
///
/// Not synchronized: one caller drives a handle at a time.
pub struct RoutingStatement {
    ctx: RoutingContext,
    factory: UnitFactory,
    value_resolver: Box<dyn ShardValueResolver>,
    log: CommandLog,
    units: FanoutSet,
    state: StatementState,
    sql: Option<String>,
    settings: StatementSettings,
    warnings: Vec<SqlWarning>,
}

impl RoutingStatement {
    pub fn new(ctx: RoutingContext, recipe: CreationRecipe) -> Self {
        let settings = StatementSettings::from(&ctx.config.defaults);
        Self {
            ctx,
            factory: UnitFactory::new(recipe),
            value_resolver: Box::new(IdentityValueResolver),
            log: CommandLog::new(),
            units: FanoutSet::new(),
            state: StatementState::Created,
            sql: None,
            settings,
            warnings: Vec::new(),
        }
    }

    /// Replace the shard-value hook (e.g. with bound prepared-statement
    /// parameters).
    pub fn with_value_resolver(mut self, resolver: Box<dyn ShardValueResolver>) -> Self {
        self.value_resolver = resolver;
        self
    }

    pub fn set_value_resolver(&mut self, resolver: Box<dyn ShardValueResolver>) {
        self.value_resolver = resolver;
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == StatementState::Closed
    }

    /// SQL of the most recent execution call.
    pub fn last_sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// Names of the targets with a live unit, in creation order.
    pub fn live_targets(&self) -> Vec<String> {
        self.units.target_names()
    }

    pub fn command_log(&self) -> &CommandLog {
        &self.log
    }

    // ── Configuration ───────────────────────────────────────────────────────

    pub fn max_rows(&self) -> StatementResult<i32> {
        self.ensure_open()?;
        Ok(self.settings.max_rows)
    }

    pub fn set_max_rows(&mut self, max: i32) -> StatementResult<()> {
        self.apply_setting(StatementSetting::MaxRows(max))
    }

    pub fn max_field_size(&self) -> StatementResult<i32> {
        self.ensure_open()?;
        Ok(self.settings.max_field_size)
    }

    pub fn set_max_field_size(&mut self, max: i32) -> StatementResult<()> {
        self.apply_setting(StatementSetting::MaxFieldSize(max))
    }

    /// Seconds; 0 means no timeout.
    pub fn query_timeout(&self) -> StatementResult<i32> {
        self.ensure_open()?;
        Ok(self.settings.query_timeout)
    }

    pub fn set_query_timeout(&mut self, seconds: i32) -> StatementResult<()> {
        self.apply_setting(StatementSetting::QueryTimeout(seconds))
    }

    pub fn fetch_size(&self) -> StatementResult<i32> {
        self.ensure_open()?;
        Ok(self.settings.fetch_size)
    }

    pub fn set_fetch_size(&mut self, rows: i32) -> StatementResult<()> {
        self.apply_setting(StatementSetting::FetchSize(rows))
    }

    pub fn escape_processing(&self) -> StatementResult<bool> {
        self.ensure_open()?;
        Ok(self.settings.escape_processing)
    }

    pub fn set_escape_processing(&mut self, enable: bool) -> StatementResult<()> {
        self.apply_setting(StatementSetting::EscapeProcessing(enable))
    }

    pub fn is_poolable(&self) -> StatementResult<bool> {
        self.ensure_open()?;
        Ok(self.settings.poolable)
    }

    pub fn set_poolable(&mut self, poolable: bool) -> StatementResult<()> {
        self.apply_setting(StatementSetting::Poolable(poolable))
    }

    pub fn result_set_type(&self) -> StatementResult<ResultSetType> {
        self.ensure_open()?;
        Ok(self.factory.recipe().result_type())
    }

    pub fn result_set_concurrency(&self) -> StatementResult<ResultSetConcurrency> {
        self.ensure_open()?;
        Ok(self.factory.recipe().concurrency())
    }

    pub fn result_set_holdability(&self) -> StatementResult<ResultSetHoldability> {
        self.ensure_open()?;
        Ok(self.factory.recipe().holdability())
    }

    /// Validate, cache, record, then forward to every live unit.
    fn apply_setting(&mut self, setting: StatementSetting) -> StatementResult<()> {
        self.ensure_open()?;
        let s = &mut self.settings;
        match setting {
            StatementSetting::MaxRows(v) => s.max_rows = non_negative("max rows", v)?,
            StatementSetting::MaxFieldSize(v) => s.max_field_size = non_negative("max field size", v)?,
            StatementSetting::QueryTimeout(v) => s.query_timeout = non_negative("query timeout", v)?,
            StatementSetting::FetchSize(v) => s.fetch_size = non_negative("fetch size", v)?,
            StatementSetting::EscapeProcessing(v) => s.escape_processing = v,
            StatementSetting::Poolable(v) => s.poolable = v,
        }
        self.log.record(setting);
        if self.units.is_empty() {
            return Ok(());
        }
        tracing::debug!(setting = setting.name(), units = self.units.len(), "forwarding setting to live units");
        self.units
            .try_for_each(|unit| setting.apply(unit.statement_mut()))
    }

    // ── Execution ───────────────────────────────────────────────────────────

    /// Run `sql` as a query on every routed target.
    ///
    /// Returns `None` when no target produced a cursor, the target's own
    /// cursor when exactly one did, and a merged cursor otherwise.
    pub fn execute_query(&mut self, sql: &str) -> StatementResult<Option<Box<dyn Cursor>>> {
        let started = Instant::now();
        let targets = self.prepare(sql)?;
        let spec = OrderByResolver::parse(self.ctx.order_by.as_ref(), sql)?;

        let outcome = self.fan_out(sql, &targets, |stmt| stmt.execute_query(sql));
        let results = self.finish("query", started, targets.len(), outcome)?;

        let mut cursors: Vec<Box<dyn Cursor>> = results.into_iter().flatten().collect();
        match cursors.len() {
            0 => Ok(None),
            1 => Ok(cursors.pop()),
            _ => merge_cursors(cursors, &spec).map(Some),
        }
    }

    /// Run `sql` as an update on every routed target and return the summed
    /// affected-row count.
    pub fn execute_update(&mut self, sql: &str) -> StatementResult<i32> {
        self.run_update(sql, KeyRetrieval::Unspecified)
    }

    pub fn execute_update_with_keys(
        &mut self,
        sql: &str,
        keys: AutoGeneratedKeys,
    ) -> StatementResult<i32> {
        self.run_update(sql, KeyRetrieval::Flag(keys))
    }

    pub fn execute_update_with_indexes(&mut self, sql: &str, indexes: &[i32]) -> StatementResult<i32> {
        self.run_update(sql, KeyRetrieval::ColumnIndexes(indexes.to_vec()))
    }

    pub fn execute_update_with_names(&mut self, sql: &str, names: &[&str]) -> StatementResult<i32> {
        let names = names.iter().map(|n| n.to_string()).collect();
        self.run_update(sql, KeyRetrieval::ColumnNames(names))
    }

    /// Run `sql` on every routed target. True only if every target produced
    /// a result set; every target runs even after one reports false.
    pub fn execute(&mut self, sql: &str) -> StatementResult<bool> {
        self.run_execute(sql, KeyRetrieval::Unspecified)
    }

    pub fn execute_with_keys(&mut self, sql: &str, keys: AutoGeneratedKeys) -> StatementResult<bool> {
        self.run_execute(sql, KeyRetrieval::Flag(keys))
    }

    pub fn execute_with_indexes(&mut self, sql: &str, indexes: &[i32]) -> StatementResult<bool> {
        self.run_execute(sql, KeyRetrieval::ColumnIndexes(indexes.to_vec()))
    }

    pub fn execute_with_names(&mut self, sql: &str, names: &[&str]) -> StatementResult<bool> {
        let names = names.iter().map(|n| n.to_string()).collect();
        self.run_execute(sql, KeyRetrieval::ColumnNames(names))
    }

    fn run_update(&mut self, sql: &str, keys: KeyRetrieval) -> StatementResult<i32> {
        let started = Instant::now();
        let targets = self.prepare(sql)?;
        let outcome = self.fan_out(sql, &targets, |stmt| stmt.execute_update(sql, &keys));
        let counts = self.finish("update", started, targets.len(), outcome)?;
        let total: i64 = counts.into_iter().map(i64::from).sum();
        Ok(narrow_count(total))
    }

    fn run_execute(&mut self, sql: &str, keys: KeyRetrieval) -> StatementResult<bool> {
        let started = Instant::now();
        let targets = self.prepare(sql)?;
        let outcome = self.fan_out(sql, &targets, |stmt| stmt.execute(sql, &keys));
        let flags = self.finish("execute", started, targets.len(), outcome)?;
        Ok(flags.into_iter().fold(true, |all, produced| all && produced))
    }

    /// Close the previous fan-out, resolve shard predicates and route.
    fn prepare(&mut self, sql: &str) -> StatementResult<Vec<Arc<dyn TargetConnection>>> {
        self.ensure_open()?;
        self.reset_fanout();
        self.sql = Some(sql.to_string());

        let predicates = ShardPredicateResolver::parse(self.ctx.predicates.as_ref(), sql)?;
        let values = resolve_predicates(&predicates, self.value_resolver.as_ref())?;
        let targets = self.ctx.router.route(&values)?;
        if targets.is_empty() {
            return Err(StatementError::routing(format!(
                "router returned no targets (shard values: {:?})",
                values
            )));
        }
        Ok(targets)
    }

    /// Create, configure and run one unit per target, stopping at the first
    /// failure in target order.
    fn fan_out<T, F>(
        &mut self,
        sql: &str,
        targets: &[Arc<dyn TargetConnection>],
        run: F,
    ) -> StatementResult<Vec<T>>
    where
        T: Send,
        F: Fn(&mut dyn NativeStatement) -> StatementResult<T> + Sync,
    {
        self.state = StatementState::Executing;
        match self.ctx.config.fanout.mode {
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(targets.len());
                for target in targets {
                    let unit = open_unit(&self.factory, &self.log, &mut self.units, target)?;
                    self.ctx.sink.on_dispatch(unit.target_name(), sql);
                    results.push(run(unit.statement_mut())?);
                }
                Ok(results)
            }
            ExecutionMode::Parallel => {
                for target in targets {
                    open_unit(&self.factory, &self.log, &mut self.units, target)?;
                }
                self.run_parallel(sql, &run)
            }
        }
    }

    /// Execute on every live unit on scoped threads, in batches of at most
    /// `max_parallelism`. Results and the surfaced failure follow unit order.
    fn run_parallel<T, F>(&mut self, sql: &str, run: &F) -> StatementResult<Vec<T>>
    where
        T: Send,
        F: Fn(&mut dyn NativeStatement) -> StatementResult<T> + Sync,
    {
        let batch_size = match self.ctx.config.fanout.max_parallelism {
            0 => self.units.len().max(1),
            n => n,
        };
        let sink = &self.ctx.sink;
        let mut results = Vec::with_capacity(self.units.len());

        for batch in self.units.units_mut().chunks_mut(batch_size) {
            for unit in batch.iter() {
                sink.on_dispatch(unit.target_name(), sql);
            }
            let outcomes: Vec<StatementResult<T>> = std::thread::scope(|s| {
                let handles: Vec<_> = batch
                    .iter_mut()
                    .map(|unit| s.spawn(move || run(unit.statement_mut())))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| {
                        h.join().unwrap_or_else(|_| {
                            Err(StatementError::Internal(
                                "fan-out worker panicked during execution".into(),
                            ))
                        })
                    })
                    .collect()
            });
            for outcome in outcomes {
                results.push(outcome?);
            }
        }
        Ok(results)
    }

    fn finish<T>(
        &mut self,
        op: &'static str,
        started: Instant,
        targets: usize,
        outcome: StatementResult<T>,
    ) -> StatementResult<T> {
        self.state = if self.units.is_empty() {
            StatementState::Created
        } else {
            StatementState::Open
        };
        let elapsed_us = started.elapsed().as_micros() as u64;
        routedb_observability::record_fanout_metrics(op, targets, elapsed_us, outcome.is_ok());
        if let Err(e) = &outcome {
            tracing::debug!(op, targets, units = self.units.len(), error = %e, "fan-out aborted");
        }
        outcome
    }

    /// Close the units left over from the previous execution call.
    fn reset_fanout(&mut self) {
        if self.units.is_empty() {
            return;
        }
        if let Err(e) = self.units.close_all() {
            tracing::warn!(error = %e, "previous execution units did not close cleanly");
            self.warnings.push(SqlWarning::new(format!(
                "previous execution units did not close cleanly: {e}"
            )));
        }
        self.state = StatementState::Created;
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Cancel on every live unit. Every unit is attempted; failures are
    /// raised together afterwards.
    pub fn cancel(&mut self) -> StatementResult<()> {
        self.ensure_open()?;
        self.units
            .for_each_soft("cancel", |unit| unit.statement().cancel())
    }

    /// Close every live unit and clear the command log. The handle is closed
    /// afterwards even when some unit closes failed. Closing twice is a no-op.
    pub fn close(&mut self) -> StatementResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.state = StatementState::Closed;
        let outcome = self.units.close_all();
        self.log.clear();
        self.warnings.clear();
        self.sql = None;
        tracing::debug!(failed = outcome.is_err(), "routing statement closed");
        outcome
    }

    // ── Diagnostics ─────────────────────────────────────────────────────────

    /// Router-level warnings followed by each live unit's warnings.
    pub fn warnings(&self) -> StatementResult<Vec<SqlWarning>> {
        self.ensure_open()?;
        let mut all = self.warnings.clone();
        for unit in self.units.iter() {
            all.extend(unit.statement().warnings()?);
        }
        Ok(all)
    }

    pub fn clear_warnings(&mut self) -> StatementResult<()> {
        self.ensure_open()?;
        self.warnings.clear();
        self.units
            .try_for_each(|unit| unit.statement_mut().clear_warnings())
    }

    /// Sum of the live units' update counts, or -1 if none reports one.
    pub fn update_count(&self) -> StatementResult<i32> {
        self.ensure_open()?;
        let mut total = 0i64;
        let mut any = false;
        for unit in self.units.iter() {
            let count = unit.statement().update_count()?;
            if count >= 0 {
                any = true;
                total += i64::from(count);
            }
        }
        Ok(if any { narrow_count(total) } else { -1 })
    }

    /// Current cursors of the live units, combined like `execute_query`.
    pub fn result_set(&mut self) -> StatementResult<Option<Box<dyn Cursor>>> {
        self.ensure_open()?;
        let mut cursors = Vec::new();
        for unit in self.units.iter_mut() {
            if let Some(cursor) = unit.statement_mut().result_set()? {
                cursors.push(cursor);
            }
        }
        match cursors.len() {
            0 => Ok(None),
            1 => Ok(cursors.pop()),
            _ => {
                let spec = match &self.sql {
                    Some(sql) => OrderByResolver::parse(self.ctx.order_by.as_ref(), sql)?,
                    None => MergeSpec::unordered(),
                };
                merge_cursors(cursors, &spec).map(Some)
            }
        }
    }

    /// Result-set chaining is not supported; always false.
    pub fn more_results(&self) -> StatementResult<bool> {
        self.ensure_open()?;
        Ok(false)
    }

    pub fn more_results_with(&self, _current: CurrentResult) -> StatementResult<bool> {
        self.more_results()
    }

    /// Generated keys are not collected across shards; always `None`.
    pub fn generated_keys(&self) -> StatementResult<Option<Box<dyn Cursor>>> {
        self.ensure_open()?;
        Ok(None)
    }

    fn ensure_open(&self) -> StatementResult<()> {
        if self.is_closed() {
            Err(StatementError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Drop for RoutingStatement {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "routing statement dropped with unit close failures");
        }
    }
}

/// Create a unit for `target`, register it, then replay the command log on it.
/// The unit is registered before replay so a failed replay still leaves it
/// reachable for close.
fn open_unit<'a>(
    factory: &UnitFactory,
    log: &CommandLog,
    units: &'a mut FanoutSet,
    target: &Arc<dyn TargetConnection>,
) -> StatementResult<&'a mut ExecutionUnit> {
    let unit = units.push(factory.create(target)?);
    if !log.is_empty() {
        tracing::trace!(target_name = unit.target_name(), commands = log.len(), "replaying command log");
    }
    log.replay(unit.statement_mut())?;
    Ok(unit)
}

fn non_negative(what: &str, value: i32) -> StatementResult<i32> {
    if value < 0 {
        Err(StatementError::invalid_argument(format!(
            "{what} must be >= 0, got {value}"
        )))
    } else {
        Ok(value)
    }
}

/// Narrow a summed count to the reported width, saturating at the bounds.
fn narrow_count(total: i64) -> i32 {
    i32::try_from(total).unwrap_or(if total < 0 { i32::MIN } else { i32::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_count_saturates() {
        assert_eq!(narrow_count(10), 10);
        assert_eq!(narrow_count(i64::from(i32::MAX) + 5), i32::MAX);
        assert_eq!(narrow_count(i64::from(i32::MIN) - 5), i32::MIN);
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(non_negative("fetch size", 0), Ok(0));
        assert!(matches!(
            non_negative("fetch size", -1),
            Err(StatementError::InvalidArgument(ref m)) if m.contains("fetch size")
        ));
    }
}
