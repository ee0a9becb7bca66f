//! Interfaces to the SQL-facing collaborators: shard-predicate extraction,
//! shard-value resolution, and ORDER BY extraction.

use std::collections::BTreeMap;

use routedb_common::datum::Datum;
use routedb_common::error::{StatementError, StatementResult};

use crate::merge::MergeSpec;

/// A shard-column value as extracted from SQL text, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ShardValue {
    Literal(Datum),
    /// A bind placeholder, 1-based.
    Placeholder(usize),
}

/// Shard column name → extracted value.
pub type ShardPredicates = BTreeMap<String, ShardValue>;

/// Shard column name → concrete value handed to the router.
pub type ResolvedShardValues = BTreeMap<String, Datum>;

pub trait ShardPredicateResolver: Send + Sync {
    fn parse(&self, sql: &str) -> StatementResult<ShardPredicates>;
}

impl<F> ShardPredicateResolver for F
where
    F: Fn(&str) -> StatementResult<ShardPredicates> + Send + Sync,
{
    fn parse(&self, sql: &str) -> StatementResult<ShardPredicates> {
        self(sql)
    }
}

pub trait OrderByResolver: Send + Sync {
    fn parse(&self, sql: &str) -> StatementResult<MergeSpec>;
}

impl<F> OrderByResolver for F
where
    F: Fn(&str) -> StatementResult<MergeSpec> + Send + Sync,
{
    fn parse(&self, sql: &str) -> StatementResult<MergeSpec> {
        self(sql)
    }
}

/// Turns an extracted shard value into the value routed on.
pub trait ShardValueResolver: Send + Sync {
    fn resolve(&self, column: &str, value: &ShardValue) -> StatementResult<Datum>;
}

/// Finds no shard predicates; every statement is routed without a key.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShardPredicates;

impl ShardPredicateResolver for NoShardPredicates {
    fn parse(&self, _sql: &str) -> StatementResult<ShardPredicates> {
        Ok(ShardPredicates::new())
    }
}

/// Reports no ORDER BY; multi-target results are concatenated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOrderBy;

impl OrderByResolver for NoOrderBy {
    fn parse(&self, _sql: &str) -> StatementResult<MergeSpec> {
        Ok(MergeSpec::unordered())
    }
}

/// Passes literals through. Placeholders cannot be resolved without bound
/// parameters and fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityValueResolver;

impl ShardValueResolver for IdentityValueResolver {
    fn resolve(&self, column: &str, value: &ShardValue) -> StatementResult<Datum> {
        match value {
            ShardValue::Literal(datum) => Ok(datum.clone()),
            ShardValue::Placeholder(idx) => Err(StatementError::resolution(format!(
                "shard column '{}' is bound to placeholder ${} but no parameters are bound",
                column, idx
            ))),
        }
    }
}

/// Substitutes bound parameters for placeholders, as a prepared statement
/// does.
#[derive(Debug, Clone, Default)]
pub struct BoundParameterResolver {
    params: Vec<Datum>,
}

impl BoundParameterResolver {
    pub fn new(params: Vec<Datum>) -> Self {
        Self { params }
    }

    /// Bind `value` at 1-based `index`, growing the list with NULLs as needed.
    pub fn bind(&mut self, index: usize, value: Datum) -> StatementResult<()> {
        if index == 0 {
            return Err(StatementError::invalid_argument("parameter index starts at 1"));
        }
        if self.params.len() < index {
            self.params.resize(index, Datum::Null);
        }
        self.params[index - 1] = value;
        Ok(())
    }

    pub fn params(&self) -> &[Datum] {
        &self.params
    }
}

impl ShardValueResolver for BoundParameterResolver {
    fn resolve(&self, column: &str, value: &ShardValue) -> StatementResult<Datum> {
        match value {
            ShardValue::Literal(datum) => Ok(datum.clone()),
            ShardValue::Placeholder(idx) => idx
                .checked_sub(1)
                .and_then(|i| self.params.get(i))
                .cloned()
                .ok_or_else(|| {
                    StatementError::resolution(format!(
                        "shard column '{}' references parameter ${} which is not bound",
                        column, idx
                    ))
                }),
        }
    }
}

/// Resolve every extracted predicate through `resolver`.
pub fn resolve_predicates(
    predicates: &ShardPredicates,
    resolver: &dyn ShardValueResolver,
) -> StatementResult<ResolvedShardValues> {
    predicates
        .iter()
        .map(|(column, value)| Ok::<_, StatementError>((column.clone(), resolver.resolve(column, value)?)))
        .collect()
}
