//! The fan-out set: live execution units of the current execution call.

use routedb_common::error::StatementResult;

use crate::failure::FailureAggregator;
use crate::target::ExecutionUnit;

/// Ordered, exclusively owned collection of live execution units.
///
/// Grows only while an execution call runs and is closed and cleared as a
/// whole by [`FanoutSet::close_all`].
#[derive(Debug, Default)]
pub struct FanoutSet {
    units: Vec<ExecutionUnit>,
}

impl FanoutSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit and hand back a reference to it.
    pub fn push(&mut self, unit: ExecutionUnit) -> &mut ExecutionUnit {
        self.units.push(unit);
        let last = self.units.len() - 1;
        &mut self.units[last]
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionUnit> {
        self.units.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ExecutionUnit> {
        self.units.iter_mut()
    }

    pub(crate) fn units_mut(&mut self) -> &mut [ExecutionUnit] {
        &mut self.units
    }

    pub fn target_names(&self) -> Vec<String> {
        self.units.iter().map(|u| u.target_name().to_string()).collect()
    }

    /// Apply `f` to every unit in order, stopping at the first failure.
    pub fn try_for_each<F>(&mut self, mut f: F) -> StatementResult<()>
    where
        F: FnMut(&mut ExecutionUnit) -> StatementResult<()>,
    {
        for unit in &mut self.units {
            f(unit)?;
        }
        Ok(())
    }

    /// Apply `f` to every unit in order regardless of earlier failures and
    /// raise the captured failures as one composite.
    pub fn for_each_soft<F>(&mut self, op: &'static str, mut f: F) -> StatementResult<()>
    where
        F: FnMut(&mut ExecutionUnit) -> StatementResult<()>,
    {
        let mut agg = FailureAggregator::new(op);
        for unit in &mut self.units {
            let outcome = f(unit);
            agg.attempt(unit.target_name(), outcome);
        }
        agg.finish()
    }

    /// Close every unit and empty the set. The set is empty afterwards even
    /// when some closes failed.
    pub fn close_all(&mut self) -> StatementResult<()> {
        if self.units.is_empty() {
            return Ok(());
        }
        tracing::debug!(units = self.units.len(), "closing fan-out set");
        let mut agg = FailureAggregator::new("close");
        for mut unit in self.units.drain(..) {
            let outcome = unit.statement_mut().close();
            agg.attempt(unit.target_name(), outcome);
        }
        agg.finish()
    }
}
