//! Fail-soft collection of per-target failures for administrative fan-outs.
//!
//! Data operations stop at the first failing target. Cancel and close must
//! reach every target, so their failures are captured here and raised once,
//! after the loop, as a single composite.

use routedb_common::error::{CompositeFailure, StatementResult};

pub struct FailureAggregator {
    op: &'static str,
    composite: CompositeFailure,
    attempted: usize,
}

impl FailureAggregator {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            composite: CompositeFailure::new(),
            attempted: 0,
        }
    }

    /// Note the outcome of the operation on `target`. Never fails.
    pub fn attempt(&mut self, target: &str, outcome: StatementResult<()>) {
        self.attempted += 1;
        if let Err(e) = outcome {
            tracing::warn!(op = self.op, target, error = %e, "administrative operation failed on target");
            self.composite.stack(target, e);
        }
    }

    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn failed(&self) -> usize {
        self.composite.len()
    }

    /// `Ok(())` when nothing failed, otherwise one composite holding every
    /// captured failure in attempt order.
    pub fn finish(self) -> StatementResult<()> {
        if !self.composite.is_empty() {
            tracing::debug!(
                op = self.op,
                attempted = self.attempted,
                failed = self.composite.len(),
                "administrative fan-out finished with failures"
            );
        }
        routedb_observability::record_admin_failures(self.op, self.composite.len());
        self.composite.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routedb_common::error::StatementError;

    #[test]
    fn test_all_success_is_silent() {
        let mut agg = FailureAggregator::new("cancel");
        agg.attempt("s0", Ok(()));
        agg.attempt("s1", Ok(()));
        assert_eq!(agg.attempted(), 2);
        assert_eq!(agg.failed(), 0);
        assert_eq!(agg.finish(), Ok(()));
    }

    #[test]
    fn test_failures_do_not_stop_collection() {
        let mut agg = FailureAggregator::new("close");
        agg.attempt("s0", Err(StatementError::execution("s0", "first")));
        agg.attempt("s1", Ok(()));
        agg.attempt("s2", Err(StatementError::execution("s2", "third")));
        assert_eq!(agg.attempted(), 3);

        match agg.finish() {
            Err(StatementError::Composite(c)) => {
                let targets: Vec<&str> = c.causes().iter().map(|f| f.target.as_str()).collect();
                assert_eq!(targets, vec!["s0", "s2"]);
            }
            other => panic!("expected composite, got {other:?}"),
        }
    }
}
