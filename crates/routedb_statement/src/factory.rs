//! Execution unit factory: one creation recipe, fixed when the logical
//! statement is built, applied to every target it fans out to.

use std::sync::Arc;

use routedb_common::error::StatementResult;

use crate::target::{ExecutionUnit, TargetConnection};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultSetType {
    #[default]
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultSetConcurrency {
    #[default]
    ReadOnly,
    Updatable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultSetHoldability {
    #[default]
    HoldCursorsOverCommit,
    CloseCursorsAtCommit,
}

/// How native statements are created on each target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreationRecipe {
    #[default]
    Default,
    Typed {
        result_type: ResultSetType,
        concurrency: ResultSetConcurrency,
    },
    Holdable {
        result_type: ResultSetType,
        concurrency: ResultSetConcurrency,
        holdability: ResultSetHoldability,
    },
}

impl CreationRecipe {
    pub fn typed(result_type: ResultSetType, concurrency: ResultSetConcurrency) -> Self {
        CreationRecipe::Typed {
            result_type,
            concurrency,
        }
    }

    pub fn holdable(
        result_type: ResultSetType,
        concurrency: ResultSetConcurrency,
        holdability: ResultSetHoldability,
    ) -> Self {
        CreationRecipe::Holdable {
            result_type,
            concurrency,
            holdability,
        }
    }

    pub fn result_type(&self) -> ResultSetType {
        match self {
            CreationRecipe::Default => ResultSetType::default(),
            CreationRecipe::Typed { result_type, .. }
            | CreationRecipe::Holdable { result_type, .. } => *result_type,
        }
    }

    pub fn concurrency(&self) -> ResultSetConcurrency {
        match self {
            CreationRecipe::Default => ResultSetConcurrency::default(),
            CreationRecipe::Typed { concurrency, .. }
            | CreationRecipe::Holdable { concurrency, .. } => *concurrency,
        }
    }

    pub fn holdability(&self) -> ResultSetHoldability {
        match self {
            CreationRecipe::Holdable { holdability, .. } => *holdability,
            _ => ResultSetHoldability::default(),
        }
    }
}

/// Creates one execution unit per target. Creation failures are returned as
/// the target produced them and are never retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitFactory {
    recipe: CreationRecipe,
}

impl UnitFactory {
    pub fn new(recipe: CreationRecipe) -> Self {
        Self { recipe }
    }

    pub fn recipe(&self) -> &CreationRecipe {
        &self.recipe
    }

    pub fn create(&self, target: &Arc<dyn TargetConnection>) -> StatementResult<ExecutionUnit> {
        let statement = target.create_statement(&self.recipe)?;
        Ok(ExecutionUnit::new(Arc::clone(target), statement))
    }
}
