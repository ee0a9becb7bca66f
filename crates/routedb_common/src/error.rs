use std::fmt;

use thiserror::Error;

/// Convenience alias for `Result<T, StatementError>`.
pub type StatementResult<T> = Result<T, StatementError>;

/// Error classification for retry/escalation decisions.
///
/// - `UserError`: bad SQL, bad argument, operation on a closed handle
/// - `Transient`: a shard-side operation failed; the caller MAY retry
/// - `Aggregate`: several targets failed during one administrative call
/// - `InternalBug`: should never happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserError,
    Transient,
    Aggregate,
    InternalBug,
}

/// Every failure the statement router can surface.
///
/// Failures on the data path (query, update, execute) reach the caller as the
/// exact value the failing target produced. Only administrative fan-outs
/// (cancel, close) wrap their failures in [`StatementError::Composite`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatementError {
    /// Shard-predicate or ORDER BY extraction failed.
    #[error("Resolution failure: {0}")]
    Resolution(String),

    /// The router produced no usable target list.
    #[error("Routing failure: {0}")]
    Routing(String),

    #[error("Unit creation failed on {target}: {reason}")]
    UnitCreation { target: String, reason: String },

    /// A target's native operation failed.
    #[error("Execution failed on {target}: {reason}")]
    Execution {
        target: String,
        reason: String,
        sql_state: Option<String>,
    },

    #[error("{0}")]
    Composite(CompositeFailure),

    #[error("Statement is closed")]
    Closed,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StatementError {
    /// Classify this error for retry/escalation decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StatementError::Resolution(_)
            | StatementError::Closed
            | StatementError::InvalidArgument(_)
            | StatementError::Unsupported(_) => ErrorKind::UserError,
            StatementError::Routing(_)
            | StatementError::UnitCreation { .. }
            | StatementError::Execution { .. } => ErrorKind::Transient,
            StatementError::Composite(_) => ErrorKind::Aggregate,
            StatementError::Internal(_) => ErrorKind::InternalBug,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, StatementError::Closed)
    }

    pub fn is_user_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::UserError)
    }

    /// Map to an SQLSTATE code. Execution failures keep the code reported by
    /// the target when one was given.
    pub fn sql_state(&self) -> &str {
        match self {
            StatementError::Resolution(_) => "42601", // syntax_error
            StatementError::Routing(_) => "08001",    // unable to establish connection
            StatementError::UnitCreation { .. } => "08003",
            StatementError::Execution { sql_state, .. } => sql_state.as_deref().unwrap_or("HY000"),
            StatementError::Composite(_) => "HY000",
            StatementError::Closed => "HY010", // function sequence error
            StatementError::InvalidArgument(_) => "HY024",
            StatementError::Unsupported(_) => "0A000", // feature_not_supported
            StatementError::Internal(_) => "XX000",
        }
    }

    pub fn resolution(reason: impl Into<String>) -> Self {
        StatementError::Resolution(reason.into())
    }

    pub fn routing(reason: impl Into<String>) -> Self {
        StatementError::Routing(reason.into())
    }

    pub fn unit_creation(target: impl Into<String>, reason: impl Into<String>) -> Self {
        StatementError::UnitCreation {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(target: impl Into<String>, reason: impl Into<String>) -> Self {
        StatementError::Execution {
            target: target.into(),
            reason: reason.into(),
            sql_state: None,
        }
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        StatementError::InvalidArgument(reason.into())
    }
}

impl From<CompositeFailure> for StatementError {
    fn from(composite: CompositeFailure) -> Self {
        StatementError::Composite(composite)
    }
}

// ── Composite failure ───────────────────────────────────────────────────────

/// One captured failure inside a [`CompositeFailure`].
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFailure {
    pub target: String,
    pub error: StatementError,
}

/// Failures captured from one administrative call, in capture order.
///
/// An empty composite is "no failure": [`CompositeFailure::into_result`] turns
/// it into `Ok(())`, so it never reaches a caller as an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeFailure {
    causes: Vec<TargetFailure>,
}

impl CompositeFailure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a failure captured on `target`.
    pub fn stack(&mut self, target: impl Into<String>, error: StatementError) {
        self.causes.push(TargetFailure {
            target: target.into(),
            error,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn causes(&self) -> &[TargetFailure] {
        &self.causes
    }

    /// The captured errors, without their target names.
    pub fn errors(&self) -> impl Iterator<Item = &StatementError> {
        self.causes.iter().map(|c| &c.error)
    }

    pub fn into_causes(self) -> Vec<TargetFailure> {
        self.causes
    }

    pub fn into_result(self) -> StatementResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(StatementError::Composite(self))
        }
    }
}

impl fmt::Display for CompositeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} target failure(s)", self.causes.len())?;
        for (i, cause) in self.causes.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}[{}] {}", cause.target, cause.error)?;
        }
        Ok(())
    }
}

// ── Warnings ────────────────────────────────────────────────────────────────

/// A non-fatal notice raised by a target or by the router itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlWarning {
    /// Target that raised the warning; `None` for router-level warnings.
    pub target: Option<String>,
    pub message: String,
    pub sql_state: Option<String>,
}

impl SqlWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            target: None,
            message: message.into(),
            sql_state: None,
        }
    }

    pub fn from_target(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            message: message.into(),
            sql_state: None,
        }
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }
}

impl fmt::Display for SqlWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "[{target}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_composite_is_ok() {
        assert_eq!(CompositeFailure::new().into_result(), Ok(()));
    }

    #[test]
    fn test_composite_keeps_capture_order() {
        let mut composite = CompositeFailure::new();
        composite.stack("shard_b", StatementError::execution("shard_b", "cancel refused"));
        composite.stack("shard_a", StatementError::Internal("boom".into()));

        let targets: Vec<&str> = composite.causes().iter().map(|c| c.target.as_str()).collect();
        assert_eq!(targets, vec!["shard_b", "shard_a"]);

        let err = composite.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aggregate);
        let msg = err.to_string();
        assert!(msg.starts_with("2 target failure(s): [shard_b]"), "got: {msg}");
        assert!(msg.contains("; [shard_a] Internal error: boom"));
    }

    #[test]
    fn test_execution_sql_state_passthrough() {
        let err = StatementError::Execution {
            target: "s0".into(),
            reason: "duplicate key".into(),
            sql_state: Some("23505".into()),
        };
        assert_eq!(err.sql_state(), "23505");
        assert_eq!(StatementError::execution("s0", "x").sql_state(), "HY000");
        assert_eq!(StatementError::Closed.sql_state(), "HY010");
    }

    #[test]
    fn test_kind_classification() {
        assert!(StatementError::Closed.is_user_error());
        assert!(StatementError::resolution("bad where").is_user_error());
        assert_eq!(StatementError::routing("no targets").kind(), ErrorKind::Transient);
        assert_eq!(
            StatementError::unit_creation("s1", "pool exhausted").kind(),
            ErrorKind::Transient
        );
        assert_eq!(StatementError::Internal("x".into()).kind(), ErrorKind::InternalBug);
    }

    #[test]
    fn test_warning_display() {
        let w = SqlWarning::from_target("shard_0", "truncated").with_sql_state("01004");
        assert_eq!(w.to_string(), "[shard_0] truncated");
        assert_eq!(SqlWarning::new("reset").to_string(), "reset");
    }
}
