//! Shared vocabulary for the routedb statement router: scalar values and rows,
//! the error hierarchy, warnings, and configuration.

pub mod config;
pub mod datum;
pub mod error;

pub use config::{ExecutionMode, FanoutConfig, LoggingConfig, RouteConfig, StatementDefaults};
pub use datum::{compare_datums, Datum, OwnedRow};
pub use error::{
    CompositeFailure, ErrorKind, SqlWarning, StatementError, StatementResult, TargetFailure,
};
