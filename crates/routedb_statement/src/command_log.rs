//! Record/replay of statement configuration.
//!
//! Every setter applied to the logical statement is appended here so it can be
//! replayed, in record order, onto native statements created later.

use routedb_common::error::StatementResult;

use crate::target::NativeStatement;

/// One supported configuration call together with its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementSetting {
    MaxRows(i32),
    MaxFieldSize(i32),
    QueryTimeout(i32),
    FetchSize(i32),
    EscapeProcessing(bool),
    Poolable(bool),
}

impl StatementSetting {
    pub fn name(&self) -> &'static str {
        match self {
            StatementSetting::MaxRows(_) => "set_max_rows",
            StatementSetting::MaxFieldSize(_) => "set_max_field_size",
            StatementSetting::QueryTimeout(_) => "set_query_timeout",
            StatementSetting::FetchSize(_) => "set_fetch_size",
            StatementSetting::EscapeProcessing(_) => "set_escape_processing",
            StatementSetting::Poolable(_) => "set_poolable",
        }
    }

    /// Dispatch this setting onto a native statement.
    pub fn apply(&self, statement: &mut dyn NativeStatement) -> StatementResult<()> {
        match *self {
            StatementSetting::MaxRows(max) => statement.set_max_rows(max),
            StatementSetting::MaxFieldSize(max) => statement.set_max_field_size(max),
            StatementSetting::QueryTimeout(secs) => statement.set_query_timeout(secs),
            StatementSetting::FetchSize(rows) => statement.set_fetch_size(rows),
            StatementSetting::EscapeProcessing(enable) => statement.set_escape_processing(enable),
            StatementSetting::Poolable(poolable) => statement.set_poolable(poolable),
        }
    }
}

/// Ordered, append-only log of configuration calls.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Vec<StatementSetting>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, setting: StatementSetting) {
        self.commands.push(setting);
    }

    /// Apply every recorded setting to `statement` in record order. Stops at
    /// the first failure and returns it.
    pub fn replay(&self, statement: &mut dyn NativeStatement) -> StatementResult<()> {
        for setting in &self.commands {
            setting.apply(statement)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatementSetting> {
        self.commands.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Cursor;
    use crate::target::KeyRetrieval;
    use routedb_common::error::{SqlWarning, StatementError};

    /// Journals every setter; fails the setter named in `fail_on`.
    #[derive(Default)]
    struct Journal {
        calls: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl Journal {
        fn note(&mut self, call: &'static str, arg: String) -> StatementResult<()> {
            if self.fail_on == Some(call) {
                return Err(StatementError::execution("journal", format!("{call} rejected")));
            }
            self.calls.push(format!("{call}({arg})"));
            Ok(())
        }
    }

    impl NativeStatement for Journal {
        fn set_max_rows(&mut self, max: i32) -> StatementResult<()> {
            self.note("set_max_rows", max.to_string())
        }
        fn set_max_field_size(&mut self, max: i32) -> StatementResult<()> {
            self.note("set_max_field_size", max.to_string())
        }
        fn set_query_timeout(&mut self, seconds: i32) -> StatementResult<()> {
            self.note("set_query_timeout", seconds.to_string())
        }
        fn set_fetch_size(&mut self, rows: i32) -> StatementResult<()> {
            self.note("set_fetch_size", rows.to_string())
        }
        fn set_escape_processing(&mut self, enable: bool) -> StatementResult<()> {
            self.note("set_escape_processing", enable.to_string())
        }
        fn set_poolable(&mut self, poolable: bool) -> StatementResult<()> {
            self.note("set_poolable", poolable.to_string())
        }
        fn execute_query(&mut self, _sql: &str) -> StatementResult<Option<Box<dyn Cursor>>> {
            Ok(None)
        }
        fn execute_update(&mut self, _sql: &str, _keys: &KeyRetrieval) -> StatementResult<i32> {
            Ok(0)
        }
        fn execute(&mut self, _sql: &str, _keys: &KeyRetrieval) -> StatementResult<bool> {
            Ok(false)
        }
        fn result_set(&mut self) -> StatementResult<Option<Box<dyn Cursor>>> {
            Ok(None)
        }
        fn update_count(&self) -> StatementResult<i32> {
            Ok(-1)
        }
        fn warnings(&self) -> StatementResult<Vec<SqlWarning>> {
            Ok(vec![])
        }
        fn clear_warnings(&mut self) -> StatementResult<()> {
            Ok(())
        }
        fn cancel(&self) -> StatementResult<()> {
            Ok(())
        }
        fn close(&mut self) -> StatementResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_replay_preserves_record_order() {
        let mut log = CommandLog::new();
        log.record(StatementSetting::FetchSize(100));
        log.record(StatementSetting::MaxRows(50));
        log.record(StatementSetting::Poolable(false));
        log.record(StatementSetting::MaxRows(10));

        let mut journal = Journal::default();
        log.replay(&mut journal).unwrap();
        assert_eq!(
            journal.calls,
            vec![
                "set_fetch_size(100)",
                "set_max_rows(50)",
                "set_poolable(false)",
                "set_max_rows(10)",
            ]
        );
    }

    #[test]
    fn test_replay_stops_at_first_failure() {
        let mut log = CommandLog::new();
        log.record(StatementSetting::MaxRows(5));
        log.record(StatementSetting::QueryTimeout(3));
        log.record(StatementSetting::EscapeProcessing(false));

        let mut journal = Journal {
            fail_on: Some("set_query_timeout"),
            ..Default::default()
        };
        let err = log.replay(&mut journal).unwrap_err();
        assert!(matches!(err, StatementError::Execution { .. }));
        assert_eq!(journal.calls, vec!["set_max_rows(5)"]);
    }

    #[test]
    fn test_clear_empties_log() {
        let mut log = CommandLog::new();
        log.record(StatementSetting::MaxFieldSize(1024));
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(log.is_empty());

        let mut journal = Journal::default();
        log.replay(&mut journal).unwrap();
        assert!(journal.calls.is_empty());
    }

    #[test]
    fn test_setting_names() {
        assert_eq!(StatementSetting::QueryTimeout(1).name(), "set_query_timeout");
        assert_eq!(StatementSetting::EscapeProcessing(true).name(), "set_escape_processing");
    }
}
