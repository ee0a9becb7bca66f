//! Router seam plus two reference routers.
//!
//! The placement algorithm proper belongs to the embedding application; the
//! routers here cover broadcast and single-column hash placement.

use std::sync::Arc;

use routedb_common::datum::Datum;
use routedb_common::error::{StatementError, StatementResult};
use xxhash_rust::xxh3::xxh3_64;

use crate::resolver::ResolvedShardValues;
use crate::target::TargetConnection;

/// Maps resolved shard values to the targets a statement must run on, in
/// execution order.
pub trait Router: Send + Sync {
    fn route(&self, values: &ResolvedShardValues) -> StatementResult<Vec<Arc<dyn TargetConnection>>>;
}

impl<F> Router for F
where
    F: Fn(&ResolvedShardValues) -> StatementResult<Vec<Arc<dyn TargetConnection>>> + Send + Sync,
{
    fn route(&self, values: &ResolvedShardValues) -> StatementResult<Vec<Arc<dyn TargetConnection>>> {
        self(values)
    }
}

/// Sends every statement to every target.
pub struct BroadcastRouter {
    targets: Vec<Arc<dyn TargetConnection>>,
}

impl BroadcastRouter {
    pub fn new(targets: Vec<Arc<dyn TargetConnection>>) -> Self {
        Self { targets }
    }
}

impl Router for BroadcastRouter {
    fn route(&self, _values: &ResolvedShardValues) -> StatementResult<Vec<Arc<dyn TargetConnection>>> {
        Ok(self.targets.clone())
    }
}

/// Hash placement on one shard column: `xxh3(value) % targets`. Statements
/// without a value for the column are broadcast.
pub struct HashRouter {
    shard_column: String,
    targets: Vec<Arc<dyn TargetConnection>>,
}

impl HashRouter {
    pub fn new(shard_column: impl Into<String>, targets: Vec<Arc<dyn TargetConnection>>) -> Self {
        Self {
            shard_column: shard_column.into(),
            targets,
        }
    }

    /// Index of the target owning `value`.
    pub fn target_index(&self, value: &Datum) -> Option<usize> {
        if self.targets.is_empty() {
            return None;
        }
        let mut buf = Vec::with_capacity(16);
        encode_datum_for_hash(&mut buf, value);
        Some((xxh3_64(&buf) % self.targets.len() as u64) as usize)
    }
}

impl Router for HashRouter {
    fn route(&self, values: &ResolvedShardValues) -> StatementResult<Vec<Arc<dyn TargetConnection>>> {
        let value = values
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(&self.shard_column))
            .map(|(_, v)| v);
        match value {
            None => Ok(self.targets.clone()),
            Some(v) => {
                let idx = self.target_index(v).ok_or_else(|| {
                    StatementError::routing(format!(
                        "no targets registered for shard column '{}'",
                        self.shard_column
                    ))
                })?;
                Ok(vec![Arc::clone(&self.targets[idx])])
            }
        }
    }
}

/// Type tag + value bytes. Integers of either width share one encoding so a
/// literal routes the same way as the stored column.
fn encode_datum_for_hash(buf: &mut Vec<u8>, datum: &Datum) {
    match datum {
        Datum::Null => buf.push(0x00),
        Datum::Boolean(b) => {
            buf.push(0x01);
            buf.push(u8::from(*b));
        }
        Datum::Int32(_) | Datum::Int64(_) => {
            buf.push(0x03);
            buf.extend_from_slice(&datum.as_i64().unwrap_or_default().to_le_bytes());
        }
        Datum::Float64(v) => {
            buf.push(0x04);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Datum::Text(s) => {
            buf.push(0x05);
            buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        Datum::Timestamp(us) => {
            buf.push(0x06);
            buf.extend_from_slice(&us.to_le_bytes());
        }
        Datum::Date(days) => {
            buf.push(0x07);
            buf.extend_from_slice(&days.to_le_bytes());
        }
        Datum::Decimal(m, s) => {
            buf.push(0x08);
            buf.push(*s);
            buf.extend_from_slice(&m.to_le_bytes());
        }
        Datum::Bytea(bytes) => {
            buf.push(0x09);
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
    }
}
