use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single scalar value flowing through a shard cursor or a shard predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Text(String),
    Timestamp(i64), // microseconds since Unix epoch
    Date(i32),      // days since Unix epoch (1970-01-01)
    /// Fixed-point decimal: mantissa × 10^(-scale).
    Decimal(i128, u8),
    Bytea(Vec<u8>),
}

impl Datum {
    /// SQL-ish name of the value's type, used in column descriptions.
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Boolean(_) => "boolean",
            Datum::Int32(_) => "int4",
            Datum::Int64(_) => "int8",
            Datum::Float64(_) => "float8",
            Datum::Text(_) => "text",
            Datum::Timestamp(_) => "timestamp",
            Datum::Date(_) => "date",
            Datum::Decimal(_, _) => "numeric",
            Datum::Bytea(_) => "bytea",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Int32(v) => Some(*v as i64),
            Datum::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Int32(v) => Some(*v as f64),
            Datum::Int64(v) => Some(*v as f64),
            Datum::Float64(v) => Some(*v),
            Datum::Decimal(m, s) => Some(*m as f64 / 10f64.powi(*s as i32)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Total order used when interleaving shard cursors.
    ///
    /// NULL sorts before every non-null value. Numeric types compare across
    /// widths; values of unrelated types compare equal.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Datum::Null, Datum::Null) => Ordering::Equal,
            (Datum::Null, _) => Ordering::Less,
            (_, Datum::Null) => Ordering::Greater,
            (Datum::Boolean(a), Datum::Boolean(b)) => a.cmp(b),
            (Datum::Int32(a), Datum::Int32(b)) => a.cmp(b),
            (Datum::Int64(a), Datum::Int64(b)) => a.cmp(b),
            (Datum::Int32(a), Datum::Int64(b)) => (*a as i64).cmp(b),
            (Datum::Int64(a), Datum::Int32(b)) => a.cmp(&(*b as i64)),
            (Datum::Text(a), Datum::Text(b)) => a.cmp(b),
            (Datum::Timestamp(a), Datum::Timestamp(b)) => a.cmp(b),
            (Datum::Date(a), Datum::Date(b)) => a.cmp(b),
            (Datum::Bytea(a), Datum::Bytea(b)) => a.cmp(b),
            (Datum::Decimal(a, sa), Datum::Decimal(b, sb)) => decimal_cmp(*a, *sa, *b, *sb),
            (Datum::Decimal(a, sa), Datum::Int64(b)) => decimal_cmp(*a, *sa, i128::from(*b), 0),
            (Datum::Int64(a), Datum::Decimal(b, sb)) => decimal_cmp(i128::from(*a), 0, *b, *sb),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Boolean(b) => write!(f, "{}", b),
            Datum::Int32(v) => write!(f, "{}", v),
            Datum::Int64(v) => write!(f, "{}", v),
            Datum::Float64(v) => write!(f, "{}", v),
            Datum::Text(s) => write!(f, "{}", s),
            Datum::Timestamp(us) => write!(f, "{}", us),
            Datum::Date(days) => write!(f, "{}", days),
            Datum::Decimal(m, s) => write!(f, "{}", decimal_to_string(*m, *s)),
            Datum::Bytea(bytes) => {
                write!(f, "\\x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl From<i32> for Datum {
    fn from(v: i32) -> Self {
        Datum::Int32(v)
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int64(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Text(v.to_string())
    }
}

impl From<String> for Datum {
    fn from(v: String) -> Self {
        Datum::Text(v)
    }
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Datum::Boolean(v)
    }
}

/// A row is an ordered list of datums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedRow {
    pub values: Vec<Datum>,
}

impl OwnedRow {
    pub fn new(values: Vec<Datum>) -> Self {
        Self { values }
    }

    pub fn get(&self, idx: usize) -> Option<&Datum> {
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for OwnedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

/// Compare two optional datums; a missing value sorts like NULL.
pub fn compare_datums(a: Option<&Datum>, b: Option<&Datum>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(d)) => Datum::Null.sort_cmp(d),
        (Some(d), None) => d.sort_cmp(&Datum::Null),
        (Some(da), Some(db)) => da.sort_cmp(db),
    }
}

// ── Decimal helpers ─────────────────────────────────────────────────────────

/// (12345, 2) → "123.45", (-1, 3) → "-0.001", (100, 0) → "100"
pub fn decimal_to_string(mantissa: i128, scale: u8) -> String {
    if scale == 0 {
        return mantissa.to_string();
    }
    let negative = mantissa < 0;
    let s = mantissa.unsigned_abs().to_string();
    let scale = scale as usize;
    let result = if s.len() <= scale {
        format!("0.{}{}", "0".repeat(scale - s.len()), s)
    } else {
        let (int_part, frac_part) = s.split_at(s.len() - scale);
        format!("{}.{}", int_part, frac_part)
    };
    if negative {
        format!("-{}", result)
    } else {
        result
    }
}

/// Compare `a / 10^sa` with `b / 10^sb`.
///
/// The lower-scale side is rescaled. If that overflows `i128`, its magnitude
/// exceeds any `i128`, so its sign alone decides the order.
fn decimal_cmp(a: i128, sa: u8, b: i128, sb: u8) -> Ordering {
    match sa.cmp(&sb) {
        Ordering::Equal => a.cmp(&b),
        Ordering::Greater => match rescale(b, sa - sb) {
            Some(b) => a.cmp(&b),
            None => 0.cmp(&b),
        },
        Ordering::Less => match rescale(a, sb - sa) {
            Some(a) => a.cmp(&b),
            None => a.cmp(&0),
        },
    }
}

fn rescale(value: i128, by: u8) -> Option<i128> {
    10i128
        .checked_pow(u32::from(by))
        .and_then(|factor| value.checked_mul(factor))
}
