//! Runtime value type for the XMD evaluator.
//!
//! [`AstValue`] is deliberately separate from the store's
//! [`Variable`]; [`AstValue::to_variable`] and [`AstValue::from_variable`]
//! translate at the boundary.

use std::cmp::Ordering;
use std::fmt;

use crate::error::EvalError;
use crate::variable::{format_number, Variable};

/// An XMD runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AstValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Array(Vec<AstValue>),
    /// Insertion-ordered map.
    Object(Vec<(String, AstValue)>),
    #[default]
    Null,
}

impl fmt::Display for AstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstValue::String(s) => write!(f, "{s}"),
            AstValue::Number(n) => write!(f, "{}", format_number(*n)),
            AstValue::Boolean(b) => write!(f, "{b}"),
            AstValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            AstValue::Object(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            AstValue::Null => Ok(()),
        }
    }
}

impl AstValue {
    pub fn string(s: impl Into<String>) -> Self {
        AstValue::String(s.into())
    }

    /// Empty string: the evaluator's "nothing to show" result.
    pub fn empty() -> Self {
        AstValue::String(String::new())
    }

    /// Truthiness: `""`, `0`, `[]` and `null` are false; objects are true.
    pub fn is_truthy(&self) -> bool {
        match self {
            AstValue::String(s) => !s.is_empty(),
            AstValue::Number(n) => *n != 0.0 && !n.is_nan(),
            AstValue::Boolean(b) => *b,
            AstValue::Array(items) => !items.is_empty(),
            AstValue::Object(_) => true,
            AstValue::Null => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AstValue::String(_) => "string",
            AstValue::Number(_) => "number",
            AstValue::Boolean(_) => "boolean",
            AstValue::Array(_) => "array",
            AstValue::Object(_) => "object",
            AstValue::Null => "null",
        }
    }

    /// Numeric view: numbers as-is, numeric strings parsed, booleans 0/1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AstValue::Number(n) => Some(*n),
            AstValue::String(s) => s.trim().parse().ok(),
            AstValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// `true` for the empty-string and null results that produce no output.
    pub fn is_blank(&self) -> bool {
        match self {
            AstValue::String(s) => s.is_empty(),
            AstValue::Null => true,
            _ => false,
        }
    }

    /// Object property lookup.
    pub fn get(&self, key: &str) -> Option<&AstValue> {
        match self {
            AstValue::Object(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Insert or replace an object property, keeping first-insertion order.
    pub fn insert(&mut self, key: &str, value: AstValue) -> bool {
        match self {
            AstValue::Object(pairs) => {
                if let Some(slot) = pairs.iter_mut().find(|(k, _)| k == key) {
                    slot.1 = value;
                } else {
                    pairs.push((key.to_owned(), value));
                }
                true
            }
            _ => false,
        }
    }

    // ── Store boundary ───────────────────────────────────────────────────────

    pub fn to_variable(&self) -> Variable {
        match self {
            AstValue::String(s) => Variable::String(s.clone()),
            AstValue::Number(n) => Variable::Number(*n),
            AstValue::Boolean(b) => Variable::Boolean(*b),
            AstValue::Array(items) => {
                Variable::Array(items.iter().map(AstValue::to_variable).collect())
            }
            AstValue::Object(pairs) => Variable::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_variable()))
                    .collect(),
            ),
            AstValue::Null => Variable::Null,
        }
    }

    pub fn from_variable(var: &Variable) -> Self {
        match var {
            Variable::String(s) => AstValue::String(s.clone()),
            Variable::Number(n) => AstValue::Number(*n),
            Variable::Boolean(b) => AstValue::Boolean(*b),
            Variable::Array(items) => {
                AstValue::Array(items.iter().map(AstValue::from_variable).collect())
            }
            Variable::Object(pairs) => AstValue::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), AstValue::from_variable(v)))
                    .collect(),
            ),
            Variable::Null => AstValue::Null,
        }
    }

    // ── Arithmetic helpers ───────────────────────────────────────────────────

    fn both_numbers(&self, rhs: &AstValue) -> Option<(f64, f64)> {
        match (self, rhs) {
            (AstValue::Number(a), AstValue::Number(b)) => Some((*a, *b)),
            _ => None,
        }
    }

    /// `+`: numeric sum, string concatenation when either side is a string,
    /// array concatenation for two arrays.
    pub fn arith_add(&self, rhs: &AstValue) -> Result<AstValue, EvalError> {
        if let Some((a, b)) = self.both_numbers(rhs) {
            return Ok(AstValue::Number(a + b));
        }
        match (self, rhs) {
            (AstValue::String(_), _) | (_, AstValue::String(_)) => {
                Ok(AstValue::String(format!("{self}{rhs}")))
            }
            (AstValue::Array(a), AstValue::Array(b)) => {
                Ok(AstValue::Array(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => Err(type_mismatch("addition", self, rhs)),
        }
    }

    pub fn arith_sub(&self, rhs: &AstValue) -> Result<AstValue, EvalError> {
        let (a, b) = self
            .both_numbers(rhs)
            .ok_or_else(|| type_mismatch("subtraction", self, rhs))?;
        Ok(AstValue::Number(a - b))
    }

    pub fn arith_mul(&self, rhs: &AstValue) -> Result<AstValue, EvalError> {
        let (a, b) = self
            .both_numbers(rhs)
            .ok_or_else(|| type_mismatch("multiplication", self, rhs))?;
        Ok(AstValue::Number(a * b))
    }

    pub fn arith_div(&self, rhs: &AstValue) -> Result<AstValue, EvalError> {
        let (a, b) = self
            .both_numbers(rhs)
            .ok_or_else(|| type_mismatch("division", self, rhs))?;
        if b == 0.0 {
            return Err(EvalError::new("Division by zero"));
        }
        Ok(AstValue::Number(a / b))
    }

    pub fn arith_rem(&self, rhs: &AstValue) -> Result<AstValue, EvalError> {
        let (a, b) = self
            .both_numbers(rhs)
            .ok_or_else(|| type_mismatch("modulo", self, rhs))?;
        if b == 0.0 {
            return Err(EvalError::new("Modulo by zero"));
        }
        Ok(AstValue::Number(a % b))
    }

    pub fn arith_neg(&self) -> Result<AstValue, EvalError> {
        match self {
            AstValue::Number(n) => Ok(AstValue::Number(-n)),
            other => Err(EvalError::new(format!(
                "Unary minus requires a number, got {}",
                other.type_name()
            ))),
        }
    }

    // ── Comparison ───────────────────────────────────────────────────────────

    /// Equality after coercing both sides to a common representation.
    pub fn loose_eq(&self, rhs: &AstValue) -> bool {
        match (self, rhs) {
            (AstValue::Number(a), AstValue::Number(b)) => a == b,
            (AstValue::Boolean(a), AstValue::Boolean(b)) => a == b,
            (AstValue::Null, AstValue::Null) => true,
            (AstValue::Null, other) | (other, AstValue::Null) => other.is_blank(),
            (AstValue::Number(n), AstValue::String(s)) | (AstValue::String(s), AstValue::Number(n)) => {
                match s.trim().parse::<f64>() {
                    Ok(x) => x == *n,
                    Err(_) => *s == format_number(*n),
                }
            }
            _ => self.to_string() == rhs.to_string(),
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`.  Numbers compare numerically,
    /// strings lexically; a number and a numeric string compare as numbers.
    pub fn cmp_value(&self, rhs: &AstValue) -> Result<Ordering, EvalError> {
        match (self, rhs) {
            (AstValue::String(a), AstValue::String(b)) => Ok(a.cmp(b)),
            _ => match (self.as_number(), rhs.as_number()) {
                (Some(a), Some(b)) => Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal)),
                _ => Err(EvalError::new(format!(
                    "Cannot compare {} with {}",
                    self.type_name(),
                    rhs.type_name()
                ))),
            },
        }
    }
}

fn type_mismatch(op: &str, l: &AstValue, r: &AstValue) -> EvalError {
    EvalError::new(format!(
        "Type mismatch for {op} - requires numbers, got {} and {}",
        l.type_name(),
        r.type_name()
    ))
}

impl From<f64> for AstValue {
    fn from(n: f64) -> Self {
        AstValue::Number(n)
    }
}

impl From<String> for AstValue {
    fn from(s: String) -> Self {
        AstValue::String(s)
    }
}

impl From<&str> for AstValue {
    fn from(s: &str) -> Self {
        AstValue::String(s.to_owned())
    }
}

impl From<bool> for AstValue {
    fn from(b: bool) -> Self {
        AstValue::Boolean(b)
    }
}

impl From<Vec<AstValue>> for AstValue {
    fn from(items: Vec<AstValue>) -> Self {
        AstValue::Array(items)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
