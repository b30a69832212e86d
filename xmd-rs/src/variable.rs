//! Store-level value type.
//!
//! A [`Variable`] is what lives in a [`Store`](crate::store::Store).  The
//! evaluator works on its own [`AstValue`](crate::script::value::AstValue)
//! and converts at the store boundary.

use std::fmt;

/// A dynamically typed XMD variable.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variable {
    String(String),
    Number(f64),
    Boolean(bool),
    Array(Vec<Variable>),
    /// Insertion-ordered key/value pairs.
    Object(Vec<(String, Variable)>),
    #[default]
    Null,
}

impl Variable {
    pub fn type_name(&self) -> &'static str {
        match self {
            Variable::String(_) => "string",
            Variable::Number(_) => "number",
            Variable::Boolean(_) => "boolean",
            Variable::Array(_) => "array",
            Variable::Object(_) => "object",
            Variable::Null => "null",
        }
    }

    /// Look up an object property.  `None` for non-objects.
    pub fn property(&self, key: &str) -> Option<&Variable> {
        match self {
            Variable::Object(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Convert to a JSON value for `json.stringify` / `yaml.stringify`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Variable::String(s) => J::String(s.clone()),
            Variable::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    J::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n).map(J::Number).unwrap_or(J::Null)
                }
            }
            Variable::Boolean(b) => J::Bool(*b),
            Variable::Array(items) => J::Array(items.iter().map(Variable::to_json).collect()),
            Variable::Object(pairs) => {
                let mut map = serde_json::Map::new();
                for (k, v) in pairs {
                    map.insert(k.clone(), v.to_json());
                }
                J::Object(map)
            }
            Variable::Null => J::Null,
        }
    }

    /// Build a variable from parsed JSON (also used for YAML, via serde).
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value as J;
        match value {
            J::Null => Variable::Null,
            J::Bool(b) => Variable::Boolean(*b),
            J::Number(n) => Variable::Number(n.as_f64().unwrap_or(0.0)),
            J::String(s) => Variable::String(s.clone()),
            J::Array(items) => Variable::Array(items.iter().map(Variable::from_json).collect()),
            J::Object(map) => Variable::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Variable::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::String(s) => write!(f, "{s}"),
            Variable::Number(n) => write!(f, "{}", format_number(*n)),
            Variable::Boolean(b) => write!(f, "{b}"),
            Variable::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Variable::Object(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Variable::Null => Ok(()),
        }
    }
}

impl From<&str> for Variable {
    fn from(s: &str) -> Self {
        Variable::String(s.to_owned())
    }
}

impl From<String> for Variable {
    fn from(s: String) -> Self {
        Variable::String(s)
    }
}

impl From<f64> for Variable {
    fn from(n: f64) -> Self {
        Variable::Number(n)
    }
}

impl From<bool> for Variable {
    fn from(b: bool) -> Self {
        Variable::Boolean(b)
    }
}

// ── Number formatting ─────────────────────────────────────────────────────────

/// Render a number the way XMD prints it: whole numbers in 32-bit range
/// without a decimal point, everything else `%.6g`-style.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == n.floor() && (-2147483648.0..=2147483647.0).contains(&n) {
        return format!("{}", n as i64);
    }
    format_g(n, 6)
}

/// C `%.<precision>g` formatting.
fn format_g(n: f64, precision: usize) -> String {
    if n == 0.0 {
        return "0".to_owned();
    }
    let precision = precision.max(1);
    // `{:e}` gives the decimal exponent after rounding to `precision` digits.
    let sci = format!("{:.*e}", precision - 1, n);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_owned(), e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };
    if exp < -4 || exp >= precision as i32 {
        let mantissa = strip_fraction_zeros(&mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        strip_fraction_zeros(&format!("{n:.decimals$}"))
    }
}

fn strip_fraction_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        s.to_owned()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_have_no_point() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-7.0), "-7");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn fractions_use_six_significant_digits() {
        assert_eq!(format_number(3.14), "3.14");
        assert_eq!(format_number(1.0 / 3.0), "0.333333");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn large_and_small_go_scientific() {
        assert_eq!(format_number(1e20), "1e+20");
        assert_eq!(format_number(0.00001234), "1.234e-05");
    }

    #[test]
    fn non_finite() {
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn display_collections() {
        let arr = Variable::Array(vec![Variable::from(1.0), Variable::from("a")]);
        assert_eq!(arr.to_string(), "[1, a]");
        let obj = Variable::Object(vec![("name".into(), Variable::from("Alice"))]);
        assert_eq!(obj.to_string(), "{name: Alice}");
        assert_eq!(Variable::Null.to_string(), "");
    }

    #[test]
    fn json_conversion_keeps_shape() {
        let v: serde_json::Value = serde_json::from_str(r#"{"a":[1,true,null],"b":"x"}"#).unwrap();
        let var = Variable::from_json(&v);
        assert_eq!(var.property("b"), Some(&Variable::from("x")));
        assert_eq!(var.to_json(), v);
    }

    #[test]
    fn property_on_non_object() {
        assert_eq!(Variable::from(1.0).property("x"), None);
    }
}
