//! Built-in XMD functions and value methods.
//!
//! Functions receive already-evaluated arguments and return
//! `Result<AstValue, String>`; the interpreter turns the error string into an
//! evaluation error.  `print`, `File.*` and user functions live in the
//! interpreter because they need its state.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use super::value::AstValue;
use crate::variable::Variable;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Largest string (in bytes) or array (in elements) a builtin will build.
pub const MAX_GENERATED_LEN: usize = 1 << 20;

/// Every name [`call_builtin`] answers to, `Math.` aliases aside.
const BUILTIN_NAMES: &[&str] = &[
    "len", "length", "str", "string", "num", "number", "float", "int", "type", "typeof",
    "upper", "lower", "trim", "split", "replace", "contains", "starts_with", "ends_with",
    "join", "keys", "values", "repeat", "range", "abs", "floor", "ceil", "round", "sqrt",
    "pow", "min", "max", "Date.now", "Date.iso", "Date.format", "Date.parse",
    "json.stringify", "JSON.stringify", "json.parse", "JSON.parse", "yaml.stringify",
    "YAML.stringify", "yaml.parse", "YAML.parse",
];

/// Dispatch a built-in function call.
///
/// Returns `None` if `name` is not a builtin.
pub fn call_builtin(name: &str, args: Vec<AstValue>) -> Option<Result<AstValue, String>> {
    fn inner(name: &str, args: Vec<AstValue>) -> Result<Option<AstValue>, String> {
        // `Math.floor` and `floor` are the same function.
        let bare = name.strip_prefix("Math.").unwrap_or(name);
        Ok(Some(match bare {
            // ── Conversion ───────────────────────────────────────────────────
            "len" | "length" => length_of(get(&args, 0, name)?)
                .ok_or_else(|| format!("{name}: no length for {}", args[0].type_name()))?,
            "str" | "string" => AstValue::String(get(&args, 0, name)?.to_string()),
            "num" | "number" | "float" => {
                let v = get(&args, 0, name)?;
                AstValue::Number(
                    v.as_number()
                        .ok_or_else(|| format!("{name}: cannot convert '{v}' to a number"))?,
                )
            }
            "int" => AstValue::Number(get_num(&args, 0, name)?.trunc()),
            "type" | "typeof" => AstValue::string(get(&args, 0, name)?.type_name()),

            // ── Strings ──────────────────────────────────────────────────────
            "upper" | "lower" | "trim" | "split" | "replace" | "contains" | "starts_with"
            | "ends_with" | "join" | "keys" | "values" | "repeat" => {
                let mut args = args.into_iter();
                let receiver = args
                    .next()
                    .ok_or_else(|| format!("{name}: too few args"))?;
                call_method(&receiver, bare, args.collect())?
            }

            // ── Arrays ───────────────────────────────────────────────────────
            "range" => {
                let (start, end) = match args.len() {
                    1 => (0.0, get_num(&args, 0, name)?),
                    _ => (get_num(&args, 0, name)?, get_num(&args, 1, name)?),
                };
                let (start, end) = (start as i64, end as i64);
                if end.saturating_sub(start) > MAX_GENERATED_LEN as i64 {
                    return Err(format!("{name}: more than {MAX_GENERATED_LEN} elements"));
                }
                AstValue::Array((start..end).map(|n| AstValue::Number(n as f64)).collect())
            }

            // ── Math ─────────────────────────────────────────────────────────
            "abs" => AstValue::Number(get_num(&args, 0, name)?.abs()),
            "floor" => AstValue::Number(get_num(&args, 0, name)?.floor()),
            "ceil" => AstValue::Number(get_num(&args, 0, name)?.ceil()),
            "round" => AstValue::Number(get_num(&args, 0, name)?.round()),
            "sqrt" => AstValue::Number(get_num(&args, 0, name)?.sqrt()),
            "pow" => AstValue::Number(get_num(&args, 0, name)?.powf(get_num(&args, 1, name)?)),
            "min" | "max" => {
                let nums = numbers(&args, name)?;
                let pick = if bare == "min" { f64::min } else { f64::max };
                AstValue::Number(
                    nums.into_iter()
                        .reduce(pick)
                        .ok_or_else(|| format!("{name}: too few args"))?,
                )
            }

            // ── Date ─────────────────────────────────────────────────────────
            "Date.now" => AstValue::Number(Utc::now().timestamp_millis() as f64),
            "Date.iso" => AstValue::String(Utc::now().to_rfc3339()),
            "Date.format" => {
                let millis = match args.first() {
                    Some(_) => get_num(&args, 0, name)? as i64,
                    None => Utc::now().timestamp_millis(),
                };
                let fmt = match args.get(1) {
                    Some(f) => f.to_string(),
                    None => DEFAULT_DATE_FORMAT.to_owned(),
                };
                AstValue::String(format_millis(millis, &fmt)?)
            }
            "Date.parse" => {
                let s = get(&args, 0, name)?.to_string();
                AstValue::Number(parse_date(&s).ok_or_else(|| format!("{name}: invalid date '{s}'"))? as f64)
            }

            // ── JSON / YAML ──────────────────────────────────────────────────
            "json.stringify" | "JSON.stringify" => {
                let json = get(&args, 0, name)?.to_variable().to_json();
                let pretty = args.get(1).is_some_and(AstValue::is_truthy);
                let text = if pretty {
                    serde_json::to_string_pretty(&json)
                } else {
                    serde_json::to_string(&json)
                };
                AstValue::String(text.map_err(|e| format!("{name}: {e}"))?)
            }
            "json.parse" | "JSON.parse" => {
                let src = get(&args, 0, name)?.to_string();
                let json: serde_json::Value =
                    serde_json::from_str(&src).map_err(|e| format!("{name}: {e}"))?;
                AstValue::from_variable(&Variable::from_json(&json))
            }
            "yaml.stringify" | "YAML.stringify" => {
                let json = get(&args, 0, name)?.to_variable().to_json();
                AstValue::String(serde_yaml::to_string(&json).map_err(|e| format!("{name}: {e}"))?)
            }
            "yaml.parse" | "YAML.parse" => {
                let src = get(&args, 0, name)?.to_string();
                let json: serde_json::Value =
                    serde_yaml::from_str(&src).map_err(|e| format!("{name}: {e}"))?;
                AstValue::from_variable(&Variable::from_json(&json))
            }

            _ => return Ok(None),
        }))
    }
    inner(name, args).transpose()
}

/// `true` if `name` is dispatched by [`call_builtin`].
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name.strip_prefix("Math.").unwrap_or(name))
}

/// Call `receiver.method(args)`.
pub fn call_method(receiver: &AstValue, method: &str, args: Vec<AstValue>) -> Result<AstValue, String> {
    match receiver {
        AstValue::String(s) => string_method(s, method, &args),
        AstValue::Array(items) => array_method(items, method, &args),
        AstValue::Object(pairs) => object_method(receiver, pairs, method, &args),
        AstValue::Number(n) if matches!(method, "to_fixed" | "toFixed") => {
            let digits = get_num(&args, 0, method).unwrap_or(0.0).max(0.0) as usize;
            Ok(AstValue::String(format!("{n:.digits$}")))
        }
        other if is_string_method(method) => Err(format!(
            "String method '{method}' requires a string, got {}",
            other.type_name()
        )),
        other => Err(format!("Unknown method '{method}' for {}", other.type_name())),
    }
}

fn is_string_method(method: &str) -> bool {
    matches!(
        method,
        "upper"
            | "toUpperCase"
            | "lower"
            | "toLowerCase"
            | "trim"
            | "split"
            | "replace"
            | "contains"
            | "includes"
            | "starts_with"
            | "startsWith"
            | "ends_with"
            | "endsWith"
            | "repeat"
            | "substring"
            | "length"
    )
}

fn string_method(s: &str, method: &str, args: &[AstValue]) -> Result<AstValue, String> {
    Ok(match method {
        "upper" | "toUpperCase" => AstValue::string(s.to_uppercase()),
        "lower" | "toLowerCase" => AstValue::string(s.to_lowercase()),
        "trim" => AstValue::string(s.trim()),
        "length" => AstValue::Number(s.chars().count() as f64),
        "split" => {
            let sep = get_str_or(args, 0, " ");
            let parts: Vec<AstValue> = if sep.is_empty() {
                s.chars().map(|c| AstValue::String(c.to_string())).collect()
            } else {
                s.split(sep.as_str()).map(AstValue::from).collect()
            };
            AstValue::Array(parts)
        }
        "replace" => {
            let from = get(args, 0, method)?.to_string();
            let to = get(args, 1, method)?.to_string();
            AstValue::String(s.replace(&from, &to))
        }
        "contains" | "includes" => AstValue::Boolean(s.contains(&get(args, 0, method)?.to_string())),
        "starts_with" | "startsWith" => {
            AstValue::Boolean(s.starts_with(&get(args, 0, method)?.to_string()))
        }
        "ends_with" | "endsWith" => AstValue::Boolean(s.ends_with(&get(args, 0, method)?.to_string())),
        "repeat" => {
            let count = get_num(args, 0, method)?.max(0.0);
            if s.is_empty() || count < 1.0 {
                return Ok(AstValue::empty());
            }
            if count * s.len() as f64 > MAX_GENERATED_LEN as f64 {
                return Err(format!("{method}: result longer than {MAX_GENERATED_LEN} bytes"));
            }
            AstValue::String(s.repeat(count as usize))
        }
        "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let start = (get_num(args, 0, method)?.max(0.0) as usize).min(chars.len());
            let end = match args.get(1) {
                Some(_) => (get_num(args, 1, method)?.max(0.0) as usize).clamp(start, chars.len()),
                None => chars.len(),
            };
            AstValue::String(chars[start..end].iter().collect())
        }
        _ => return Err(format!("Unknown method '{method}' for string")),
    })
}

fn array_method(items: &[AstValue], method: &str, args: &[AstValue]) -> Result<AstValue, String> {
    Ok(match method {
        "length" => AstValue::Number(items.len() as f64),
        "join" => {
            let sep = get_str_or(args, 0, ",");
            let parts: Vec<String> = items.iter().map(AstValue::to_string).collect();
            AstValue::String(parts.join(&sep))
        }
        "contains" | "includes" => {
            let needle = get(args, 0, method)?;
            AstValue::Boolean(items.iter().any(|v| v.loose_eq(needle)))
        }
        "first" => items.first().cloned().unwrap_or_default(),
        "last" => items.last().cloned().unwrap_or_default(),
        "reverse" => AstValue::Array(items.iter().rev().cloned().collect()),
        m if is_string_method(m) => {
            return Err(format!("String method '{m}' requires a string, got array"))
        }
        _ => return Err(format!("Unknown method '{method}' for array")),
    })
}

fn object_method(
    receiver: &AstValue,
    pairs: &[(String, AstValue)],
    method: &str,
    args: &[AstValue],
) -> Result<AstValue, String> {
    Ok(match method {
        "keys" => AstValue::Array(pairs.iter().map(|(k, _)| AstValue::string(k.as_str())).collect()),
        "values" => AstValue::Array(pairs.iter().map(|(_, v)| v.clone()).collect()),
        "length" => AstValue::Number(pairs.len() as f64),
        "has" => AstValue::Boolean(receiver.get(&get(args, 0, method)?.to_string()).is_some()),
        m if is_string_method(m) => {
            return Err(format!("String method '{m}' requires a string, got object"))
        }
        _ => return Err(format!("Unknown method '{method}' for object")),
    })
}

fn length_of(v: &AstValue) -> Option<AstValue> {
    let n = match v {
        AstValue::String(s) => s.chars().count(),
        AstValue::Array(items) => items.len(),
        AstValue::Object(pairs) => pairs.len(),
        _ => return None,
    };
    Some(AstValue::Number(n as f64))
}

// ── Dates ─────────────────────────────────────────────────────────────────────

fn format_millis(millis: i64, fmt: &str) -> Result<String, String> {
    let dt = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| format!("Date.format: timestamp {millis} out of range"))?;
    let mut out = String::new();
    write!(out, "{}", dt.format(fmt)).map_err(|_| format!("Date.format: bad format '{fmt}'"))?;
    Ok(out)
}

/// RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC), as epoch milliseconds.
fn parse_date(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).timestamp_millis())
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn get<'a>(args: &'a [AstValue], idx: usize, name: &str) -> Result<&'a AstValue, String> {
    args.get(idx)
        .ok_or_else(|| format!("{name}: missing argument {}", idx + 1))
}

fn get_num(args: &[AstValue], idx: usize, name: &str) -> Result<f64, String> {
    let v = get(args, idx, name)?;
    v.as_number()
        .ok_or_else(|| format!("{name}: argument {} must be a number, got {}", idx + 1, v.type_name()))
}

fn get_str_or(args: &[AstValue], idx: usize, default: &str) -> String {
    args.get(idx)
        .map(AstValue::to_string)
        .unwrap_or_else(|| default.to_owned())
}

fn numbers(args: &[AstValue], name: &str) -> Result<Vec<f64>, String> {
    // `max([1, 2, 3])` and `max(1, 2, 3)` both work.
    let flat: Vec<&AstValue> = match args {
        [AstValue::Array(items)] => items.iter().collect(),
        _ => args.iter().collect(),
    };
    flat.into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_number()
                .ok_or_else(|| format!("{name}: argument {} must be a number", i + 1))
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<AstValue>) -> AstValue {
        call_builtin(name, args)
            .expect("not a builtin")
            .expect("builtin failed")
    }

    fn s(v: &str) -> AstValue {
        AstValue::from(v)
    }

    fn n(v: f64) -> AstValue {
        AstValue::from(v)
    }

    #[test]
    fn unknown_name_is_none() {
        assert!(call_builtin("no_such_fn", vec![]).is_none());
        assert!(!is_builtin("greet"));
        assert!(is_builtin("len"));
        assert!(is_builtin("Date.now"));
        assert!(is_builtin("Math.sqrt"));
        assert!(!is_builtin("Math.print"));
    }

    #[test]
    fn every_listed_name_dispatches() {
        for name in BUILTIN_NAMES {
            let dispatched = call_builtin(name, vec![s("1"), s("1")]).is_some();
            assert!(dispatched, "{name} is listed but not dispatched");
        }
    }

    #[test]
    fn conversions() {
        assert_eq!(call("len", vec![s("héllo")]), n(5.0));
        assert_eq!(call("str", vec![n(3.0)]), s("3"));
        assert_eq!(call("num", vec![s(" 2.5 ")]), n(2.5));
        assert_eq!(call("type", vec![AstValue::Array(vec![])]), s("array"));
        assert!(call_builtin("num", vec![s("abc")]).unwrap().is_err());
    }

    #[test]
    fn math() {
        assert_eq!(call("Math.floor", vec![n(2.7)]), n(2.0));
        assert_eq!(call("max", vec![n(1.0), n(9.0), n(4.0)]), n(9.0));
        assert_eq!(call("min", vec![AstValue::Array(vec![n(3.0), n(-1.0)])]), n(-1.0));
        assert_eq!(call("pow", vec![n(2.0), n(10.0)]), n(1024.0));
    }

    #[test]
    fn range_is_half_open() {
        assert_eq!(call("range", vec![n(3.0)]), AstValue::Array(vec![n(0.0), n(1.0), n(2.0)]));
        assert_eq!(call("range", vec![n(2.0), n(4.0)]), AstValue::Array(vec![n(2.0), n(3.0)]));
        assert_eq!(call("range", vec![n(5.0), n(1.0)]), AstValue::Array(vec![]));
    }

    #[test]
    fn oversized_results_are_errors() {
        let err = call_builtin("range", vec![n(0.0), n(1e12)]).unwrap().unwrap_err();
        assert!(err.contains("elements"), "{err}");
        assert!(call_builtin("range", vec![n(-1e300), n(1e300)]).unwrap().is_err());

        let err = call_method(&s("ab"), "repeat", vec![n(1e19)]).unwrap_err();
        assert!(err.contains("longer than"), "{err}");
        assert!(call_method(&s("ab"), "repeat", vec![n(f64::INFINITY)]).is_err());
        assert_eq!(call_method(&s(""), "repeat", vec![n(1e19)]), Ok(s("")));
        assert_eq!(call_method(&s("ab"), "repeat", vec![n(3.0)]), Ok(s("ababab")));
    }

    #[test]
    fn string_methods() {
        assert_eq!(call_method(&s("abc"), "upper", vec![]), Ok(s("ABC")));
        assert_eq!(
            call_method(&s("a-b-a"), "replace", vec![s("a"), s("x")]),
            Ok(s("x-b-x"))
        );
        assert_eq!(call_method(&s("hello"), "starts_with", vec![s("he")]), Ok(AstValue::from(true)));
        assert_eq!(call_method(&s("hello"), "substring", vec![n(1.0), n(3.0)]), Ok(s("el")));
        assert_eq!(
            call_method(&s("a b"), "split", vec![]),
            Ok(AstValue::Array(vec![s("a"), s("b")]))
        );
        assert_eq!(
            call_method(&s("a,b"), "split", vec![s(",")]),
            Ok(AstValue::Array(vec![s("a"), s("b")]))
        );
    }

    #[test]
    fn string_method_on_number_is_error() {
        let err = call_method(&n(5.0), "upper", vec![]).unwrap_err();
        assert!(err.contains("requires a string"), "{err}");
        assert!(call_method(&n(5.0), "frobnicate", vec![]).is_err());
    }

    #[test]
    fn array_and_object_methods() {
        let arr = AstValue::Array(vec![s("a"), s("b")]);
        assert_eq!(call_method(&arr, "length", vec![]), Ok(n(2.0)));
        assert_eq!(call_method(&arr, "join", vec![s(" | ")]), Ok(s("a | b")));
        assert_eq!(call_method(&arr, "contains", vec![s("b")]), Ok(AstValue::from(true)));

        let obj = AstValue::Object(vec![("x".into(), n(1.0)), ("y".into(), n(2.0))]);
        assert_eq!(
            call_method(&obj, "keys", vec![]),
            Ok(AstValue::Array(vec![s("x"), s("y")]))
        );
        assert_eq!(call_method(&obj, "has", vec![s("y")]), Ok(AstValue::from(true)));
    }

    #[test]
    fn number_to_fixed() {
        assert_eq!(call_method(&n(3.14159), "toFixed", vec![n(2.0)]), Ok(s("3.14")));
    }

    #[test]
    fn dates() {
        assert_eq!(
            call("Date.format", vec![n(0.0), s("%Y-%m-%d")]),
            s("1970-01-01")
        );
        assert_eq!(call("Date.parse", vec![s("1970-01-02")]), n(86_400_000.0));
        assert_eq!(
            call("Date.parse", vec![s("1970-01-01T00:00:01Z")]),
            n(1000.0)
        );
        let AstValue::Number(now) = call("Date.now", vec![]) else {
            panic!("expected number");
        };
        assert!(now > 1.6e12);
    }

    #[test]
    fn json_round_trip() {
        let v = call("json.parse", vec![s(r#"{"name":"Alice","tags":[1,2]}"#)]);
        assert_eq!(v.get("name"), Some(&s("Alice")));
        assert_eq!(
            call("json.stringify", vec![v]),
            s(r#"{"name":"Alice","tags":[1,2]}"#)
        );
        assert!(call_builtin("json.parse", vec![s("{oops")]).unwrap().is_err());
    }

    #[test]
    fn yaml_parse() {
        let v = call("yaml.parse", vec![s("name: Bob\nage: 30\n")]);
        assert_eq!(v.get("age"), Some(&n(30.0)));
        let out = call("yaml.stringify", vec![v]).to_string();
        assert!(out.contains("name: Bob"), "{out}");
    }
}
