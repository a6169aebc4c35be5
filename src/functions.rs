// Built-in function implementations and the signature registry
//
// Every built-in is registered in BUILTINS as a (name, signature,
// implementation) entry. Implementations are pure functions over
// arguments the evaluator has already resolved, arity-checked, and
// type-narrowed; they have no access to the evaluation context.

use std::fmt;

use thiserror::Error;

use crate::signature::{ParamType, Parameter, Signature};
use crate::value::Value;

/// Direction of an arity violation, kept for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArityKind {
    TooFew,
    TooMany,
}

impl fmt::Display for ArityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArityKind::TooFew => write!(f, "too few"),
            ArityKind::TooMany => write!(f, "too many"),
        }
    }
}

/// Function call errors
///
/// Every variant names the function; ArgumentType carries the 1-based
/// offending position and MalformedInput the offending substring. These
/// are raised at the point of detection and unwind through the evaluator
/// without local recovery.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    /// The function required an implicit context value and either none was
    /// available or it had the wrong type
    #[error("Context value is not a compatible type with argument 1 of function ${function}")]
    BadContext { function: String },

    /// Too few or too many explicit arguments relative to the signature
    #[error("Function ${function} was invoked with {kind} arguments")]
    Arity { function: String, kind: ArityKind },

    /// An argument resolved to a value outside its parameter's type classes
    #[error("Argument {position} of function ${function} does not match function signature")]
    ArgumentType { function: String, position: usize },

    /// Function-specific validation failure on a correctly-typed argument
    #[error("Malformed URL passed to ${function}: \"{input}\"")]
    MalformedInput { function: String, input: String },
}

pub(crate) fn arg_type(function: &str, position: usize) -> FunctionError {
    FunctionError::ArgumentType {
        function: function.to_string(),
        position,
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// A registered built-in: declared signature plus implementation.
///
/// `rebind` marks functions callable with one extra trailing
/// sub-expression that is evaluated against a context equal to the
/// resolved primary argument (the evaluator owns that mechanism).
pub struct Builtin {
    pub name: &'static str,
    pub signature: Signature,
    pub rebind: bool,
    pub invoke: fn(&str, &[Value]) -> Result<Value, FunctionError>,
}

/// Look up a built-in by name. The table is closed and immutable; this is
/// the single dispatch point for all function calls.
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

const P_NUM_CTX: Parameter = Parameter {
    types: &[ParamType::Number],
    context_eligible: true,
};
const P_NUM: Parameter = Parameter {
    types: &[ParamType::Number],
    context_eligible: false,
};
const P_STR_CTX: Parameter = Parameter {
    types: &[ParamType::String],
    context_eligible: true,
};
const P_STR: Parameter = Parameter {
    types: &[ParamType::String],
    context_eligible: false,
};
const P_ANY_CTX: Parameter = Parameter {
    types: &[ParamType::Any],
    context_eligible: true,
};
const P_ANY: Parameter = Parameter {
    types: &[ParamType::Any],
    context_eligible: false,
};
const P_SEQ_CTX: Parameter = Parameter {
    types: &[ParamType::Array, ParamType::Number],
    context_eligible: true,
};
const P_OBJ_CTX: Parameter = Parameter {
    types: &[ParamType::Object],
    context_eligible: true,
};
const P_CAST_CTX: Parameter = Parameter {
    types: &[ParamType::Number, ParamType::String, ParamType::Boolean],
    context_eligible: true,
};
const P_JOIN_CTX: Parameter = Parameter {
    types: &[ParamType::Array, ParamType::String],
    context_eligible: true,
};
const P_ARR_CTX: Parameter = Parameter {
    types: &[ParamType::Array],
    context_eligible: true,
};

const SIG_NUM1: Signature = Signature {
    min_args: 1,
    max_args: 1,
    params: &[P_NUM_CTX],
};
const SIG_STR1: Signature = Signature {
    min_args: 1,
    max_args: 1,
    params: &[P_STR_CTX],
};
const SIG_ANY1: Signature = Signature {
    min_args: 1,
    max_args: 1,
    params: &[P_ANY_CTX],
};
const SIG_ROUND: Signature = Signature {
    min_args: 1,
    max_args: 2,
    params: &[P_NUM_CTX, P_NUM],
};
const SIG_POWER: Signature = Signature {
    min_args: 2,
    max_args: 2,
    params: &[P_NUM_CTX, P_NUM],
};
const SIG_AGG: Signature = Signature {
    min_args: 1,
    max_args: 1,
    params: &[P_SEQ_CTX],
};
const SIG_CAST_NUM: Signature = Signature {
    min_args: 1,
    max_args: 1,
    params: &[P_CAST_CTX],
};
const SIG_SUBSTRING: Signature = Signature {
    min_args: 2,
    max_args: 3,
    params: &[P_STR_CTX, P_NUM, P_NUM],
};
const SIG_STR_STR: Signature = Signature {
    min_args: 2,
    max_args: 2,
    params: &[P_STR_CTX, P_STR],
};
const SIG_JOIN: Signature = Signature {
    min_args: 1,
    max_args: 2,
    params: &[P_JOIN_CTX, P_STR],
};
const SIG_KEYS: Signature = Signature {
    min_args: 1,
    max_args: 1,
    params: &[P_OBJ_CTX],
};
const SIG_LOOKUP: Signature = Signature {
    min_args: 2,
    max_args: 2,
    params: &[P_OBJ_CTX, P_STR],
};
const SIG_APPEND: Signature = Signature {
    min_args: 2,
    max_args: 2,
    params: &[P_ANY, P_ANY],
};
const SIG_REVERSE: Signature = Signature {
    min_args: 1,
    max_args: 1,
    params: &[P_ARR_CTX],
};

pub static BUILTINS: &[Builtin] = &[
    // Numeric
    Builtin { name: "number", signature: SIG_CAST_NUM, rebind: false, invoke: numeric::number },
    Builtin { name: "abs", signature: SIG_NUM1, rebind: true, invoke: numeric::abs },
    Builtin { name: "floor", signature: SIG_NUM1, rebind: true, invoke: numeric::floor },
    Builtin { name: "ceil", signature: SIG_NUM1, rebind: true, invoke: numeric::ceil },
    Builtin { name: "round", signature: SIG_ROUND, rebind: false, invoke: numeric::round },
    Builtin { name: "sqrt", signature: SIG_NUM1, rebind: true, invoke: numeric::sqrt },
    Builtin { name: "power", signature: SIG_POWER, rebind: false, invoke: numeric::power },
    // Aggregation
    Builtin { name: "sum", signature: SIG_AGG, rebind: false, invoke: array::sum },
    Builtin { name: "max", signature: SIG_AGG, rebind: false, invoke: array::max },
    Builtin { name: "min", signature: SIG_AGG, rebind: false, invoke: array::min },
    Builtin { name: "average", signature: SIG_AGG, rebind: false, invoke: array::average },
    Builtin { name: "count", signature: SIG_ANY1, rebind: false, invoke: array::count },
    // String
    Builtin { name: "string", signature: SIG_ANY1, rebind: false, invoke: string::string },
    Builtin { name: "length", signature: SIG_STR1, rebind: true, invoke: string::length },
    Builtin { name: "uppercase", signature: SIG_STR1, rebind: true, invoke: string::uppercase },
    Builtin { name: "lowercase", signature: SIG_STR1, rebind: true, invoke: string::lowercase },
    Builtin { name: "trim", signature: SIG_STR1, rebind: true, invoke: string::trim },
    Builtin { name: "substring", signature: SIG_SUBSTRING, rebind: false, invoke: string::substring },
    Builtin { name: "substringBefore", signature: SIG_STR_STR, rebind: false, invoke: string::substring_before },
    Builtin { name: "substringAfter", signature: SIG_STR_STR, rebind: false, invoke: string::substring_after },
    Builtin { name: "contains", signature: SIG_STR_STR, rebind: false, invoke: string::contains },
    Builtin { name: "join", signature: SIG_JOIN, rebind: false, invoke: string::join },
    // Boolean
    Builtin { name: "boolean", signature: SIG_ANY1, rebind: false, invoke: boolean::boolean },
    Builtin { name: "not", signature: SIG_ANY1, rebind: false, invoke: boolean::not },
    // Array
    Builtin { name: "append", signature: SIG_APPEND, rebind: false, invoke: array::append },
    Builtin { name: "reverse", signature: SIG_REVERSE, rebind: false, invoke: array::reverse },
    // Object
    Builtin { name: "keys", signature: SIG_KEYS, rebind: false, invoke: object::keys },
    Builtin { name: "lookup", signature: SIG_LOOKUP, rebind: false, invoke: object::lookup },
    // URL
    Builtin { name: "urlEncode", signature: SIG_STR1, rebind: true, invoke: url::url_encode },
    Builtin { name: "urlEncodeComponent", signature: SIG_STR1, rebind: true, invoke: url::url_encode_component },
    Builtin { name: "urlDecode", signature: SIG_STR1, rebind: true, invoke: url::url_decode },
    Builtin { name: "urlDecodeComponent", signature: SIG_STR1, rebind: true, invoke: url::url_decode_component },
];

// ── Numeric functions ────────────────────────────────────────────────────────

pub mod numeric {
    use super::*;

    /// $number() - Cast a number, string, or boolean to a number
    pub fn number(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        match &args[0] {
            v @ (Value::Int(_) | Value::Float(_)) => Ok(v.clone()),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::String(s) => {
                // Try integer first so "5" stays an Int
                if let Ok(i) = s.trim().parse::<i64>() {
                    Ok(Value::Int(i))
                } else if let Ok(f) = s.trim().parse::<f64>() {
                    Ok(Value::Float(f))
                } else {
                    Err(arg_type(name, 1))
                }
            }
            _ => Err(arg_type(name, 1)),
        }
    }

    /// $abs() - Absolute value, preserving the numeric sub-kind
    pub fn abs(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        match &args[0] {
            Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
            Value::Float(n) => Ok(Value::Float(n.abs())),
            _ => unreachable!("argument narrowed to number"),
        }
    }

    /// $floor() - Greatest integer <= n
    ///
    /// An integer argument passes through unchanged (identity, not
    /// re-derivation); a fractional argument uses mathematical floor,
    /// so floor(-5.3) == -6.
    pub fn floor(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        match &args[0] {
            v @ Value::Int(_) => Ok(v.clone()),
            Value::Float(n) => Ok(Value::Int(n.floor() as i64)),
            _ => unreachable!("argument narrowed to number"),
        }
    }

    /// $ceil() - Smallest integer >= n
    pub fn ceil(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        match &args[0] {
            v @ Value::Int(_) => Ok(v.clone()),
            Value::Float(n) => Ok(Value::Int(n.ceil() as i64)),
            _ => unreachable!("argument narrowed to number"),
        }
    }

    /// $round(n [, precision]) - Round half to even at the given number of
    /// decimal places (default 0)
    pub fn round(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let precision = match args.get(1) {
            None => 0,
            Some(p) => p.as_i64().ok_or_else(|| arg_type(name, 2))?,
        };
        if precision == 0 {
            if let v @ Value::Int(_) = &args[0] {
                return Ok(v.clone());
            }
        }
        let n = args[0].as_f64().ok_or_else(|| arg_type(name, 1))?;
        let scale = 10f64.powi(precision as i32);
        let rounded = round_half_even(n * scale) / scale;
        if precision <= 0 {
            Ok(Value::Int(rounded as i64))
        } else {
            Ok(Value::Float(rounded))
        }
    }

    fn round_half_even(x: f64) -> f64 {
        let floor = x.floor();
        let diff = x - floor;
        if diff > 0.5 {
            floor + 1.0
        } else if diff < 0.5 {
            floor
        } else if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    }

    /// $sqrt() - Square root; negative input is a type error
    pub fn sqrt(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let n = args[0].as_f64().ok_or_else(|| arg_type(name, 1))?;
        if n < 0.0 {
            return Err(arg_type(name, 1));
        }
        Ok(Value::Float(n.sqrt()))
    }

    /// $power(base, exponent) - Exponentiation; stays an Int for integer
    /// base and non-negative integer exponent when the result fits
    pub fn power(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        if let (Value::Int(b), Value::Int(e)) = (&args[0], &args[1]) {
            if (0..=u32::MAX as i64).contains(e) {
                if let Some(r) = b.checked_pow(*e as u32) {
                    return Ok(Value::Int(r));
                }
            }
        }
        let b = args[0].as_f64().ok_or_else(|| arg_type(name, 1))?;
        let e = args[1].as_f64().ok_or_else(|| arg_type(name, 2))?;
        Ok(Value::Float(b.powf(e)))
    }
}

// ── String functions ─────────────────────────────────────────────────────────

pub mod string {
    use super::*;

    /// Cast a value to its string form: strings pass through unquoted,
    /// everything else renders as compact JSON.
    pub fn string_of(value: &Value) -> String {
        match value {
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        }
    }

    /// $string() - Cast value to string
    pub fn string(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        match &args[0] {
            v @ Value::String(_) => Ok(v.clone()),
            other => Ok(Value::string(string_of(other))),
        }
    }

    /// $length() - Number of characters (Unicode scalar values)
    pub fn length(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let s = expect_str(&args[0]);
        Ok(Value::Int(s.chars().count() as i64))
    }

    /// $uppercase() - Convert to uppercase
    pub fn uppercase(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        Ok(Value::string(expect_str(&args[0]).to_uppercase()))
    }

    /// $lowercase() - Convert to lowercase
    pub fn lowercase(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        Ok(Value::string(expect_str(&args[0]).to_lowercase()))
    }

    /// $trim() - Strip leading/trailing whitespace and collapse internal
    /// whitespace runs to a single space
    pub fn trim(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let s = expect_str(&args[0]);
        let collapsed: Vec<&str> = s.split_whitespace().collect();
        Ok(Value::string(collapsed.join(" ")))
    }

    /// $substring(str, start [, length]) - Character-based slicing;
    /// a negative start counts from the end
    pub fn substring(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let s = expect_str(&args[0]);
        let chars: Vec<char> = s.chars().collect();
        let total = chars.len() as i64;

        let start = args[1].as_f64().ok_or_else(|| arg_type(name, 2))?.floor() as i64;
        let start = if start < 0 {
            (total + start).max(0)
        } else {
            start.min(total)
        };

        let end = match args.get(2) {
            None => total,
            Some(len) => {
                let len = len.as_f64().ok_or_else(|| arg_type(name, 3))?.floor() as i64;
                (start + len.max(0)).min(total)
            }
        };

        let result: String = chars[start as usize..end as usize].iter().collect();
        Ok(Value::string(result))
    }

    /// $substringBefore(str, chars) - Text before the first occurrence of
    /// chars; the whole string when chars is not present
    pub fn substring_before(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let s = expect_str(&args[0]);
        let pat = expect_str(&args[1]);
        match s.find(pat) {
            Some(idx) => Ok(Value::string(&s[..idx])),
            None => Ok(Value::string(s)),
        }
    }

    /// $substringAfter(str, chars) - Text after the first occurrence of
    /// chars; the whole string when chars is not present
    pub fn substring_after(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let s = expect_str(&args[0]);
        let pat = expect_str(&args[1]);
        match s.find(pat) {
            Some(idx) => Ok(Value::string(&s[idx + pat.len()..])),
            None => Ok(Value::string(s)),
        }
    }

    /// $contains(str, pattern)
    pub fn contains(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let s = expect_str(&args[0]);
        let pat = expect_str(&args[1]);
        Ok(Value::Bool(s.contains(pat)))
    }

    /// $join(array [, separator]) - Concatenate an array of strings
    pub fn join(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let sep = match args.get(1) {
            None => "",
            Some(s) => expect_str(s),
        };
        let parts: Vec<&str> = match &args[0] {
            Value::String(s) => vec![s],
            Value::Array(arr) => {
                let mut parts = Vec::with_capacity(arr.len());
                for item in arr.iter() {
                    parts.push(item.as_str().ok_or_else(|| arg_type(name, 1))?);
                }
                parts
            }
            _ => return Err(arg_type(name, 1)),
        };
        Ok(Value::string(parts.join(sep)))
    }

    fn expect_str(v: &Value) -> &str {
        v.as_str().expect("argument narrowed to string")
    }
}

// ── Boolean functions ────────────────────────────────────────────────────────

pub mod boolean {
    use super::*;

    /// Language truthiness: false, 0, "", null, absence, and empty (or
    /// all-falsy) arrays and empty objects are false.
    pub fn boolean_of(value: &Value) -> bool {
        match value {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(arr) => arr.iter().any(boolean_of),
            Value::Object(map) => !map.is_empty(),
        }
    }

    /// $boolean() - Cast value to boolean
    pub fn boolean(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        Ok(Value::Bool(boolean_of(&args[0])))
    }

    /// $not() - Logical negation of the boolean cast
    pub fn not(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        Ok(Value::Bool(!boolean_of(&args[0])))
    }
}

// ── Array / aggregation functions ────────────────────────────────────────────

pub mod array {
    use super::*;

    /// Flatten nested arrays into a numeric sequence; a lone number is a
    /// singleton. Any non-numeric element is a type error on argument 1.
    fn numeric_sequence(name: &str, value: &Value) -> Result<Vec<Value>, FunctionError> {
        fn walk(name: &str, value: &Value, out: &mut Vec<Value>) -> Result<(), FunctionError> {
            match value {
                Value::Array(arr) => {
                    for item in arr.iter() {
                        walk(name, item, out)?;
                    }
                    Ok(())
                }
                v @ (Value::Int(_) | Value::Float(_)) => {
                    out.push(v.clone());
                    Ok(())
                }
                _ => Err(arg_type(name, 1)),
            }
        }
        let mut out = Vec::new();
        walk(name, value, &mut out)?;
        Ok(out)
    }

    /// $sum() - Sum of a numeric sequence; stays an Int while every
    /// element is an Int and the total fits
    pub fn sum(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let seq = numeric_sequence(name, &args[0])?;
        let mut int_total: Option<i64> = Some(0);
        let mut total = 0.0;
        for v in &seq {
            total += v.as_f64().unwrap_or(0.0);
            int_total = match (int_total, v.as_i64()) {
                (Some(acc), Some(i)) => acc.checked_add(i),
                _ => None,
            };
        }
        match int_total {
            Some(i) => Ok(Value::Int(i)),
            None => Ok(Value::Float(total)),
        }
    }

    /// $max() - Largest element, returned with its original sub-kind;
    /// an empty sequence has no maximum
    pub fn max(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let seq = numeric_sequence(name, &args[0])?;
        let best = seq.into_iter().reduce(|a, b| {
            if b.as_f64().unwrap_or(f64::NEG_INFINITY) > a.as_f64().unwrap_or(f64::NEG_INFINITY) {
                b
            } else {
                a
            }
        });
        Ok(best.unwrap_or(Value::Undefined))
    }

    /// $min() - Smallest element; an empty sequence has no minimum
    pub fn min(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let seq = numeric_sequence(name, &args[0])?;
        let best = seq.into_iter().reduce(|a, b| {
            if b.as_f64().unwrap_or(f64::INFINITY) < a.as_f64().unwrap_or(f64::INFINITY) {
                b
            } else {
                a
            }
        });
        Ok(best.unwrap_or(Value::Undefined))
    }

    /// $average() - Arithmetic mean (inherently floating)
    pub fn average(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let seq = numeric_sequence(name, &args[0])?;
        if seq.is_empty() {
            return Ok(Value::Undefined);
        }
        let total: f64 = seq.iter().filter_map(Value::as_f64).sum();
        Ok(Value::Float(total / seq.len() as f64))
    }

    /// $count() - Number of elements; a non-array counts as one
    pub fn count(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        match &args[0] {
            Value::Array(arr) => Ok(Value::Int(arr.len() as i64)),
            _ => Ok(Value::Int(1)),
        }
    }

    /// $append(a, b) - Concatenate two values as sequences
    pub fn append(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let mut out = to_sequence(&args[0]);
        out.extend(to_sequence(&args[1]));
        Ok(Value::array(out))
    }

    /// $reverse() - Array with elements in reverse order
    pub fn reverse(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let arr = args[0].as_array().expect("argument narrowed to array");
        let out: Vec<Value> = arr.iter().rev().cloned().collect();
        Ok(Value::array(out))
    }

    fn to_sequence(value: &Value) -> Vec<Value> {
        match value {
            Value::Array(arr) => arr.as_ref().clone(),
            other => vec![other.clone()],
        }
    }
}

// ── Object functions ─────────────────────────────────────────────────────────

pub mod object {
    use super::*;

    /// $keys() - Member names of an object; an empty object has none
    pub fn keys(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let map = args[0].as_object().expect("argument narrowed to object");
        if map.is_empty() {
            return Ok(Value::Undefined);
        }
        let keys: Vec<Value> = map.keys().map(|k| Value::string(k.as_str())).collect();
        Ok(Value::array(keys))
    }

    /// $lookup(object, key) - Member value, or no value when absent
    pub fn lookup(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let map = args[0].as_object().expect("argument narrowed to object");
        let key = args[1].as_str().expect("argument narrowed to string");
        Ok(map.get(key).cloned().unwrap_or(Value::Undefined))
    }
}

// ── URL functions ────────────────────────────────────────────────────────────

pub mod url {
    use super::*;

    // Characters left intact by component encoding (JS encodeURIComponent)
    fn component_unreserved(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '!' | '~' | '*' | '\'' | '(' | ')')
    }

    // Full-URL encoding additionally keeps the reserved separators
    fn uri_unreserved(c: char) -> bool {
        component_unreserved(c)
            || matches!(c, ';' | ',' | '/' | '?' | ':' | '@' | '&' | '=' | '+' | '$' | '#')
    }

    fn percent_encode(s: &str, keep: fn(char) -> bool) -> String {
        let mut out = String::with_capacity(s.len());
        let mut buf = [0u8; 4];
        for c in s.chars() {
            if keep(c) {
                out.push(c);
            } else {
                for b in c.encode_utf8(&mut buf).as_bytes() {
                    out.push_str(&format!("%{:02X}", b));
                }
            }
        }
        out
    }

    /// Percent-decode a string.
    ///
    /// Every input character must be within the single-byte range
    /// (code point <= 0xFF); anything beyond is malformed and reported by
    /// the offending character. A truncated or non-hex escape, or a byte
    /// sequence that is not valid UTF-8 after decoding, is malformed and
    /// reported with the whole input.
    fn percent_decode(name: &str, s: &str) -> Result<String, FunctionError> {
        for c in s.chars() {
            if c as u32 > 0xFF {
                return Err(FunctionError::MalformedInput {
                    function: name.to_string(),
                    input: c.to_string(),
                });
            }
        }
        let malformed = || FunctionError::MalformedInput {
            function: name.to_string(),
            input: s.to_string(),
        };

        let chars: Vec<char> = s.chars().collect();
        let mut bytes = Vec::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '%' {
                let hi = chars.get(i + 1).and_then(|c| c.to_digit(16));
                let lo = chars.get(i + 2).and_then(|c| c.to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        bytes.push((hi * 16 + lo) as u8);
                        i += 3;
                    }
                    _ => return Err(malformed()),
                }
            } else {
                bytes.push(chars[i] as u8);
                i += 1;
            }
        }
        String::from_utf8(bytes).map_err(|_| malformed())
    }

    /// $urlEncode() - Percent-encode, keeping URL separators intact
    pub fn url_encode(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let s = args[0].as_str().expect("argument narrowed to string");
        Ok(Value::string(percent_encode(s, uri_unreserved)))
    }

    /// $urlEncodeComponent() - Percent-encode a single URL component
    pub fn url_encode_component(_name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let s = args[0].as_str().expect("argument narrowed to string");
        Ok(Value::string(percent_encode(s, component_unreserved)))
    }

    /// $urlDecode() - Percent-decode a URL
    pub fn url_decode(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let s = args[0].as_str().expect("argument narrowed to string");
        Ok(Value::string(percent_decode(name, s)?))
    }

    /// $urlDecodeComponent() - Percent-decode a URL component
    pub fn url_decode_component(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let s = args[0].as_str().expect("argument narrowed to string");
        Ok(Value::string(percent_decode(name, s)?))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
