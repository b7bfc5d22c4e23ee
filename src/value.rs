use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use crate::format;

/// Default CONVFMT and OFMT
pub const DEFAULT_NUMBER_FORMAT: &str = "%.6g";

/// AWK value type with dynamic typing and automatic coercion
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Never assigned - behaves as both "" and 0
    #[default]
    Uninitialized,
    /// Result of arithmetic or a numeric literal
    Number(f64),
    /// String literal, concatenation or non-numeric input
    Str(String),
    /// Input text that looks numeric, with its parsed value
    StrNum(String, f64),
}

impl Value {
    /// Wrap text that came from input (fields, getline, `-v`, ARGV, ENVIRON).
    /// It becomes a strnum if it looks like a number.
    pub fn from_input(s: impl Into<String>) -> Self {
        let s = s.into();
        match looks_numeric(&s) {
            Some(n) => Value::StrNum(s, n),
            None => Value::Str(s),
        }
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn bool(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }

    /// Truth value: numbers and strnums by value, strings by emptiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Uninitialized => false,
            Value::Number(n) | Value::StrNum(_, n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// Numeric coercion; non-numeric text converts by its leading number
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Uninitialized => 0.0,
            Value::Number(n) | Value::StrNum(_, n) => *n,
            Value::Str(s) => parse_leading_number(s),
        }
    }

    /// String coercion, converting computed numbers with `convfmt`
    pub fn to_str(&self, convfmt: &str) -> Cow<'_, str> {
        match self {
            Value::Uninitialized => Cow::Borrowed(""),
            Value::Number(n) => Cow::Owned(number_to_string(*n, convfmt)),
            Value::Str(s) | Value::StrNum(s, _) => Cow::Borrowed(s),
        }
    }

    pub fn into_string(self, convfmt: &str) -> String {
        match self {
            Value::Uninitialized => String::new(),
            Value::Number(n) => number_to_string(n, convfmt),
            Value::Str(s) | Value::StrNum(s, _) => s,
        }
    }

    /// Whether this value takes part in numeric comparison
    pub fn compares_as_number(&self) -> bool {
        matches!(
            self,
            Value::Number(_) | Value::StrNum(..) | Value::Uninitialized
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str(DEFAULT_NUMBER_FORMAT))
    }
}

/// Compare two values: numerically when both are numbers or strnums,
/// otherwise as strings
pub fn compare_values(left: &Value, right: &Value, convfmt: &str) -> Ordering {
    if left.compares_as_number() && right.compares_as_number() {
        let (l, r) = (left.to_number(), right.to_number());
        return l.partial_cmp(&r).unwrap_or_else(|| {
            // NaN sorts after everything, equal to itself
            l.is_nan().cmp(&r.is_nan())
        });
    }
    left.to_str(convfmt).cmp(&right.to_str(convfmt))
}

/// Number to string: integral values print as integers, everything else
/// goes through `format` (CONVFMT or OFMT)
pub fn number_to_string(n: f64, format: &str) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n == n.trunc() && n.abs() < 1e16 {
        return (n as i64).to_string();
    }
    format::format_number(n, format)
}

/// Byte length of the longest number at the start of `bytes`:
/// optional sign, digits with optional fraction, optional exponent.
/// Zero if there is no digit.
fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i = 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        i = j;
    }

    if digits == 0 {
        return 0;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        // "1e" and "1e+" keep only the mantissa
        if j > exp_start {
            i = j;
        }
    }

    i
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Parse the leading numeric portion of a string
/// "42abc" -> 42.0
/// "  3.14  " -> 3.14
/// "abc" -> 0.0
pub fn parse_leading_number(s: &str) -> f64 {
    let s = s.trim_start_matches(is_blank);
    let len = numeric_prefix_len(s.as_bytes());
    if len == 0 {
        return 0.0;
    }
    s[..len].parse().unwrap_or(0.0)
}

/// The numeric value of `s` if the whole string, ignoring surrounding
/// blanks, is a number
pub fn looks_numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim_matches(is_blank);
    if trimmed.is_empty() {
        return None;
    }

    // Fast path for plain integers
    if trimmed.len() < 16 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.parse::<i64>().ok().map(|n| n as f64);
    }

    if numeric_prefix_len(trimmed.as_bytes()) == trimmed.len() {
        trimmed.parse().ok()
    } else {
        None
    }
}
