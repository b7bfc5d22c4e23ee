//! printf-style formatting shared by `printf`, `sprintf()` and number to
//! string conversion through CONVFMT/OFMT.

use std::iter::Peekable;
use std::slice::Iter;
use std::str::Chars;

use crate::error::{Error, Result};
use crate::value::{DEFAULT_NUMBER_FORMAT, Value};

/// Flags, width and precision of one conversion specification
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FormatArgs {
    pub left_justified: bool,
    pub signed: bool,
    pub prefix_space: bool,
    pub alternative_form: bool,
    pub zero_padded: bool,
    pub width: usize,
    pub precision: Option<usize>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum IntegerFormat {
    Decimal,
    Octal,
    HexLower,
    HexUpper,
}

/// Format `args` according to `format`. Strings are taken as-is, numbers
/// used with `%s` are converted with `convfmt`.
pub fn sprintf(format: &str, args: &[Value], convfmt: &str) -> Result<String> {
    let mut out = String::with_capacity(format.len() + 16);
    let mut chars = format.chars().peekable();
    let mut args = args.iter();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let (conversion, spec) = parse_conversion_specifier_args(&mut chars, &mut args)?;
        let Some(conversion) = conversion else {
            // Lone '%' at the end of the format
            out.push('%');
            break;
        };

        match conversion {
            'd' | 'i' => {
                let n = next_arg(&mut args)?.to_number();
                if n.is_finite() {
                    fmt_write_signed(&mut out, n.trunc() as i64, &spec);
                } else {
                    fmt_write_float(&mut out, n, 'f', &spec);
                }
            }
            'o' | 'u' | 'x' | 'X' => {
                let n = next_arg(&mut args)?.to_number();
                let integer_format = match conversion {
                    'o' => IntegerFormat::Octal,
                    'u' => IntegerFormat::Decimal,
                    'x' => IntegerFormat::HexLower,
                    _ => IntegerFormat::HexUpper,
                };
                fmt_write_unsigned(&mut out, to_unsigned(n), integer_format, &spec);
            }
            'c' => {
                let arg = next_arg(&mut args)?;
                let text = match arg {
                    // Numeric input fields are character codes too
                    Value::Number(n) | Value::StrNum(_, n) => char::from_u32(n.trunc() as u32)
                        .map(String::from)
                        .unwrap_or_default(),
                    other => other.to_str(convfmt).chars().take(1).collect(),
                };
                fmt_write_string(&mut out, &text, &FormatArgs { precision: None, ..spec });
            }
            's' => {
                let arg = next_arg(&mut args)?;
                fmt_write_string(&mut out, &arg.to_str(convfmt), &spec);
            }
            'e' | 'E' | 'f' | 'F' | 'g' | 'G' => {
                let n = next_arg(&mut args)?.to_number();
                fmt_write_float(&mut out, n, conversion, &spec);
            }
            other => {
                // Unknown conversions are copied through
                out.push('%');
                out.push(other);
            }
        }
    }

    Ok(out)
}

/// Format a number with a CONVFMT/OFMT style format
pub fn format_number(value: f64, format: &str) -> String {
    if format == DEFAULT_NUMBER_FORMAT {
        let mut out = String::new();
        let spec = FormatArgs {
            precision: Some(6),
            ..Default::default()
        };
        fmt_write_float(&mut out, value, 'g', &spec);
        return out;
    }
    sprintf(format, &[Value::Number(value)], DEFAULT_NUMBER_FORMAT)
        .unwrap_or_else(|_| format_number(value, DEFAULT_NUMBER_FORMAT))
}

fn next_arg<'v>(args: &mut Iter<'v, Value>) -> Result<&'v Value> {
    args.next()
        .ok_or_else(|| Error::runtime("not enough arguments for format string"))
}

fn to_unsigned(n: f64) -> u64 {
    if n < 0.0 {
        n.trunc() as i64 as u64
    } else {
        n.trunc() as u64
    }
}

/// Parse flags, width, precision and length modifiers after a '%'.
/// `*` takes the width or precision from the next argument.
/// Returns the conversion character (`None` at end of input) and the arguments.
pub fn parse_conversion_specifier_args(
    chars: &mut Peekable<Chars<'_>>,
    args: &mut Iter<'_, Value>,
) -> Result<(Option<char>, FormatArgs)> {
    let mut result = FormatArgs::default();

    while let Some(&c) = chars.peek() {
        match c {
            '-' => result.left_justified = true,
            '+' => result.signed = true,
            ' ' => result.prefix_space = true,
            '#' => result.alternative_form = true,
            '0' => result.zero_padded = true,
            _ => break,
        }
        chars.next();
    }

    if chars.peek() == Some(&'*') {
        chars.next();
        let width = next_arg(args)?.to_number() as i64;
        if width < 0 {
            result.left_justified = true;
        }
        result.width = width.unsigned_abs() as usize;
    } else {
        result.width = parse_number(chars);
    }

    if chars.peek() == Some(&'.') {
        chars.next();
        result.precision = if chars.peek() == Some(&'*') {
            chars.next();
            let precision = next_arg(args)?.to_number() as i64;
            (precision >= 0).then_some(precision as usize)
        } else {
            Some(parse_number(chars))
        };
    }

    // C length modifiers mean nothing here
    while matches!(chars.peek(), Some('h' | 'l' | 'L' | 'q' | 'j' | 'z' | 't')) {
        chars.next();
    }

    Ok((chars.next(), result))
}

fn parse_number(chars: &mut Peekable<Chars<'_>>) -> usize {
    let mut number = 0usize;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        number = number.saturating_mul(10).saturating_add(digit as usize);
        chars.next();
    }
    number
}

fn pad_target(target: &mut String, padding: usize, ch: char) {
    target.extend(std::iter::repeat_n(ch, padding));
}

fn sign_prefix(negative: bool, args: &FormatArgs) -> &'static str {
    if negative {
        "-"
    } else if args.signed {
        "+"
    } else if args.prefix_space {
        " "
    } else {
        ""
    }
}

/// Zero-extend `digits` to the precision; precision 0 prints nothing for 0
fn apply_precision(digits: String, precision: Option<usize>) -> String {
    match precision {
        Some(0) if digits == "0" => String::new(),
        Some(p) if p > digits.len() => {
            let mut padded = "0".repeat(p - digits.len());
            padded.push_str(&digits);
            padded
        }
        _ => digits,
    }
}

// left justified:        prefix body padding
// right, zero padded:    prefix zeros body
// right, space padded:   padding prefix body
fn write_padded(target: &mut String, prefix: &str, body: &str, args: &FormatArgs, zero_pad: bool) {
    let length = prefix.chars().count() + body.chars().count();
    let padding = args.width.saturating_sub(length);
    if args.left_justified {
        target.push_str(prefix);
        target.push_str(body);
        pad_target(target, padding, ' ');
    } else if zero_pad {
        target.push_str(prefix);
        pad_target(target, padding, '0');
        target.push_str(body);
    } else {
        pad_target(target, padding, ' ');
        target.push_str(prefix);
        target.push_str(body);
    }
}

pub fn fmt_write_signed(target: &mut String, value: i64, args: &FormatArgs) {
    let digits = apply_precision(value.unsigned_abs().to_string(), args.precision);
    let sign = sign_prefix(value < 0, args);
    // An explicit precision disables the 0 flag for integers
    let zero_pad = args.zero_padded && args.precision.is_none();
    write_padded(target, sign, &digits, args, zero_pad);
}

pub fn fmt_write_unsigned(
    target: &mut String,
    value: u64,
    integer_format: IntegerFormat,
    args: &FormatArgs,
) {
    let digits = match integer_format {
        IntegerFormat::Decimal => value.to_string(),
        IntegerFormat::Octal => format!("{value:o}"),
        IntegerFormat::HexLower => format!("{value:x}"),
        IntegerFormat::HexUpper => format!("{value:X}"),
    };
    let mut digits = apply_precision(digits, args.precision);

    // `#o` forces a leading zero
    if args.alternative_form && integer_format == IntegerFormat::Octal && !digits.starts_with('0') {
        digits.insert(0, '0');
    }
    let prefix = match integer_format {
        IntegerFormat::HexLower if args.alternative_form && value != 0 => "0x",
        IntegerFormat::HexUpper if args.alternative_form && value != 0 => "0X",
        _ => "",
    };

    let zero_pad = args.zero_padded && args.precision.is_none();
    write_padded(target, prefix, &digits, args, zero_pad);
}

/// Width and precision count characters, not bytes
pub fn fmt_write_string(target: &mut String, value: &str, args: &FormatArgs) {
    let shown: &str = match args.precision {
        Some(p) => match value.char_indices().nth(p) {
            Some((end, _)) => &value[..end],
            None => value,
        },
        None => value,
    };
    write_padded(target, "", shown, args, false);
}

/// `%e`, `%f` and `%g` (and their upper-case forms)
pub fn fmt_write_float(target: &mut String, value: f64, conversion: char, args: &FormatArgs) {
    let upper = conversion.is_ascii_uppercase();
    let sign = sign_prefix(value.is_sign_negative() && !value.is_nan(), args);

    if !value.is_finite() {
        let body = match (value.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        write_padded(target, sign, body, args, false);
        return;
    }

    let precision = args.precision.unwrap_or(6);
    let magnitude = value.abs();
    let mut body = match conversion.to_ascii_lowercase() {
        'f' => format!("{:.*}", precision, magnitude),
        'e' => format_exponent(magnitude, precision, upper),
        _ => format_general(magnitude, precision, args.alternative_form, upper),
    };
    if args.alternative_form && precision == 0 && !body.contains('.') {
        match body.find(['e', 'E']) {
            Some(pos) => body.insert(pos, '.'),
            None => body.push('.'),
        }
    }

    write_padded(target, sign, &body, args, args.zero_padded);
}

/// d.ddde+XX with at least two exponent digits
fn format_exponent(magnitude: f64, precision: usize, upper: bool) -> String {
    let formatted = format!("{:.*e}", precision, magnitude);
    let (mantissa, exponent) = formatted
        .split_once('e')
        .unwrap_or((formatted.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    format!(
        "{}{}{}{:02}",
        mantissa,
        if upper { 'E' } else { 'e' },
        if exponent < 0 { '-' } else { '+' },
        exponent.abs()
    )
}

/// `%g`: shortest of `%e`/`%f` style for `precision` significant digits
fn format_general(magnitude: f64, precision: usize, keep_zeros: bool, upper: bool) -> String {
    let precision = precision.max(1);
    let exponent = if magnitude == 0.0 {
        0
    } else {
        // Exponent after rounding to the requested significant digits
        let formatted = format!("{:.*e}", precision - 1, magnitude);
        formatted
            .split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0)
    };

    let body = if exponent < -4 || exponent >= precision as i32 {
        format_exponent(magnitude, precision - 1, upper)
    } else {
        format!("{:.*}", (precision as i32 - 1 - exponent) as usize, magnitude)
    };

    if keep_zeros {
        body
    } else {
        strip_trailing_zeros(&body)
    }
}

fn strip_trailing_zeros(s: &str) -> String {
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(pos) => s.split_at(pos),
        None => (s, ""),
    };
    if !mantissa.contains('.') {
        return s.to_string();
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}{exponent}")
}
