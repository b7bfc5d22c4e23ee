use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

use crate::ast::{Builtin, Expr, Scope};
use crate::error::{Error, SourceLocation};
use crate::format;
use crate::value::Value;

use super::io::run_command;
use super::record::FieldSplitter;
use super::{Exec, Interpreter};

impl<'a> Interpreter<'a> {
    /// Call a built-in function. The argument count and the kind of
    /// array and lvalue arguments are checked before anything is evaluated.
    pub(super) fn call_builtin(
        &mut self,
        func: Builtin,
        args: &[Expr],
        location: SourceLocation,
    ) -> Exec<Value> {
        let (min, max) = func.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                format!("{min}")
            } else if max == usize::MAX {
                format!("at least {min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(Error::runtime_at(
                format!(
                    "{}() takes {expected} arguments, got {}",
                    func.name(),
                    args.len()
                ),
                location,
            )
            .into());
        }

        match func {
            Builtin::Length => self.call_length(args),
            Builtin::Substr => {
                let s = self.string_arg(&args[0])?;
                let start = self.eval(&args[1])?.to_number();
                let length = match args.get(2) {
                    Some(arg) => Some(self.eval(arg)?.to_number()),
                    None => None,
                };
                Ok(Value::Str(substr(&s, start, length)))
            }
            Builtin::Index => {
                let s = self.string_arg(&args[0])?;
                let target = self.string_arg(&args[1])?;
                let position = s
                    .find(target.as_str())
                    .map(|byte| s[..byte].chars().count() + 1)
                    .unwrap_or(0);
                Ok(Value::Number(position as f64))
            }
            Builtin::Split => self.call_split(args, location),
            Builtin::Sub | Builtin::Gsub => self.call_sub(args, func == Builtin::Gsub, location),
            Builtin::Match => {
                let s = self.string_arg(&args[0])?;
                let regex = self.regex_operand(&args[1])?;
                match regex.find(&s) {
                    Some(m) => {
                        self.rstart = (s[..m.start()].chars().count() + 1) as f64;
                        self.rlength = m.as_str().chars().count() as f64;
                    }
                    None => {
                        self.rstart = 0.0;
                        self.rlength = -1.0;
                    }
                }
                Ok(Value::Number(self.rstart))
            }
            Builtin::Sprintf => {
                let format = self.string_arg(&args[0])?;
                let mut values = Vec::with_capacity(args.len() - 1);
                for arg in &args[1..] {
                    values.push(self.eval(arg)?);
                }
                Ok(Value::Str(format::sprintf(&format, &values, &self.convfmt)?))
            }
            Builtin::Tolower => Ok(Value::Str(self.string_arg(&args[0])?.to_lowercase())),
            Builtin::Toupper => Ok(Value::Str(self.string_arg(&args[0])?.to_uppercase())),

            // Math functions
            Builtin::Sin => Ok(Value::Number(self.number_arg(&args[0])?.sin())),
            Builtin::Cos => Ok(Value::Number(self.number_arg(&args[0])?.cos())),
            Builtin::Atan2 => {
                let y = self.number_arg(&args[0])?;
                let x = self.number_arg(&args[1])?;
                Ok(Value::Number(y.atan2(x)))
            }
            Builtin::Exp => Ok(Value::Number(self.number_arg(&args[0])?.exp())),
            Builtin::Log => Ok(Value::Number(self.number_arg(&args[0])?.ln())),
            Builtin::Sqrt => Ok(Value::Number(self.number_arg(&args[0])?.sqrt())),
            Builtin::Int => Ok(Value::Number(self.number_arg(&args[0])?.trunc())),
            Builtin::Rand => Ok(Value::Number(self.rng.gen_range(0.0..1.0))),
            Builtin::Srand => {
                let previous = self.seed;
                self.seed = match args.first() {
                    Some(arg) => self.number_arg(arg)?,
                    None => SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_secs() as f64)
                        .unwrap_or(0.0),
                };
                self.rng = StdRng::seed_from_u64(self.seed as i64 as u64);
                Ok(Value::Number(previous))
            }

            // I/O and system functions
            Builtin::System => {
                let command = self.string_arg(&args[0])?;
                self.flush_all()?;
                Ok(Value::Number(run_command(&command) as f64))
            }
            Builtin::Close => {
                let name = self.string_arg(&args[0])?;
                // Command output must come after what was printed before
                self.output.flush()?;
                Ok(Value::Number(self.streams.close(&name) as f64))
            }
            Builtin::Fflush => match args.first() {
                None => {
                    let status = if self.flush_all().is_ok() { 0.0 } else { -1.0 };
                    Ok(Value::Number(status))
                }
                Some(arg) => {
                    let name = self.string_arg(arg)?;
                    Ok(Value::Number(self.streams.flush(&name) as f64))
                }
            },
        }
    }

    fn string_arg(&mut self, arg: &Expr) -> Exec<String> {
        Ok(self.eval(arg)?.into_string(&self.convfmt))
    }

    fn number_arg(&mut self, arg: &Expr) -> Exec<f64> {
        Ok(self.eval(arg)?.to_number())
    }

    /// length(), length(s) or the element count of an array
    fn call_length(&mut self, args: &[Expr]) -> Exec<Value> {
        let Some(arg) = args.first() else {
            let count = self.record.text(&self.ofs).chars().count();
            return Ok(Value::Number(count as f64));
        };
        if let Expr::Var(var, _) = arg
            && let Some(array) = self.scopes.existing_array(var)
        {
            return Ok(Value::Number(array.borrow().len() as f64));
        }
        let s = self.string_arg(arg)?;
        Ok(Value::Number(s.chars().count() as f64))
    }

    /// split(s, array [, fs]): clears `array` and fills it from 1
    fn call_split(&mut self, args: &[Expr], location: SourceLocation) -> Exec<Value> {
        let var = match &args[1] {
            Expr::Var(var, _) if !matches!(var.scope, Scope::Special(_)) => var,
            _ => {
                return Err(Error::runtime_at(
                    "split: second argument must be an array name",
                    location,
                )
                .into());
            }
        };

        let s = self.string_arg(&args[0])?;
        let splitter = match args.get(2) {
            Some(Expr::Regex(source, _)) => FieldSplitter::from_regex(source)?,
            Some(other) => {
                let fs = self.string_arg(other)?;
                FieldSplitter::from_fs(&fs)?
            }
            None => self.record.splitter().clone(),
        };

        let array = self.scopes.array(var)?;
        let parts = splitter.split(&s, false);
        let mut array = array.borrow_mut();
        array.clear();
        for (i, part) in parts.iter().enumerate() {
            array.insert((i + 1).to_string(), Value::from_input(*part));
        }
        Ok(Value::Number(parts.len() as f64))
    }

    /// sub(re, repl [, target]) and gsub(...); target defaults to $0
    fn call_sub(&mut self, args: &[Expr], global: bool, location: SourceLocation) -> Exec<Value> {
        if let Some(target) = args.get(2)
            && !target.is_lvalue()
        {
            return Err(Error::runtime_at(
                "sub/gsub third argument must be a variable, array element or field",
                location,
            )
            .into());
        }

        let regex = self.regex_operand(&args[0])?;
        let replacement = self.string_arg(&args[1])?;

        let lvalue = match args.get(2) {
            Some(target) => Some(self.lvalue(target)?),
            None => None,
        };
        let text = match &lvalue {
            Some(lvalue) => self.load(lvalue)?.into_string(&self.convfmt),
            None => self.record.text(&self.ofs).to_string(),
        };

        let (result, count) = substitute(&regex, &text, &replacement, global);
        if count > 0 {
            match &lvalue {
                Some(lvalue) => self.store(lvalue, Value::Str(result))?,
                None => self.record.set_record(result),
            }
        }
        Ok(Value::Number(count as f64))
    }
}

/// POSIX substr: positions are rounded, 1-based, and clamped to the string
fn substr(s: &str, start: f64, length: Option<f64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as f64;

    let mut first = start.round();
    let mut end = match length {
        Some(length) => first + length.round(),
        None => len + 1.0,
    };
    if first < 1.0 {
        first = 1.0;
    }
    if end > len + 1.0 {
        end = len + 1.0;
    }
    // Also catches NaN
    if !(end > first) {
        return String::new();
    }
    chars[(first as usize - 1)..(end as usize - 1)].iter().collect()
}

/// Replace the first (or every) match of `regex` in `text`. In the
/// replacement, `&` stands for the matched text and `\&` for a literal
/// ampersand. An empty match right after a previous match is skipped.
fn substitute(regex: &Regex, text: &str, replacement: &str, global: bool) -> (String, usize) {
    let mut result = String::with_capacity(text.len());
    let mut count = 0;
    let mut last = 0;
    let mut previous_end = None;

    for m in regex.find_iter(text) {
        if m.is_empty() && previous_end == Some(m.start()) {
            continue;
        }
        result.push_str(&text[last..m.start()]);
        expand_replacement(&mut result, replacement, m.as_str());
        last = m.end();
        previous_end = Some(m.end());
        count += 1;
        if !global {
            break;
        }
    }
    result.push_str(&text[last..]);
    (result, count)
}

fn expand_replacement(out: &mut String, replacement: &str, matched: &str) {
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some('&' | '\\')) => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '&' => out.push_str(matched),
            _ => out.push(c),
        }
    }
}
