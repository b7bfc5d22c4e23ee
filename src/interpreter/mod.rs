mod builtins;
mod expr;
pub mod io;
pub mod record;
pub mod scope;
mod stmt;

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::rc::Rc;

use log::{debug, trace};
use rand::SeedableRng;
use rand::rngs::StdRng;
use regex::{Regex, RegexBuilder};

use crate::ast::*;
use crate::error::{Error, Result};
use crate::value::{DEFAULT_NUMBER_FORMAT, Value};

use io::{OutputMode, RecordReader, RecordSeparator, Streams};
use record::{FieldSplitter, Record};
use scope::Scopes;

/// How a phase of the run ended. `Exit` is not a failure: the caller
/// still runs the END phase, and reads the status from
/// [`Interpreter::exit_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Exit(i32),
}

/// Non-local control transfer out of statement execution
#[derive(Debug)]
enum Unwind {
    Error(Error),
    Next,
    NextFile,
    Exit,
}

impl From<Error> for Unwind {
    fn from(err: Error) -> Self {
        Unwind::Error(err)
    }
}

impl From<std::io::Error> for Unwind {
    fn from(err: std::io::Error) -> Self {
        Unwind::Error(Error::Io(err))
    }
}

type Exec<T> = std::result::Result<T, Unwind>;

const REGEX_CACHE_LIMIT: usize = 500;

/// Compile a regex the way every AWK regex is compiled: `.` also
/// matches newline, and a brace that cannot start an interval is literal
pub(crate) fn compile_regex(source: &str) -> Result<Regex> {
    let source = escape_literal_braces(source);
    Ok(RegexBuilder::new(&source).dot_matches_new_line(true).build()?)
}

/// Rewrite `{` and `}` that are not part of a `{n}`, `{n,}` or `{n,m}`
/// interval following a repeatable item into `\{` and `\}`. A stray `[`
/// inside a bracket expression is escaped as well, since the regex crate
/// would read it as a nested class.
fn escape_literal_braces(source: &str) -> Cow<'_, str> {
    if !source.contains(['{', '}', '[']) {
        return Cow::Borrowed(source);
    }
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 8);
    let mut in_bracket = false;
    // Whether the last item can take a repetition
    let mut repeatable = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_bracket {
            match c {
                '\\' => {
                    out.push(c);
                    if let Some(&next) = chars.get(i + 1) {
                        out.push(next);
                        i += 1;
                    }
                }
                '[' if matches!(chars.get(i + 1), Some(':' | '=' | '.')) => {
                    // `[:alpha:]` and friends, copied through their closing `]`
                    let end = chars[i + 2..]
                        .iter()
                        .position(|&c| c == ']')
                        .map_or(chars.len() - 1, |p| i + 2 + p);
                    out.extend(&chars[i..=end]);
                    i = end;
                }
                '[' => out.push_str("\\["),
                ']' => {
                    out.push(c);
                    in_bracket = false;
                    repeatable = true;
                }
                _ => out.push(c),
            }
            i += 1;
            continue;
        }

        match c {
            '\\' => {
                out.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
                repeatable = true;
            }
            '[' => {
                out.push(c);
                in_bracket = true;
                // `]` directly after `[` or `[^` is a member
                if chars.get(i + 1) == Some(&'^') {
                    out.push('^');
                    i += 1;
                }
                if chars.get(i + 1) == Some(&']') {
                    out.push(']');
                    i += 1;
                }
            }
            '{' => match interval_len(&chars[i..]) {
                Some(len) if repeatable => {
                    out.extend(&chars[i..i + len]);
                    i += len - 1;
                    repeatable = false;
                }
                _ => {
                    out.push_str("\\{");
                    repeatable = true;
                }
            },
            '}' => {
                out.push_str("\\}");
                repeatable = true;
            }
            '(' | '|' | '^' | '$' | '*' | '+' | '?' => {
                out.push(c);
                repeatable = false;
            }
            _ => {
                out.push(c);
                repeatable = true;
            }
        }
        i += 1;
    }
    Cow::Owned(out)
}

/// Length of the interval at the start of `chars`, braces included
fn interval_len(chars: &[char]) -> Option<usize> {
    let mut i = 1;
    let digits = |from: usize| chars[from..].iter().take_while(|c| c.is_ascii_digit()).count();
    let min = digits(i);
    if min == 0 {
        return None;
    }
    i += min;
    if chars.get(i) == Some(&',') {
        i += 1;
        i += digits(i);
    }
    (chars.get(i) == Some(&'}')).then_some(i + 1)
}

/// The AWK interpreter runtime. One instance holds all state of one run.
pub struct Interpreter<'a> {
    /// Where unredirected print and printf output goes
    output: Box<dyn Write + 'a>,

    /// User functions of the program being run
    functions: Rc<Vec<FunctionDef>>,

    /// Global variables and function call frames
    scopes: Scopes,

    /// Current record ($0) and its fields
    record: Record,

    /// Main input of the file being processed, read by plain getline
    main_input: Option<RecordReader<'a>>,
    record_separator: RecordSeparator,

    /// Files and commands opened by redirection or getline
    streams: Streams,

    regex_cache: HashMap<String, Regex>,

    /// Range pattern state, by rule index
    range_active: HashMap<usize, bool>,

    rng: StdRng,
    seed: f64,

    // Special variables
    nr: f64,
    fnr: f64,
    fs: String,
    ofs: String,
    ors: String,
    rs: String,
    subsep: String,
    convfmt: String,
    ofmt: String,
    filename: String,
    rstart: f64,
    rlength: f64,

    exit_status: i32,
    /// Set once `exit` ran; remaining input is skipped
    exited: bool,
}

impl<'a> Interpreter<'a> {
    pub fn new(output: impl Write + 'a) -> Self {
        let mut interpreter = Self {
            output: Box::new(output),
            functions: Rc::new(Vec::new()),
            scopes: Scopes::new(),
            record: Record::new(),
            main_input: None,
            record_separator: RecordSeparator::default(),
            streams: Streams::new(),
            regex_cache: HashMap::new(),
            range_active: HashMap::new(),
            rng: StdRng::seed_from_u64(0),
            seed: 0.0,
            nr: 0.0,
            fnr: 0.0,
            fs: " ".to_string(),
            ofs: " ".to_string(),
            ors: "\n".to_string(),
            rs: "\n".to_string(),
            subsep: "\x1c".to_string(),
            convfmt: DEFAULT_NUMBER_FORMAT.to_string(),
            ofmt: DEFAULT_NUMBER_FORMAT.to_string(),
            filename: String::new(),
            rstart: 0.0,
            rlength: -1.0,
            exit_status: 0,
            exited: false,
        };
        interpreter.set_args(Vec::<String>::new());
        interpreter.set_environ(std::env::vars_os().map(|(key, value)| {
            (
                key.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        }));
        interpreter
    }

    /// Set ARGV (and ARGC); ARGV[0] is conventionally the program name
    pub fn set_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: HashMap<String, Value> = args
            .into_iter()
            .enumerate()
            .map(|(i, arg)| (i.to_string(), Value::from_input(arg)))
            .collect();
        self.scopes.set_global("ARGC", Value::Number(argv.len() as f64));
        self.scopes.set_global_array("ARGV", argv);
    }

    /// Replace the ENVIRON snapshot
    pub fn set_environ<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let environ = vars
            .into_iter()
            .map(|(key, value)| (key, Value::from_input(value)))
            .collect();
        self.scopes.set_global_array("ENVIRON", environ);
    }

    /// Set the field separator, as `-F` does
    pub fn set_fs(&mut self, fs: &str) -> Result<()> {
        self.set_special(SpecialVar::Fs, Value::str(fs))
    }

    /// Assign a variable from outside the program (`-v name=value` or a
    /// `name=value` operand). The value is input, so it may be a strnum.
    pub fn set_variable(&mut self, name: &str, value: &str) -> Result<()> {
        let value = Value::from_input(value);
        match SpecialVar::from_name(name) {
            Some(var) => self.set_special(var, value),
            None => {
                let var = VarRef {
                    name: name.to_string(),
                    scope: Scope::Global,
                };
                self.scopes.set(&var, value)
            }
        }
    }

    /// Status given to the last `exit expr`, 0 if none
    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    /// Run the BEGIN rules
    pub fn exec_begin(&mut self, program: &Program) -> Result<Outcome> {
        self.functions = Rc::clone(&program.functions);
        debug!("running BEGIN rules");
        let result = self.run_rules(program.begin_rules());
        self.finish_phase(result)
    }

    /// Run the main rules over every record of one input
    pub fn exec_file(
        &mut self,
        program: &Program,
        file_name: &str,
        reader: impl BufRead + 'a,
    ) -> Result<Outcome> {
        if self.exited {
            return Ok(Outcome::Exit(self.exit_status));
        }
        self.functions = Rc::clone(&program.functions);
        debug!("processing input {file_name:?}");
        self.filename = file_name.to_string();
        self.fnr = 0.0;
        self.main_input = Some(RecordReader::new(Box::new(reader)));
        let result = self.run_main(program);
        self.main_input = None;
        self.finish_phase(result)
    }

    /// Run the END rules, then flush and close all output
    pub fn exec_end(&mut self, program: &Program) -> Result<Outcome> {
        self.functions = Rc::clone(&program.functions);
        debug!("running END rules");
        let result = self.run_rules(program.end_rules());
        let outcome = self.finish_phase(result);
        let closed = self.close_all();
        let outcome = outcome?;
        closed?;
        Ok(outcome)
    }

    /// Flush the output and close every open file and command
    pub fn close_all(&mut self) -> Result<()> {
        let flushed = self.output.flush();
        self.streams.close_all()?;
        flushed?;
        Ok(())
    }

    fn run_rules<'r>(&mut self, rules: impl Iterator<Item = &'r Rule>) -> Exec<()> {
        for rule in rules {
            self.run_action(rule)?;
        }
        Ok(())
    }

    fn finish_phase(&mut self, result: Exec<()>) -> Result<Outcome> {
        match result {
            Ok(()) => Ok(Outcome::Completed),
            Err(Unwind::Exit) => {
                debug!("exit with status {}", self.exit_status);
                self.exited = true;
                Ok(Outcome::Exit(self.exit_status))
            }
            Err(Unwind::Next | Unwind::NextFile) => Err(self.abort(Error::runtime(
                "next or nextfile used outside the main input loop",
            ))),
            Err(Unwind::Error(err)) => Err(self.abort(err)),
        }
    }

    /// An error ends the run: flush and close everything before reporting it
    fn abort(&mut self, err: Error) -> Error {
        debug!("run failed, closing streams: {err}");
        if let Err(close_err) = self.close_all() {
            debug!("close after error failed: {close_err}");
        }
        err
    }

    fn run_main(&mut self, program: &Program) -> Exec<()> {
        while let Some(text) = self.read_main_record()? {
            self.nr += 1.0;
            self.fnr += 1.0;
            trace!("record {}: {:?}", self.nr, text);
            self.record.set_record(text);

            match self.run_main_rules(program) {
                Ok(()) | Err(Unwind::Next) => {}
                Err(Unwind::NextFile) => break,
                Err(unwind) => return Err(unwind),
            }
        }
        Ok(())
    }

    fn read_main_record(&mut self) -> Exec<Option<String>> {
        match self.main_input.as_mut() {
            Some(reader) => Ok(reader.read_record(&self.record_separator)?),
            None => Ok(None),
        }
    }

    fn run_main_rules(&mut self, program: &Program) -> Exec<()> {
        for (index, rule) in program.rules.iter().enumerate() {
            if self.pattern_matches(index, &rule.pattern)? {
                self.run_action(rule)?;
            }
        }
        Ok(())
    }

    fn run_action(&mut self, rule: &Rule) -> Exec<()> {
        match &rule.action {
            Some(block) => {
                self.exec_block(block)?;
            }
            None => {
                let mut line = self.record.text(&self.ofs).to_string();
                line.push_str(&self.ors);
                self.write_output(None, &line)?;
            }
        }
        Ok(())
    }

    fn pattern_matches(&mut self, index: usize, pattern: &Pattern) -> Exec<bool> {
        match pattern {
            Pattern::Begin | Pattern::End => Ok(false),
            Pattern::Always => Ok(true),
            Pattern::Expr(expr) => Ok(self.eval(expr)?.is_truthy()),
            Pattern::Range(start, stop) => {
                let active = self.range_active.get(&index).copied().unwrap_or(false);
                if !active && !self.eval(start)?.is_truthy() {
                    return Ok(false);
                }
                // The stop pattern is checked on the starting record too
                let stopped = self.eval(stop)?.is_truthy();
                self.range_active.insert(index, !stopped);
                Ok(true)
            }
        }
    }

    /// Write to the output sink or a redirection target
    fn write_output(&mut self, redirect: Option<&OutputRedirect>, text: &str) -> Exec<()> {
        let Some(redirect) = redirect else {
            self.output.write_all(text.as_bytes())?;
            return Ok(());
        };

        let (target, mode) = match redirect {
            OutputRedirect::Truncate(target) => (target, OutputMode::Truncate),
            OutputRedirect::Append(target) => (target, OutputMode::Append),
            OutputRedirect::Pipe(target) => (target, OutputMode::Pipe),
        };
        let name = self.eval(target)?.into_string(&self.convfmt);
        let stream = self.streams.output(&name, mode)?;
        // Write failures surface through close()
        if let Err(err) = stream.write_all(text.as_bytes()) {
            debug!("write to {name:?} failed: {err}");
        }
        Ok(())
    }

    /// Flush the sink and every output stream, before running commands
    fn flush_all(&mut self) -> Result<()> {
        self.output.flush()?;
        self.streams.flush_all()
    }

    fn regex(&mut self, source: &str) -> Result<Regex> {
        if let Some(regex) = self.regex_cache.get(source) {
            return Ok(regex.clone());
        }
        let regex = compile_regex(source)?;
        // Dynamic regexes built from input can be unbounded in number
        if self.regex_cache.len() >= REGEX_CACHE_LIMIT {
            trace!("regex cache full, clearing");
            self.regex_cache.clear();
        }
        self.regex_cache.insert(source.to_string(), regex.clone());
        Ok(regex)
    }

    fn special(&mut self, var: SpecialVar) -> Value {
        match var {
            SpecialVar::Nr => Value::Number(self.nr),
            SpecialVar::Nf => Value::Number(self.record.nf() as f64),
            SpecialVar::Fnr => Value::Number(self.fnr),
            SpecialVar::Fs => Value::str(self.fs.as_str()),
            SpecialVar::Ofs => Value::str(self.ofs.as_str()),
            SpecialVar::Ors => Value::str(self.ors.as_str()),
            SpecialVar::Rs => Value::str(self.rs.as_str()),
            SpecialVar::Filename => Value::str(self.filename.as_str()),
            SpecialVar::Subsep => Value::str(self.subsep.as_str()),
            SpecialVar::Rstart => Value::Number(self.rstart),
            SpecialVar::Rlength => Value::Number(self.rlength),
            SpecialVar::Convfmt => Value::str(self.convfmt.as_str()),
            SpecialVar::Ofmt => Value::str(self.ofmt.as_str()),
        }
    }

    fn set_special(&mut self, var: SpecialVar, value: Value) -> Result<()> {
        match var {
            SpecialVar::Nr => self.nr = value.to_number(),
            SpecialVar::Fnr => self.fnr = value.to_number(),
            SpecialVar::Nf => {
                let nf = value.to_number();
                if nf < 0.0 || nf.is_nan() {
                    return Err(Error::runtime(format!("NF set to negative value {nf}")));
                }
                self.record.set_nf(nf as usize);
            }
            SpecialVar::Fs => {
                let fs = value.into_string(&self.convfmt);
                self.record.set_splitter(FieldSplitter::from_fs(&fs)?);
                self.fs = fs;
            }
            SpecialVar::Rs => {
                let rs = value.into_string(&self.convfmt);
                self.record_separator = RecordSeparator::from_rs(&rs)?;
                self.record.set_paragraph_mode(rs.is_empty());
                self.rs = rs;
            }
            SpecialVar::Ofs => self.ofs = value.into_string(&self.convfmt),
            SpecialVar::Ors => self.ors = value.into_string(&self.convfmt),
            SpecialVar::Subsep => self.subsep = value.into_string(&self.convfmt),
            SpecialVar::Convfmt => self.convfmt = value.into_string(&self.convfmt),
            SpecialVar::Ofmt => self.ofmt = value.into_string(&self.convfmt),
            SpecialVar::Filename => self.filename = value.into_string(&self.convfmt),
            SpecialVar::Rstart => return Err(Error::runtime("RSTART is read-only")),
            SpecialVar::Rlength => return Err(Error::runtime("RLENGTH is read-only")),
        }
        Ok(())
    }

    fn assign_var(&mut self, var: &VarRef, value: Value) -> Result<()> {
        match var.scope {
            Scope::Special(special) => self.set_special(special, value),
            _ => self.scopes.set(var, value),
        }
    }
}
