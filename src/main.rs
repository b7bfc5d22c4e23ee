use std::env;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::process;

use log::debug;

use awk_engine::{Error, Interpreter, Outcome, Program, parse_program};

/// Parsed command line
#[derive(Debug, Default)]
struct Options {
    field_separator: Option<String>,
    assignments: Vec<(String, String)>,
    program_files: Vec<String>,
    program_text: Option<String>,
    operands: Vec<String>,
}

enum Command {
    Run(Options),
    Help,
    Version,
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();

    match run(&args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("awk-engine: {}", e);
            process::exit(2);
        }
    }
}

fn run(args: &[String]) -> Result<i32, Box<dyn std::error::Error>> {
    let options = match parse_args(args)? {
        Command::Help => {
            print_help();
            return Ok(0);
        }
        Command::Version => {
            println!("awk-engine {}", env!("CARGO_PKG_VERSION"));
            return Ok(0);
        }
        Command::Run(options) => options,
    };

    let source = if options.program_files.is_empty() {
        options.program_text.clone().ok_or("no program provided")?
    } else {
        let mut sources = Vec::with_capacity(options.program_files.len());
        for path in &options.program_files {
            sources.push(fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?);
        }
        sources.join("\n")
    };
    let program = parse_program(&source)?;

    let stdout = BufWriter::new(io::stdout().lock());
    let mut interpreter = Interpreter::new(stdout);
    if let Some(fs) = &options.field_separator {
        interpreter.set_fs(&field_separator(fs))?;
    }
    for (name, value) in &options.assignments {
        interpreter.set_variable(name, &unescape(value))?;
    }
    let mut argv = vec!["awk-engine".to_string()];
    argv.extend(options.operands.iter().cloned());
    interpreter.set_args(argv);

    if let Err(err) = execute(&mut interpreter, &program, &options.operands) {
        // Phases close their own streams on error; this covers inputs that failed to open
        let _ = interpreter.close_all();
        return Err(err.into());
    }
    Ok(interpreter.exit_status())
}

/// Run all three phases. END rules run even after `exit`.
fn execute(
    interpreter: &mut Interpreter<'static>,
    program: &Program,
    operands: &[String],
) -> awk_engine::Result<()> {
    let outcome = interpreter.exec_begin(program)?;
    if outcome == Outcome::Completed && (program.has_main_rules() || program.has_end_rules()) {
        read_inputs(interpreter, program, operands)?;
    }
    interpreter.exec_end(program)?;
    Ok(())
}

fn read_inputs(
    interpreter: &mut Interpreter<'static>,
    program: &Program,
    operands: &[String],
) -> awk_engine::Result<()> {
    let mut read_any = false;
    for operand in operands {
        if let Some((name, value)) = assignment_operand(operand) {
            debug!("command line assignment {name}={value:?}");
            interpreter.set_variable(name, &unescape(value))?;
            continue;
        }
        read_any = true;
        let outcome = if operand == "-" {
            interpreter.exec_file(program, operand, io::stdin().lock())?
        } else {
            let file = File::open(operand)
                .map_err(|e| Error::runtime(format!("can't open file {operand}: {e}")))?;
            interpreter.exec_file(program, operand, BufReader::new(file))?
        };
        if let Outcome::Exit(_) = outcome {
            return Ok(());
        }
    }
    if !read_any {
        interpreter.exec_file(program, "", io::stdin().lock())?;
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut options = Options::default();
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];

        if !positional.is_empty() {
            positional.push(arg.clone());
        } else if arg == "--help" || arg == "-h" {
            return Ok(Command::Help);
        } else if arg == "--version" {
            return Ok(Command::Version);
        } else if arg == "--" {
            positional.extend(args[i + 1..].iter().cloned());
            break;
        } else if arg == "-F" || arg == "-v" || arg == "-f" {
            i += 1;
            let value = args
                .get(i)
                .ok_or_else(|| format!("option {arg} requires an argument"))?;
            apply_option(&mut options, arg, value)?;
        } else if arg.len() > 2 && (arg.starts_with("-F") || arg.starts_with("-v") || arg.starts_with("-f")) {
            let (flag, value) = arg.split_at(2);
            apply_option(&mut options, flag, value)?;
        } else if arg.starts_with('-') && arg != "-" {
            return Err(format!("unknown option: {arg}"));
        } else {
            positional.push(arg.clone());
        }

        i += 1;
    }

    let mut positional = positional.into_iter();
    if options.program_files.is_empty() {
        options.program_text = Some(positional.next().ok_or("no program provided")?);
    }
    options.operands = positional.collect();
    Ok(Command::Run(options))
}

fn apply_option(options: &mut Options, flag: &str, value: &str) -> Result<(), String> {
    match flag {
        "-F" => options.field_separator = Some(value.to_string()),
        "-f" => options.program_files.push(value.to_string()),
        _ => {
            let (name, value) = assignment_operand(value)
                .ok_or_else(|| format!("invalid variable assignment: {value}"))?;
            options.assignments.push((name.to_string(), value.to_string()));
        }
    }
    Ok(())
}

/// `name=value` where name is a valid identifier
fn assignment_operand(operand: &str) -> Option<(&str, &str)> {
    let (name, value) = operand.split_once('=')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    if (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Some((name, value))
    } else {
        None
    }
}

/// `-Ft` means a tab, as in other awks
fn field_separator(fs: &str) -> String {
    if fs == "t" { "\t".to_string() } else { unescape(fs) }
}

/// Escape processing for command line values, as for string literals
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('/') => out.push('/'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0C'),
            Some('v') => out.push('\x0B'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn print_help() {
    println!(
        r#"Usage: awk-engine [OPTIONS] 'program' [file | var=value ...]
       awk-engine [OPTIONS] -f progfile [file | var=value ...]

Options:
  -F fs          Set the field separator to fs
  -v var=val     Assign value to variable before execution
  -f progfile    Read the AWK program from file (repeatable)
  --version      Print version information
  --help         Print this help message

Set RUST_LOG=debug to trace execution.

Examples:
  awk-engine '{{ print $1 }}' file.txt
  awk-engine -F: '{{ print $1 }}' /etc/passwd
  awk-engine 'BEGIN {{ print "Hello" }}'
  awk-engine '/pattern/ {{ print }}' file.txt
"#
    );
}
