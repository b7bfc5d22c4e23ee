//! awk-engine - an AWK front end and execution engine
//!
//! The crate lexes and parses AWK source into a [`Program`], then runs it
//! with an [`Interpreter`] in three phases: BEGIN rules, the main rules once
//! per input record, and END rules. The host decides which inputs to feed
//! and what to do with the exit status.
//!
//! # Example
//!
//! ```
//! use awk_engine::{Interpreter, Outcome, parse_program};
//!
//! let program = parse_program(r#"BEGIN { print "Hello, World!" }"#).unwrap();
//!
//! let mut output = Vec::new();
//! let mut interpreter = Interpreter::new(&mut output);
//! assert_eq!(interpreter.exec_begin(&program).unwrap(), Outcome::Completed);
//! interpreter.exec_end(&program).unwrap();
//! drop(interpreter);
//!
//! assert_eq!(String::from_utf8(output).unwrap(), "Hello, World!\n");
//! ```
//!
//! # Field Processing Example
//!
//! ```
//! use awk_engine::{Interpreter, parse_program};
//!
//! let program = parse_program("{ print $2, $1 }").unwrap();
//!
//! let mut output = Vec::new();
//! let mut interpreter = Interpreter::new(&mut output);
//! interpreter.set_fs(",").unwrap();
//! interpreter.exec_begin(&program).unwrap();
//! interpreter
//!     .exec_file(&program, "-", &b"hello,world\nfoo,bar\n"[..])
//!     .unwrap();
//! interpreter.exec_end(&program).unwrap();
//! drop(interpreter);
//!
//! assert_eq!(String::from_utf8(output).unwrap(), "world hello\nbar foo\n");
//! ```
//!
//! # Exit Example
//!
//! `exit` is not an error. The phase ends early, and END rules still run.
//!
//! ```
//! use awk_engine::{Interpreter, Outcome, parse_program};
//!
//! let program = parse_program("/stop/ { exit 3 } { n++ } END { print n }").unwrap();
//!
//! let mut output = Vec::new();
//! let mut interpreter = Interpreter::new(&mut output);
//! interpreter.exec_begin(&program).unwrap();
//! let outcome = interpreter
//!     .exec_file(&program, "-", &b"a\nb\nstop\nc\n"[..])
//!     .unwrap();
//! assert_eq!(outcome, Outcome::Exit(3));
//! interpreter.exec_end(&program).unwrap();
//! assert_eq!(interpreter.exit_status(), 3);
//! drop(interpreter);
//!
//! assert_eq!(String::from_utf8(output).unwrap(), "2\n");
//! ```

pub mod ast;
pub mod error;
pub mod format;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::Program;
pub use error::{Error, Result, SourceLocation};
pub use interpreter::{Interpreter, Outcome};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use value::Value;

/// Lex and parse a complete AWK program
pub fn parse_program(source: &str) -> Result<Program> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}
