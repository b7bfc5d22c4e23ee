//! CLI integration tests for awk-engine
//!
//! These tests run the awk-engine binary and verify command-line behavior.

use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::NamedTempFile;

fn spawn(args: &[&str], input: Option<&str>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_awk-engine"));
    cmd.args(args);
    cmd.stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().unwrap();
    if let Some(input_str) = input
        && let Some(mut stdin) = child.stdin.take()
    {
        stdin.write_all(input_str.as_bytes()).unwrap();
    }
    child.wait_with_output().unwrap()
}

/// Run awk-engine with the given arguments and input, returning stdout
fn run_awk_engine(args: &[&str], input: Option<&str>) -> Result<String, String> {
    let output = spawn(args, input);
    if output.status.success() {
        String::from_utf8(output.stdout).map_err(|e| e.to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_cli_help() {
    let output = run_awk_engine(&["--help"], None).unwrap();
    assert!(output.contains("Usage:"));
    assert!(output.contains("awk-engine"));
}

#[test]
fn test_cli_version() {
    let output = run_awk_engine(&["--version"], None).unwrap();
    assert!(output.starts_with("awk-engine "));
}

#[test]
fn test_cli_simple_program() {
    let output = run_awk_engine(&["BEGIN { print \"hello\" }"], None).unwrap();
    assert_eq!(output, "hello\n");
}

#[test]
fn test_cli_with_input() {
    let output = run_awk_engine(&["{ print $1 }"], Some("a b c")).unwrap();
    assert_eq!(output, "a\n");
}

#[test]
fn test_cli_field_separator() {
    let output = run_awk_engine(&["-F", ":", "{ print $1 }"], Some("a:b:c")).unwrap();
    assert_eq!(output, "a\n");
}

#[test]
fn test_cli_field_separator_attached() {
    let output = run_awk_engine(&["-F,", "{ print $2 }"], Some("a,b,c")).unwrap();
    assert_eq!(output, "b\n");
}

#[test]
fn test_cli_field_separator_tab() {
    let output = run_awk_engine(&["-Ft", "{ print $2 }"], Some("a b\tc")).unwrap();
    assert_eq!(output, "c\n");
}

#[test]
fn test_cli_variable() {
    let output = run_awk_engine(&["-v", "x=5", "BEGIN { print x + 1 }"], None).unwrap();
    assert_eq!(output, "6\n");
}

#[test]
fn test_cli_variable_escapes() {
    let output = run_awk_engine(&["-v", "s=a\\tb", "BEGIN { print s }"], None).unwrap();
    assert_eq!(output, "a\tb\n");
}

#[test]
fn test_cli_program_file() {
    let file = temp_file("BEGIN { print \"from file\" }\n");
    let path = file.path().to_str().unwrap();
    let output = run_awk_engine(&["-f", path], None).unwrap();
    assert_eq!(output, "from file\n");
}

#[test]
fn test_cli_repeated_program_files() {
    let lib = temp_file("function twice(x) { return 2 * x }\n");
    let main = temp_file("BEGIN { print twice(21) }\n");
    let output = run_awk_engine(
        &["-f", lib.path().to_str().unwrap(), "-f", main.path().to_str().unwrap()],
        None,
    )
    .unwrap();
    assert_eq!(output, "42\n");
}

#[test]
fn test_cli_separator_end_of_options() {
    let output = run_awk_engine(&["--", "BEGIN { print \"test\" }"], None).unwrap();
    assert_eq!(output, "test\n");
}

#[test]
fn test_cli_stdin_dash() {
    let output = run_awk_engine(&["{ print }", "-"], Some("hello")).unwrap();
    assert_eq!(output, "hello\n");
}

#[test]
fn test_cli_multiple_inputs() {
    let file1 = temp_file("a\n");
    let file2 = temp_file("b\n");
    let path1 = file1.path().to_str().unwrap();
    let path2 = file2.path().to_str().unwrap();
    let output = run_awk_engine(&["{ print FNR, $0 }", path1, path2], None).unwrap();
    assert_eq!(output, "1 a\n1 b\n");
}

#[test]
fn test_cli_assignment_operands() {
    let file1 = temp_file("a\n");
    let file2 = temp_file("b\n");
    let path1 = file1.path().to_str().unwrap();
    let path2 = file2.path().to_str().unwrap();
    let output = run_awk_engine(&["{ print tag, $0 }", "tag=one", path1, "tag=two", path2], None).unwrap();
    assert_eq!(output, "one a\ntwo b\n");
}

#[test]
fn test_cli_argv() {
    let output = run_awk_engine(&["BEGIN { print ARGC, ARGV[1] }", "data.txt"], None).unwrap();
    assert_eq!(output, "2 data.txt\n");
}

#[test]
fn test_cli_begin_only_does_not_read_input() {
    let output = run_awk_engine(&["BEGIN { print \"only\" }", "/nonexistent/input"], None).unwrap();
    assert_eq!(output, "only\n");
}

#[test]
fn test_cli_exit_status() {
    let output = spawn(&["{ exit $1 } END { print \"end\" }"], Some("7\n8\n"));
    assert_eq!(output.status.code(), Some(7));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "end\n");
}

#[test]
fn test_cli_deep_recursion() {
    let program = "function f(n) { if (n == 0) return 0; return 1 + f(n - 1) } BEGIN { print f(n) }";
    let output = run_awk_engine(&["-v", "n=10000", program], None).unwrap();
    assert_eq!(output, "10000\n");
}

#[test]
fn test_cli_runtime_error_exit_code() {
    let output = spawn(&["BEGIN { print \"before\"; print 1 / 0 }"], None);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "before\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("division by zero"));
}

#[test]
fn test_cli_syntax_error_exit_code() {
    let output = spawn(&["BEGIN { print ( }"], None);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("syntax error"));
}

#[test]
fn test_cli_missing_input_file() {
    let output = spawn(&["{ print }", "/nonexistent/input"], None);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_error_no_program() {
    let result = run_awk_engine(&[], None);
    assert!(result.is_err());
}

#[test]
fn test_cli_error_unknown_option() {
    let result = run_awk_engine(&["--unknown"], None);
    assert!(result.is_err());
}

#[test]
fn test_cli_error_missing_f_arg() {
    let result = run_awk_engine(&["-f"], None);
    assert!(result.is_err());
}

#[test]
fn test_cli_error_missing_v_arg() {
    let result = run_awk_engine(&["-v"], None);
    assert!(result.is_err());
}

#[test]
fn test_cli_error_invalid_v_arg() {
    let result = run_awk_engine(&["-v", "invalid"], None);
    assert!(result.is_err());
}

#[test]
fn test_cli_error_missing_field_sep_arg() {
    let result = run_awk_engine(&["-F"], None);
    assert!(result.is_err());
}
