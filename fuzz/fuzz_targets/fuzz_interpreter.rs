#![no_main]

use awk_engine::{Interpreter, Outcome, parse_program};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First third is the program, the rest is input
    let split_point = data.len() / 3;
    let (program_bytes, input_bytes) = data.split_at(split_point);

    let Ok(program) = std::str::from_utf8(program_bytes) else {
        return;
    };
    let Ok(input) = std::str::from_utf8(input_bytes) else {
        return;
    };

    // Keep sizes bounded, and stay away from the shell and the filesystem
    if program.len() > 10000 || input.len() > 100000 {
        return;
    }
    if program.contains("system") || program.contains('|') || program.contains('>') || program.contains('<') {
        return;
    }

    let Ok(program) = parse_program(program) else {
        return;
    };

    let mut output = Vec::new();
    let mut interpreter = Interpreter::new(&mut output);
    interpreter.set_environ(Vec::new());
    if let Ok(Outcome::Completed) = interpreter.exec_begin(&program) {
        let _ = interpreter.exec_file(&program, "-", input.as_bytes());
    }
    let _ = interpreter.exec_end(&program);
});
