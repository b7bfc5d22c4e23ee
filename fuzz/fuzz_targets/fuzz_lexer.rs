#![no_main]

use awk_engine::Lexer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Errors are fine, panics and hangs are not
    let _ = Lexer::new(data).tokenize();
});
