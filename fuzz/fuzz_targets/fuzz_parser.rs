#![no_main]

use awk_engine::parse_program;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = parse_program(data);
});
