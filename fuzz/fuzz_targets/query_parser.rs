#![no_main]

use libfuzzer_sys::fuzz_target;
use loghive_query::Parser;

fuzz_target!(|data: &[u8]| {
    let Ok(query) = std::str::from_utf8(data) else {
        return;
    };
    let _ = Parser::new(query, "message").parse();
});
