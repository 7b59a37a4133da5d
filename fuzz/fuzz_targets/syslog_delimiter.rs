#![no_main]

use libfuzzer_sys::fuzz_target;
use loghive_ingest::delimiter::SyslogDelimiter;

fuzz_target!(|data: &[u8]| {
    let mut delimiter = SyslogDelimiter::new();
    for byte in data {
        let _ = delimiter.push(*byte);
    }
    let _ = delimiter.vestige();
});
