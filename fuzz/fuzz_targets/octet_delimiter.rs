#![no_main]

use libfuzzer_sys::fuzz_target;
use loghive_ingest::delimiter::OctetCountDelimiter;

fuzz_target!(|data: &[u8]| {
    let mut delimiter = OctetCountDelimiter::new();
    for byte in data {
        let _ = delimiter.push(*byte);
    }
    let _ = delimiter.vestige();
});
