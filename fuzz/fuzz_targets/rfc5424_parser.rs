#![no_main]

use libfuzzer_sys::fuzz_target;
use loghive_ingest::parser::{LogFormat, RecordParser};

fuzz_target!(|data: &[u8]| {
    let Ok(record) = std::str::from_utf8(data) else {
        return;
    };
    let parser = RecordParser::new(LogFormat::Rfc5424);

    // 크래시나 패닉 없이 Some 또는 None을 반환해야 한다
    let _ = parser.parse(record);
});
