#![no_main]

use libfuzzer_sys::fuzz_target;
use repolens_git::changes::{parse_name_status, parse_numstat, split_unified_diff};
use repolens_git::history::parse_log;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = split_unified_diff(text);
        let _ = parse_name_status(text);
        let _ = parse_numstat(text);
        let _ = parse_log(text);
    }
});
