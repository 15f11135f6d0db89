#![no_main]

use finrank::models::{YearFilter, parse_venues};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let _ = input.parse::<YearFilter>();
    let _ = parse_venues(input);
});
