#![no_main]

use finrank::normalize::names;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(name) = std::str::from_utf8(data) else {
        return;
    };
    // The key of a parsed name must parse back to itself
    if let Some(parsed) = names::parse(name) {
        let again = names::parse(&parsed.key).map(|n| n.key);
        assert_eq!(again.as_deref(), Some(parsed.key.as_str()));
    }
});
