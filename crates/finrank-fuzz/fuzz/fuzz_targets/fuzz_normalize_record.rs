#![no_main]

use finrank::config::venues;
use finrank::models::FetchScope;
use finrank::normalize::normalize_record;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any JSON value must normalize to Ok or Err, never panic
    let Ok(record) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Some(jf) = venues::find("jf") else {
        return;
    };
    let _ = normalize_record(&record, &FetchScope::journal_year(jf, 2024));
    let _ = normalize_record(&record, &FetchScope::working_papers("A1", 2023));
});
