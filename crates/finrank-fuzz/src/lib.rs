//! Fuzzing library for finrank.
//!
//! Targets the parts that see untrusted input: raw OpenAlex records,
//! author display names and CLI scope strings.
//!
//! # Usage
//!
//! ```bash
//! cd crates/finrank-fuzz
//! cargo +nightly fuzz run fuzz_normalize_record -- -max_total_time=60
//! ```

pub use finrank::models;
pub use finrank::normalize;
