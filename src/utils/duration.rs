//! Duration string parsing
//!
//! Accepts a sequence of decimal magnitudes each followed by a unit suffix,
//! e.g. `"24h"`, `"1h30m"`, `"1.5h"`, `"250ms"`. The bare string `"0"` is the
//! only unit-less value allowed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use crate::utils::error::{CertError, CertResult};

/// Full-string shape of a duration
static DURATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:ns|us|µs|μs|ms|s|m|h))+$").unwrap()
});

/// One magnitude/unit component
static COMPONENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]*)(?:\.([0-9]*))?(ns|us|µs|μs|ms|s|m|h)").unwrap()
});

const MAX_FRACTION_DIGITS: usize = 18;

fn unit_nanos(unit: &str) -> u128 {
    match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        _ => 3_600 * 1_000_000_000,
    }
}

/// Parse a duration string
pub fn parse_duration(input: &str) -> CertResult<Duration> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err(CertError::Validation(format!(
            "Invalid duration string {:?}: negative durations are not allowed",
            input
        )));
    }
    let s = s.strip_prefix('+').unwrap_or(s);
    if s.is_empty() || !DURATION_REGEX.is_match(s) {
        return Err(CertError::Validation(format!(
            "Invalid duration string: {:?}",
            input
        )));
    }

    let mut total: u128 = 0;
    for caps in COMPONENT_REGEX.captures_iter(s) {
        let whole = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let unit = unit_nanos(&caps[3]);

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range(input))?
        };
        let mut component = whole.checked_mul(unit).ok_or_else(|| out_of_range(input))?;

        let digits = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
        if !digits.is_empty() {
            let numerator: u128 = digits.parse().map_err(|_| out_of_range(input))?;
            let scale = 10u128.pow(digits.len() as u32);
            component = component
                .checked_add(numerator * unit / scale)
                .ok_or_else(|| out_of_range(input))?;
        }

        total = total
            .checked_add(component)
            .ok_or_else(|| out_of_range(input))?;
    }

    let nanos = u64::try_from(total).map_err(|_| out_of_range(input))?;
    Ok(Duration::from_nanos(nanos))
}

fn out_of_range(input: &str) -> CertError {
    CertError::Validation(format!("Invalid duration string {:?}: out of range", input))
}
