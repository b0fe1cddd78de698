// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-friendly durations and byte sizes.

use std::time::Duration;

/// Split `"30s"` into `("30", "s")`, `"24 hours"` into `("24", " hours")`.
fn split_number(s: &str) -> (&str, &str) {
    s.char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""))
}

/// Parse a duration such as `"30s"`, `"10m"`, `"1h"`, `"24 hours"` or `"2d"`.
///
/// A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num_str, suffix) = split_number(s);
    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", s))?;

    let multiplier = match suffix.trim().to_ascii_lowercase().as_str() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        other => return Err(format!("unknown duration suffix: {}", other)),
    };

    num.checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration out of range: {}", s))
}

/// Parse a byte size such as `"512M"`, `"1GB"`, `"100MB"` or `"4096"`.
///
/// Units are binary (`1K == 1024`) and case-insensitive.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let (num_str, suffix) = split_number(s);
    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in size: {}", s))?;

    let shift = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 0,
        "k" | "kb" | "kib" => 10,
        "m" | "mb" | "mib" => 20,
        "g" | "gb" | "gib" => 30,
        "t" | "tb" | "tib" => 40,
        other => return Err(format!("unknown size suffix: {}", other)),
    };

    num.checked_mul(1u64 << shift)
        .ok_or_else(|| format!("size out of range: {}", s))
}

/// Format milliseconds as `"850ms"`, `"5s"`, `"2m"`, `"1h30m"` or `"3d"`.
pub fn format_elapsed_ms(ms: u64) -> String {
    if ms < 1000 {
        return format!("{}ms", ms);
    }
    let secs = ms / 1000;
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86399 => match (secs % 3600) / 60 {
            0 => format!("{}h", secs / 3600),
            m => format!("{}h{}m", secs / 3600, m),
        },
        _ => format!("{}d", secs / 86400),
    }
}

#[cfg(test)]
#[path = "units_tests.rs"]
mod tests;
