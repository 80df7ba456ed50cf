// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `xs:duration` values as used by WS-Eventing `Expires`.
//!
//! Years and months have no fixed length; they are approximated as 365 and 30
//! days. Negative durations are rejected.

use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Parse `PnYnMnDTnHnMnS` (fractional seconds allowed).
pub fn parse_duration(text: &str) -> Option<Duration> {
    let rest = text.trim().strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }
    let (date, time) = match rest.split_once('T') {
        Some((d, t)) if !t.is_empty() => (d, Some(t)),
        Some(_) => return None,
        None => (rest, None),
    };

    let mut secs = 0f64;
    for (value, unit) in components(date)? {
        secs += value
            * match unit {
                'Y' => (365 * DAY) as f64,
                'M' => (30 * DAY) as f64,
                'D' => DAY as f64,
                _ => return None,
            };
    }
    if let Some(time) = time {
        for (value, unit) in components(time)? {
            secs += value
                * match unit {
                    'H' => HOUR as f64,
                    'M' => MINUTE as f64,
                    'S' => 1.0,
                    _ => return None,
                };
        }
    }
    Duration::try_from_secs_f64(secs).ok()
}

fn components(s: &str) -> Option<Vec<(f64, char)>> {
    let mut out = Vec::new();
    let mut number = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
        } else {
            if number.is_empty() {
                return None;
            }
            out.push((number.parse().ok()?, c));
            number.clear();
        }
    }
    if !number.is_empty() {
        return None;
    }
    Some(out)
}

/// Format as `PnDTnHnMnS`, omitting zero fields (`PT0S` for zero).
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let days = total / DAY;
    let hours = (total % DAY) / HOUR;
    let minutes = (total % HOUR) / MINUTE;
    let seconds = total % MINUTE;
    let millis = d.subsec_millis();

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if hours > 0 || minutes > 0 || seconds > 0 || millis > 0 || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if millis > 0 {
            out.push_str(&format!("{}.{:03}S", seconds, millis));
        } else if seconds > 0 || (hours == 0 && minutes == 0) {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}
