// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP-date formatting and parsing (RFC 9110 section 5.6.7).
//!
//! Output is always IMF-fixdate; input also accepts the obsolete RFC 850 and
//! asctime forms.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DAY_NAMES: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Format as `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn format_http_date(time: SystemTime) -> String {
    let secs = match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs(),
        Err(e) => {
            log::debug!("[http] time before UNIX_EPOCH: {}", e);
            0
        }
    };
    let days = secs / 86_400;
    let remaining = secs % 86_400;
    let (year, month, day) = days_to_date(days);
    format!(
        "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
        DAY_NAMES[(days % 7) as usize],
        day,
        MONTH_NAMES[(month - 1) as usize],
        year,
        remaining / 3_600,
        (remaining % 3_600) / 60,
        remaining % 60
    )
}

/// Parse any of the three HTTP-date forms. Returns `None` on error, which
/// callers treat as an absent header.
pub fn parse_http_date(text: &str) -> Option<SystemTime> {
    let text = text.trim();
    let fields: Vec<&str> = text.split_whitespace().collect();
    let (day, month, year, clock) = match fields.as_slice() {
        // IMF-fixdate: Sun, 06 Nov 1994 08:49:37 GMT
        [_, day, month, year, clock, "GMT"] => (*day, *month, year.parse::<u32>().ok()?, *clock),
        // RFC 850: Sunday, 06-Nov-94 08:49:37 GMT
        [_, date, clock, "GMT"] => {
            let mut parts = date.split('-');
            let day = parts.next()?;
            let month = parts.next()?;
            let yy: u32 = parts.next()?.parse().ok()?;
            let year = if yy < 70 { 2000 + yy } else if yy < 100 { 1900 + yy } else { yy };
            (day, month, year, *clock)
        }
        // asctime: Sun Nov  6 08:49:37 1994
        [_, month, day, clock, year] => (*day, *month, year.parse::<u32>().ok()?, *clock),
        _ => return None,
    };

    let day: u32 = day.parse().ok()?;
    let month = MONTH_NAMES.iter().position(|m| m.eq_ignore_ascii_case(month))? as u32 + 1;
    let mut hms = clock.split(':').map(|p| p.parse::<u64>().ok());
    let (h, m, s) = (hms.next()??, hms.next()??, hms.next()??);
    if year < 1970 || day == 0 || day > days_in_month(year, month) || h > 23 || m > 59 || s > 60 {
        return None;
    }

    let days = date_to_days(year, month, day);
    Some(UNIX_EPOCH + Duration::from_secs(days * 86_400 + h * 3_600 + m * 60 + s))
}

/// Convert days since Unix epoch (1970-01-01) to a calendar date.
pub(crate) fn days_to_date(days: u64) -> (u32, u32, u32) {
    let mut year = 1970;
    let mut remaining_days = days;

    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let mut month = 1;
    while month < 12 && remaining_days >= u64::from(days_in_month(year, month)) {
        remaining_days -= u64::from(days_in_month(year, month));
        month += 1;
    }

    // At most 30 here.
    (year, month, remaining_days as u32 + 1)
}

fn date_to_days(year: u32, month: u32, day: u32) -> u64 {
    let mut days: u64 = (1970..year)
        .map(|y| if is_leap_year(y) { 366 } else { 365 })
        .sum();
    days += (1..month).map(|m| u64::from(days_in_month(year, m))).sum::<u64>();
    days + u64::from(day - 1)
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Determine whether the given year is a leap year in the Gregorian calendar.
pub(crate) fn is_leap_year(year: u32) -> bool {
    (year.is_multiple_of(4) && !year.is_multiple_of(100)) || year.is_multiple_of(400)
}
