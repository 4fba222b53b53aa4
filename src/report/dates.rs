//! # Date and Digit Localization
//!
//! Converts Gregorian `YYYY-MM-DD` strings to the Persian solar (Jalali)
//! calendar using the proleptic day-count algorithm — pure integer
//! arithmetic, no tables beyond the Gregorian month offsets.
//!
//! The conversion must never throw past this boundary: any string that does
//! not parse as a Gregorian date is returned unchanged. All digits in
//! report output go through [`to_persian_digits`] for display consistency.

use chrono::NaiveDate;

/// Cumulative days before each Gregorian month (non-leap).
const GREGORIAN_MONTH_OFFSETS: [i64; 12] =
    [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// Converts a Gregorian `YYYY-MM-DD` string (a longer timestamp is
/// truncated to its date part) into a Jalali `۱۴۰۳/۰۱/۰۱`-style string.
/// Returns the input unchanged when it does not parse.
pub fn to_jalali(date: &str) -> String {
    let head: String = date.chars().take(10).collect();
    match NaiveDate::parse_from_str(&head, "%Y-%m-%d") {
        Ok(d) => {
            use chrono::Datelike;
            let (jy, jm, jd) = gregorian_to_jalali(d.year(), d.month(), d.day());
            to_persian_digits(&format!("{:04}/{:02}/{:02}", jy, jm, jd))
        }
        Err(_) => date.to_string(),
    }
}

/// Proleptic Gregorian → Jalali conversion on day counts.
pub fn gregorian_to_jalali(gy: i32, gm: u32, gd: u32) -> (i32, u32, u32) {
    let gy = gy as i64;
    let gm = gm as i64;
    let gd = gd as i64;

    let gy2 = if gm > 2 { gy + 1 } else { gy };
    let mut days = 355_666 + 365 * gy + (gy2 + 3) / 4 - (gy2 + 99) / 100
        + (gy2 + 399) / 400
        + gd
        + GREGORIAN_MONTH_OFFSETS[(gm - 1) as usize];

    let mut jy = -1595 + 33 * (days / 12_053);
    days %= 12_053;
    jy += 4 * (days / 1461);
    days %= 1461;
    if days > 365 {
        jy += (days - 1) / 365;
        days = (days - 1) % 365;
    }

    let (jm, jd) = if days < 186 {
        (1 + days / 31, 1 + days % 31)
    } else {
        (7 + (days - 186) / 30, 1 + (days - 186) % 30)
    };

    (jy as i32, jm as u32, jd as u32)
}

/// Maps ASCII digits to their Persian glyphs (۰–۹); everything else is
/// passed through.
pub fn to_persian_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '0'..='9' => {
                let offset = c as u32 - '0' as u32;
                char::from_u32('\u{06F0}' as u32 + offset).unwrap_or(c)
            }
            c => c,
        })
        .collect()
}
