use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

/// Format used for dates inside the search descriptor
pub const TOKEN_DATE_FORMAT: &str = "%Y-%m-%d";

fn portuguese_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})\s+de\s+(\p{L}{3})").expect("static date pattern"))
}

fn english_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\p{L}{3})\p{L}*\.?\s+(\d{1,2})").expect("static date pattern"))
}

fn month_number(abbrev: &str) -> Option<u32> {
    let month = match abbrev.to_lowercase().as_str() {
        "jan" => 1,
        "fev" | "feb" => 2,
        "mar" => 3,
        "abr" | "apr" => 4,
        "mai" | "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "ago" | "aug" => 8,
        "set" | "sep" => 9,
        "out" | "oct" => 10,
        "nov" => 11,
        "dez" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Resolve a date as echoed by the search page ("sex., 6 de jun.", "Fri, Jun 6"
/// or "2025-06-06").
///
/// Day-and-month forms take the year of `today`, or the next one when that
/// day has already passed.
pub fn parse_display_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text.trim(), TOKEN_DATE_FORMAT) {
        return Some(date);
    }

    let (day, month) = if let Some(caps) = portuguese_regex().captures(text) {
        (caps[1].parse::<u32>().ok()?, month_number(&caps[2])?)
    } else {
        let caps = english_regex().captures(text)?;
        (caps[2].parse::<u32>().ok()?, month_number(&caps[1])?)
    };

    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
    match this_year {
        Some(date) if date >= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
    }
}

/// `base` plus every day within `range` on both sides, sorted
pub fn expand_range(base: NaiveDate, range: u32) -> Vec<NaiveDate> {
    let mut dates = vec![base];
    for offset in 1..=i64::from(range) {
        dates.push(base + Duration::days(offset));
        dates.push(base - Duration::days(offset));
    }
    dates.sort();
    dates
}

pub fn to_token_date(date: NaiveDate) -> String {
    date.format(TOKEN_DATE_FORMAT).to_string()
}
