//! Italian date formatting and parsing in the wiki's time zone.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::ContentError;

const MONTHS: [&str; 12] = [
    "gennaio",
    "febbraio",
    "marzo",
    "aprile",
    "maggio",
    "giugno",
    "luglio",
    "agosto",
    "settembre",
    "ottobre",
    "novembre",
    "dicembre",
];

static LOCAL_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}) (\w+) (\d{4}) alle (\d{1,2}:\d{2}(?::\d{2})?)$").expect("valid regex")
});

/// Lowercase Italian name of `month` (1-based).
pub fn month_name(month: u32) -> &'static str {
    MONTHS[(month.clamp(1, 12) - 1) as usize]
}

pub fn month_from_name(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|idx| idx as u32 + 1)
}

pub fn local_date(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// Parses `dd/mm/yyyy`.
pub fn parse_short_date(text: &str) -> Result<NaiveDate, ContentError> {
    NaiveDate::parse_from_str(text.trim(), "%d/%m/%Y")
        .map_err(|_| ContentError::InvalidDate(text.to_string()))
}

pub fn format_short_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// `5 marzo 2024`
pub fn format_long_date(date: NaiveDate) -> String {
    format!("{} {} {}", date.day(), month_name(date.month()), date.year())
}

/// `il 5 marzo alle 14:00`, with the elided article before 8 and 11.
pub fn time_with_article(ts: DateTime<Utc>, tz: Tz) -> String {
    let local = ts.with_timezone(&tz);
    let article = if matches!(local.day(), 8 | 11) {
        "l'"
    } else {
        "il "
    };
    format!(
        "{article}{} {} alle {:02}:{:02}",
        local.day(),
        month_name(local.month()),
        local.hour(),
        local.minute()
    )
}

/// Parses `<d> <mese> <yyyy> alle <HH:MM>` as a local time in `tz`.
pub fn parse_local_time(text: &str, tz: Tz) -> Result<DateTime<Utc>, ContentError> {
    let invalid = || ContentError::InvalidDate(text.to_string());
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let caps = LOCAL_TIME_RE.captures(&normalized).ok_or_else(invalid)?;

    let day: u32 = caps[1].parse().map_err(|_| invalid())?;
    let month = month_from_name(&caps[2]).ok_or_else(invalid)?;
    let year: i32 = caps[3].parse().map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
    let time = NaiveTime::parse_from_str(&caps[4], "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&caps[4], "%H:%M:%S"))
        .map_err(|_| invalid())?;

    tz.from_local_datetime(&NaiveDateTime::new(date, time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// Same day and month in `year`; 29 February falls back to 1 March.
pub fn anniversary_in(date: NaiveDate, year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
        .unwrap_or(date)
}
