//! Date and time macros.
//!
//! # Macros
//!
//! - `{{time}}`, `{{date}}`, `{{weekday}}`, `{{isotime}}`, `{{isodate}}`
//! - `{{datetimeformat FORMAT}}` with moment-style tokens (`YYYY`, `MMMM`, `Do`, `HH`, ...)
//! - `{{time_UTC+N}}` / `{{time_UTC-N}}`
//! - `{{lasttime}}`, `{{lastdate}}` for the last non-system message
//! - `{{idle_duration}}` since the last user message
//! - `{{timediff::A::B}}`

use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex};

use character_card::{ChatMessage, ChatRole};

fn macro_regex(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("time macro pattern is valid")
}

static TIME: Lazy<Regex> = Lazy::new(|| macro_regex(r"\{\{time\}\}"));
static DATE: Lazy<Regex> = Lazy::new(|| macro_regex(r"\{\{date\}\}"));
static WEEKDAY: Lazy<Regex> = Lazy::new(|| macro_regex(r"\{\{weekday\}\}"));
static ISOTIME: Lazy<Regex> = Lazy::new(|| macro_regex(r"\{\{isotime\}\}"));
static ISODATE: Lazy<Regex> = Lazy::new(|| macro_regex(r"\{\{isodate\}\}"));
static DATETIME_FORMAT: Lazy<Regex> = Lazy::new(|| macro_regex(r"\{\{datetimeformat +([^}]*)\}\}"));
static TIME_UTC: Lazy<Regex> = Lazy::new(|| macro_regex(r"\{\{time_utc([+-]\d+)\}\}"));
static LAST_TIME: Lazy<Regex> = Lazy::new(|| macro_regex(r"\{\{lasttime\}\}"));
static LAST_DATE: Lazy<Regex> = Lazy::new(|| macro_regex(r"\{\{lastdate\}\}"));
static IDLE: Lazy<Regex> = Lazy::new(|| macro_regex(r"\{\{idle_duration\}\}"));
static TIMEDIFF: Lazy<Regex> = Lazy::new(|| macro_regex(r"\{\{timediff::(.*?)::(.*?)\}\}"));

/// Replace the clock macros, using `now` as the current time.
pub fn replace_time_macros(content: &str, chat_log: &[ChatMessage], now: DateTime<Local>) -> String {
    let mut out = replace_literal(&TIME, content, &format_moment(&now, "LT"));
    out = replace_literal(&DATE, &out, &format_moment(&now, "LL"));
    out = replace_literal(&WEEKDAY, &out, &format_moment(&now, "dddd"));
    out = replace_literal(&ISOTIME, &out, &format_moment(&now, "HH:mm"));
    out = replace_literal(&ISODATE, &out, &format_moment(&now, "YYYY-MM-DD"));

    out = DATETIME_FORMAT
        .replace_all(&out, |caps: &Captures| format_moment(&now, &caps[1]))
        .into_owned();

    out = TIME_UTC
        .replace_all(&out, |caps: &Captures| {
            let shifted = caps[1]
                .parse::<i64>()
                .ok()
                .and_then(utc_offset)
                .map(|offset| now.with_timezone(&offset));
            match shifted {
                Some(time) => format_moment(&time, "LT"),
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    // Last non-system message; empty when it has no stamp.
    let last_stamp = chat_log
        .iter()
        .rev()
        .find(|m| !m.is_system())
        .and_then(|m| m.time_stamp)
        .map(|t| t.with_timezone(&Local));
    let (last_time, last_date) = match last_stamp {
        Some(stamp) => (format_moment(&stamp, "LT"), format_moment(&stamp, "LL")),
        None => (String::new(), String::new()),
    };
    out = replace_literal(&LAST_TIME, &out, &last_time);
    out = replace_literal(&LAST_DATE, &out, &last_date);

    let idle = chat_log
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .and_then(|m| m.time_stamp)
        .map(|t| humanize(now.with_timezone(&Utc) - t))
        .unwrap_or_else(|| "just now".to_string());
    replace_literal(&IDLE, &out, &idle)
}

fn replace_literal(re: &Regex, text: &str, value: &str) -> String {
    re.replace_all(text, NoExpand(value)).into_owned()
}

/// Replace `{{timediff::A::B}}` with the humanized distance between two
/// timestamps. Unparseable inputs leave the macro untouched.
pub fn replace_timediff(content: &str) -> String {
    TIMEDIFF
        .replace_all(content, |caps: &Captures| {
            match (parse_timestamp(&caps[1]), parse_timestamp(&caps[2])) {
                (Some(a), Some(b)) => humanize(a - b),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Hours for small magnitudes, minutes otherwise. Offsets of a day or more
/// are rejected.
fn utc_offset(amount: i64) -> Option<FixedOffset> {
    let unit = if amount.checked_abs()? < 16 { 3600 } else { 60 };
    let seconds = i32::try_from(amount.checked_mul(unit)?).ok()?;
    FixedOffset::east_opt(seconds)
}

/// Parse the timestamp forms accepted by `{{timediff}}`.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return local_to_utc(naive);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).and_then(local_to_utc);
    }
    text.parse::<i64>()
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Describe a duration in words, ignoring its sign.
///
/// Follows the usual relative-time thresholds: under 45 seconds is "a few
/// seconds", under 45 minutes counts minutes, under 22 hours counts hours,
/// under 26 days counts days, under 11 months counts months.
pub fn humanize(duration: Duration) -> String {
    let millis = duration.num_milliseconds().unsigned_abs() as f64;
    let seconds = (millis / 1000.0).round();
    let minutes = (millis / 60_000.0).round();
    let hours = (millis / 3_600_000.0).round();
    let days_exact = millis / 86_400_000.0;
    let days = days_exact.round();
    let months = (days_exact * 4800.0 / 146_097.0).round();
    let years = (days_exact * 400.0 / 146_097.0).round();

    if seconds < 45.0 {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{minutes} minutes")
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{hours} hours")
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{days} days")
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{months} months")
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{years} years")
    }
}

const TOKENS: &[&str] = &[
    "LLLL", "LLL", "LTS", "LT", "LL", "L", "YYYY", "YY", "MMMM", "MMM", "MM", "M", "Do", "DD",
    "D", "dddd", "ddd", "dd", "d", "HH", "H", "hh", "h", "mm", "m", "ss", "s", "A", "a", "ZZ",
    "Z", "X", "x",
];

/// Format a time with moment-style tokens. Text inside `[...]` is copied
/// verbatim, unknown characters pass through.
pub fn format_moment<Tz>(time: &DateTime<Tz>, format: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    let mut rest = format;

    while let Some(c) = rest.chars().next() {
        if c == '[' {
            if let Some(end) = rest.find(']') {
                out.push_str(&rest[1..end]);
                rest = &rest[end + 1..];
                continue;
            }
        }
        match TOKENS.iter().find(|t| rest.starts_with(**t)) {
            Some(token) => {
                out.push_str(&format_token(time, token));
                rest = &rest[token.len()..];
            }
            None => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    out
}

fn format_token<Tz>(time: &DateTime<Tz>, token: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let hour12 = match time.hour() % 12 {
        0 => 12,
        h => h,
    };
    let meridiem = if time.hour() < 12 { "AM" } else { "PM" };

    match token {
        "LLLL" => format_moment(time, "dddd, MMMM D, YYYY h:mm A"),
        "LLL" => format_moment(time, "MMMM D, YYYY h:mm A"),
        "LTS" => format_moment(time, "h:mm:ss A"),
        "LT" => format_moment(time, "h:mm A"),
        "LL" => format_moment(time, "MMMM D, YYYY"),
        "L" => format_moment(time, "MM/DD/YYYY"),
        "YYYY" => format!("{:04}", time.year()),
        "YY" => format!("{:02}", time.year().rem_euclid(100)),
        "MMMM" => time.format("%B").to_string(),
        "MMM" => time.format("%b").to_string(),
        "MM" => format!("{:02}", time.month()),
        "M" => time.month().to_string(),
        "Do" => ordinal(time.day()),
        "DD" => format!("{:02}", time.day()),
        "D" => time.day().to_string(),
        "dddd" => time.format("%A").to_string(),
        "ddd" => time.format("%a").to_string(),
        "dd" => time.format("%a").to_string().chars().take(2).collect(),
        "d" => time.weekday().num_days_from_sunday().to_string(),
        "HH" => format!("{:02}", time.hour()),
        "H" => time.hour().to_string(),
        "hh" => format!("{hour12:02}"),
        "h" => hour12.to_string(),
        "mm" => format!("{:02}", time.minute()),
        "m" => time.minute().to_string(),
        "ss" => format!("{:02}", time.second()),
        "s" => time.second().to_string(),
        "A" => meridiem.to_string(),
        "a" => meridiem.to_lowercase(),
        "ZZ" => time.format("%z").to_string(),
        "Z" => time.format("%:z").to_string(),
        "X" => time.timestamp().to_string(),
        "x" => time.timestamp_millis().to_string(),
        other => other.to_string(),
    }
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}
