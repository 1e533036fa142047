//! Literal normalization and canonical formatting
//!
//! Date-times are zoneless and stored at millisecond precision; fractions
//! finer than three digits are rejected at parse time. Doubles always print
//! with a decimal point, strings print double-quoted with their inner text
//! verbatim, and regex/like payloads escape the `/` character on the way
//! out.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// The optional time component as produced by the lexer:
/// `((hour, minute), Some((second, Some(fraction))))`.
pub(crate) type TimeParts = Option<((String, String), Option<(String, Option<String>)>)>;

pub(crate) fn normalize_date_time(
    sign: Option<char>,
    year: &str,
    month: &str,
    day: &str,
    time: TimeParts,
) -> Result<NaiveDateTime, String> {
    let raw = render_raw(sign, year, month, day, &time);
    let year: i32 = match year.parse::<i32>() {
        Ok(y) if sign == Some('-') => -y,
        Ok(y) => y,
        Err(_) => return Err(format!("no viable alternative at input '{}'", raw)),
    };
    let (hour, minute, second, millis) = match &time {
        None => (0, 0, 0, 0),
        Some(((hour, minute), seconds)) => {
            let (second, millis) = match seconds {
                None => (0, 0),
                Some((second, fraction)) => {
                    let millis = match fraction {
                        None => 0,
                        Some(f) if f.len() > 3 => {
                            return Err(format!("no viable alternative at input '{}'", raw));
                        }
                        Some(f) => {
                            let mut padded = f.clone();
                            while padded.len() < 3 {
                                padded.push('0');
                            }
                            digits(&padded)
                        }
                    };
                    (digits(second), millis)
                }
            };
            (digits(hour), digits(minute), second, millis)
        }
    };
    NaiveDate::from_ymd_opt(year, digits(month), digits(day))
        .and_then(|d| d.and_hms_milli_opt(hour, minute, second, millis))
        .ok_or_else(|| format!("invalid date-time value '{}'", raw))
}

/// Digit-only strings from the lexer; `0` on the (unreachable) parse miss
/// keeps this infallible.
fn digits(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}

fn render_raw(sign: Option<char>, year: &str, month: &str, day: &str, time: &TimeParts) -> String {
    let mut raw = String::new();
    if let Some(sign) = sign {
        raw.push(sign);
    }
    raw.push_str(year);
    raw.push('-');
    raw.push_str(month);
    raw.push('-');
    raw.push_str(day);
    if let Some(((hour, minute), seconds)) = time {
        raw.push('T');
        raw.push_str(hour);
        raw.push(':');
        raw.push_str(minute);
        if let Some((second, fraction)) = seconds {
            raw.push(':');
            raw.push_str(second);
            if let Some(fraction) = fraction {
                raw.push('.');
                raw.push_str(fraction);
            }
        }
    }
    raw
}

/// Canonical date-time form: seconds only when non-zero (or when millis
/// are present), millis only when non-zero, years padded to four digits
/// with an explicit `+` beyond year 9999.
pub(crate) fn format_date_time(dt: &NaiveDateTime) -> String {
    let date = dt.date();
    let year = date.year();
    let year = if year > 9999 {
        format!("+{}", year)
    } else if year < 0 {
        format!("-{:04}", -year)
    } else {
        format!("{:04}", year)
    };
    let mut out = format!(
        "{}-{:02}-{:02}T{:02}:{:02}",
        year,
        date.month(),
        date.day(),
        dt.hour(),
        dt.minute()
    );
    let millis = dt.nanosecond() / 1_000_000;
    if dt.second() != 0 || millis != 0 {
        out.push_str(&format!(":{:02}", dt.second()));
        if millis != 0 {
            out.push_str(&format!(".{:03}", millis));
        }
    }
    out
}

/// Doubles keep a fractional part even when whole, so that `4.0` does not
/// round-trip into a long.
pub(crate) fn format_double(v: f64) -> String {
    if v.is_finite() && v == v.trunc() {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

pub(crate) fn quote(s: &str) -> String {
    format!("\"{}\"", s)
}

/// `\/` is the one escape the language layer owns; everything else in a
/// string literal passes through untouched.
pub(crate) fn unescape_regex(s: &str) -> String {
    s.replace("\\/", "/")
}

pub(crate) fn escape_regex(s: &str) -> String {
    s.replace('/', "\\/")
}
