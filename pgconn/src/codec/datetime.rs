//! ISO-ish text parsing for `timestamp`/`timestamptz`/`date`/`time` values.
//!
//! PostgreSQL's default `datestyle` is forced to `ISO, MDY` by the startup
//! phase, so the text representation this parses is always
//! `YYYY-MM-DD HH:MM:SS[.ffffff][+-TZ[:MM[:SS]]][ BC]`, plus the special
//! values `infinity` / `-infinity`.
use std::fmt;

/// A fully decomposed timestamp, as parsed from PostgreSQL's ISO text
/// representation. `year` is negative for `BC` dates (the spec's own
/// convention: `"...0010-02-03... BC"` decodes to `year == -10`, not the
/// astronomical year).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedTimestamp {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
    /// Fixed UTC offset in seconds, if the text carried a timezone.
    pub offset_seconds: Option<i32>,
    pub infinity: Option<Infinity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Infinity {
    Positive,
    Negative,
}

#[derive(Debug)]
pub struct DecodeTimestampError(String);

impl fmt::Display for DecodeTimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid timestamp text: {}", self.0)
    }
}

impl std::error::Error for DecodeTimestampError {}

fn err(msg: impl Into<String>) -> DecodeTimestampError {
    DecodeTimestampError(msg.into())
}

/// Parse a postgres timestamp/timestamptz text value.
pub fn decode_timestamp(text: &str) -> Result<DecodedTimestamp, DecodeTimestampError> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("infinity") {
        return Ok(zeroed(Some(Infinity::Positive)));
    }
    if text.eq_ignore_ascii_case("-infinity") {
        return Ok(zeroed(Some(Infinity::Negative)));
    }

    let (text, is_bc) = match text.strip_suffix("BC") {
        Some(rest) => (rest.trim_end(), true),
        None => (text, false),
    };

    let (date_part, rest) = text.split_once(' ').ok_or_else(|| err("missing date/time separator"))?;
    let mut year_month_day = date_part.splitn(3, '-');
    let year: i32 = year_month_day.next().ok_or_else(|| err("missing year"))?.parse().map_err(|_| err("bad year"))?;
    let month: u8 = year_month_day.next().ok_or_else(|| err("missing month"))?.parse().map_err(|_| err("bad month"))?;
    let day: u8 = year_month_day.next().ok_or_else(|| err("missing day"))?.parse().map_err(|_| err("bad day"))?;

    // find a trailing timezone offset: `+HH`, `+HH:MM`, `+HH:MM:SS`, `-HH...`
    let (time_and_frac, offset_seconds) = split_offset(rest)?;

    let (time_part, frac_part) = match time_and_frac.split_once('.') {
        Some((t, f)) => (t, Some(f)),
        None => (time_and_frac, None),
    };

    let mut hms = time_part.splitn(3, ':');
    let hour: u8 = hms.next().ok_or_else(|| err("missing hour"))?.parse().map_err(|_| err("bad hour"))?;
    let minute: u8 = hms.next().ok_or_else(|| err("missing minute"))?.parse().map_err(|_| err("bad minute"))?;
    let second: u8 = hms.next().ok_or_else(|| err("missing second"))?.parse().map_err(|_| err("bad second"))?;

    let microsecond = match frac_part {
        Some(f) => {
            let mut digits = [0u8; 6];
            let bytes = f.as_bytes();
            let n = bytes.len().min(6);
            digits[..n].copy_from_slice(&bytes[..n]);
            let padded: String = digits.iter().map(|&b| if b == 0 { '0' } else { b as char }).collect();
            padded.parse().map_err(|_| err("bad fractional seconds"))?
        }
        None => 0,
    };

    Ok(DecodedTimestamp {
        year: if is_bc { -year } else { year },
        month,
        day,
        hour,
        minute,
        second,
        microsecond,
        offset_seconds,
        infinity: None,
    })
}

fn zeroed(infinity: Option<Infinity>) -> DecodedTimestamp {
    DecodedTimestamp {
        year: 0,
        month: 0,
        day: 0,
        hour: 0,
        minute: 0,
        second: 0,
        microsecond: 0,
        offset_seconds: None,
        infinity,
    }
}

#[cfg(feature = "time")]
fn to_primitive(ts: &DecodedTimestamp) -> Result<time::PrimitiveDateTime, DecodeTimestampError> {
    if ts.infinity.is_some() {
        return Err(err("infinity/-infinity has no time::PrimitiveDateTime representation"));
    }
    let month = time::Month::try_from(ts.month).map_err(|e| err(e.to_string()))?;
    let date = time::Date::from_calendar_date(ts.year, month, ts.day).map_err(|e| err(e.to_string()))?;
    let time = time::Time::from_hms_micro(ts.hour, ts.minute, ts.second, ts.microsecond)
        .map_err(|e| err(e.to_string()))?;
    Ok(time::PrimitiveDateTime::new(date, time))
}

/// Parse a `timestamp` text value into a [`time::PrimitiveDateTime`].
#[cfg(feature = "time")]
pub fn decode_primitive_date_time(text: &str) -> Result<time::PrimitiveDateTime, DecodeTimestampError> {
    to_primitive(&decode_timestamp(text)?)
}

/// Parse a `timestamptz` text value into a [`time::OffsetDateTime`]. The
/// server always sends a fixed numeric offset (never a zone name) because
/// the startup phase pins `DateStyle` to `ISO, MDY`; a text value with no
/// offset at all is treated as UTC.
#[cfg(feature = "time")]
pub fn decode_offset_date_time(text: &str) -> Result<time::OffsetDateTime, DecodeTimestampError> {
    let ts = decode_timestamp(text)?;
    let naive = to_primitive(&ts)?;
    let offset = match ts.offset_seconds {
        Some(secs) => time::UtcOffset::from_whole_seconds(secs).map_err(|e| err(e.to_string()))?,
        None => time::UtcOffset::UTC,
    };
    Ok(naive.assume_offset(offset))
}

/// Render a [`time::PrimitiveDateTime`] as a `timestamp` text value.
#[cfg(feature = "time")]
pub fn encode_primitive_date_time(dt: &time::PrimitiveDateTime) -> String {
    render(dt.year(), u8::from(dt.month()), dt.day(), dt.hour(), dt.minute(), dt.second(), dt.microsecond(), None)
}

/// Render a [`time::OffsetDateTime`] as a `timestamptz` text value.
#[cfg(feature = "time")]
pub fn encode_offset_date_time(dt: &time::OffsetDateTime) -> String {
    render(
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        dt.microsecond(),
        Some(dt.offset().whole_seconds()),
    )
}

#[cfg(feature = "time")]
#[allow(clippy::too_many_arguments)]
fn render(
    year: i32,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    microsecond: u32,
    offset_seconds: Option<i32>,
) -> String {
    let (year, bc) = if year <= 0 { (1 - year, true) } else { (year, false) };
    let mut s = format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}");
    if microsecond > 0 {
        s.push_str(&format!(".{microsecond:06}"));
    }
    if let Some(secs) = offset_seconds {
        let sign = if secs < 0 { '-' } else { '+' };
        let secs = secs.abs();
        s.push_str(&format!("{sign}{:02}", secs / 3600));
        let rem = secs % 3600;
        if rem != 0 {
            s.push_str(&format!(":{:02}", rem / 60));
        }
    }
    if bc {
        s.push_str(" BC");
    }
    s
}

fn split_offset(rest: &str) -> Result<(&str, Option<i32>), DecodeTimestampError> {
    // The sign must not be confused with the date's own leading digits;
    // the time component always starts with `HH:MM:SS`, so search from
    // after the first colon-separated field.
    let Some(sign_pos) = rest.find(['+', '-']) else {
        return Ok((rest, None));
    };
    let (time_part, tz_part) = rest.split_at(sign_pos);
    let sign = if tz_part.starts_with('-') { -1i32 } else { 1i32 };
    let tz_digits = &tz_part[1..];
    let mut parts = tz_digits.splitn(3, ':');
    let hh: i32 = parts.next().unwrap_or("0").parse().map_err(|_| err("bad tz hour"))?;
    let mm: i32 = parts.next().unwrap_or("0").parse().map_err(|_| err("bad tz minute"))?;
    let ss: i32 = parts.next().unwrap_or("0").parse().map_err(|_| err("bad tz second"))?;
    Ok((time_part, Some(sign * (hh * 3600 + mm * 60 + ss))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bc_era_with_offset_and_fraction() {
        let ts = decode_timestamp("0010-02-03 04:05:06.123-07 BC").unwrap();
        assert_eq!(ts.year, -10);
        assert_eq!(ts.month, 2);
        assert_eq!(ts.day, 3);
        assert_eq!(ts.hour, 4);
        assert_eq!(ts.minute, 5);
        assert_eq!(ts.second, 6);
        assert_eq!(ts.microsecond, 123_000);
        assert_eq!(ts.offset_seconds, Some(-7 * 3600));
    }

    #[test]
    fn infinity_values() {
        assert_eq!(decode_timestamp("infinity").unwrap().infinity, Some(Infinity::Positive));
        assert_eq!(decode_timestamp("-infinity").unwrap().infinity, Some(Infinity::Negative));
    }

    #[test]
    fn plain_timestamp_no_offset() {
        let ts = decode_timestamp("2024-01-02 03:04:05").unwrap();
        assert_eq!((ts.year, ts.month, ts.day), (2024, 1, 2));
        assert_eq!((ts.hour, ts.minute, ts.second), (3, 4, 5));
        assert_eq!(ts.offset_seconds, None);
    }
}
