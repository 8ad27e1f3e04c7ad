use std::{cmp::Ordering, fmt, str::FromStr};

/// A `!!timestamp` value: a calendar date, optionally with a time of day.
///
/// Dates and date-times without an offset are "naive"; a trailing `Z` or
/// `+HH:MM` makes the time zone-aware. The textual form follows the
/// ISO-8601 subset of the YAML 1.1 timestamp type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub time: Option<Time>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
    /// UTC offset in minutes. `None` for naive times, `Some(0)` for `Z`.
    pub offset: Option<i16>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("not a timestamp")]
    Malformed,
    #[error("{0} is out of range")]
    OutOfRange(&'static str),
}

/// Timestamp fields as written, before range checks.
struct RawTimestamp {
    year: u32,
    month: u32,
    day: u32,
    time: Option<RawTime>,
}

struct RawTime {
    hour: u32,
    minute: u32,
    second: u32,
    microsecond: u32,
    offset: Option<(bool, u32, u32)>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    /// Read between `min` and `max` ASCII digits.
    fn digits(&mut self, min: usize, max: usize) -> Option<(u32, usize)> {
        let start = self.pos;
        let mut value = 0u32;
        while self.pos - start < max {
            match self.peek() {
                Some(byte @ b'0'..=b'9') => {
                    value = value * 10 + u32::from(byte - b'0');
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let count = self.pos - start;
        (count >= min).then_some((value, count))
    }

    fn skip_blanks(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
        self.pos - start
    }
}

fn lex(value: &str) -> Option<RawTimestamp> {
    let mut cursor = Cursor {
        bytes: value.as_bytes(),
        pos: 0,
    };

    let (year, _) = cursor.digits(4, 4)?;
    if !cursor.eat(b'-') {
        return None;
    }
    let (month, month_len) = cursor.digits(1, 2)?;
    if !cursor.eat(b'-') {
        return None;
    }
    let (day, day_len) = cursor.digits(1, 2)?;

    if cursor.at_end() {
        // The date-only form is strictly `YYYY-MM-DD`.
        return (month_len == 2 && day_len == 2).then_some(RawTimestamp {
            year,
            month,
            day,
            time: None,
        });
    }

    if !(cursor.eat(b'T') || cursor.eat(b't') || cursor.skip_blanks() > 0) {
        return None;
    }

    let (hour, _) = cursor.digits(1, 2)?;
    if !cursor.eat(b':') {
        return None;
    }
    let (minute, _) = cursor.digits(2, 2)?;
    if !cursor.eat(b':') {
        return None;
    }
    let (second, _) = cursor.digits(2, 2)?;

    let mut microsecond = 0;
    if cursor.eat(b'.') {
        let start = cursor.pos;
        while matches!(cursor.peek(), Some(b'0'..=b'9')) {
            cursor.pos += 1;
        }
        // Only microsecond precision is kept.
        let fraction = &cursor.bytes[start..cursor.pos];
        for i in 0..6 {
            let digit = fraction.get(i).map_or(0, |byte| u32::from(byte - b'0'));
            microsecond = microsecond * 10 + digit;
        }
    }

    let mut offset = None;
    if !cursor.at_end() {
        cursor.skip_blanks();
        if cursor.eat(b'Z') {
            offset = Some((false, 0, 0));
        } else {
            let negative = if cursor.eat(b'-') {
                true
            } else if cursor.eat(b'+') {
                false
            } else {
                return None;
            };
            let (hours, _) = cursor.digits(1, 2)?;
            let minutes = if cursor.eat(b':') {
                cursor.digits(2, 2)?.0
            } else {
                0
            };
            offset = Some((negative, hours, minutes));
        }
        if !cursor.at_end() {
            return None;
        }
    }

    Some(RawTimestamp {
        year,
        month,
        day,
        time: Some(RawTime {
            hour,
            minute,
            second,
            microsecond,
            offset,
        }),
    })
}

/// True if `value` has the syntax of a timestamp. Field ranges are not
/// checked; that happens when the value is constructed.
pub fn matches(value: &str) -> bool {
    lex(value).is_some()
}

fn is_leap_year(year: u32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Days since 1970-01-01 in the proleptic Gregorian calendar.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let day_of_year = (153 * (month + if month > 2 { -3 } else { 9 }) + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146097 + day_of_era - 719468
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = lex(s).ok_or(TimestampError::Malformed)?;

        if !(1..=9999).contains(&raw.year) {
            return Err(TimestampError::OutOfRange("year"));
        }
        if !(1..=12).contains(&raw.month) {
            return Err(TimestampError::OutOfRange("month"));
        }
        if raw.day < 1 || raw.day > days_in_month(raw.year, raw.month) {
            return Err(TimestampError::OutOfRange("day"));
        }

        let time = match raw.time {
            None => None,
            Some(time) => {
                if time.hour > 23 {
                    return Err(TimestampError::OutOfRange("hour"));
                }
                if time.minute > 59 {
                    return Err(TimestampError::OutOfRange("minute"));
                }
                if time.second > 59 {
                    return Err(TimestampError::OutOfRange("second"));
                }
                let offset = match time.offset {
                    None => None,
                    Some((negative, hours, minutes)) => {
                        if hours > 23 || minutes > 59 {
                            return Err(TimestampError::OutOfRange("time zone offset"));
                        }
                        let total = (hours * 60 + minutes) as i16;
                        Some(if negative { -total } else { total })
                    }
                };
                Some(Time {
                    hour: time.hour as u8,
                    minute: time.minute as u8,
                    second: time.second as u8,
                    microsecond: time.microsecond,
                    offset,
                })
            }
        };

        Ok(Timestamp {
            year: raw.year as u16,
            month: raw.month as u8,
            day: raw.day as u8,
            time,
        })
    }
}

impl Timestamp {
    #[inline]
    pub fn date(year: u16, month: u8, day: u8) -> Self {
        Self {
            year,
            month,
            day,
            time: None,
        }
    }

    pub fn with_time(self, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            time: Some(Time {
                hour,
                minute,
                second,
                microsecond: 0,
                offset: None,
            }),
            ..self
        }
    }

    pub fn with_microsecond(mut self, microsecond: u32) -> Self {
        if let Some(ref mut time) = self.time {
            time.microsecond = microsecond;
        }
        self
    }

    /// Set the UTC offset in minutes.
    pub fn with_offset(mut self, minutes: i16) -> Self {
        if let Some(ref mut time) = self.time {
            time.offset = Some(minutes);
        }
        self
    }

    #[inline]
    pub fn is_date(&self) -> bool {
        self.time.is_none()
    }

    /// Microseconds since the epoch, shifted to UTC when an offset is known.
    fn instant(&self) -> i128 {
        let days = days_from_civil(self.year.into(), self.month.into(), self.day.into());
        let mut seconds = i128::from(days) * 86400;
        let mut micros = 0;
        if let Some(time) = self.time {
            seconds += i128::from(time.hour) * 3600
                + i128::from(time.minute) * 60
                + i128::from(time.second);
            seconds -= i128::from(time.offset.unwrap_or(0)) * 60;
            micros = i128::from(time.microsecond);
        }
        seconds * 1_000_000 + micros
    }

    /// Chronological order. Dates only compare with dates, and naive
    /// date-times only with naive date-times; other pairs are unordered.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self.time, other.time) {
            (None, None) => Some(self.instant().cmp(&other.instant())),
            (Some(a), Some(b)) if a.offset.is_some() == b.offset.is_some() => {
                Some(self.instant().cmp(&other.instant()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)?;
        let Some(time) = self.time else {
            return Ok(());
        };
        write!(f, " {:02}:{:02}:{:02}", time.hour, time.minute, time.second)?;
        if time.microsecond != 0 {
            write!(f, ".{:06}", time.microsecond)?;
        }
        if let Some(offset) = time.offset {
            let sign = if offset < 0 { '-' } else { '+' };
            let offset = offset.unsigned_abs();
            write!(f, "{sign}{:02}:{:02}", offset / 60, offset % 60)?;
        }
        Ok(())
    }
}
