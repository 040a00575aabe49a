use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::internal::{
    self, NANOS_PER_DAY, NANOS_PER_HOUR, NANOS_PER_MINUTE, NANOS_PER_SECOND,
};

/// A time of day without a time zone, such as 09:55:02.123456789.
///
/// The time is stored as nanoseconds since midnight on the 24-hour clock.
/// Construction is unchecked: a negative value or one reaching 24 hours is
/// an invalid time ([`Time::is_valid`]), and the default time is invalid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Time {
    nanos: i64,
}

impl Default for Time {
    fn default() -> Self {
        Time {
            nanos: NANOS_PER_DAY,
        }
    }
}

impl Time {
    /// A time from hours, minutes, and seconds.
    pub const fn from_hms(hours: i32, minutes: i32, seconds: i32) -> Time {
        Time {
            nanos: (hours as i64 * 3600 + minutes as i64 * 60 + seconds as i64)
                * NANOS_PER_SECOND,
        }
    }

    /// A time from hours, minutes, seconds, and milliseconds.
    pub const fn from_hms_milli(hours: i32, minutes: i32, seconds: i32, millis: i32) -> Time {
        Time {
            nanos: Time::from_hms(hours, minutes, seconds).nanos + millis as i64 * 1_000_000,
        }
    }

    /// A time from hours, minutes, seconds, and a sub-second nanosecond
    /// count.
    pub const fn from_hms_nano(hours: i32, minutes: i32, seconds: i32, nanos: i64) -> Time {
        Time {
            nanos: Time::from_hms(hours, minutes, seconds).nanos + nanos,
        }
    }

    /// A time from a nanosecond count since midnight.
    pub const fn from_nanos_since_midnight(nanos: i64) -> Time {
        Time { nanos }
    }

    /// The time of day of a wall-clock reading, in UTC. Readings before the
    /// Unix epoch yield an invalid time.
    pub fn from_system_time(time: SystemTime) -> Time {
        match time.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(since) => Time {
                nanos: (since.as_nanos() % NANOS_PER_DAY as u128) as i64,
            },
            Err(err) => Time {
                nanos: -((err.duration().as_nanos() % NANOS_PER_DAY as u128) as i64),
            },
        }
    }

    /// The current time of day from the system clock, in UTC.
    pub fn current() -> Time {
        Time::from_system_time(SystemTime::now())
    }

    /// Midnight, 00:00:00.
    pub const fn midnight() -> Time {
        Time { nanos: 0 }
    }

    /// Whether this is a real time of day, i.e. within 00:00:00..24:00:00.
    pub const fn is_valid(&self) -> bool {
        self.nanos >= 0 && self.nanos < NANOS_PER_DAY
    }

    /// Hour of day (0, 23).
    pub const fn hour(&self) -> i32 {
        (self.nanos.rem_euclid(NANOS_PER_DAY) / NANOS_PER_HOUR) as i32
    }

    /// Minute of hour (0, 59).
    pub const fn minute(&self) -> i32 {
        (self.nanos % NANOS_PER_HOUR / NANOS_PER_MINUTE) as i32
    }

    /// Second of minute (0, 59).
    pub const fn second(&self) -> i32 {
        (self.nanos % NANOS_PER_MINUTE / NANOS_PER_SECOND) as i32
    }

    /// Millisecond of second (0, 999).
    pub const fn millisecond(&self) -> i32 {
        (self.nanos % NANOS_PER_SECOND / 1_000_000) as i32
    }

    /// Microsecond of second (0, 999999).
    pub const fn microsecond(&self) -> i32 {
        (self.nanos % NANOS_PER_SECOND / 1_000) as i32
    }

    /// Nanosecond of second (0, 999999999).
    pub const fn nanosecond(&self) -> i32 {
        (self.nanos % NANOS_PER_SECOND) as i32
    }

    pub const fn add_hours(&self, hours: i64) -> Time {
        Time {
            nanos: self.nanos + hours * NANOS_PER_HOUR,
        }
    }

    pub const fn subtract_hours(&self, hours: i64) -> Time {
        self.add_hours(-hours)
    }

    pub const fn add_minutes(&self, minutes: i64) -> Time {
        Time {
            nanos: self.nanos + minutes * NANOS_PER_MINUTE,
        }
    }

    pub const fn subtract_minutes(&self, minutes: i64) -> Time {
        self.add_minutes(-minutes)
    }

    pub const fn add_seconds(&self, seconds: i64) -> Time {
        Time {
            nanos: self.nanos + seconds * NANOS_PER_SECOND,
        }
    }

    pub const fn subtract_seconds(&self, seconds: i64) -> Time {
        self.add_seconds(-seconds)
    }

    pub const fn add_milliseconds(&self, millis: i64) -> Time {
        Time {
            nanos: self.nanos + millis * 1_000_000,
        }
    }

    pub const fn subtract_milliseconds(&self, millis: i64) -> Time {
        self.add_milliseconds(-millis)
    }

    pub const fn add_microseconds(&self, micros: i64) -> Time {
        Time {
            nanos: self.nanos + micros * 1_000,
        }
    }

    pub const fn subtract_microseconds(&self, micros: i64) -> Time {
        self.add_microseconds(-micros)
    }

    pub const fn add_nanoseconds(&self, nanos: i64) -> Time {
        Time {
            nanos: self.nanos + nanos,
        }
    }

    pub const fn subtract_nanoseconds(&self, nanos: i64) -> Time {
        self.add_nanoseconds(-nanos)
    }

    pub const fn to_nanos_since_midnight(&self) -> i64 {
        self.nanos
    }

    pub const fn to_micros_since_midnight(&self) -> i64 {
        self.nanos / 1_000
    }

    pub const fn to_millis_since_midnight(&self) -> i64 {
        self.nanos / 1_000_000
    }

    pub const fn to_seconds_since_midnight(&self) -> i64 {
        self.nanos / NANOS_PER_SECOND
    }

    pub const fn to_minutes_since_midnight(&self) -> i64 {
        self.nanos / NANOS_PER_MINUTE
    }

    pub const fn to_hours_since_midnight(&self) -> i64 {
        self.nanos / NANOS_PER_HOUR
    }

    /// Nanoseconds from `from` to `to`; negative when `to` is earlier.
    pub const fn nanoseconds_between(from: Time, to: Time) -> i64 {
        to.nanos - from.nanos
    }

    pub const fn microseconds_between(from: Time, to: Time) -> i64 {
        to.to_micros_since_midnight() - from.to_micros_since_midnight()
    }

    pub const fn milliseconds_between(from: Time, to: Time) -> i64 {
        to.to_millis_since_midnight() - from.to_millis_since_midnight()
    }

    pub const fn seconds_between(from: Time, to: Time) -> i64 {
        to.to_seconds_since_midnight() - from.to_seconds_since_midnight()
    }

    pub const fn minutes_between(from: Time, to: Time) -> i64 {
        to.to_minutes_since_midnight() - from.to_minutes_since_midnight()
    }

    pub const fn hours_between(from: Time, to: Time) -> i64 {
        to.to_hours_since_midnight() - from.to_hours_since_midnight()
    }

    /// Renders the time according to `format`.
    ///
    /// Patterns: `h`/`hh` 24-hour, `H`/`HH` 12-hour, `m`/`mm` minute,
    /// `s`/`ss` second, `f`..`fffffffff` fraction of a second at 1 to 9
    /// digits, `a`/`A` meridiem. Unrecognized characters and unrecognized
    /// run lengths pass through literally. An invalid time renders as the
    /// empty string.
    pub fn format(&self, format: &str) -> String {
        if !self.is_valid() {
            return String::new();
        }
        let chars: Vec<char> = format.chars().collect();
        let mut output = String::new();
        let mut pos = 0;
        while pos < chars.len() {
            let count = internal::run_length(&chars, pos);
            match self.stringify(chars[pos], count) {
                Some(text) => output.push_str(&text),
                None => output.extend(&chars[pos..pos + count]),
            }
            pos += count;
        }
        output
    }

    fn stringify(&self, flag: char, count: usize) -> Option<String> {
        Some(match (flag, count) {
            ('h', 1 | 2) => format!("{:0count$}", self.hour()),
            ('H', 1 | 2) => {
                let hour = self.hour();
                let clock = if hour == 0 || hour == 12 { 12 } else { hour % 12 };
                format!("{clock:0count$}")
            }
            ('m', 1 | 2) => format!("{:0count$}", self.minute()),
            ('s', 1 | 2) => format!("{:0count$}", self.second()),
            ('f', 1..=9) => format!(
                "{:0count$}",
                self.nanosecond() as i64 / 10_i64.pow(9 - count as u32)
            ),
            ('a', 1) => String::from(if self.hour() >= 12 { "pm" } else { "am" }),
            ('A', 1) => String::from(if self.hour() >= 12 { "PM" } else { "AM" }),
            _ => return None,
        })
    }

    /// Parses a time from `input` according to `format`, with the same
    /// patterns as [`Time::format`]. `None` when the input cannot be read
    /// against the format.
    pub fn parse(input: &str, format: &str) -> Option<Time> {
        let inp: Vec<char> = input.chars().collect();
        let fmt: Vec<char> = format.chars().collect();
        let mut hour: i64 = 0;
        let mut minute: i64 = 0;
        let mut second: i64 = 0;
        let mut subsecond: i64 = 0;
        let (mut fpos, mut ipos) = (0, 0);
        while fpos < fmt.len() && ipos < inp.len() {
            let count = internal::run_length(&fmt, fpos);
            match fmt[fpos] {
                'h' | 'H' => hour = internal::read_int(&inp, &mut ipos, 2)?,
                'm' => minute = internal::read_int(&inp, &mut ipos, 2)?,
                's' => second = internal::read_int(&inp, &mut ipos, 2)?,
                'f' if count <= 9 => {
                    let digits = internal::read_int(&inp, &mut ipos, count)?;
                    subsecond = digits * 10_i64.pow(9 - count as u32);
                }
                'a' | 'A' => {
                    hour += match meridiem(&inp, &mut ipos)? {
                        Meridiem::Am if hour >= 12 => -12,
                        Meridiem::Pm if hour < 12 => 12,
                        _ => 0,
                    };
                }
                _ => ipos += count,
            }
            fpos += count;
        }
        Some(Time::from_hms_nano(
            hour as i32,
            minute as i32,
            second as i32,
            subsecond,
        ))
    }
}

pub(crate) enum Meridiem {
    Am,
    Pm,
}

/// Reads a case-insensitive "am"/"pm" marker, advancing past it.
pub(crate) fn meridiem(chars: &[char], pos: &mut usize) -> Option<Meridiem> {
    if *pos + 2 > chars.len() {
        return None;
    }
    let marker = [
        chars[*pos].to_ascii_lowercase(),
        chars[*pos + 1].to_ascii_lowercase(),
    ];
    let found = match marker {
        ['a', 'm'] => Meridiem::Am,
        ['p', 'm'] => Meridiem::Pm,
        _ => return None,
    };
    *pos += 2;
    Some(found)
}

impl fmt::Display for Time {
    /// ISO-8601 time format with milliseconds, `hh:mm:ss.fff`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format("hh:mm:ss.fff"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity() {
        assert!(!Time::default().is_valid());
        assert!(Time::midnight().is_valid());
        assert!(Time::from_hms(22, 1, 55).is_valid());
        assert!(!Time::from_hms(-1, 0, 0).is_valid());
        assert!(!Time::from_hms(24, 0, 0).is_valid());
        assert!(Time::from_nanos_since_midnight(1).is_valid());
        assert!(!Time::from_hms(23, 59, 59).add_seconds(1).is_valid());
    }

    #[test]
    fn accessors() {
        let time = Time::from_hms_nano(9, 55, 2, 123_456_789);
        assert_eq!(time.hour(), 9);
        assert_eq!(time.minute(), 55);
        assert_eq!(time.second(), 2);
        assert_eq!(time.millisecond(), 123);
        assert_eq!(time.microsecond(), 123_456);
        assert_eq!(time.nanosecond(), 123_456_789);
        assert_eq!(time.to_seconds_since_midnight(), 9 * 3600 + 55 * 60 + 2);
        assert_eq!(time.to_hours_since_midnight(), 9);
    }

    #[test]
    fn arithmetic() {
        let time = Time::from_hms(2, 55, 10);
        assert_eq!(time.add_hours(2), Time::from_hms(4, 55, 10));
        assert_eq!(time.subtract_minutes(56), Time::from_hms(1, 59, 10));
        assert_eq!(
            time.add_milliseconds(1500),
            Time::from_hms_milli(2, 55, 11, 500)
        );
        assert_eq!(
            time.add_nanoseconds(999).subtract_nanoseconds(999),
            time
        );
        // No wrap-around: past-midnight results are simply invalid.
        assert!(!Time::from_hms(23, 0, 0).add_hours(2).is_valid());
    }

    #[test]
    fn between() {
        let early = Time::from_hms(9, 0, 0);
        let late = Time::from_hms_milli(10, 30, 0, 250);
        assert_eq!(Time::seconds_between(early, late), 5400);
        assert_eq!(Time::seconds_between(late, early), -5400);
        assert_eq!(Time::milliseconds_between(early, late), 5_400_250);
        assert_eq!(Time::hours_between(early, late), 1);
    }

    #[test]
    fn formatting() {
        let time = Time::from_hms_nano(9, 5, 2, 123_456_789);
        assert_eq!(time.format("hh:mm:ss"), "09:05:02");
        assert_eq!(time.format("h:m:s"), "9:5:2");
        assert_eq!(time.format("hh:mm:ss.fff"), "09:05:02.123");
        assert_eq!(time.format("ss.fffffffff"), "02.123456789");
        assert_eq!(time.format("HH:mm A"), "09:05 AM");
        assert_eq!(Time::from_hms(13, 8, 0).format("H:mm a"), "1:08 pm");
        assert_eq!(Time::from_hms(0, 30, 0).format("H a"), "12 am");
        assert_eq!(Time::from_hms(12, 0, 0).format("H A"), "12 PM");
        assert_eq!(Time::default().format("hh:mm"), "");
        // Unrecognized run lengths stay literal.
        assert_eq!(time.format("hhh"), "hhh");
        assert_eq!(time.to_string(), "09:05:02.123");
    }

    #[test]
    fn parsing() {
        assert_eq!(
            Time::parse("09:05:02", "hh:mm:ss"),
            Some(Time::from_hms(9, 5, 2))
        );
        assert_eq!(
            Time::parse("09:05:02.123", "hh:mm:ss.fff"),
            Some(Time::from_hms_milli(9, 5, 2, 123))
        );
        assert_eq!(
            Time::parse("1:08 pm", "H:mm a"),
            Some(Time::from_hms(13, 8, 0))
        );
        assert_eq!(
            Time::parse("12:00 AM", "HH:mm a"),
            Some(Time::from_hms(0, 0, 0))
        );
        assert_eq!(
            Time::parse("12:00 PM", "HH:mm a"),
            Some(Time::from_hms(12, 0, 0))
        );
        assert_eq!(Time::parse("xx:05", "hh:mm"), None);
        assert_eq!(
            Time::parse("02.123456789", "ss.fffffffff"),
            Some(Time::from_hms_nano(0, 0, 2, 123_456_789))
        );
    }
}
