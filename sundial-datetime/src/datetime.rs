use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::internal::{self, NANOS_PER_DAY, NANOS_PER_HOUR, NANOS_PER_MINUTE, NANOS_PER_SECOND};
use crate::time::{meridiem, Meridiem};
use crate::{Date, Time, Weekday};

/// A date and time of day without a time zone, such as
/// 2017-12-31 22:34:55 UTC.
///
/// Internally a [`Date`] plus a [`Time`]; valid iff both parts are. The
/// duration-based constructors and conversions count signed nanoseconds
/// from the epoch 1970-01-01 00:00:00 UTC.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct DateTime {
    date: Date,
    time: Time,
}

impl DateTime {
    pub const fn new(date: Date, time: Time) -> DateTime {
        DateTime { date, time }
    }

    /// The given date at midnight.
    pub const fn from_date(date: Date) -> DateTime {
        DateTime {
            date,
            time: Time::midnight(),
        }
    }

    /// The datetime `nanos` nanoseconds from the Unix epoch; negative
    /// values reach back before it (the time part stays within the day the
    /// instant falls in).
    pub fn from_nanos_since_epoch(nanos: i64) -> DateTime {
        DateTime {
            date: Date::from_days_since_epoch(nanos.div_euclid(NANOS_PER_DAY)),
            time: Time::from_nanos_since_midnight(nanos.rem_euclid(NANOS_PER_DAY)),
        }
    }

    /// The datetime of a wall-clock reading, in UTC.
    pub fn from_system_time(time: SystemTime) -> DateTime {
        let nanos = match time.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_nanos()).unwrap_or(i64::MAX),
            Err(err) => i64::try_from(err.duration().as_nanos())
                .map(|n| -n)
                .unwrap_or(i64::MIN),
        };
        DateTime::from_nanos_since_epoch(nanos)
    }

    /// The current datetime from the system clock, in UTC.
    pub fn current() -> DateTime {
        DateTime::from_system_time(SystemTime::now())
    }

    /// The Unix epoch, 1970-01-01 00:00:00.
    pub fn epoch() -> DateTime {
        DateTime::new(Date::epoch(), Time::midnight())
    }

    pub fn is_valid(&self) -> bool {
        self.date.is_valid() && self.time.is_valid()
    }

    pub const fn date(&self) -> Date {
        self.date
    }

    pub const fn time(&self) -> Time {
        self.time
    }

    pub const fn year(&self) -> i32 {
        self.date.year()
    }

    pub const fn month(&self) -> i32 {
        self.date.month()
    }

    pub const fn day(&self) -> i32 {
        self.date.day()
    }

    pub const fn hour(&self) -> i32 {
        self.time.hour()
    }

    pub const fn minute(&self) -> i32 {
        self.time.minute()
    }

    pub const fn second(&self) -> i32 {
        self.time.second()
    }

    pub const fn millisecond(&self) -> i32 {
        self.time.millisecond()
    }

    pub const fn microsecond(&self) -> i32 {
        self.time.microsecond()
    }

    pub const fn nanosecond(&self) -> i32 {
        self.time.nanosecond()
    }

    pub fn day_of_week(&self) -> i32 {
        self.date.day_of_week()
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    pub fn day_of_year(&self) -> i32 {
        self.date.day_of_year()
    }

    pub fn days_in_month(&self) -> i32 {
        self.date.days_in_month()
    }

    pub fn days_in_year(&self) -> i32 {
        self.date.days_in_year()
    }

    pub fn is_leap_year(&self) -> bool {
        self.date.is_leap_year()
    }

    /// ISO week of the year and its week year; see [`Date::week_of_year`].
    pub fn week_of_year(&self) -> (i32, i32) {
        self.date.week_of_year()
    }

    pub fn day_of_week_name(&self, short: bool) -> &'static str {
        self.date.day_of_week_name(short)
    }

    pub fn month_name(&self, short: bool) -> &'static str {
        self.date.month_name(short)
    }

    pub fn add_years(&self, years: i32) -> DateTime {
        DateTime::new(self.date.add_years(years), self.time)
    }

    pub fn subtract_years(&self, years: i32) -> DateTime {
        DateTime::new(self.date.subtract_years(years), self.time)
    }

    pub fn add_months(&self, months: i32) -> DateTime {
        DateTime::new(self.date.add_months(months), self.time)
    }

    pub fn subtract_months(&self, months: i32) -> DateTime {
        DateTime::new(self.date.subtract_months(months), self.time)
    }

    pub fn add_days(&self, days: i64) -> DateTime {
        DateTime::new(self.date.add_days(days), self.time)
    }

    pub fn subtract_days(&self, days: i64) -> DateTime {
        DateTime::new(self.date.subtract_days(days), self.time)
    }

    pub fn add_hours(&self, hours: i64) -> DateTime {
        self.add_nanoseconds(hours * NANOS_PER_HOUR)
    }

    pub fn subtract_hours(&self, hours: i64) -> DateTime {
        self.add_nanoseconds(-hours * NANOS_PER_HOUR)
    }

    pub fn add_minutes(&self, minutes: i64) -> DateTime {
        self.add_nanoseconds(minutes * NANOS_PER_MINUTE)
    }

    pub fn subtract_minutes(&self, minutes: i64) -> DateTime {
        self.add_nanoseconds(-minutes * NANOS_PER_MINUTE)
    }

    pub fn add_seconds(&self, seconds: i64) -> DateTime {
        self.add_nanoseconds(seconds * NANOS_PER_SECOND)
    }

    pub fn subtract_seconds(&self, seconds: i64) -> DateTime {
        self.add_nanoseconds(-seconds * NANOS_PER_SECOND)
    }

    pub fn add_milliseconds(&self, millis: i64) -> DateTime {
        self.add_nanoseconds(millis * 1_000_000)
    }

    pub fn subtract_milliseconds(&self, millis: i64) -> DateTime {
        self.add_nanoseconds(-millis * 1_000_000)
    }

    pub fn add_microseconds(&self, micros: i64) -> DateTime {
        self.add_nanoseconds(micros * 1_000)
    }

    pub fn subtract_microseconds(&self, micros: i64) -> DateTime {
        self.add_nanoseconds(-micros * 1_000)
    }

    /// Shifts by a signed nanosecond count, carrying whole days into the
    /// date part.
    pub fn add_nanoseconds(&self, nanos: i64) -> DateTime {
        let total = self.time.to_nanos_since_midnight() as i128 + nanos as i128;
        let day = NANOS_PER_DAY as i128;
        DateTime {
            date: self.date.add_days(total.div_euclid(day) as i64),
            time: Time::from_nanos_since_midnight(total.rem_euclid(day) as i64),
        }
    }

    pub fn subtract_nanoseconds(&self, nanos: i64) -> DateTime {
        self.add_nanoseconds(-nanos)
    }

    /// Signed nanoseconds since the Unix epoch, not counting leap seconds.
    pub fn to_nanos_since_epoch(&self) -> i64 {
        self.date.to_days_since_epoch() * NANOS_PER_DAY + self.time.to_nanos_since_midnight()
    }

    pub fn to_micros_since_epoch(&self) -> i64 {
        self.to_nanos_since_epoch() / 1_000
    }

    pub fn to_millis_since_epoch(&self) -> i64 {
        self.to_nanos_since_epoch() / 1_000_000
    }

    pub fn to_seconds_since_epoch(&self) -> i64 {
        self.to_nanos_since_epoch() / NANOS_PER_SECOND
    }

    pub fn to_minutes_since_epoch(&self) -> i64 {
        self.to_nanos_since_epoch() / NANOS_PER_MINUTE
    }

    pub fn to_hours_since_epoch(&self) -> i64 {
        self.to_nanos_since_epoch() / NANOS_PER_HOUR
    }

    /// Days since the epoch of the date part alone.
    pub fn to_days_since_epoch(&self) -> i64 {
        self.date.to_days_since_epoch()
    }

    /// This datetime as a wall-clock reading.
    pub fn to_system_time(&self) -> SystemTime {
        let nanos = self.to_nanos_since_epoch();
        if nanos >= 0 {
            SystemTime::UNIX_EPOCH + Duration::from_nanos(nanos as u64)
        } else {
            SystemTime::UNIX_EPOCH - Duration::from_nanos(nanos.unsigned_abs())
        }
    }

    /// The Julian Day as a fraction: the integral part counts days, the
    /// fractional part the time since noon UT. JD 0.0 is noon on
    /// 24 November 4714 BCE (proleptic Gregorian); 2017-12-31 00:09:35 is
    /// JD 2458118.506655093.
    pub fn to_julian_day(&self) -> f64 {
        self.date.to_days_since_epoch() as f64 + 2_440_587.5
            + self.time.to_nanos_since_midnight() as f64 / NANOS_PER_DAY as f64
    }

    /// The datetime of the fractional Julian Day `julian_day`, at
    /// millisecond resolution.
    pub fn from_julian_day(julian_day: f64) -> DateTime {
        let whole = julian_day as i64;
        let fraction = julian_day - whole as f64;
        let millis = (86_400_000f64 * fraction) as i64;
        DateTime::from_date(Date::from_days_since_epoch(whole - 2_440_587))
            .subtract_hours(12)
            .add_milliseconds(millis)
    }

    /// Absolute number of nanoseconds between two datetimes.
    pub fn nanoseconds_between(from: DateTime, to: DateTime) -> i64 {
        (from.to_nanos_since_epoch() - to.to_nanos_since_epoch()).abs()
    }

    pub fn microseconds_between(from: DateTime, to: DateTime) -> i64 {
        DateTime::nanoseconds_between(from, to) / 1_000
    }

    pub fn milliseconds_between(from: DateTime, to: DateTime) -> i64 {
        DateTime::nanoseconds_between(from, to) / 1_000_000
    }

    pub fn seconds_between(from: DateTime, to: DateTime) -> i64 {
        DateTime::nanoseconds_between(from, to) / NANOS_PER_SECOND
    }

    pub fn minutes_between(from: DateTime, to: DateTime) -> i64 {
        DateTime::nanoseconds_between(from, to) / NANOS_PER_MINUTE
    }

    pub fn hours_between(from: DateTime, to: DateTime) -> i64 {
        DateTime::nanoseconds_between(from, to) / NANOS_PER_HOUR
    }

    pub fn days_between(from: DateTime, to: DateTime) -> i64 {
        DateTime::nanoseconds_between(from, to) / NANOS_PER_DAY
    }

    pub fn weeks_between(from: DateTime, to: DateTime) -> i64 {
        DateTime::days_between(from, to) / 7
    }

    /// Renders the datetime according to `format`.
    ///
    /// The full pattern set: `#` era sign, `E` era word, `y`/`yy`/`yyyy`
    /// year, `M`..`MMMM` month, `d`/`dd` day, `ddd`/`dddd` weekday,
    /// `h`/`hh` 24-hour, `H`/`HH` 12-hour, `m`/`mm` minute, `s`/`ss`
    /// second, `f`..`fffffffff` second fraction, `a`/`A` meridiem.
    /// Unrecognized characters and unrecognized run lengths of pattern
    /// letters pass through literally. An invalid datetime renders as the
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
            let flag = chars[pos];
            if internal::is_pattern(flag, count) {
                let part = match flag {
                    'h' | 'H' | 'm' | 's' | 'f' | 'a' | 'A' => self.time.format(
                        &std::iter::repeat(flag).take(count).collect::<String>(),
                    ),
                    _ => self.date.format(
                        &std::iter::repeat(flag).take(count).collect::<String>(),
                    ),
                };
                output.push_str(&part);
            } else {
                output.extend(&chars[pos..pos + count]);
            }
            pos += count;
        }
        output
    }

    /// Parses a datetime from `input` according to `format`, with the same
    /// patterns as [`DateTime::format`]. `None` when the input cannot be
    /// read against the format, or when the format contains a pattern
    /// letter at an unrecognized run length.
    pub fn parse(input: &str, format: &str) -> Option<DateTime> {
        let inp: Vec<char> = input.chars().collect();
        let fmt: Vec<char> = format.chars().collect();
        let mut sign: i32 = 1;
        let mut year: i64 = 0;
        let mut month: i64 = 1;
        let mut day: i64 = 1;
        let mut hour: i64 = 0;
        let mut minute: i64 = 0;
        let mut second: i64 = 0;
        let mut subsecond: i64 = 0;
        let (mut fpos, mut ipos) = (0, 0);
        while fpos < fmt.len() {
            let count = internal::run_length(&fmt, fpos);
            let flag = fmt[fpos];
            if internal::is_pattern_letter(flag) && !internal::is_pattern(flag, count) {
                return None;
            }
            match flag {
                '#' => match inp.get(ipos) {
                    Some('+') => {
                        sign = 1;
                        ipos += 1;
                    }
                    Some('-') => {
                        sign = -1;
                        ipos += 1;
                    }
                    _ => return None,
                },
                'E' => {
                    let rest = inp.get(ipos..).unwrap_or(&[]);
                    if rest.starts_with(&['C', 'E']) {
                        sign = 1;
                        ipos += 2;
                    } else if rest.starts_with(&['B', 'C', 'E']) {
                        sign = -1;
                        ipos += 3;
                    } else {
                        return None;
                    }
                }
                'y' => {
                    let max = if count == 1 || count == 4 { 4 } else { 2 };
                    year = internal::read_int(&inp, &mut ipos, max)?;
                    if count == 2 {
                        year += 2000;
                    }
                }
                'M' => match count {
                    1 | 2 => month = internal::read_int(&inp, &mut ipos, 2)?,
                    3 => {
                        let (index, len) =
                            internal::match_name(&internal::SHORT_MONTH_NAMES, &inp, ipos)?;
                        month = index as i64 + 1;
                        ipos += len;
                    }
                    _ => {
                        let (index, len) =
                            internal::match_name(&internal::LONG_MONTH_NAMES, &inp, ipos)?;
                        month = index as i64 + 1;
                        ipos += len;
                    }
                },
                'd' => match count {
                    1 | 2 => day = internal::read_int(&inp, &mut ipos, 2)?,
                    3 => {
                        let (_, len) =
                            internal::match_name(&internal::SHORT_WEEKDAY_NAMES, &inp, ipos)?;
                        ipos += len;
                    }
                    _ => {
                        let (_, len) =
                            internal::match_name(&internal::LONG_WEEKDAY_NAMES, &inp, ipos)?;
                        ipos += len;
                    }
                },
                'h' | 'H' => hour = internal::read_int(&inp, &mut ipos, 2)?,
                'a' | 'A' => {
                    hour += match meridiem(&inp, &mut ipos)? {
                        Meridiem::Am if hour >= 12 => -12,
                        Meridiem::Pm if hour < 12 => 12,
                        _ => 0,
                    };
                }
                'm' => minute = internal::read_int(&inp, &mut ipos, 2)?,
                's' => second = internal::read_int(&inp, &mut ipos, 2)?,
                'f' => {
                    let digits = internal::read_int(&inp, &mut ipos, count)?;
                    subsecond = digits * 10_i64.pow(9 - count as u32);
                }
                _ => ipos += count,
            }
            fpos += count;
        }
        Some(DateTime::new(
            Date::new(sign * year as i32, month as i32, day as i32),
            Time::from_hms_nano(hour as i32, minute as i32, second as i32, subsecond),
        ))
    }
}

impl fmt::Display for DateTime {
    /// ISO-8601 combined format with milliseconds,
    /// `yyyy-MM-ddThh:mm:ss.fff`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format("yyyy-MM-ddThh:mm:ss.fff"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_invalid() {
        assert!(!DateTime::default().is_valid());
        assert!(DateTime::epoch().is_valid());
        assert_eq!(DateTime::epoch().to_nanos_since_epoch(), 0);
    }

    #[test]
    fn nanos_roundtrip_with_floor_split() {
        let dt = DateTime::from_nanos_since_epoch(-1);
        assert_eq!(dt.date(), Date::new(1969, 12, 31));
        assert_eq!(dt.time(), Time::from_hms_nano(23, 59, 59, 999_999_999));
        assert_eq!(dt.to_nanos_since_epoch(), -1);

        let nanos = 1_700_259_728_123_456_789;
        let dt = DateTime::from_nanos_since_epoch(nanos);
        assert_eq!(dt.to_nanos_since_epoch(), nanos);
        assert_eq!(dt.date(), Date::new(2023, 11, 17));
        assert_eq!(dt.nanosecond(), 123_456_789);
    }

    #[test]
    fn system_time_roundtrip() {
        let wall = SystemTime::UNIX_EPOCH + Duration::from_millis(86_400_500);
        let dt = DateTime::from_system_time(wall);
        assert_eq!(dt.date(), Date::new(1970, 1, 2));
        assert_eq!(dt.time(), Time::from_hms_milli(0, 0, 0, 500));
        assert_eq!(dt.to_system_time(), wall);

        let before = SystemTime::UNIX_EPOCH - Duration::from_secs(1);
        assert_eq!(
            DateTime::from_system_time(before),
            DateTime::new(Date::new(1969, 12, 31), Time::from_hms(23, 59, 59))
        );
    }

    #[test]
    fn duration_arithmetic_carries_days() {
        let dt = DateTime::new(Date::new(2023, 12, 31), Time::from_hms(23, 59, 0));
        assert_eq!(
            dt.add_minutes(2),
            DateTime::new(Date::new(2024, 1, 1), Time::from_hms(0, 1, 0))
        );
        assert_eq!(
            dt.add_minutes(2).subtract_minutes(2),
            dt
        );
        assert_eq!(
            DateTime::epoch().subtract_nanoseconds(1).to_nanos_since_epoch(),
            -1
        );
        assert_eq!(
            dt.add_seconds(90),
            DateTime::new(Date::new(2024, 1, 1), Time::from_hms(0, 0, 30))
        );
    }

    #[test]
    fn calendar_arithmetic() {
        let dt = DateTime::new(Date::new(2013, 1, 31), Time::from_hms(10, 0, 0));
        assert_eq!(
            dt.add_months(1),
            DateTime::new(Date::new(2013, 2, 28), Time::from_hms(10, 0, 0))
        );
        assert_eq!(
            dt.subtract_months(2),
            DateTime::new(Date::new(2012, 11, 30), Time::from_hms(10, 0, 0))
        );
        assert_eq!(
            dt.add_years(1).add_days(1),
            DateTime::new(Date::new(2014, 2, 1), Time::from_hms(10, 0, 0))
        );
    }

    #[test]
    fn julian_day() {
        let dt = DateTime::new(Date::new(2017, 12, 31), Time::from_hms(0, 9, 35));
        assert!((dt.to_julian_day() - 2_458_118.506_655_093).abs() < 1e-6);
        assert_eq!(
            DateTime::new(Date::new(2017, 12, 31), Time::from_hms(12, 0, 0)).to_julian_day(),
            2_458_119.0
        );

        let restored = DateTime::from_julian_day(2_458_118.506_655_093);
        assert!(DateTime::milliseconds_between(dt, restored) <= 1);
    }

    #[test]
    fn between_is_absolute() {
        let a = DateTime::new(Date::new(2023, 11, 17), Time::from_hms(22, 22, 8));
        let b = a.add_days(2).add_hours(3);
        assert_eq!(DateTime::days_between(a, b), 2);
        assert_eq!(DateTime::days_between(b, a), 2);
        assert_eq!(DateTime::hours_between(a, b), 51);
        assert_eq!(DateTime::seconds_between(a, b), 51 * 3600);
        assert_eq!(DateTime::weeks_between(a, b.add_days(12)), 2);
    }

    #[test]
    fn ordering() {
        let earlier = DateTime::new(Date::new(2017, 12, 15), Time::from_hms(23, 59, 59));
        let later = DateTime::new(Date::new(2017, 12, 16), Time::from_hms(0, 0, 0));
        assert!(earlier < later);
        assert!(later >= earlier);
        assert_eq!(earlier, earlier.add_nanoseconds(0));
    }

    #[test]
    fn formatting() {
        let dt = DateTime::new(
            Date::new(2017, 12, 15),
            Time::from_hms_nano(22, 34, 55, 123_456_789),
        );
        assert_eq!(dt.format("yyyy-MM-dd hh:mm:ss"), "2017-12-15 22:34:55");
        assert_eq!(dt.to_string(), "2017-12-15T22:34:55.123");
        assert_eq!(
            dt.format("dddd, MMMM d, yyyy H:mm:ss.ffffff A"),
            "Friday, December 15, 2017 10:34:55.123456 PM"
        );
        assert_eq!(dt.format("E #yy"), "CE +17");
        // Unrecognized run lengths stay literal.
        assert_eq!(dt.format("yyyyy h"), "yyyyy 22");
        assert_eq!(DateTime::default().format("yyyy"), "");
    }

    #[test]
    fn parsing() {
        assert_eq!(
            DateTime::parse("2017-12-15 22:34:55", "yyyy-MM-dd hh:mm:ss"),
            Some(DateTime::new(
                Date::new(2017, 12, 15),
                Time::from_hms(22, 34, 55)
            ))
        );
        assert_eq!(
            DateTime::parse(
                "Friday, december 15, 2017 10:34:55.123 pm",
                "dddd, MMMM d, yyyy H:mm:ss.fff a"
            ),
            Some(DateTime::new(
                Date::new(2017, 12, 15),
                Time::from_hms_milli(22, 34, 55, 123)
            ))
        );
        assert_eq!(
            DateTime::parse("-44-03-15", "#yy-MM-dd"),
            Some(DateTime::new(
                Date::new(-2044, 3, 15),
                Time::midnight()
            ))
        );
        // A pattern letter at an unrecognized run length fails the parse.
        assert_eq!(DateTime::parse("2017", "yyyyy"), None);
        assert_eq!(DateTime::parse("xx-12", "yyyy-MM"), None);
    }

    #[test]
    fn parse_format_roundtrip() {
        let dt = DateTime::new(
            Date::new(2023, 11, 17),
            Time::from_hms_nano(5, 4, 3, 210_000_000),
        );
        let pattern = "yyyy-MM-ddThh:mm:ss.fff";
        assert_eq!(DateTime::parse(&dt.format(pattern), pattern), Some(dt));
    }
}
