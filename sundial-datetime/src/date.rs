use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::internal::{self, NANOS_PER_DAY};

/// Day of the week, ISO numbered: Monday is 1, Sunday is 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weekday {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
    Sunday = 7,
}

/// Month of the year, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Month {
    January = 1,
    February = 2,
    March = 3,
    April = 4,
    May = 5,
    June = 6,
    July = 7,
    August = 8,
    September = 9,
    October = 10,
    November = 11,
    December = 12,
}

/// A date without a time zone in the proleptic Gregorian calendar, such as
/// 2017-12-15.
///
/// The date is the triple (year, month, day). There is no year 0: year -1
/// is 1 BCE, year -2 is 2 BCE, and so on. A default-constructed date is
/// invalid, as is any triple whose fields do not name a real day; validity
/// is never enforced at construction and can be queried with
/// [`Date::is_valid`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Date {
    year: i32,
    month: i32,
    day: i32,
}

impl Date {
    /// A date from the given year, month, and day, unchecked.
    pub const fn new(year: i32, month: i32, day: i32) -> Date {
        Date { year, month, day }
    }

    /// The date `days` after 1970-01-01 (negative values reach back before
    /// the epoch).
    pub fn from_days_since_epoch(days: i64) -> Date {
        let (year, month, day) = internal::ymd_from_days(days);
        Date { year, month, day }
    }

    /// Today according to the system clock, in UTC.
    pub fn current() -> Date {
        let nanos = match SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
            Ok(since) => since.as_nanos() as i128,
            Err(err) => -(err.duration().as_nanos() as i128),
        };
        Date::from_days_since_epoch(nanos.div_euclid(NANOS_PER_DAY as i128) as i64)
    }

    /// The Unix epoch, 1970-01-01.
    pub fn epoch() -> Date {
        Date::from_days_since_epoch(0)
    }

    /// Whether the fields name a real day: a non-zero year, a month in
    /// 1..=12, and a day within that month.
    pub fn is_valid(&self) -> bool {
        self.year != 0
            && self.month > 0
            && self.month < 13
            && self.day > 0
            && self.day <= Date::days_in_month_of_year(self.year, self.month)
    }

    pub const fn year(&self) -> i32 {
        self.year
    }

    pub const fn month(&self) -> i32 {
        self.month
    }

    pub const fn day(&self) -> i32 {
        self.day
    }

    /// Day of the week as a number between 1 (Monday) and 7 (Sunday).
    pub fn day_of_week(&self) -> i32 {
        ((self.to_days_since_epoch() + 3).rem_euclid(7) + 1) as i32
    }

    /// Day of the week as a [`Weekday`].
    pub fn weekday(&self) -> Weekday {
        match self.day_of_week() {
            1 => Weekday::Monday,
            2 => Weekday::Tuesday,
            3 => Weekday::Wednesday,
            4 => Weekday::Thursday,
            5 => Weekday::Friday,
            6 => Weekday::Saturday,
            _ => Weekday::Sunday,
        }
    }

    /// Day of the year, between 1 and 365 (366 in leap years).
    pub fn day_of_year(&self) -> i32 {
        (self.to_days_since_epoch() - internal::days_from_ymd(self.year, 1, 1) + 1) as i32
    }

    /// Number of days in this date's month, between 28 and 31.
    pub fn days_in_month(&self) -> i32 {
        Date::days_in_month_of_year(self.year, self.month)
    }

    /// Number of days in this date's year: 365 or 366.
    pub fn days_in_year(&self) -> i32 {
        if self.is_leap_year() {
            366
        } else {
            365
        }
    }

    /// Whether this date's year is a leap year.
    pub fn is_leap_year(&self) -> bool {
        Date::is_leap(self.year)
    }

    /// Leap-year rule of the proleptic Gregorian calendar: divisible by 4,
    /// except centuries not divisible by 400. Since there is no year 0, the
    /// years -1, -5, -9, ... are the leap years before the common era.
    pub fn is_leap(mut year: i32) -> bool {
        if year < 1 {
            year += 1;
        }
        year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
    }

    /// Number of days in `month` of `year`; 0 for a month outside 1..=12.
    pub fn days_in_month_of_year(year: i32, month: i32) -> i32 {
        match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 => {
                if Date::is_leap(year) {
                    29
                } else {
                    28
                }
            }
            _ => 0,
        }
    }

    /// ISO week of the year and the year that week belongs to.
    ///
    /// Weeks start on Monday and the first Thursday of a year is always in
    /// week 1, so the week year is not always [`Date::year`]: 2000-01-01
    /// falls in week 52 of 1999, and 2010-01-01 in week 53 of 2009.
    pub fn week_of_year(&self) -> (i32, i32) {
        fn first_week_date(year: i32) -> Date {
            let d = Date::new(year, 1, 1);
            d.add_days(((11 - d.day_of_week()) % 7 - 3) as i64)
        }
        let mut year = self.year;
        let mut first = first_week_date(year);
        if *self < first {
            // Before the start of this year's first week: the date belongs
            // to the last week of the previous year.
            year -= 1;
            first = first_week_date(year);
        } else {
            let next = first_week_date(year + 1);
            if *self >= next {
                year += 1;
                first = next;
            }
        }
        let week = (Date::days_between(first, *self) / 7 + 1) as i32;
        (week, year)
    }

    /// English name of this date's weekday ("Sat" / "Saturday").
    pub fn day_of_week_name(&self, short: bool) -> &'static str {
        let index = self.day_of_week() as usize - 1;
        if short {
            internal::SHORT_WEEKDAY_NAMES[index]
        } else {
            internal::LONG_WEEKDAY_NAMES[index]
        }
    }

    /// English name of this date's month ("Jan" / "January").
    pub fn month_name(&self, short: bool) -> &'static str {
        let index = self.month as usize - 1;
        if short {
            internal::SHORT_MONTH_NAMES[index]
        } else {
            internal::LONG_MONTH_NAMES[index]
        }
    }

    pub fn add_days(&self, days: i64) -> Date {
        Date::from_days_since_epoch(self.to_days_since_epoch() + days)
    }

    pub fn subtract_days(&self, days: i64) -> Date {
        self.add_days(-days)
    }

    /// Adds months, clamping to the end of the resulting month when the day
    /// does not exist there: 2013-01-31 plus one month is 2013-02-28.
    pub fn add_months(&self, months: i32) -> Date {
        if months < 0 {
            return self.subtract_months(-months);
        }
        let total_months = self.month + months - 1;
        let year = self.year + total_months / 12;
        let month = total_months % 12 + 1;
        let day = self.day.min(Date::days_in_month_of_year(year, month));
        Date { year, month, day }
    }

    /// Subtracts months with the same end-of-month clamping as
    /// [`Date::add_months`]: 2012-03-31 minus one month is 2012-02-29.
    pub fn subtract_months(&self, months: i32) -> Date {
        if months < 0 {
            return self.add_months(-months);
        }
        let year = self.year - (self.month - months - 12).abs() / 12;
        let month = (11 + self.month - months % 12) % 12 + 1;
        let day = self.day.min(Date::days_in_month_of_year(year, month));
        Date { year, month, day }
    }

    /// Adds years, skipping the nonexistent year 0.
    pub fn add_years(&self, years: i32) -> Date {
        let year = self.year + years;
        Date {
            year: if year > 0 { year } else { year - 1 },
            ..*self
        }
    }

    /// Subtracts years, skipping the nonexistent year 0.
    pub fn subtract_years(&self, years: i32) -> Date {
        let year = self.year - years;
        Date {
            year: if year > 0 { year } else { year - 1 },
            ..*self
        }
    }

    /// Days elapsed since 1970-01-01; negative before the epoch.
    pub fn to_days_since_epoch(&self) -> i64 {
        internal::days_from_ymd(self.year, self.month, self.day)
    }

    /// The Julian Day Number: consecutive days since 24 November 4714 BCE
    /// (proleptic Gregorian).
    pub fn to_julian_day(&self) -> i64 {
        self.to_days_since_epoch() + 2_440_588
    }

    /// The date of Julian Day Number `julian_day`.
    pub fn from_julian_day(julian_day: i64) -> Date {
        Date::from_days_since_epoch(julian_day - 2_440_588)
    }

    /// Days from `from` to `to`; negative when `to` is earlier.
    pub fn days_between(from: Date, to: Date) -> i64 {
        to.to_days_since_epoch() - from.to_days_since_epoch()
    }

    /// Whole weeks from `from` to `to`.
    pub fn weeks_between(from: Date, to: Date) -> i64 {
        Date::days_between(from, to) / 7
    }

    /// Renders the date according to `format`.
    ///
    /// Patterns: `#` era sign, `E` era word (CE/BCE), `y`/`yy`/`yyyy` year,
    /// `M`/`MM`/`MMM`/`MMMM` month, `d`/`dd` day of month, `ddd`/`dddd` day
    /// of week. Unrecognized characters and unrecognized run lengths of
    /// pattern letters pass through literally. An invalid date renders as
    /// the empty string.
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
        let year = self.year.abs();
        Some(match (flag, count) {
            ('#', 1) => String::from(if self.year < 0 { "-" } else { "+" }),
            ('E', 1) => String::from(if self.year < 0 { "BCE" } else { "CE" }),
            ('y', 1) => year.to_string(),
            ('y', 2) => format!("{:02}", year % 100),
            ('y', 4) => format!("{:04}", year % 10_000),
            ('M', 1) => self.month.to_string(),
            ('M', 2) => format!("{:02}", self.month),
            ('M', 3) => self.month_name(true).to_string(),
            ('M', 4) => self.month_name(false).to_string(),
            ('d', 1) => self.day.to_string(),
            ('d', 2) => format!("{:02}", self.day),
            ('d', 3) => self.day_of_week_name(true).to_string(),
            ('d', 4) => self.day_of_week_name(false).to_string(),
            _ => return None,
        })
    }

    /// Parses a date from `input` according to `format`, using the same
    /// patterns as [`Date::format`]. `yy` years are resolved into the
    /// 2000s. `None` when the input cannot be read against the format; the
    /// returned date may still be invalid if the fields are out of range.
    pub fn parse(input: &str, format: &str) -> Option<Date> {
        let inp: Vec<char> = input.chars().collect();
        let fmt: Vec<char> = format.chars().collect();
        let mut sign: i32 = 1;
        let mut year: i32 = 1;
        let mut month: i32 = 1;
        let mut day: i32 = 1;
        let (mut fpos, mut ipos) = (0, 0);
        while fpos < fmt.len() && ipos < inp.len() {
            let count = internal::run_length(&fmt, fpos);
            match fmt[fpos] {
                '#' => {
                    if inp[ipos] == '+' {
                        sign = 1;
                        ipos += 1;
                    } else if inp[ipos] == '-' {
                        sign = -1;
                        ipos += 1;
                    }
                }
                'E' => {
                    if inp[ipos..].starts_with(&['C', 'E']) {
                        sign = 1;
                        ipos += 2;
                    } else if inp[ipos..].starts_with(&['B', 'C', 'E']) {
                        sign = -1;
                        ipos += 3;
                    }
                }
                'y' => match count {
                    1 => year = internal::read_int(&inp, &mut ipos, 4)? as i32,
                    2 => year = internal::read_int(&inp, &mut ipos, 2)? as i32 + 2000,
                    4 => year = internal::read_int(&inp, &mut ipos, 4)? as i32,
                    _ => {}
                },
                'M' => match count {
                    1 | 2 => month = internal::read_int(&inp, &mut ipos, 2)? as i32,
                    3 => {
                        let (index, len) =
                            internal::match_name(&internal::SHORT_MONTH_NAMES, &inp, ipos)?;
                        month = index as i32 + 1;
                        ipos += len;
                    }
                    4 => {
                        let (index, len) =
                            internal::match_name(&internal::LONG_MONTH_NAMES, &inp, ipos)?;
                        month = index as i32 + 1;
                        ipos += len;
                    }
                    _ => {}
                },
                'd' => match count {
                    1 | 2 => day = internal::read_int(&inp, &mut ipos, 2)? as i32,
                    // Weekday names keep the strings in sync but carry no
                    // field value.
                    3 => ipos = (ipos + 3).min(inp.len()),
                    4 => {
                        while ipos < inp.len() && inp[ipos].is_alphabetic() {
                            ipos += 1;
                        }
                    }
                    _ => {}
                },
                _ => ipos += count,
            }
            fpos += count;
        }
        Some(Date::new(sign * year, month, day))
    }
}

impl fmt::Display for Date {
    /// ISO-8601 date format, `yyyy-MM-dd`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format("yyyy-MM-dd"))
    }
}
