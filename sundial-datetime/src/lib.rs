//! Calendrical value types in the proleptic Gregorian calendar.
//!
//! [`Date`] is a year/month/day triple without a time zone, [`Time`] is a
//! nanosecond-resolution time of day, and [`DateTime`] combines the two.
//! All three are plain immutable values: arithmetic returns new instances.
//!
//! There is no year 0; negative years are years before the common era.
//! Formatting and parsing use a pattern grammar (`yyyy-MM-dd hh:mm:ss.fff`,
//! era signs, month and weekday names, 12-hour clock with meridiem) described
//! on the `format` methods.

#![forbid(unsafe_code)]

mod date;
mod datetime;
mod internal;
mod time;

pub use date::{Date, Month, Weekday};
pub use datetime::DateTime;
pub use time::Time;
