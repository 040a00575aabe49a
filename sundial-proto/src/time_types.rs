use std::ops::{Add, Div, Neg, Sub};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Unix uses an epoch located at 1/1/1970-00:00h (UTC) and NTP uses
/// 1/1/1900-00:00h. This leads to an offset equivalent to 70 years in
/// seconds; there are 17 leap years between the two dates.
pub const EPOCH_OFFSET: u64 = (70 * 365 + 17) * 86400;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A 64-bit NTP timestamp: 32 bits of seconds since the prime epoch
/// "1900-01-01 00:00:00 UTC" and 32 bits of second fraction (units of
/// 2⁻³² s). The all-zero value is the protocol's "unknown" sentinel.
///
/// Seconds wrap every 2³² s (one NTP era, about 136 years); era 0 runs from
/// the prime epoch to 2036-02-07 06:28:15. Subtracting two timestamps yields
/// the difference of their era-reduced durations, which is only meaningful
/// when both lie in the same era. Era resolution for server offsets is done
/// at the packet layer.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NtpTimestamp {
    timestamp: u64,
}

impl NtpTimestamp {
    /// Wraps a raw 64-bit fixed-point value.
    pub const fn from_fixed_int(timestamp: u64) -> NtpTimestamp {
        NtpTimestamp { timestamp }
    }

    /// Builds a timestamp from its two 32-bit halves.
    pub const fn from_seconds_fraction(seconds: u32, fraction: u32) -> NtpTimestamp {
        NtpTimestamp {
            timestamp: (seconds as u64) << 32 | fraction as u64,
        }
    }

    /// Encodes a duration measured from the prime epoch. Seconds beyond one
    /// era are reduced; the nanosecond remainder is truncated into the
    /// 32-bit fraction field.
    pub fn from_duration(since_prime_epoch: Duration) -> NtpTimestamp {
        Self::from_seconds_nanos_since_ntp_epoch(
            since_prime_epoch.as_secs(),
            since_prime_epoch.subsec_nanos(),
        )
    }

    /// Encodes a wall-clock time point, on either side of the Unix epoch.
    pub fn from_system_time(time: SystemTime) -> NtpTimestamp {
        match time.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(since) => Self::from_seconds_nanos_since_ntp_epoch(
                EPOCH_OFFSET.wrapping_add(since.as_secs()),
                since.subsec_nanos(),
            ),
            Err(err) => {
                let before = err.duration();
                let borrow = (before.subsec_nanos() > 0) as u64;
                Self::from_seconds_nanos_since_ntp_epoch(
                    EPOCH_OFFSET
                        .wrapping_sub(before.as_secs())
                        .wrapping_sub(borrow),
                    (NANOS_PER_SECOND as u32 - before.subsec_nanos()) % NANOS_PER_SECOND as u32,
                )
            }
        }
    }

    pub fn from_seconds_nanos_since_ntp_epoch(seconds: u64, nanos: u32) -> NtpTimestamp {
        // NTP uses 1/2^32 s as its unit of fractional time; our time is in
        // nanoseconds.
        let fraction = ((nanos as u64) << 32) / NANOS_PER_SECOND as u64;

        NtpTimestamp {
            timestamp: (seconds << 32) | fraction,
        }
    }

    /// The era-reduced seconds field.
    pub const fn seconds(self) -> u32 {
        (self.timestamp >> 32) as u32
    }

    /// The fraction-of-second field, in units of 2⁻³² s.
    pub const fn fraction(self) -> u32 {
        self.timestamp as u32
    }

    /// The raw 64-bit fixed-point value.
    pub const fn value(self) -> u64 {
        self.timestamp
    }

    /// Reconstructs the duration since the prime epoch, reduced to this
    /// timestamp's era. The fraction converts back to nanoseconds within
    /// one nanosecond of the value it was built from.
    pub fn duration(self) -> NtpDuration {
        let subsec = ((self.fraction() as u64 * NANOS_PER_SECOND as u64) >> 32) as i64;
        NtpDuration::from_nanos(self.seconds() as i64 * NANOS_PER_SECOND + subsec)
    }
}

impl Sub for NtpTimestamp {
    type Output = NtpDuration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.duration() - rhs.duration()
    }
}

/// A signed span of time with nanosecond resolution.
///
/// This is the result type of all timestamp arithmetic. Raw cross-era
/// offsets span ±2³² s, which is why it carries whole nanoseconds rather
/// than 32.32 fixed point.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NtpDuration {
    nanos: i64,
}

impl NtpDuration {
    pub const ZERO: NtpDuration = NtpDuration { nanos: 0 };

    pub const fn from_nanos(nanos: i64) -> NtpDuration {
        NtpDuration { nanos }
    }

    pub const fn from_micros(micros: i64) -> NtpDuration {
        NtpDuration {
            nanos: micros.saturating_mul(1_000),
        }
    }

    pub const fn from_millis(millis: i64) -> NtpDuration {
        NtpDuration {
            nanos: millis.saturating_mul(1_000_000),
        }
    }

    pub const fn from_seconds(seconds: i64) -> NtpDuration {
        NtpDuration {
            nanos: seconds.saturating_mul(NANOS_PER_SECOND),
        }
    }

    pub const fn as_nanos(self) -> i64 {
        self.nanos
    }

    /// Whole seconds, truncated toward zero.
    pub const fn whole_seconds(self) -> i64 {
        self.nanos / NANOS_PER_SECOND
    }

    /// Nanoseconds past the last whole second; carries the sign of the
    /// duration.
    pub const fn subsec_nanos(self) -> i32 {
        (self.nanos % NANOS_PER_SECOND) as i32
    }

    pub fn to_seconds(self) -> f64 {
        self.nanos as f64 / NANOS_PER_SECOND as f64
    }

    pub const fn is_negative(self) -> bool {
        self.nanos < 0
    }

    pub const fn abs(self) -> NtpDuration {
        NtpDuration {
            nanos: self.nanos.saturating_abs(),
        }
    }

    /// Converts to a standard duration; `None` for negative spans.
    pub fn to_std(self) -> Option<Duration> {
        u64::try_from(self.nanos).ok().map(Duration::from_nanos)
    }
}

impl From<Duration> for NtpDuration {
    fn from(duration: Duration) -> Self {
        NtpDuration {
            nanos: i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX),
        }
    }
}

impl Add for NtpDuration {
    type Output = NtpDuration;

    fn add(self, rhs: Self) -> Self::Output {
        // Saturate so that two large spans can never wrap around zero.
        NtpDuration {
            nanos: self.nanos.saturating_add(rhs.nanos),
        }
    }
}

impl Sub for NtpDuration {
    type Output = NtpDuration;

    fn sub(self, rhs: Self) -> Self::Output {
        NtpDuration {
            nanos: self.nanos.saturating_sub(rhs.nanos),
        }
    }
}

impl Neg for NtpDuration {
    type Output = NtpDuration;

    fn neg(self) -> Self::Output {
        NtpDuration {
            nanos: self.nanos.saturating_neg(),
        }
    }
}

macro_rules! ntp_duration_scalar_div {
    ($scalar_type:ty) => {
        impl Div<$scalar_type> for NtpDuration {
            type Output = NtpDuration;

            fn div(self, rhs: $scalar_type) -> NtpDuration {
                NtpDuration {
                    nanos: self.nanos / (rhs as i64),
                }
            }
        }
    };
}

ntp_duration_scalar_div!(i32);
ntp_duration_scalar_div!(i64);
ntp_duration_scalar_div!(u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timestamp_has_zero_duration() {
        assert_eq!(NtpTimestamp::from_fixed_int(0).duration(), NtpDuration::ZERO);
    }

    #[test]
    fn one_second_boundary() {
        let ts = NtpTimestamp::from_fixed_int(1 << 32);
        assert_eq!(ts.seconds(), 1);
        assert_eq!(ts.fraction(), 0);
        assert_eq!(ts.duration(), NtpDuration::from_seconds(1));
    }

    #[test]
    fn parts_roundtrip() {
        let ts = NtpTimestamp::from_seconds_fraction(0xE902_6610, 0x8000_0000);
        assert_eq!(ts.seconds(), 0xE902_6610);
        assert_eq!(ts.fraction(), 0x8000_0000);
        assert_eq!(ts.value(), 0xE902_6610_8000_0000);
        assert_eq!(
            ts.duration(),
            NtpDuration::from_seconds(0xE902_6610) + NtpDuration::from_millis(500)
        );
    }

    #[test]
    fn duration_roundtrip_within_one_tick() {
        // Every nanosecond offset in [0, 1ms).
        for nanos in 0..1_000_000_u64 {
            let encoded = NtpTimestamp::from_duration(Duration::from_nanos(nanos));
            let decoded = encoded.duration().as_nanos();
            assert!(
                (decoded - nanos as i64).abs() <= 1,
                "{nanos} decoded as {decoded}"
            );
        }
    }

    #[test]
    fn seconds_reduce_modulo_era() {
        let ts = NtpTimestamp::from_duration(Duration::from_secs((1 << 32) + 5));
        assert_eq!(ts.seconds(), 5);
    }

    #[test]
    fn subtraction_is_antisymmetric() {
        let a = NtpTimestamp::from_seconds_fraction(100, 0x4000_0000);
        let b = NtpTimestamp::from_seconds_fraction(250, 0);
        assert_eq!(a - b, -(b - a));
        assert_eq!(a - a, NtpDuration::ZERO);
        assert_eq!(b - a, NtpDuration::from_millis(149_750));
    }

    #[test]
    fn system_time_encoding() {
        let ts = NtpTimestamp::from_system_time(SystemTime::UNIX_EPOCH);
        assert_eq!(ts.seconds() as u64, EPOCH_OFFSET);
        assert_eq!(ts.fraction(), 0);

        let later = SystemTime::UNIX_EPOCH + Duration::from_millis(1_500);
        let ts = NtpTimestamp::from_system_time(later);
        assert_eq!(ts.seconds() as u64, EPOCH_OFFSET + 1);
        assert_eq!(ts.fraction(), 1 << 31);

        let earlier = SystemTime::UNIX_EPOCH - Duration::from_millis(1_500);
        let ts = NtpTimestamp::from_system_time(earlier);
        assert_eq!(ts.seconds() as u64, EPOCH_OFFSET - 2);
        assert_eq!(ts.fraction(), 1 << 31);
    }

    #[test]
    fn duration_accessors() {
        let d = NtpDuration::from_nanos(-1_031_250_000);
        assert_eq!(d.whole_seconds(), -1);
        assert_eq!(d.subsec_nanos(), -31_250_000);
        assert!(d.is_negative());
        assert_eq!(d.abs(), NtpDuration::from_nanos(1_031_250_000));
        assert_eq!(d.to_std(), None);
        assert_eq!(
            d.abs().to_std(),
            Some(Duration::from_nanos(1_031_250_000))
        );
    }

    #[test]
    fn duration_math() {
        let a = NtpDuration::from_millis(250);
        let b = NtpDuration::from_millis(750);
        assert_eq!(a + b, NtpDuration::from_seconds(1));
        assert_eq!(a - b, NtpDuration::from_millis(-500));
        assert_eq!((a + b) / 2, NtpDuration::from_millis(500));
        assert_eq!((a - b) / 2, NtpDuration::from_millis(-250));
        assert_eq!(NtpDuration::from(Duration::from_micros(31_250)).as_nanos(), 31_250_000);
    }
}
