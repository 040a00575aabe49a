use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;

use crate::wire;
use crate::{NtpDuration, NtpTimestamp};

/// The received byte count did not match the fixed NTPv4 message length.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("packet must be exactly 48 bytes, got {0}")]
pub struct PacketSizeError(pub usize);

/// The thirteen header fields of an NTPv4 message, in wire order.
///
/// Values are raw: `leap` uses the low 2 bits, `version` and `mode` the low
/// 3 bits each; the four timestamps are 64-bit fixed point and the root
/// delay/dispersion are 32-bit NTP short format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFields {
    pub leap: u8,
    pub version: u8,
    pub mode: u8,
    pub stratum: u8,
    pub poll: i8,
    pub precision: i8,
    pub root_delay: u32,
    pub root_dispersion: u32,
    pub reference_id: u32,
    pub reference_timestamp: u64,
    pub origin_timestamp: u64,
    pub receive_timestamp: u64,
    pub transmit_timestamp: u64,
}

/// An immutable 48-byte NTPv4 message.
///
/// A packet whose 48 bytes are all zero is *null*; the default packet is
/// null, and a null packet reads as zero through every accessor. The
/// payload is shared, so cloning is cheap, and equality is byte equality
/// (all null packets compare equal).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    data: Option<Arc<[u8; Packet::LENGTH]>>,
}

fn pointerize(data: [u8; Packet::LENGTH]) -> Option<Arc<[u8; Packet::LENGTH]>> {
    if data.iter().all(|&byte| byte == 0) {
        None
    } else {
        Some(Arc::new(data))
    }
}

impl Packet {
    pub const LENGTH: usize = 48;

    /// Serializes the given field values into a packet.
    pub fn new(fields: PacketFields) -> Packet {
        let mut data = [0u8; Packet::LENGTH];
        wire::serialize::<u8>(
            ((fields.leap as u32) << 6 | (fields.version as u32) << 3 | fields.mode as u32) as u8,
            &mut data[0..],
        );
        wire::serialize::<u8>(fields.stratum, &mut data[1..]);
        wire::serialize::<u8>(fields.poll as u8, &mut data[2..]);
        wire::serialize::<u8>(fields.precision as u8, &mut data[3..]);
        wire::serialize::<u32>(fields.root_delay, &mut data[4..]);
        wire::serialize::<u32>(fields.root_dispersion, &mut data[8..]);
        wire::serialize::<u32>(fields.reference_id, &mut data[12..]);
        wire::serialize::<u64>(fields.reference_timestamp, &mut data[16..]);
        wire::serialize::<u64>(fields.origin_timestamp, &mut data[24..]);
        wire::serialize::<u64>(fields.receive_timestamp, &mut data[32..]);
        wire::serialize::<u64>(fields.transmit_timestamp, &mut data[40..]);
        Packet {
            data: pointerize(data),
        }
    }

    /// Wraps a raw 48-byte buffer.
    pub fn from_data(data: [u8; Packet::LENGTH]) -> Packet {
        Packet {
            data: pointerize(data),
        }
    }

    /// The client request: leap 0, version 4, mode 3, every other field
    /// zero except the transmit timestamp.
    pub fn poll_message(transmit: NtpTimestamp) -> Packet {
        Packet::new(PacketFields {
            version: 4,
            mode: 3,
            transmit_timestamp: transmit.value(),
            ..PacketFields::default()
        })
    }

    /// Whether the underlying data is all zeros.
    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    /// A copy of the 48-byte payload; all zeros for a null packet.
    pub fn data(&self) -> [u8; Packet::LENGTH] {
        self.data.as_deref().copied().unwrap_or([0; Packet::LENGTH])
    }

    /// Leap indicator: 0 none, 1 last minute has 61 s, 2 has 59 s,
    /// 3 unsynchronized.
    pub fn leap(&self) -> u8 {
        self.byte(0) >> 6
    }

    /// NTP version number.
    pub fn version(&self) -> u8 {
        self.byte(0) >> 3 & 7
    }

    /// Association mode: 3 client, 4 server, others per RFC 5905.
    pub fn mode(&self) -> u8 {
        self.byte(0) & 7
    }

    /// Server level in the NTP hierarchy: 0 unspecified/kiss, 1 primary,
    /// 2..15 secondary, 16 unsynchronized.
    pub fn stratum(&self) -> u8 {
        self.byte(1)
    }

    /// Maximum interval between successive messages, log2 seconds.
    pub fn poll(&self) -> i8 {
        self.byte(2) as i8
    }

    /// System clock precision, log2 seconds.
    pub fn precision(&self) -> i8 {
        self.byte(3) as i8
    }

    /// Total round-trip delay to the reference clock, NTP short format.
    pub fn root_delay(&self) -> u32 {
        self.word(4)
    }

    /// Total dispersion to the reference clock, NTP short format.
    pub fn root_dispersion(&self) -> u32 {
        self.word(8)
    }

    /// Code identifying the server or reference clock.
    pub fn reference_id(&self) -> u32 {
        self.word(12)
    }

    /// Server time at which the system clock was last set or corrected.
    pub fn reference_timestamp(&self) -> NtpTimestamp {
        self.timestamp(16)
    }

    /// Client time at which the request departed for the server.
    pub fn origin_timestamp(&self) -> NtpTimestamp {
        self.timestamp(24)
    }

    /// Server time at which the request arrived from the client.
    pub fn receive_timestamp(&self) -> NtpTimestamp {
        self.timestamp(32)
    }

    /// Server time at which the reply departed for the client.
    pub fn transmit_timestamp(&self) -> NtpTimestamp {
        self.timestamp(40)
    }

    /// Round-trip delay of the exchange: `(t4 − t1) − (t3 − t2)`.
    ///
    /// The inner subtractions wrap within the 64-bit timestamp space, so
    /// the result holds as long as neither clock wrapped between its two
    /// readings. Network asymmetry can make it negative; callers clamp or
    /// reject as appropriate.
    ///
    /// `destination` is the client time at which the reply arrived.
    pub fn delay(&self, destination: NtpTimestamp) -> NtpDuration {
        let round_trip = NtpTimestamp::from_fixed_int(
            destination
                .value()
                .wrapping_sub(self.origin_timestamp().value()),
        );
        let server_span = NtpTimestamp::from_fixed_int(
            self.transmit_timestamp()
                .value()
                .wrapping_sub(self.receive_timestamp().value()),
        );
        round_trip.duration() - server_span.duration()
    }

    /// Server clock offset relative to the client:
    /// `((t2 − t1) + (t3 − t4)) / 2`, computed over era-reduced durations.
    ///
    /// Ambiguous when the four timestamps straddle an era boundary; use
    /// [`Packet::offset`] outside of tests.
    pub fn offset_timestamp(&self, destination: NtpTimestamp) -> NtpDuration {
        ((self.receive_timestamp() - self.origin_timestamp())
            + (self.transmit_timestamp() - destination))
            / 2
    }

    /// Era-resolving server clock offset.
    ///
    /// The raw offset is computed against the encoded time point, then its
    /// whole-second part is folded through a two's-complement 32-bit
    /// reinterpretation and recombined with the sub-second remainder. The
    /// result is correctly signed whenever the client clock is within 2³¹ s
    /// (about 68 years) of the server, even across adjacent eras.
    ///
    /// `destination` is the client wall-clock time at which the reply
    /// arrived.
    pub fn offset(&self, destination: SystemTime) -> NtpDuration {
        let raw = self.offset_timestamp(NtpTimestamp::from_system_time(destination));
        let folded = raw.whole_seconds() as i32;
        NtpDuration::from_seconds(folded as i64) + NtpDuration::from_nanos(raw.subsec_nanos() as i64)
    }

    fn byte(&self, index: usize) -> u8 {
        self.data.as_ref().map_or(0, |data| data[index])
    }

    fn word(&self, offset: usize) -> u32 {
        self.data
            .as_ref()
            .map_or(0, |data| wire::deserialize(&data[offset..]))
    }

    fn timestamp(&self, offset: usize) -> NtpTimestamp {
        NtpTimestamp::from_fixed_int(
            self.data
                .as_ref()
                .map_or(0, |data| wire::deserialize(&data[offset..])),
        )
    }
}

impl TryFrom<&[u8]> for Packet {
    type Error = PacketSizeError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        let data: [u8; Packet::LENGTH] =
            data.try_into().map_err(|_| PacketSizeError(data.len()))?;
        Ok(Packet::from_data(data))
    }
}
