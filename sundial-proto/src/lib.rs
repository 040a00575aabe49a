//! Wire-level types for NTPv4: the big-endian integer codec, the 64-bit
//! fixed-point timestamp with its signed duration companion, and the
//! immutable 48-byte message with delay/offset arithmetic.
//!
//! This crate is a leaf: it performs no I/O and holds no async machinery.

#![forbid(unsafe_code)]

mod packet;
mod time_types;
pub mod wire;

pub use packet::{Packet, PacketFields, PacketSizeError};
pub use time_types::{NtpDuration, NtpTimestamp, EPOCH_OFFSET};
