//! On-disk record codecs.
//!
//! A murmur file is a fixed-layout, big-endian structure with no framing,
//! no checksums and no version field:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Header (14 bytes)                                        │
//! │  - aggregation: u8 (wire codes 1..=5)                     │
//! │  - max_retention: u64 (seconds)                           │
//! │  - x_files_factor: u8 (0..=100)                           │
//! │  - archive_count: u32                                     │
//! ├──────────────────────────────────────────────────────────┤
//! │  ArchiveInfo[archive_count] (12 bytes each)               │
//! │  - offset: u32, seconds_per_point: u32, points: u32       │
//! ├──────────────────────────────────────────────────────────┤
//! │  Point ring per archive, finest precision first           │
//! │  - interval: u64, value: u64 (16 bytes per slot)          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! All multi-byte integers are big-endian regardless of host byte order.
//! A point's `value` word is the IEEE-754 bit pattern of an `f64`; the bits
//! round-trip unchanged through write and read. A slot of all zero bytes is
//! an empty slot (`interval == 0`).

use crate::db::aggregate::AggregationMethod;
use crate::error::{MurmurError, Result};
use std::io::{Read, Write};

/// Header size in bytes.
pub const HEADER_SIZE: usize = 14;

/// Archive descriptor size in bytes.
pub const ARCHIVE_INFO_SIZE: usize = 12;

/// Point slot size in bytes.
pub const POINT_SIZE: usize = 16;

// The layout is tightly packed; a size drift here is a format break.
const _: () = assert!(HEADER_SIZE == 1 + 8 + 1 + 4);
const _: () = assert!(ARCHIVE_INFO_SIZE == 4 + 4 + 4);
const _: () = assert!(POINT_SIZE == 8 + 8);

/// The murmur file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// How points are folded during propagation.
    pub aggregation: AggregationMethod,
    /// The longest span of time the file can store, in seconds.
    pub max_retention: u64,
    /// Minimum percentage (0..=100) of known points required to propagate.
    pub x_files_factor: u8,
    /// Number of archive descriptors that follow the header.
    pub archive_count: u32,
}

impl Header {
    /// Writes the header in big-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.aggregation as u8])?;
        writer.write_all(&self.max_retention.to_be_bytes())?;
        writer.write_all(&[self.x_files_factor])?;
        writer.write_all(&self.archive_count.to_be_bytes())?;
        Ok(())
    }

    /// Reads a header.
    ///
    /// # Errors
    ///
    /// Returns [`MurmurError::Corrupted`] on a short read or an unknown
    /// aggregation code.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut buf)
            .map_err(|_| MurmurError::Corrupted("short read in header"))?;

        let aggregation = AggregationMethod::from_u8(buf[0])
            .ok_or(MurmurError::Corrupted("unknown aggregation method"))?;
        let max_retention = u64::from_be_bytes(buf[1..9].try_into().unwrap());
        let x_files_factor = buf[9];
        let archive_count = u32::from_be_bytes(buf[10..14].try_into().unwrap());

        Ok(Self {
            aggregation,
            max_retention,
            x_files_factor,
            archive_count,
        })
    }
}

/// One archive's entry in the on-disk directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveInfo {
    /// Byte offset of the archive's first slot.
    pub offset: u32,
    /// Precision: seconds each point covers.
    pub seconds_per_point: u32,
    /// Number of ring slots.
    pub points: u32,
}

impl ArchiveInfo {
    /// Writes the descriptor in big-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.offset.to_be_bytes())?;
        writer.write_all(&self.seconds_per_point.to_be_bytes())?;
        writer.write_all(&self.points.to_be_bytes())?;
        Ok(())
    }

    /// Reads a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`MurmurError::Corrupted`] on a short read.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; ARCHIVE_INFO_SIZE];
        reader
            .read_exact(&mut buf)
            .map_err(|_| MurmurError::Corrupted("short read in archive directory"))?;

        Ok(Self {
            offset: u32::from_be_bytes(buf[0..4].try_into().unwrap()),
            seconds_per_point: u32::from_be_bytes(buf[4..8].try_into().unwrap()),
            points: u32::from_be_bytes(buf[8..12].try_into().unwrap()),
        })
    }
}

/// A single ring slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    /// Canonical start of the bucket this slot holds; 0 means empty.
    pub interval: u64,
    /// The stored sample, as raw `f64` bits.
    pub value: u64,
}

impl Point {
    /// Builds a point from a bucket start and a sample value.
    pub fn new(interval: u64, value: f64) -> Self {
        Self {
            interval,
            value: value.to_bits(),
        }
    }

    /// The sample as a float.
    pub fn value(&self) -> f64 {
        f64::from_bits(self.value)
    }

    /// True if this slot has never been written on this ring cycle.
    pub fn is_empty(&self) -> bool {
        self.interval == 0
    }

    /// Encodes the point into its 16-byte wire form.
    pub fn to_bytes(self) -> [u8; POINT_SIZE] {
        let mut buf = [0u8; POINT_SIZE];
        buf[0..8].copy_from_slice(&self.interval.to_be_bytes());
        buf[8..16].copy_from_slice(&self.value.to_be_bytes());
        buf
    }

    /// Decodes a point from its 16-byte wire form.
    pub fn from_bytes(buf: &[u8; POINT_SIZE]) -> Self {
        Self {
            interval: u64::from_be_bytes(buf[0..8].try_into().unwrap()),
            value: u64::from_be_bytes(buf[8..16].try_into().unwrap()),
        }
    }

    /// Writes the point in big-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Reads a point.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; POINT_SIZE];
        reader.read_exact(&mut buf)?;
        Ok(Self::from_bytes(&buf))
    }
}
