//! Runtime archive model and the ring locator.

use crate::db::format::{ArchiveInfo, POINT_SIZE};

/// One resolution layer of an open file.
///
/// Materialized from an [`ArchiveInfo`] at open time with the derived fields
/// filled in. Archives live contiguously in the handle's chain, finest
/// precision first; `lower` indexes the next-coarser archive in that chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Archive {
    /// Byte offset of the archive's first slot in the file.
    pub offset: u32,
    /// Precision: seconds each point covers.
    pub seconds_per_point: u32,
    /// Number of ring slots.
    pub points: u32,
    /// Seconds the ring covers before wrapping.
    pub retention: u64,
    /// Size of the ring in bytes.
    pub size: u64,
    /// Chain index of the next-coarser archive, if any.
    pub lower: Option<usize>,
}

/// A located slot: the bucket it canonically holds and where it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Canonical bucket start: `timestamp - timestamp % seconds_per_point`.
    pub interval: u64,
    /// Absolute byte offset of the slot in the file.
    pub offset: u64,
}

impl Archive {
    /// Materializes a runtime archive from its on-disk descriptor.
    pub fn from_info(info: &ArchiveInfo, lower: Option<usize>) -> Self {
        Self {
            offset: info.offset,
            seconds_per_point: info.seconds_per_point,
            points: info.points,
            retention: u64::from(info.seconds_per_point) * u64::from(info.points),
            size: u64::from(info.points) * POINT_SIZE as u64,
            lower,
        }
    }

    /// One past the last byte of the archive's ring.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + self.size
    }

    /// Locates the slot for `timestamp`.
    ///
    /// The ring address is `(interval % retention) / seconds_per_point`, so
    /// the same slot is repurposed for the same-phase timestamp after one
    /// full retention. No I/O happens here; callers seek to `Slot::offset`.
    pub fn slot(&self, timestamp: u64) -> Slot {
        let spp = u64::from(self.seconds_per_point);
        let interval = timestamp - timestamp % spp;
        let index = (interval % self.retention) / spp;

        Slot {
            interval,
            offset: u64::from(self.offset) + POINT_SIZE as u64 * index,
        }
    }
}
