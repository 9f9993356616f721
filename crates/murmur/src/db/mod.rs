//! The murmur engine: file creation, opening, reads, writes and propagation.
//!
//! A murmur file never grows after creation. Every write lands in the
//! highest-precision archive that still covers the timestamp, then cascades
//! downward: for each finer/coarser pair the engine re-reads the finer ring's
//! consolidation window and folds it into the coarser bucket covering the
//! same timestamp. All I/O is synchronous and runs on the calling thread;
//! the handle's seek pointer is shared state, so every access seeks first.

pub mod aggregate;
pub mod archive;
pub mod format;

use crate::clock::{Clock, SystemClock};
use crate::error::{MurmurError, Result};
use crate::spec;
use aggregate::{aggregate, AggregationMethod};
use archive::Archive;
use format::{ArchiveInfo, Header, Point, ARCHIVE_INFO_SIZE, HEADER_SIZE, POINT_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, error};

/// An open murmur database: one file handle plus its archive chain.
///
/// Close by dropping; the descriptor and chain are released on every exit
/// path, including mid-construction failures. A handle assumes exclusive
/// access: no locking is performed, and concurrent writers to the same file
/// are undefined behavior at the format level.
///
/// ```rust,ignore
/// use murmur::{AggregationMethod, Murmur};
///
/// Murmur::create("load.mmr", &["10s:1m", "1m:5m"], AggregationMethod::Average, 50)?;
/// let mut db = Murmur::open("load.mmr")?;
/// db.set(timestamp, 0.75)?;
/// let value = db.get(timestamp)?;
/// ```
pub struct Murmur {
    file: File,
    aggregation: AggregationMethod,
    max_retention: u64,
    x_files_factor: u8,
    archives: Vec<Archive>,
    clock: Box<dyn Clock>,
}

impl Murmur {
    /// Creates a new database file at `path`.
    ///
    /// Parses and validates `spec_tokens`, lays the archives out finest
    /// precision first, writes the header and directory, and reserves the
    /// slot region without writing data, so every slot reads back as zero
    /// bytes. An existing file at `path` is truncated; callers wanting an
    /// existence check must perform it themselves.
    ///
    /// # Errors
    ///
    /// Configuration errors (bad spec, invalid archive combination, x-files
    /// factor above 100, layout overflowing the 32-bit offset field) leave
    /// the filesystem untouched. I/O errors carry the OS error and may leave
    /// a partial file behind.
    pub fn create<P: AsRef<Path>, S: AsRef<str>>(
        path: P,
        spec_tokens: &[S],
        aggregation: AggregationMethod,
        x_files_factor: u8,
    ) -> Result<()> {
        if x_files_factor > 100 {
            return Err(MurmurError::InvalidXFilesFactor(x_files_factor));
        }

        let specs = spec::validate(spec::parse(spec_tokens)?)?;

        let mut max_retention = 0u64;
        let mut offset = (HEADER_SIZE + ARCHIVE_INFO_SIZE * specs.len()) as u64;
        let mut infos = Vec::with_capacity(specs.len());

        for s in &specs {
            max_retention = max_retention.max(s.retention());
            infos.push(ArchiveInfo {
                offset: u32::try_from(offset).map_err(|_| MurmurError::LayoutTooLarge)?,
                seconds_per_point: s.seconds_per_point,
                points: s.points,
            });
            offset += u64::from(s.points) * POINT_SIZE as u64;
        }
        if u32::try_from(offset).is_err() {
            return Err(MurmurError::LayoutTooLarge);
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o640);
        }
        let mut file = options.open(path.as_ref())?;

        let header = Header {
            aggregation,
            max_retention,
            x_files_factor,
            archive_count: infos.len() as u32,
        };
        header.write_to(&mut file)?;
        for info in &infos {
            info.write_to(&mut file)?;
        }

        // Reserve the rings without writing data; the extension reads back
        // as zero bytes, which is the empty-slot encoding.
        file.set_len(offset)?;
        file.sync_all()?;

        debug!(
            path = %path.as_ref().display(),
            archives = infos.len(),
            size = offset,
            "created database"
        );
        Ok(())
    }

    /// Opens a database with the wall clock as its time source.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_clock(path, Box::new(SystemClock))
    }

    /// Opens a database with an injected time source.
    ///
    /// Reads the header and archive directory and materializes the archive
    /// chain in canonical on-disk order, linking each archive to its
    /// next-coarser neighbor.
    ///
    /// # Errors
    ///
    /// A short read, a zero archive count or an unknown aggregation code is
    /// reported as [`MurmurError::Corrupted`]; no handle is produced and the
    /// descriptor is released.
    pub fn open_with_clock<P: AsRef<Path>>(path: P, clock: Box<dyn Clock>) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let header = Header::read_from(&mut file)?;
        if header.archive_count == 0 {
            return Err(MurmurError::Corrupted("no archives specified"));
        }

        let count = header.archive_count as usize;
        let mut archives = Vec::with_capacity(count);
        for i in 0..count {
            let info = ArchiveInfo::read_from(&mut file)?;
            let lower = (i + 1 < count).then_some(i + 1);
            let arch = Archive::from_info(&info, lower);
            debug!(
                offset = arch.offset,
                seconds_per_point = arch.seconds_per_point,
                points = arch.points,
                "archive header"
            );
            archives.push(arch);
        }

        Ok(Self {
            file,
            aggregation: header.aggregation,
            max_retention: header.max_retention,
            x_files_factor: header.x_files_factor,
            archives,
            clock,
        })
    }

    /// How points are folded during propagation.
    pub fn aggregation(&self) -> AggregationMethod {
        self.aggregation
    }

    /// The longest span of time this file can store, in seconds.
    pub fn max_retention(&self) -> u64 {
        self.max_retention
    }

    /// Minimum percentage of known points required for a propagation step.
    pub fn x_files_factor(&self) -> u8 {
        self.x_files_factor
    }

    /// The archive chain, finest precision first.
    pub fn archives(&self) -> &[Archive] {
        &self.archives
    }

    /// Writes `value` at `timestamp` and propagates to coarser archives.
    ///
    /// The primary write goes to the finest archive whose retention still
    /// covers the timestamp. Each finer/coarser pair below it then has its
    /// consolidation window re-aggregated, unless the window holds fewer
    /// known points than the x-files factor demands, which ends the walk.
    ///
    /// # Errors
    ///
    /// [`MurmurError::NoSuitableArchive`] for a future timestamp or one
    /// older than the file's maximum retention. An I/O failure after the
    /// primary write surfaces as [`MurmurError::Propagation`]; the primary
    /// write is not rolled back.
    pub fn set(&mut self, timestamp: u64, value: f64) -> Result<()> {
        let primary = self.select_archive(timestamp)?;
        self.write_point(primary, timestamp, value)?;

        self.propagate(primary, timestamp).map_err(|e| {
            error!(timestamp, error = %e, "propagation failed; archive is probably inconsistent");
            MurmurError::Propagation(Box::new(e))
        })
    }

    /// Reads the value stored for `timestamp`.
    ///
    /// Selects the same primary archive as a write at `timestamp` would and
    /// returns that slot's value as-is. The slot's interval is not checked:
    /// a slot left over from a previous ring cycle is returned unchanged.
    /// Callers needing staleness detection must inspect the raw slots via
    /// [`Murmur::dump_archive`].
    pub fn get(&mut self, timestamp: u64) -> Result<f64> {
        let index = self.select_archive(timestamp)?;
        self.read_archive(index, timestamp)
    }

    /// Reads the value for `timestamp` from an explicitly chosen archive.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds for the archive chain.
    pub fn read_archive(&mut self, index: usize, timestamp: u64) -> Result<f64> {
        let slot = self.archives[index].slot(timestamp);
        self.file.seek(SeekFrom::Start(slot.offset))?;
        Ok(Point::read_from(&mut self.file)?.value())
    }

    /// Reads every slot of an archive in ring order.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds for the archive chain.
    pub fn dump_archive(&mut self, index: usize) -> Result<Vec<Point>> {
        let arch = self.archives[index];
        let mut buf = vec![0u8; arch.size as usize];
        self.file.seek(SeekFrom::Start(u64::from(arch.offset)))?;
        self.file.read_exact(&mut buf)?;
        Ok(decode_points(&buf))
    }

    /// Picks the finest archive that still covers `timestamp`.
    ///
    /// When the timestamp sits exactly at the retention horizon no archive
    /// strictly covers it and the coarsest is used.
    fn select_archive(&self, timestamp: u64) -> Result<usize> {
        let now = self.clock.now();
        let diff = now
            .checked_sub(timestamp)
            .ok_or(MurmurError::NoSuitableArchive(timestamp))?;
        if diff > self.max_retention {
            return Err(MurmurError::NoSuitableArchive(timestamp));
        }

        Ok(self
            .archives
            .iter()
            .position(|arch| arch.retention > diff)
            .unwrap_or(self.archives.len() - 1))
    }

    /// Writes one point into the archive's slot for `timestamp`.
    fn write_point(&mut self, index: usize, timestamp: u64, value: f64) -> Result<()> {
        let slot = self.archives[index].slot(timestamp);
        self.file.seek(SeekFrom::Start(slot.offset))?;
        Point::new(slot.interval, value).write_to(&mut self.file)?;
        Ok(())
    }

    /// Re-aggregates each coarser bucket covering `timestamp`, walking the
    /// chain from `index` until the coarsest archive or a too-sparse window.
    fn propagate(&mut self, mut index: usize, timestamp: u64) -> Result<()> {
        while let Some(lower) = self.archives[index].lower {
            let ratio = (self.archives[lower].seconds_per_point
                / self.archives[index].seconds_per_point) as usize;
            let window = self.read_window(index, timestamp, ratio)?;

            let known = window.iter().filter(|p| !p.is_empty()).count();
            let required = (ratio * usize::from(self.x_files_factor)).div_ceil(100);
            if known < required {
                debug!(
                    archive = lower,
                    known, required, "window too sparse, propagation skipped"
                );
                break;
            }

            let value = aggregate(self.aggregation, &window);
            self.write_point(lower, timestamp, value)?;
            index = lower;
        }
        Ok(())
    }

    /// Reads `len` consecutive slots starting at the archive's bucket of
    /// `timestamp`, splitting the read when the run crosses the ring's end
    /// so the result is in temporal order.
    fn read_window(&mut self, index: usize, timestamp: u64, len: usize) -> Result<Vec<Point>> {
        let arch = self.archives[index];
        let start = arch.slot(timestamp);
        let mut buf = vec![0u8; len * POINT_SIZE];

        if start.offset + buf.len() as u64 > arch.end() {
            let tail = (arch.end() - start.offset) as usize;
            self.file.seek(SeekFrom::Start(start.offset))?;
            self.file.read_exact(&mut buf[..tail])?;
            self.file.seek(SeekFrom::Start(u64::from(arch.offset)))?;
            self.file.read_exact(&mut buf[tail..])?;
        } else {
            self.file.seek(SeekFrom::Start(start.offset))?;
            self.file.read_exact(&mut buf)?;
        }

        Ok(decode_points(&buf))
    }
}

/// Decodes a byte run into points. The length must be a slot multiple.
fn decode_points(buf: &[u8]) -> Vec<Point> {
    buf.chunks_exact(POINT_SIZE)
        .map(|chunk| Point::from_bytes(chunk.try_into().unwrap()))
        .collect()
}
