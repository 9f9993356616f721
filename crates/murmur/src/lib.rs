//! Murmur - a fixed-size, round-robin time series database.
//!
//! One file stores one series. The file holds a small header and a chain of
//! *archives* of increasing retention but decreasing precision; each archive
//! is a ring of fixed-size point slots. Writes land in the highest-precision
//! archive covering the timestamp and are folded into every coarser archive
//! below it, so the file's size never changes after creation.
//!
//! # Components
//!
//! - [`spec`]: `PRECISION:RETENTION` token parsing and archive validation
//! - [`db::format`]: big-endian on-disk record codecs
//! - [`db::archive`]: the runtime archive chain and ring locator
//! - [`db::aggregate`]: consolidation of propagation windows
//! - [`Murmur`]: the engine: create, open, set, get, dump
//! - [`clock`]: injectable time sources
//!
//! # Example
//!
//! ```rust,ignore
//! use murmur::{AggregationMethod, Murmur};
//!
//! // 10-second precision for a minute, one-minute precision for five.
//! Murmur::create("cpu.mmr", &["10s:1m", "1m:5m"], AggregationMethod::Average, 50)?;
//!
//! let mut db = Murmur::open("cpu.mmr")?;
//! db.set(now, 0.75)?;
//! assert_eq!(db.get(now)?, 0.75);
//! ```

#![deny(missing_docs)]

pub mod clock;
pub mod db;
pub mod error;
pub mod spec;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::aggregate::AggregationMethod;
pub use db::archive::Archive;
pub use db::format::Point;
pub use db::Murmur;
pub use error::{MurmurError, Result};
pub use spec::ArchiveSpec;
