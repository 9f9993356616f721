//! Archive spec parsing and multi-archive validation.
//!
//! A database is described by an ordered list of `PRECISION:RETENTION`
//! tokens, one per archive. Each side is a number with an optional unit
//! suffix; a unit is any non-empty prefix of `seconds`, `minutes`, `hours`,
//! `days`, `weeks` or `years` (case-sensitive). A bare left-hand number is in
//! seconds. A right-hand number with a unit is a retention span and is
//! divided down to a point count; a bare right-hand number *is* the point
//! count. So `10s:60` keeps 60 points while `10s:60s` keeps 6.
//!
//! The `years` multiplier is `60*60*24*7*365` seconds (52 * 7 * 365 days),
//! not a calendar year. The quirk is load-bearing: it is what existing files
//! were sized with.

use crate::error::{MurmurError, Result};

/// Seconds per unit name. Units are matched by non-empty prefix.
const UNITS: [(&str, u64); 6] = [
    ("seconds", 1),
    ("minutes", 60),
    ("hours", 60 * 60),
    ("days", 60 * 60 * 24),
    ("weeks", 60 * 60 * 24 * 7),
    ("years", 60 * 60 * 24 * 7 * 365),
];

/// A parsed request for one archive resolution, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSpec {
    /// Precision: how many seconds each point covers.
    pub seconds_per_point: u32,
    /// Number of ring slots in the archive.
    pub points: u32,
}

impl ArchiveSpec {
    /// The time window this archive covers before wrapping, in seconds.
    pub fn retention(&self) -> u64 {
        u64::from(self.seconds_per_point) * u64::from(self.points)
    }
}

/// Resolves a unit suffix to its multiplier in seconds.
fn unit_multiplier(unit: &str) -> Option<u64> {
    UNITS
        .iter()
        .find(|(name, _)| name.starts_with(unit))
        .map(|&(_, mult)| mult)
}

/// Splits a side into its leading number and whatever trails it.
fn split_number(side: &str) -> Option<(u64, &str)> {
    let digits = side.len() - side.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let value = side[..digits].parse::<u64>().ok()?;
    Some((value, &side[digits..]))
}

/// Parses one `PRECISION:RETENTION` token.
fn parse_token(token: &str) -> Result<ArchiveSpec> {
    let invalid = || MurmurError::InvalidSpec(token.to_string());

    let (precision, retention) = token.split_once(':').ok_or_else(invalid)?;

    let (base, unit) = split_number(precision).ok_or_else(invalid)?;
    let seconds_per_point = if unit.is_empty() {
        base
    } else {
        let mult = unit_multiplier(unit).ok_or_else(invalid)?;
        base.checked_mul(mult).ok_or_else(invalid)?
    };
    if seconds_per_point == 0 {
        return Err(invalid());
    }

    let (base, unit) = split_number(retention).ok_or_else(invalid)?;
    let points = if unit.is_empty() {
        base
    } else {
        let mult = unit_multiplier(unit).ok_or_else(invalid)?;
        base.checked_mul(mult).ok_or_else(invalid)? / seconds_per_point
    };
    if points == 0 {
        return Err(invalid());
    }

    Ok(ArchiveSpec {
        seconds_per_point: u32::try_from(seconds_per_point).map_err(|_| invalid())?,
        points: u32::try_from(points).map_err(|_| invalid())?,
    })
}

/// Parses a sequence of archive spec tokens.
///
/// # Errors
///
/// Returns [`MurmurError::NoArchives`] for an empty sequence and
/// [`MurmurError::InvalidSpec`] for any malformed token (missing colon,
/// unparseable number, unknown unit, zero precision or point count).
pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<ArchiveSpec>> {
    if tokens.is_empty() {
        return Err(MurmurError::NoArchives);
    }
    tokens.iter().map(|t| parse_token(t.as_ref())).collect()
}

/// Validates a set of archive specs and puts them in canonical order.
///
/// Sorts ascending by precision, then checks every adjacent finer/coarser
/// pair: precisions must be distinct, the coarser precision must be a
/// multiple of the finer, retention must not shrink, and the finer archive
/// must hold at least one full consolidation window.
pub fn validate(mut specs: Vec<ArchiveSpec>) -> Result<Vec<ArchiveSpec>> {
    if specs.is_empty() {
        return Err(MurmurError::NoArchives);
    }

    specs.sort_by_key(|s| s.seconds_per_point);

    for pair in specs.windows(2) {
        let (finer, coarser) = (pair[0], pair[1]);

        if finer.seconds_per_point == coarser.seconds_per_point {
            return Err(MurmurError::DuplicatePrecision(
                finer.seconds_per_point,
                coarser.seconds_per_point,
            ));
        }

        if coarser.seconds_per_point % finer.seconds_per_point != 0 {
            return Err(MurmurError::UndividablePrecision {
                finer: finer.seconds_per_point,
                coarser: coarser.seconds_per_point,
            });
        }

        if finer.retention() > coarser.retention() {
            return Err(MurmurError::RetentionOrder {
                finer: finer.retention(),
                coarser: coarser.retention(),
            });
        }

        let per_consolidation = coarser.seconds_per_point / finer.seconds_per_point;
        if finer.points < per_consolidation {
            return Err(MurmurError::NotEnoughPoints {
                needed: per_consolidation,
                points: finer.points,
            });
        }
    }

    Ok(specs)
}
