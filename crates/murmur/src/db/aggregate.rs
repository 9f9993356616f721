//! Folding a run of points into a single consolidated value.

use crate::db::format::Point;
use std::fmt;
use std::str::FromStr;

use crate::error::MurmurError;

/// How a propagation window is folded into one coarser point.
///
/// The discriminants are the on-disk wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AggregationMethod {
    /// Arithmetic mean over the whole window.
    #[default]
    Average = 1,
    /// Sum over the whole window.
    Sum = 2,
    /// Value of the most recently stamped slot.
    Last = 3,
    /// Greatest value in the window.
    Max = 4,
    /// Smallest value in the window.
    Min = 5,
}

impl AggregationMethod {
    /// Decodes a wire code.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Average),
            2 => Some(Self::Sum),
            3 => Some(Self::Last),
            4 => Some(Self::Max),
            5 => Some(Self::Min),
            _ => None,
        }
    }

    /// The method's canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Sum => "sum",
            Self::Last => "last",
            Self::Max => "max",
            Self::Min => "min",
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregationMethod {
    type Err = MurmurError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "average" => Ok(Self::Average),
            "sum" => Ok(Self::Sum),
            "last" => Ok(Self::Last),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            other => Err(MurmurError::InvalidAggregation(other.to_string())),
        }
    }
}

/// Folds a window of points into one value.
///
/// The window is the raw slot run as read from disk, empty slots included:
/// an unwritten slot contributes an interval of 0 and a value of `0.0`.
/// `average` divides by the full window length. `last` picks the slot with
/// the greatest decoded interval, resolving ties to the earliest occurrence.
pub fn aggregate(method: AggregationMethod, window: &[Point]) -> f64 {
    debug_assert!(!window.is_empty());

    match method {
        AggregationMethod::Average => {
            window.iter().map(Point::value).sum::<f64>() / window.len() as f64
        }
        AggregationMethod::Sum => window.iter().map(Point::value).sum(),
        AggregationMethod::Last => {
            let mut best = &window[0];
            for point in &window[1..] {
                if point.interval > best.interval {
                    best = point;
                }
            }
            best.value()
        }
        AggregationMethod::Max => window[1..]
            .iter()
            .map(Point::value)
            .fold(window[0].value(), f64::max),
        AggregationMethod::Min => window[1..]
            .iter()
            .map(Point::value)
            .fold(window[0].value(), f64::min),
    }
}
