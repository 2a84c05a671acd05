//! Forecast cycle times
//!
//! Cycle times are exchanged as fixed-width `YYYYMMDDTHHMMZ` tokens (e.g. `20171122T0100Z`)
//! and stored on cubes as seconds since the Unix epoch.

use crate::cube::FloatValue;
use crate::errors::{BlendError, BlendResult};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const CYCLETIME_FORMAT: &str = "%Y%m%dT%H%MZ";

/// Units of time coordinates
pub const SECONDS_SINCE_EPOCH: &str = "seconds since 1970-01-01 00:00:00";
/// Units of forecast period coordinates
pub const SECONDS: &str = "seconds";

/// A forecast reference (cycle) time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CycleTime(DateTime<Utc>);

impl CycleTime {
    /// Parse a `YYYYMMDDTHHMMZ` token
    pub fn parse(value: &str) -> BlendResult<Self> {
        NaiveDateTime::parse_from_str(value, CYCLETIME_FORMAT)
            .map(|naive| Self(Utc.from_utc_datetime(&naive)))
            .map_err(|_| {
                BlendError::InvalidConfiguration(format!(
                    "cycle time '{}' does not match the format YYYYMMDDTHHMMZ",
                    value
                ))
            })
    }

    /// Cycle time from seconds since the Unix epoch
    pub fn from_timestamp(seconds: i64) -> BlendResult<Self> {
        DateTime::from_timestamp(seconds, 0).map(Self).ok_or_else(|| {
            BlendError::Error(format!("timestamp {} is out of range", seconds))
        })
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }

    /// Seconds since the Unix epoch, as stored on time coordinates
    pub fn seconds(&self) -> FloatValue {
        self.0.timestamp() as FloatValue
    }
}

impl fmt::Display for CycleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CYCLETIME_FORMAT))
    }
}

impl FromStr for CycleTime {
    type Err = BlendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CycleTime {
    type Error = BlendError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CycleTime> for String {
    fn from(value: CycleTime) -> Self {
        value.to_string()
    }
}

/// Scale factor from a period unit to seconds
pub(crate) fn seconds_per(units: &str) -> Option<FloatValue> {
    match units {
        "s" | "second" | "seconds" => Some(1.0),
        "min" | "minute" | "minutes" => Some(60.0),
        "h" | "hour" | "hours" => Some(3600.0),
        "day" | "days" => Some(86400.0),
        _ => None,
    }
}

/// Convert a period between time units (seconds, minutes, hours or days)
pub fn convert_period(value: FloatValue, from: &str, to: &str) -> BlendResult<FloatValue> {
    let unknown = |units: &str| BlendError::Error(format!("Unsupported time units '{}'", units));
    let from_factor = seconds_per(from).ok_or_else(|| unknown(from))?;
    let to_factor = seconds_per(to).ok_or_else(|| unknown(to))?;
    Ok(value * from_factor / to_factor)
}
