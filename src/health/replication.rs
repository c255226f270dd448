//! PostgreSQL replication positions and the queries that read them.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Current insert position of the primary.
pub const WRITE_LOCATION_SQL: &str = "SELECT pg_current_wal_insert_lsn()::text AS location";

/// Replay position, used when the insert position cannot be read.
pub const REPLAY_WRITE_LOCATION_SQL: &str = "SELECT pg_last_wal_replay_lsn()::text AS location";

/// Seconds since the last replayed transaction.
pub const REPLICATION_LAG_TIME_SQL: &str =
    "SELECT EXTRACT(EPOCH FROM (now() - pg_last_xact_replay_timestamp()))::float AS lag";

/// A write-ahead log position (`"16/B374D848"`).
///
/// Positions are totally ordered, so a replica is caught up to a location when
/// its replay position is greater than or equal to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WriteLocation(u64);

impl WriteLocation {
    pub fn new(lsn: u64) -> Self {
        Self(lsn)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Bytes between `self` and an earlier location.
    pub fn bytes_since(&self, earlier: WriteLocation) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for WriteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

impl FromStr for WriteLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidWriteLocation { value: s.to_string() };
        let (high, low) = s.trim().split_once('/').ok_or_else(invalid)?;

        let parse = |part: &str| {
            if part.is_empty() || part.len() > 8 {
                return Err(invalid());
            }
            u32::from_str_radix(part, 16).map_err(|_| invalid())
        };

        Ok(Self((u64::from(parse(high)?) << 32) | u64::from(parse(low)?)))
    }
}

/// True when the host is a primary or has replayed past `location`.
pub fn caught_up_sql(location: WriteLocation) -> String {
    format!(
        "SELECT NOT pg_is_in_recovery() OR pg_wal_lsn_diff(pg_last_wal_replay_lsn(), '{}') >= 0 AS result",
        location
    )
}

/// Bytes the host's replay position trails `location` by.
pub fn replication_lag_size_sql(location: WriteLocation) -> String {
    format!(
        "SELECT pg_wal_lsn_diff('{}', pg_last_wal_replay_lsn())::float AS diff",
        location
    )
}

/// Interpret a boolean column as PostgreSQL renders it.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "t" | "true" | "TRUE" | "1" => Some(true),
        "f" | "false" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

/// Interpret a float column; NaN and infinities are treated as unknown.
pub fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let loc: WriteLocation = "0/C73A0D88".parse().unwrap();
        assert_eq!(loc.as_u64(), 0xC73A0D88);
        assert_eq!(loc.to_string(), "0/C73A0D88");

        let loc: WriteLocation = "16/b374d848".parse().unwrap();
        assert_eq!(loc.as_u64(), (0x16_u64 << 32) | 0xB374D848);
        assert_eq!(loc.to_string(), "16/B374D848");
    }

    #[test]
    fn test_ordering() {
        let a: WriteLocation = "0/FFFFFFFF".parse().unwrap();
        let b: WriteLocation = "1/0".parse().unwrap();
        assert!(a < b);
        assert_eq!(b.bytes_since(a), 1);
        assert_eq!(a.bytes_since(b), 0);
    }

    #[test]
    fn test_rejects_malformed_locations() {
        for bad in ["", "C73A0D88", "0/", "/1", "0/xyz", "0/123456789", "0/1'; DROP TABLE users; --"] {
            assert!(
                matches!(bad.parse::<WriteLocation>(), Err(Error::InvalidWriteLocation { .. })),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_sql_embeds_canonical_location() {
        let loc: WriteLocation = "0/c73a0d88".parse().unwrap();
        assert!(caught_up_sql(loc).contains("'0/C73A0D88'"));
        assert!(replication_lag_size_sql(loc).contains("'0/C73A0D88'"));
    }

    #[test]
    fn test_parse_bool_and_float() {
        assert_eq!(parse_bool("t"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool(""), None);
        assert_eq!(parse_float(" 1.5 "), Some(1.5));
        assert_eq!(parse_float("NaN"), None);
        assert_eq!(parse_float("lag"), None);
    }
}
