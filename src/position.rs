//! Binlog stream position.
//!
//! MySQL identifies a point in the replication stream as a byte offset
//! within a named binlog file, e.g. `mysql-bin.000042:1077`. The primary
//! rotates across files; a `ROTATE_EVENT` carries the name of the next one.

use std::fmt;
use std::str::FromStr;

/// The first 4 bytes of every binlog file are the magic header, so no event
/// ever starts below this offset.
pub const MIN_POSITION: u32 = 4;

/// Error returned when parsing an invalid position string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePositionError(pub String);

impl fmt::Display for ParsePositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid binlog position: {}", self.0)
    }
}

impl std::error::Error for ParsePositionError {}

/// A position in the primary's binlog: file name plus byte offset.
///
/// # Example
///
/// ```
/// use binlog_follower::Position;
///
/// let pos = Position::new("mysql-bin.000042", 1077);
/// assert_eq!(pos.to_string(), "mysql-bin.000042:1077");
///
/// // Or use FromStr
/// let pos: Position = "mysql-bin.000042:1077".parse().unwrap();
/// assert_eq!(pos.pos, 1077);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// Binlog file name on the primary.
    pub name: String,
    /// Byte offset within the file.
    pub pos: u32,
}

impl Position {
    pub fn new(name: impl Into<String>, pos: u32) -> Self {
        Position {
            name: name.into(),
            pos,
        }
    }

    /// Returns a copy with the offset raised to [`MIN_POSITION`] if it was
    /// below the binlog magic header.
    pub fn clamped(&self) -> Position {
        Position {
            name: self.name.clone(),
            pos: self.pos.max(MIN_POSITION),
        }
    }

    /// Parse a `file:offset` string.
    pub fn parse(s: &str) -> std::result::Result<Position, ParsePositionError> {
        let (name, pos_str) = s
            .rsplit_once(':')
            .ok_or_else(|| ParsePositionError(format!("missing ':' separator: {s}")))?;
        let pos = pos_str
            .parse::<u32>()
            .map_err(|_| ParsePositionError(format!("invalid offset '{pos_str}': {s}")))?;
        Ok(Position {
            name: name.to_string(),
            pos,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.pos)
    }
}

impl FromStr for Position {
    type Err = ParsePositionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Position::parse(s)
    }
}
