//! The format-description event, first on every binlog v4 stream.

use crate::error::{BinlogError, Result};
use crate::protocol::codec::{get_u16_le, get_u32_le};

use super::EventType;
use super::header::EVENT_HEADER_SIZE;

/// No checksum appended to events.
pub const CHECKSUM_ALG_OFF: u8 = 0;
/// Every event (except the format description itself) carries a trailing
/// 4-byte CRC-32.
pub const CHECKSUM_ALG_CRC32: u8 = 1;

/// Describes how the events that follow are structured. Received once per
/// connection (and after each rotate into a freshly-written file) and
/// retained by the decoder until the connection closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptionEvent {
    /// Binlog format version; this crate requires 4 (MySQL 5.0+).
    pub binlog_version: u16,
    /// Version of the server that wrote the binlog, e.g. `5.5.34-32.0-log`.
    pub server_version: String,
    /// Seconds since the UNIX epoch when the binlog was created; may be 0.
    pub create_timestamp: u32,
    /// Common header length of subsequent events; must equal 19.
    pub event_header_length: u8,
    /// Post-header length per event type, indexed by `type code - 1`.
    pub event_type_header_lengths: Vec<u8>,
    /// Checksum algorithm announced by 5.6.1+ servers.
    pub checksum_algorithm: u8,
}

impl FormatDescriptionEvent {
    /// Parses a format-description body.
    ///
    /// Layout: binlog version (2), server version (50, null-padded),
    /// creation timestamp (4), common header length (1), then one byte per
    /// event type with that type's post-header length. Servers from 5.6.1
    /// on append a checksum-algorithm byte and the event's own CRC-32;
    /// both are split off so the per-type table stays correctly sized.
    pub fn parse(b: &[u8]) -> Result<FormatDescriptionEvent> {
        if b.len() < 2 + 50 + 4 + 1 {
            return Err(BinlogError::Packet(
                "format description event truncated".into(),
            ));
        }

        let binlog_version = get_u16_le(b);
        if binlog_version != 4 {
            return Err(BinlogError::Packet(format!(
                "unsupported binlog version {binlog_version}, must be 4"
            )));
        }

        let raw_version = &b[2..52];
        let end = raw_version
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(raw_version.len());
        let server_version = String::from_utf8_lossy(&raw_version[..end]).into_owned();

        let create_timestamp = get_u32_le(&b[52..]);

        let event_header_length = b[56];
        if event_header_length as usize != EVENT_HEADER_SIZE {
            return Err(BinlogError::Packet(format!(
                "invalid event header length {event_header_length}"
            )));
        }

        let mut lengths = &b[57..];
        let mut checksum_algorithm = CHECKSUM_ALG_OFF;
        if server_version_at_least(&server_version, (5, 6, 1)) && lengths.len() >= 5 {
            // alg byte + this event's own CRC-32
            checksum_algorithm = lengths[lengths.len() - 5];
            lengths = &lengths[..lengths.len() - 5];
        }

        Ok(FormatDescriptionEvent {
            binlog_version,
            server_version,
            create_timestamp,
            event_header_length,
            event_type_header_lengths: lengths.to_vec(),
            checksum_algorithm,
        })
    }

    /// Wire width of the table id in table-map and row events: historically
    /// 4 bytes, 6 on every modern server.
    pub fn table_id_len(&self) -> usize {
        let idx = (EventType::TableMap.code() - 1) as usize;
        match self.event_type_header_lengths.get(idx) {
            Some(6) => 4,
            _ => 6,
        }
    }

    /// Whether event bodies carry a trailing CRC-32 to strip.
    pub fn has_crc32_trailer(&self) -> bool {
        self.checksum_algorithm == CHECKSUM_ALG_CRC32
    }
}

/// Compares a `major.minor.patch[-suffix]` server version string against a
/// threshold, treating unparsable components as zero.
fn server_version_at_least(version: &str, (major, minor, patch): (u32, u32, u32)) -> bool {
    let mut parts = version.split('.');
    let mut next = || -> u32 {
        parts
            .next()
            .map(|p| {
                let digits: String = p.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().unwrap_or(0)
            })
            .unwrap_or(0)
    };
    let (a, b, c) = (next(), next(), next());
    (a, b, c) >= (major, minor, patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 5.5.34-32.0-log, no checksum suffix.
    fn v55_body() -> Vec<u8> {
        let mut b = vec![4, 0];
        let mut version = [0u8; 50];
        version[..15].copy_from_slice(b"5.5.34-32.0-log");
        b.extend_from_slice(&version);
        b.extend_from_slice(&[0, 0, 0, 0]);
        b.push(19);
        b.extend_from_slice(&[
            56, 13, 0, 8, 0, 18, 0, 4, 4, 4, 4, 18, 0, 0, 84, 0, 4, 26, 8, 0, 0, 0, 8, 8, 8, 2, 0,
        ]);
        b
    }

    #[test]
    fn parses_pre_checksum_server() {
        let e = FormatDescriptionEvent::parse(&v55_body()).unwrap();
        assert_eq!(e.binlog_version, 4);
        assert_eq!(e.server_version, "5.5.34-32.0-log");
        assert_eq!(e.create_timestamp, 0);
        assert_eq!(e.event_header_length, 19);
        assert_eq!(e.event_type_header_lengths.len(), 27);
        assert_eq!(e.checksum_algorithm, CHECKSUM_ALG_OFF);
        assert!(!e.has_crc32_trailer());
        // Table-map post-header is 8 bytes here, so table ids are 6 bytes.
        assert_eq!(e.table_id_len(), 6);
    }

    #[test]
    fn splits_checksum_suffix_on_modern_server() {
        let mut b = vec![4, 0];
        let mut version = [0u8; 50];
        version[..10].copy_from_slice(b"5.6.26-log");
        b.extend_from_slice(&version);
        b.extend_from_slice(&[0, 0, 0, 0]);
        b.push(19);
        // 35 per-type lengths, then CRC32 alg byte and the event's own crc.
        b.extend_from_slice(&[8u8; 35]);
        b.push(CHECKSUM_ALG_CRC32);
        b.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let e = FormatDescriptionEvent::parse(&b).unwrap();
        assert_eq!(e.server_version, "5.6.26-log");
        assert_eq!(e.event_type_header_lengths.len(), 35);
        assert_eq!(e.checksum_algorithm, CHECKSUM_ALG_CRC32);
        assert!(e.has_crc32_trailer());
    }

    #[test]
    fn rejects_wrong_binlog_version() {
        let mut b = v55_body();
        b[0] = 3;
        assert!(FormatDescriptionEvent::parse(&b).is_err());
    }

    #[test]
    fn rejects_wrong_header_length() {
        let mut b = v55_body();
        b[56] = 13;
        assert!(FormatDescriptionEvent::parse(&b).is_err());
    }

    #[test]
    fn legacy_four_byte_table_ids_are_detected() {
        let mut e = FormatDescriptionEvent::parse(&v55_body()).unwrap();
        e.event_type_header_lengths[(EventType::TableMap.code() - 1) as usize] = 6;
        assert_eq!(e.table_id_len(), 4);
    }

    #[test]
    fn version_comparison_handles_suffixes() {
        assert!(server_version_at_least("5.6.1-log", (5, 6, 1)));
        assert!(server_version_at_least("10.1.0-MariaDB", (5, 6, 1)));
        assert!(!server_version_at_least("5.5.34-32.0-log", (5, 6, 1)));
        assert!(!server_version_at_least("garbage", (5, 6, 1)));
    }
}
