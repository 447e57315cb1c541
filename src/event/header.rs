//! The common binlog v4 event header.

use crate::error::{BinlogError, Result};
use crate::protocol::codec::{get_u16_le, get_u32_le};

use super::EventType;

/// Wire size of the common header for binlog version 4.
pub const EVENT_HEADER_SIZE: usize = 19;

/// The 19-byte header prefixed to every binlog event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
    /// Seconds since the UNIX epoch.
    pub timestamp: u32,
    pub event_type: EventType,
    /// Id of the originating server; used to break cycles in circular
    /// replication setups.
    pub server_id: u32,
    /// Total event size: header, post-header and body.
    pub event_size: u32,
    /// Position of the next event in the binlog file.
    pub log_pos: u32,
    pub flags: u16,
}

impl EventHeader {
    /// Parses the header at the front of `b`.
    pub fn parse(b: &[u8]) -> Result<EventHeader> {
        if b.len() < EVENT_HEADER_SIZE {
            return Err(BinlogError::Packet(format!(
                "event header too short: {} bytes",
                b.len()
            )));
        }

        let timestamp = get_u32_le(&b[0..]);
        let event_type = EventType::from_code(b[4]);
        let server_id = get_u32_le(&b[5..]);
        let event_size = get_u32_le(&b[9..]);
        if (event_size as usize) < EVENT_HEADER_SIZE {
            return Err(BinlogError::Packet(format!(
                "stated event size {event_size} smaller than header"
            )));
        }
        let log_pos = get_u32_le(&b[13..]);
        let flags = get_u16_le(&b[17..]);

        Ok(EventHeader {
            timestamp,
            event_type,
            server_id,
            event_size,
            log_pos,
            flags,
        })
    }
}
