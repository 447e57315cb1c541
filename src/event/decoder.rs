//! The stateful binlog event decoder.
//!
//! Two pieces of state persist across events: the format description,
//! which governs how later events are laid out, and the table registry
//! that row events resolve their table ids against. Both are owned here
//! and mutated only as a side effect of [`EventDecoder::parse`].

use std::collections::HashMap;

use bytes::Bytes;
use tracing::trace;

use crate::error::{BinlogError, EventError, Result};

use super::format::FormatDescriptionEvent;
use super::header::{EVENT_HEADER_SIZE, EventHeader};
use super::misc::{
    BeginLoadQueryEvent, ExecuteLoadQueryEvent, GenericEvent, QueryEvent, RotateEvent, XidEvent,
};
use super::rows::RowsEvent;
use super::table_map::TableMapEvent;
use super::{Event, EventContainer, EventType};

/// Parses raw events and tracks the format/table state they establish.
#[derive(Debug, Default)]
pub struct EventDecoder {
    format: Option<FormatDescriptionEvent>,
    tables: HashMap<u64, TableMapEvent>,
}

impl EventDecoder {
    pub fn new() -> EventDecoder {
        EventDecoder::default()
    }

    /// The format description currently in effect, if one has been seen.
    pub fn format(&self) -> Option<&FormatDescriptionEvent> {
        self.format.as_ref()
    }

    /// Parses one complete event (header plus body) and updates decoder
    /// state as a side effect.
    ///
    /// `bytes` must hold exactly one event; the length is checked against
    /// the header's stated size. When the current format announces CRC-32
    /// checksums, the 4-byte trailer is stripped from the body before
    /// dispatch (without verification).
    pub fn parse(&mut self, bytes: Bytes) -> Result<EventContainer> {
        let header = EventHeader::parse(&bytes)?;

        let body = &bytes[EVENT_HEADER_SIZE..];
        if body.len() != header.event_size as usize - EVENT_HEADER_SIZE {
            return Err(BinlogError::Packet(format!(
                "invalid event size: {} body bytes for stated size {}",
                body.len(),
                header.event_size
            )));
        }

        // The format-description event carries its own checksum and is
        // parsed before the algorithm is known; everything after it loses
        // the trailer here.
        let body = match &self.format {
            Some(format)
                if format.has_crc32_trailer()
                    && header.event_type != EventType::FormatDescription
                    && body.len() >= 4 =>
            {
                &body[..body.len() - 4]
            }
            _ => body,
        };

        trace!(event_type = ?header.event_type, log_pos = header.log_pos, "decoding event");

        let event = match self.parse_body(&header, body) {
            Ok(event) => event,
            // Keep the registry-level kinds distinguishable; wrap decode
            // failures with the header and raw body for context.
            Err(e @ (BinlogError::InvalidTableId(_) | BinlogError::UnsupportedColumnType(_))) => {
                return Err(e);
            }
            Err(e) => {
                return Err(BinlogError::Event(EventError {
                    header,
                    message: e.to_string(),
                    raw_body: body.to_vec(),
                }));
            }
        };

        Ok(EventContainer {
            header,
            event,
            bytes,
        })
    }

    fn parse_body(&mut self, header: &EventHeader, body: &[u8]) -> Result<Event> {
        let event = match header.event_type {
            // Format descriptions govern how every later event is parsed;
            // capture them.
            EventType::FormatDescription => {
                let e = FormatDescriptionEvent::parse(body)?;
                self.format = Some(e.clone());
                Event::FormatDescription(e)
            }
            EventType::Rotate => {
                let e = RotateEvent::parse(body)?;
                // Table ids are scoped to one binlog file.
                self.tables.clear();
                Event::Rotate(e)
            }
            EventType::TableMap => {
                let format = self.current_format()?;
                let e = TableMapEvent::parse(format, body)?;
                self.tables.insert(e.table_id, e.clone());
                Event::TableMap(e)
            }
            EventType::WriteRowsV1 | EventType::UpdateRowsV1 | EventType::DeleteRowsV1 => {
                let table_id_len = self.current_format()?.table_id_len();
                let e = RowsEvent::parse(&self.tables, table_id_len, header.event_type, body)?;
                Event::Rows(e)
            }
            // Transaction grouping: the BEGIN statement and the COMMIT
            // marker.
            EventType::Query => Event::Query(QueryEvent::parse(body)?),
            EventType::Xid => Event::Xid(XidEvent::parse(body)?),
            EventType::BeginLoadQuery => Event::BeginLoadQuery(BeginLoadQueryEvent::parse(body)?),
            EventType::ExecuteLoadQuery => {
                Event::ExecuteLoadQuery(ExecuteLoadQueryEvent::parse(body)?)
            }
            // GTID, INTVAR, RAND, rows v2, heartbeats and anything newer
            // pass through undecoded.
            _ => Event::Generic(GenericEvent::parse(body)),
        };
        Ok(event)
    }

    fn current_format(&self) -> Result<&FormatDescriptionEvent> {
        self.format.as_ref().ok_or_else(|| {
            BinlogError::Packet("no format description event seen on this stream".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::column::{MYSQL_TYPE_LONG, MYSQL_TYPE_SHORT};

    const FORMAT_EVENT_HEADER: [u8; 19] = [
        0x52, 0x52, 0xE9, 0x53, 0x0F, 0x88, 0xF3, 0x00, 0x00, 0x67, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00,
    ];

    fn format_event_body() -> Vec<u8> {
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

    const TABLE_MAP_HEADER: [u8; 19] = [
        0x00, 0x00, 0x02, 0x01, 0x13, 0x88, 0xF3, 0x00, 0x00, 0x4A, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00,
    ];

    fn table_map_body() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&[76, 0, 0, 0, 0, 0]);
        b.extend_from_slice(&[1, 0]);
        b.push(8);
        b.extend_from_slice(b"shard767\0");
        b.push(30);
        b.extend_from_slice(b"camera_upload_index_summary_v3\0");
        b.push(2);
        b.extend_from_slice(&[MYSQL_TYPE_LONG, MYSQL_TYPE_SHORT]);
        b.push(0);
        b.push(2);
        b
    }

    const ROTATE_HEADER: [u8; 19] = [
        0x00, 0x00, 0x00, 0x00, 0x04, 0x88, 0xF3, 0x00, 0x00, 0x32, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x20, 0x00,
    ];

    fn rotate_body() -> Vec<u8> {
        let mut b = vec![4, 0, 0, 0, 0, 0, 0, 0];
        b.extend_from_slice(b"mysqld-relay-bin.000749");
        b
    }

    fn join(header: &[u8], body: &[u8]) -> Bytes {
        let mut b = header.to_vec();
        b.extend_from_slice(body);
        Bytes::from(b)
    }

    fn event_bytes(event_type: EventType, body: &[u8]) -> Bytes {
        let mut b = Vec::with_capacity(EVENT_HEADER_SIZE + body.len());
        b.extend_from_slice(&[0; 4]);
        b.push(event_type.code());
        b.extend_from_slice(&0xF388u32.to_le_bytes());
        b.extend_from_slice(&((EVENT_HEADER_SIZE + body.len()) as u32).to_le_bytes());
        b.extend_from_slice(&[0; 4]);
        b.extend_from_slice(&[0; 2]);
        b.extend_from_slice(body);
        Bytes::from(b)
    }

    fn write_rows_body() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&[76, 0, 0, 0, 0, 0]);
        b.extend_from_slice(&[1, 0]);
        b.push(2);
        b.push(0b11);
        b.push(0b00); // null bitmap
        b.extend_from_slice(&7i32.to_le_bytes());
        b.extend_from_slice(&1077i16.to_le_bytes());
        b
    }

    fn primed_decoder() -> EventDecoder {
        let mut decoder = EventDecoder::new();
        decoder
            .parse(join(&FORMAT_EVENT_HEADER, &format_event_body()))
            .unwrap();
        decoder
    }

    #[test]
    fn format_description_is_captured() {
        let decoder = primed_decoder();
        let format = decoder.format().unwrap();
        assert_eq!(format.binlog_version, 4);
        assert_eq!(format.server_version, "5.5.34-32.0-log");
        assert_eq!(format.event_header_length, 19);
        assert_eq!(format.event_type_header_lengths.len(), 27);
    }

    #[test]
    fn container_keeps_raw_bytes() {
        let mut decoder = EventDecoder::new();
        let input = join(&FORMAT_EVENT_HEADER, &format_event_body());
        let container = decoder.parse(input.clone()).unwrap();
        assert_eq!(container.bytes, input);
        assert_eq!(container.header.event_size as usize, input.len());
        assert!(matches!(container.event, Event::FormatDescription(_)));
    }

    #[test]
    fn table_map_is_registered() {
        let mut decoder = primed_decoder();
        let container = decoder
            .parse(join(&TABLE_MAP_HEADER, &table_map_body()))
            .unwrap();

        let e = match container.event {
            Event::TableMap(e) => e,
            other => panic!("expected table map, got {other:?}"),
        };
        assert_eq!(e.table_id, 76);
        assert_eq!(e.database_name, "shard767");
        assert_eq!(e.table_name, "camera_upload_index_summary_v3");
        assert_eq!(decoder.tables.len(), 1);
        assert_eq!(decoder.tables[&76], e);
    }

    #[test]
    fn rows_resolve_registered_table() {
        let mut decoder = primed_decoder();
        decoder
            .parse(join(&TABLE_MAP_HEADER, &table_map_body()))
            .unwrap();

        let container = decoder
            .parse(event_bytes(EventType::WriteRowsV1, &write_rows_body()))
            .unwrap();
        let e = match container.event {
            Event::Rows(e) => e,
            other => panic!("expected rows, got {other:?}"),
        };
        assert_eq!(e.rows.len(), 1);
        assert_eq!(e.rows[0][0], super::super::Value::Int(7));
        assert_eq!(e.rows[0][1], super::super::Value::SmallInt(1077));
    }

    #[test]
    fn rotate_clears_the_table_registry() {
        let mut decoder = primed_decoder();
        decoder
            .parse(join(&TABLE_MAP_HEADER, &table_map_body()))
            .unwrap();
        assert_eq!(decoder.tables.len(), 1);

        let container = decoder.parse(join(&ROTATE_HEADER, &rotate_body())).unwrap();
        let e = match container.event {
            Event::Rotate(e) => e,
            other => panic!("expected rotate, got {other:?}"),
        };
        assert_eq!(e.next_position, 4);
        assert_eq!(e.next_file, "mysqld-relay-bin.000749");
        assert!(decoder.tables.is_empty());

        // A row event for the cleared id now fails.
        let err = decoder
            .parse(event_bytes(EventType::WriteRowsV1, &write_rows_body()))
            .unwrap_err();
        assert!(matches!(err, BinlogError::InvalidTableId(76)), "{err}");
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let mut decoder = EventDecoder::new();
        let mut b = join(&FORMAT_EVENT_HEADER, &format_event_body()).to_vec();
        b.push(0xAA);
        assert!(decoder.parse(Bytes::from(b)).is_err());
    }

    #[test]
    fn row_event_without_format_is_rejected() {
        let mut decoder = EventDecoder::new();
        let err = decoder
            .parse(event_bytes(EventType::WriteRowsV1, &write_rows_body()))
            .unwrap_err();
        assert!(matches!(err, BinlogError::Event(_)), "{err}");
    }

    #[test]
    fn unhandled_types_pass_through_as_generic() {
        let mut decoder = primed_decoder();
        let body = [0xDE, 0xAD, 0xBE, 0xEF];
        let container = decoder
            .parse(event_bytes(EventType::Gtid, &body))
            .unwrap();
        match container.event {
            Event::Generic(e) => assert_eq!(e.data, body),
            other => panic!("expected generic, got {other:?}"),
        }
    }

    #[test]
    fn crc32_trailer_is_stripped_after_56_format() {
        let mut decoder = EventDecoder::new();

        let mut body = vec![4, 0];
        let mut version = [0u8; 50];
        version[..10].copy_from_slice(b"5.6.26-log");
        body.extend_from_slice(&version);
        body.extend_from_slice(&[0, 0, 0, 0]);
        body.push(19);
        body.extend_from_slice(&[8u8; 35]);
        body.push(super::super::CHECKSUM_ALG_CRC32);
        body.extend_from_slice(&[0, 0, 0, 0]);
        decoder
            .parse(event_bytes(EventType::FormatDescription, &body))
            .unwrap();
        assert!(decoder.format().unwrap().has_crc32_trailer());

        // Rotate body followed by a CRC-32 trailer that must not leak into
        // the file name.
        let mut rotate = rotate_body();
        rotate.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]);
        let container = decoder
            .parse(event_bytes(EventType::Rotate, &rotate))
            .unwrap();
        match container.event {
            Event::Rotate(e) => assert_eq!(e.next_file, "mysqld-relay-bin.000749"),
            other => panic!("expected rotate, got {other:?}"),
        }
    }

    #[test]
    fn body_errors_carry_header_context() {
        let mut decoder = primed_decoder();
        let err = decoder
            .parse(event_bytes(EventType::Rotate, &[1, 2, 3]))
            .unwrap_err();
        match err {
            BinlogError::Event(e) => {
                assert_eq!(e.header.event_type, EventType::Rotate);
                assert_eq!(e.raw_body, [1, 2, 3]);
                assert!(!e.message.is_empty());
            }
            other => panic!("expected event error, got {other}"),
        }
    }
}
