//! Binlog event decoding.
//!
//! Every event on the stream is a 19-byte common header followed by a
//! type-specific body. Decoding is stateful: the format-description event
//! governs how later events are laid out, and table-map events bind the
//! numeric table ids that row events reference. [`decoder::EventDecoder`]
//! holds that state; the leaf types in this module are plain parsers.

mod format;
mod header;
mod misc;
mod rows;
mod table_map;

pub mod decoder;
pub mod value;

pub use format::{CHECKSUM_ALG_CRC32, CHECKSUM_ALG_OFF, FormatDescriptionEvent};
pub use header::{EVENT_HEADER_SIZE, EventHeader};
pub use misc::{
    BeginLoadQueryEvent, ExecuteLoadQueryEvent, GenericEvent, QueryEvent, RotateEvent, XidEvent,
};
pub use rows::RowsEvent;
pub use table_map::TableMapEvent;
pub use value::Value;

use bytes::Bytes;

/// MySQL binlog event type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Unknown,
    StartV3,
    Query,
    Stop,
    Rotate,
    IntVar,
    Load,
    Slave,
    CreateFile,
    AppendBlock,
    ExecLoad,
    DeleteFile,
    NewLoad,
    Rand,
    UserVar,
    FormatDescription,
    Xid,
    BeginLoadQuery,
    ExecuteLoadQuery,
    TableMap,
    PreGaWriteRows,
    PreGaUpdateRows,
    PreGaDeleteRows,
    WriteRowsV1,
    UpdateRowsV1,
    DeleteRowsV1,
    Incident,
    Heartbeat,
    Ignorable,
    RowsQuery,
    WriteRowsV2,
    UpdateRowsV2,
    DeleteRowsV2,
    Gtid,
    AnonymousGtid,
    PreviousGtids,
    /// Anything newer than we know about; carried through as [`GenericEvent`].
    Other(u8),
}

impl EventType {
    pub fn from_code(code: u8) -> EventType {
        match code {
            0 => EventType::Unknown,
            1 => EventType::StartV3,
            2 => EventType::Query,
            3 => EventType::Stop,
            4 => EventType::Rotate,
            5 => EventType::IntVar,
            6 => EventType::Load,
            7 => EventType::Slave,
            8 => EventType::CreateFile,
            9 => EventType::AppendBlock,
            10 => EventType::ExecLoad,
            11 => EventType::DeleteFile,
            12 => EventType::NewLoad,
            13 => EventType::Rand,
            14 => EventType::UserVar,
            15 => EventType::FormatDescription,
            16 => EventType::Xid,
            17 => EventType::BeginLoadQuery,
            18 => EventType::ExecuteLoadQuery,
            19 => EventType::TableMap,
            20 => EventType::PreGaWriteRows,
            21 => EventType::PreGaUpdateRows,
            22 => EventType::PreGaDeleteRows,
            23 => EventType::WriteRowsV1,
            24 => EventType::UpdateRowsV1,
            25 => EventType::DeleteRowsV1,
            26 => EventType::Incident,
            27 => EventType::Heartbeat,
            28 => EventType::Ignorable,
            29 => EventType::RowsQuery,
            30 => EventType::WriteRowsV2,
            31 => EventType::UpdateRowsV2,
            32 => EventType::DeleteRowsV2,
            33 => EventType::Gtid,
            34 => EventType::AnonymousGtid,
            35 => EventType::PreviousGtids,
            other => EventType::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            EventType::Unknown => 0,
            EventType::StartV3 => 1,
            EventType::Query => 2,
            EventType::Stop => 3,
            EventType::Rotate => 4,
            EventType::IntVar => 5,
            EventType::Load => 6,
            EventType::Slave => 7,
            EventType::CreateFile => 8,
            EventType::AppendBlock => 9,
            EventType::ExecLoad => 10,
            EventType::DeleteFile => 11,
            EventType::NewLoad => 12,
            EventType::Rand => 13,
            EventType::UserVar => 14,
            EventType::FormatDescription => 15,
            EventType::Xid => 16,
            EventType::BeginLoadQuery => 17,
            EventType::ExecuteLoadQuery => 18,
            EventType::TableMap => 19,
            EventType::PreGaWriteRows => 20,
            EventType::PreGaUpdateRows => 21,
            EventType::PreGaDeleteRows => 22,
            EventType::WriteRowsV1 => 23,
            EventType::UpdateRowsV1 => 24,
            EventType::DeleteRowsV1 => 25,
            EventType::Incident => 26,
            EventType::Heartbeat => 27,
            EventType::Ignorable => 28,
            EventType::RowsQuery => 29,
            EventType::WriteRowsV2 => 30,
            EventType::UpdateRowsV2 => 31,
            EventType::DeleteRowsV2 => 32,
            EventType::Gtid => 33,
            EventType::AnonymousGtid => 34,
            EventType::PreviousGtids => 35,
            EventType::Other(code) => *code,
        }
    }

    pub fn is_rows_v1(&self) -> bool {
        matches!(
            self,
            EventType::WriteRowsV1 | EventType::UpdateRowsV1 | EventType::DeleteRowsV1
        )
    }
}

/// A parsed event body.
#[derive(Debug, Clone)]
pub enum Event {
    FormatDescription(FormatDescriptionEvent),
    Rotate(RotateEvent),
    TableMap(TableMapEvent),
    Rows(RowsEvent),
    Query(QueryEvent),
    Xid(XidEvent),
    BeginLoadQuery(BeginLoadQueryEvent),
    ExecuteLoadQuery(ExecuteLoadQueryEvent),
    /// Everything we do not decode (GTID, INTVAR, RAND, rows v2, ...).
    Generic(GenericEvent),
}

/// One event as received from the stream: parsed header, parsed body, and
/// the raw bytes (header included) so consumers may persist or re-parse.
#[derive(Debug, Clone)]
pub struct EventContainer {
    pub header: EventHeader,
    pub event: Event,
    pub bytes: Bytes,
}
