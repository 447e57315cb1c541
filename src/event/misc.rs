//! Event bodies with no decoder state attached: rotate, transaction
//! markers, LOAD DATA bookkeeping, and the generic passthrough.

use crate::error::{BinlogError, Result};
use crate::protocol::codec::{get_u16_le, get_u32_le, get_u64_le};

/// Tells the follower which binlog file to request next. Table-map state is
/// scoped to one file, so the decoder drops its registry on receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotateEvent {
    /// Offset inside the next binlog file.
    pub next_position: u64,
    /// Name of the next binlog file (not null-terminated on the wire).
    pub next_file: String,
}

impl RotateEvent {
    pub fn parse(b: &[u8]) -> Result<RotateEvent> {
        if b.len() < 8 {
            return Err(BinlogError::Packet("rotate event truncated".into()));
        }
        Ok(RotateEvent {
            next_position: get_u64_le(b),
            next_file: String::from_utf8_lossy(&b[8..]).into_owned(),
        })
    }
}

/// Transaction id for two-phase commit, written where a COMMIT is expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XidEvent {
    pub xid: u64,
}

impl XidEvent {
    pub fn parse(b: &[u8]) -> Result<XidEvent> {
        if b.len() < 8 {
            return Err(BinlogError::Packet("xid event truncated".into()));
        }
        Ok(XidEvent { xid: get_u64_le(b) })
    }
}

/// A statement written to the binlog as text: DDL, and the BEGIN that
/// groups row events into a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
    pub slave_proxy_id: u32,
    pub execution_time: u32,
    pub error_code: u16,
    pub status_vars: Vec<u8>,
    pub database_name: String,
    pub query: String,
}

impl QueryEvent {
    pub fn parse(b: &[u8]) -> Result<QueryEvent> {
        if b.len() < 4 + 4 + 1 + 2 + 2 {
            return Err(BinlogError::Packet("query event truncated".into()));
        }

        let slave_proxy_id = get_u32_le(b);
        let execution_time = get_u32_le(&b[4..]);
        let db_name_len = b[8] as usize;
        let error_code = get_u16_le(&b[9..]);
        let status_vars_len = get_u16_le(&b[11..]) as usize;
        let mut i = 13;

        if b.len() < i + status_vars_len + db_name_len + 1 {
            return Err(BinlogError::Packet("query event truncated".into()));
        }

        let status_vars = b[i..i + status_vars_len].to_vec();
        i += status_vars_len;

        let database_name = String::from_utf8_lossy(&b[i..i + db_name_len]).into_owned();
        i += db_name_len;

        // Null byte between schema and query.
        i += 1;

        let query = String::from_utf8_lossy(&b[i..]).into_owned();

        Ok(QueryEvent {
            slave_proxy_id,
            execution_time,
            error_code,
            status_vars,
            database_name,
            query,
        })
    }
}

/// "Truncate a file and set block-data" - first half of a binlogged
/// `LOAD DATA INFILE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginLoadQueryEvent {
    pub file_id: u32,
    pub block_data: Vec<u8>,
}

impl BeginLoadQueryEvent {
    pub fn parse(b: &[u8]) -> Result<BeginLoadQueryEvent> {
        if b.len() < 4 {
            return Err(BinlogError::Packet("begin load query event truncated".into()));
        }
        Ok(BeginLoadQueryEvent {
            file_id: get_u32_le(b),
            block_data: b[4..].to_vec(),
        })
    }
}

/// Second half of a binlogged `LOAD DATA INFILE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteLoadQueryEvent {
    pub slave_proxy_id: u32,
    pub execution_time: u32,
    pub schema_length: u8,
    pub error_code: u16,
    pub status_vars_length: u16,
    pub file_id: u32,
    pub start_pos: u32,
    pub end_pos: u32,
    pub dup_handling_flags: u8,
}

impl ExecuteLoadQueryEvent {
    pub fn parse(b: &[u8]) -> Result<ExecuteLoadQueryEvent> {
        if b.len() < 4 + 4 + 1 + 2 + 2 + 4 + 4 + 4 + 1 {
            return Err(BinlogError::Packet(
                "execute load query event truncated".into(),
            ));
        }
        Ok(ExecuteLoadQueryEvent {
            slave_proxy_id: get_u32_le(b),
            execution_time: get_u32_le(&b[4..]),
            schema_length: b[8],
            error_code: get_u16_le(&b[9..]),
            status_vars_length: get_u16_le(&b[11..]),
            file_id: get_u32_le(&b[13..]),
            start_pos: get_u32_le(&b[17..]),
            end_pos: get_u32_le(&b[21..]),
            dup_handling_flags: b[25],
        })
    }
}

/// Catch-all for event types we pass through undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericEvent {
    pub data: Vec<u8>,
}

impl GenericEvent {
    pub fn parse(b: &[u8]) -> GenericEvent {
        GenericEvent { data: b.to_vec() }
    }
}
