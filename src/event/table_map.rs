//! The table-map event: binds a numeric table id to a schema-qualified
//! table and its column layout.
//!
//! Row events carry only the table id; the decoder keeps the most recent
//! map per id and row parsing borrows the column types and metadata from
//! it. Ids are scoped to one binlog file, so the registry is dropped on
//! every rotate.

use crate::error::{BinlogError, Result};
use crate::protocol::codec::{
    byte_count_from_bit_count, get_fixed_int_le, get_length_encoded_int, get_length_encoded_str,
    get_u16_le,
};
use crate::protocol::column::*;

use super::format::FormatDescriptionEvent;

/// Structure of a table that is about to be changed by row events.
///
/// The 4-byte table ids of `old_row_based_repl_4_byte_map_id` mode are
/// selected via the format description; the mode itself is otherwise
/// unsupported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapEvent {
    pub table_id: u64,
    pub flags: u16,
    pub database_name: String,
    pub table_name: String,
    pub column_count: u64,
    /// One `MYSQL_TYPE_*` code per column.
    pub column_types: Vec<u8>,
    /// Type-specific metadata per column; zero where a type carries none.
    pub column_metadata: Vec<u16>,
    /// One bit per column that may be NULL.
    pub null_bit_vector: Vec<u8>,
}

impl TableMapEvent {
    /// Parses a table-map body. The table-id width comes from the current
    /// format description.
    pub fn parse(format: &FormatDescriptionEvent, b: &[u8]) -> Result<TableMapEvent> {
        let table_id_len = format.table_id_len();
        let mut i = 0;

        let need = |i: usize, n: usize| -> Result<()> {
            if b.len() < i + n {
                return Err(BinlogError::Packet("table map event truncated".into()));
            }
            Ok(())
        };

        need(i, table_id_len + 2)?;
        let table_id = get_fixed_int_le(&b[i..i + table_id_len]);
        i += table_id_len;

        let flags = get_u16_le(&b[i..]);
        i += 2;

        // Database name: length byte, name, null terminator.
        need(i, 1)?;
        let db_name_len = b[i] as usize;
        i += 1;
        need(i, db_name_len + 1)?;
        let database_name = String::from_utf8_lossy(&b[i..i + db_name_len]).into_owned();
        i += db_name_len + 1;

        // Table name: same shape.
        need(i, 1)?;
        let tbl_name_len = b[i] as usize;
        i += 1;
        need(i, tbl_name_len + 1)?;
        let table_name = String::from_utf8_lossy(&b[i..i + tbl_name_len]).into_owned();
        i += tbl_name_len + 1;

        let count = get_length_encoded_int(&b[i..])?;
        let column_count = count.value;
        i += count.consumed;

        need(i, column_count as usize)?;
        let column_types = b[i..i + column_count as usize].to_vec();
        i += column_count as usize;

        // Metadata array, length-prefixed as a whole; per-column width
        // depends on the column type.
        let metadata = get_length_encoded_str(&b[i..])?;
        let column_metadata = parse_column_metadata(&column_types, metadata.value)?;
        i += metadata.consumed;

        let null_len = byte_count_from_bit_count(column_count as usize);
        if b.len() - i != null_len {
            return Err(BinlogError::Packet(format!(
                "table map null-bit vector: expected {null_len} bytes, have {}",
                b.len() - i
            )));
        }
        let null_bit_vector = b[i..].to_vec();

        Ok(TableMapEvent {
            table_id,
            flags,
            database_name,
            table_name,
            column_count,
            column_types,
            column_metadata,
            null_bit_vector,
        })
    }
}

fn parse_column_metadata(column_types: &[u8], b: &[u8]) -> Result<Vec<u16>> {
    let mut metadata = vec![0u16; column_types.len()];
    let mut i = 0;

    let need = |i: usize, n: usize| -> Result<()> {
        if b.len() < i + n {
            return Err(BinlogError::Packet("column metadata truncated".into()));
        }
        Ok(())
    };

    for (col, tp) in column_types.iter().enumerate() {
        match *tp {
            // Type byte then length byte, packed big-endian-ish due to
            // MySQL Bug #37426.
            MYSQL_TYPE_STRING | MYSQL_TYPE_NEWDECIMAL => {
                need(i, 2)?;
                metadata[col] = u16::from(b[i]) << 8 | u16::from(b[i + 1]);
                i += 2;
            }
            MYSQL_TYPE_VAR_STRING | MYSQL_TYPE_VARCHAR | MYSQL_TYPE_BIT => {
                need(i, 2)?;
                metadata[col] = get_u16_le(&b[i..]);
                i += 2;
            }
            MYSQL_TYPE_BLOB | MYSQL_TYPE_DOUBLE | MYSQL_TYPE_FLOAT | MYSQL_TYPE_GEOMETRY
            | MYSQL_TYPE_TIME2 | MYSQL_TYPE_DATETIME2 | MYSQL_TYPE_TIMESTAMP2 => {
                need(i, 1)?;
                metadata[col] = u16::from(b[i]);
                i += 1;
            }
            // These never appear bare in a table map; give up.
            MYSQL_TYPE_NEWDATE | MYSQL_TYPE_ENUM | MYSQL_TYPE_SET | MYSQL_TYPE_TINY_BLOB
            | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB => {
                return Err(BinlogError::UnsupportedColumnType(*tp));
            }
            _ => metadata[col] = 0,
        }
    }

    Ok(metadata)
}
