//! Text-protocol result sets.
//!
//! A result set reply is: a column-count packet, N column definitions, an
//! EOF, the rows as sequences of length-encoded strings, and a final EOF.
//! Rows are converted per the column definition's type and UNSIGNED flag,
//! which is all the typing the text protocol offers.

use crate::error::{BinlogError, Result};
use crate::protocol::codec::{
    get_length_encoded_str, get_u16_le, get_u32_le, skip_length_encoded_str,
};
use crate::protocol::column::*;

/// One column definition from a result-set header.
#[derive(Debug, Clone, Default)]
pub struct Field {
    pub schema: Vec<u8>,
    pub table: Vec<u8>,
    pub org_table: Vec<u8>,
    pub name: Vec<u8>,
    pub org_name: Vec<u8>,
    pub charset: u16,
    pub column_length: u32,
    pub type_code: u8,
    pub flags: u16,
    pub decimals: u8,
}

impl Field {
    /// Parses a column-definition packet (protocol 4.1 layout).
    pub fn parse(b: &[u8]) -> Result<Field> {
        let mut f = Field::default();
        let mut i = 0;

        // Catalog is always "def"; skip it.
        i += skip_length_encoded_str(&b[i..])?;

        let s = get_length_encoded_str(&b[i..])?;
        f.schema = s.value.to_vec();
        i += s.consumed;

        let s = get_length_encoded_str(&b[i..])?;
        f.table = s.value.to_vec();
        i += s.consumed;

        let s = get_length_encoded_str(&b[i..])?;
        f.org_table = s.value.to_vec();
        i += s.consumed;

        let s = get_length_encoded_str(&b[i..])?;
        f.name = s.value.to_vec();
        i += s.consumed;

        let s = get_length_encoded_str(&b[i..])?;
        f.org_name = s.value.to_vec();
        i += s.consumed;

        // Fixed-length tail: filler, charset (2), column length (4),
        // type (1), flags (2), decimals (1), two trailing fillers.
        if b.len() < i + 1 + 2 + 4 + 1 + 2 + 1 {
            return Err(BinlogError::Packet("column definition truncated".into()));
        }
        i += 1;

        f.charset = get_u16_le(&b[i..]);
        i += 2;

        f.column_length = get_u32_le(&b[i..]);
        i += 4;

        f.type_code = b[i];
        i += 1;

        f.flags = get_u16_le(&b[i..]);
        i += 2;

        f.decimals = b[i];

        Ok(f)
    }

    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    fn is_unsigned(&self) -> bool {
        self.flags & UNSIGNED_FLAG != 0
    }
}

/// A value from a text-protocol row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    UInt(u64),
    Double(f64),
    Bytes(Vec<u8>),
}

/// Result of a text command: either OK-packet counters or a result set.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub status: u16,
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub fields: Vec<Field>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryResult {
    /// Cell accessor with string coercion, for bootstrap queries that read
    /// names and variable values.
    pub fn string(&self, row: usize, column: usize) -> Result<String> {
        match self.value(row, column)? {
            SqlValue::Null => Ok(String::new()),
            SqlValue::Int(v) => Ok(v.to_string()),
            SqlValue::UInt(v) => Ok(v.to_string()),
            SqlValue::Double(v) => Ok(v.to_string()),
            SqlValue::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Cell accessor with unsigned coercion, for offsets and counters.
    pub fn u64(&self, row: usize, column: usize) -> Result<u64> {
        match self.value(row, column)? {
            SqlValue::Null => Ok(0),
            SqlValue::Int(v) => Ok(*v as u64),
            SqlValue::UInt(v) => Ok(*v),
            SqlValue::Double(v) => Ok(*v as u64),
            SqlValue::Bytes(b) => String::from_utf8_lossy(b)
                .parse::<u64>()
                .map_err(|e| BinlogError::Packet(format!("non-numeric result cell: {e}"))),
        }
    }

    fn value(&self, row: usize, column: usize) -> Result<&SqlValue> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .ok_or_else(|| {
                BinlogError::Packet(format!("result has no cell at row {row} column {column}"))
            })
    }
}

/// Decodes one text-protocol row packet against the column definitions.
pub fn parse_text_row(b: &[u8], fields: &[Field]) -> Result<Vec<SqlValue>> {
    let mut row = Vec::with_capacity(fields.len());
    let mut i = 0;

    for field in fields {
        let s = get_length_encoded_str(&b[i..])?;
        i += s.consumed;

        if s.is_null {
            row.push(SqlValue::Null);
            continue;
        }

        let text = String::from_utf8_lossy(s.value);
        let value = match field.type_code {
            MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_INT24 | MYSQL_TYPE_LONG
            | MYSQL_TYPE_LONGLONG | MYSQL_TYPE_YEAR => {
                if field.is_unsigned() {
                    SqlValue::UInt(text.parse::<u64>().map_err(|e| {
                        BinlogError::Packet(format!("bad unsigned column value: {e}"))
                    })?)
                } else {
                    SqlValue::Int(text.parse::<i64>().map_err(|e| {
                        BinlogError::Packet(format!("bad integer column value: {e}"))
                    })?)
                }
            }
            MYSQL_TYPE_FLOAT | MYSQL_TYPE_DOUBLE => SqlValue::Double(
                text.parse::<f64>()
                    .map_err(|e| BinlogError::Packet(format!("bad float column value: {e}")))?,
            ),
            _ => SqlValue::Bytes(s.value.to_vec()),
        };
        row.push(value);
    }

    Ok(row)
}
