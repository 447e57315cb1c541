//! Row events: the per-row images of INSERT, UPDATE and DELETE.
//!
//! Body layout (v1):
//! - table id (4 or 6 bytes, per the format description)
//! - flags (2 bytes)
//! - column count (length-encoded)
//! - column bitmap, `ceil(count / 8)` bytes (the before-image for updates)
//! - update events only: a second bitmap for the after-image
//! - row images until the body is exhausted
//!
//! Each row image is a null bitmap over the columns selected by the column
//! bitmap, then the encoded values of the non-NULL columns in declaration
//! order. Update events emit rows in before/after pairs.

use std::collections::HashMap;

use crate::error::{BinlogError, Result};
use crate::protocol::codec::{
    bit_count, byte_count_from_bit_count, get_bit, get_fixed_int_le, get_length_encoded_int,
    get_u16_le,
};

use super::table_map::TableMapEvent;
use super::value::{Value, parse_value};
use super::EventType;

/// A decoded write/update/delete rows event (v1).
#[derive(Debug, Clone, PartialEq)]
pub struct RowsEvent {
    pub table_id: u64,
    pub flags: u16,
    pub column_count: u64,
    /// Columns present in the row images (before-image for updates).
    pub column_bitmap_before: Vec<u8>,
    /// After-image column bitmap; update events only.
    pub column_bitmap_after: Option<Vec<u8>>,
    /// Row images in wire order. For updates these alternate
    /// before, after, before, after.
    pub rows: Vec<Vec<Value>>,
}

impl RowsEvent {
    /// Parses a rows body against the table registry. The referenced table
    /// id must have been announced by a prior table-map event.
    pub fn parse(
        tables: &HashMap<u64, TableMapEvent>,
        table_id_len: usize,
        event_type: EventType,
        b: &[u8],
    ) -> Result<RowsEvent> {
        let mut i = 0;

        if b.len() < table_id_len + 2 {
            return Err(BinlogError::Packet("rows event truncated".into()));
        }
        let table_id = get_fixed_int_le(&b[i..i + table_id_len]);
        i += table_id_len;

        let flags = get_u16_le(&b[i..]);
        i += 2;

        let count = get_length_encoded_int(&b[i..])?;
        let column_count = count.value;
        i += count.consumed;

        let bitmap_len = byte_count_from_bit_count(column_count as usize);
        if b.len() < i + bitmap_len {
            return Err(BinlogError::Packet("rows event column bitmap truncated".into()));
        }
        let column_bitmap_before = b[i..i + bitmap_len].to_vec();
        i += bitmap_len;

        let column_bitmap_after = if event_type == EventType::UpdateRowsV1 {
            if b.len() < i + bitmap_len {
                return Err(BinlogError::Packet(
                    "rows event after-image bitmap truncated".into(),
                ));
            }
            let bm = b[i..i + bitmap_len].to_vec();
            i += bitmap_len;
            Some(bm)
        } else {
            None
        };

        let table = tables
            .get(&table_id)
            .ok_or(BinlogError::InvalidTableId(table_id))?;
        if (table.column_types.len() as u64) < column_count {
            return Err(BinlogError::Packet(format!(
                "rows event declares {column_count} columns, table map has {}",
                table.column_types.len()
            )));
        }

        let mut event = RowsEvent {
            table_id,
            flags,
            column_count,
            column_bitmap_before,
            column_bitmap_after,
            rows: Vec::new(),
        };

        // Row images repeat until the body is consumed; updates carry a
        // second (after) image per entry.
        while i < b.len() {
            let bitmap = event.column_bitmap_before.clone();
            i += event.parse_row(&b[i..], table, &bitmap)?;

            if let Some(after) = event.column_bitmap_after.clone() {
                i += event.parse_row(&b[i..], table, &after)?;
            }
        }

        Ok(event)
    }

    fn parse_row(&mut self, b: &[u8], table: &TableMapEvent, bitmap: &[u8]) -> Result<usize> {
        let null_len = byte_count_from_bit_count(bit_count(bitmap));
        if b.len() < null_len {
            return Err(BinlogError::Packet("row null bitmap truncated".into()));
        }
        let null_bitmap = &b[..null_len];
        let mut i = null_len;
        let mut null_bit_index = 0;

        let mut row = vec![Value::Null; self.column_count as usize];

        for (j, cell) in row.iter_mut().enumerate() {
            if get_bit(bitmap, j) == 0 {
                continue;
            }

            let is_null = (null_bitmap[null_bit_index / 8] >> (null_bit_index % 8)) & 0x01;
            null_bit_index += 1;

            if is_null > 0 {
                continue;
            }

            let (value, n) = parse_value(&b[i..], table.column_types[j], table.column_metadata[j])?;
            *cell = value;
            i += n;
        }

        self.rows.push(row);
        Ok(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::column::{MYSQL_TYPE_LONG, MYSQL_TYPE_VARCHAR};

    fn table(id: u64) -> TableMapEvent {
        TableMapEvent {
            table_id: id,
            flags: 1,
            database_name: "shard767".into(),
            table_name: "items".into(),
            column_count: 2,
            column_types: vec![MYSQL_TYPE_LONG, MYSQL_TYPE_VARCHAR],
            column_metadata: vec![0, 32],
            null_bit_vector: vec![0b10],
        }
    }

    fn registry(id: u64) -> HashMap<u64, TableMapEvent> {
        let mut tables = HashMap::new();
        tables.insert(id, table(id));
        tables
    }

    fn row_image(id: i32, name: Option<&str>) -> Vec<u8> {
        let mut b = Vec::new();
        match name {
            Some(name) => {
                b.push(0b00); // null bitmap: nothing null
                b.extend_from_slice(&id.to_le_bytes());
                b.push(name.len() as u8);
                b.extend_from_slice(name.as_bytes());
            }
            None => {
                b.push(0b10); // second selected column is NULL
                b.extend_from_slice(&id.to_le_bytes());
            }
        }
        b
    }

    fn body(event_type: EventType, images: &[Vec<u8>]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&[76, 0, 0, 0, 0, 0]);
        b.extend_from_slice(&[1, 0]);
        b.push(2); // column count
        b.push(0b11); // column bitmap
        if event_type == EventType::UpdateRowsV1 {
            b.push(0b11);
        }
        for image in images {
            b.extend_from_slice(image);
        }
        b
    }

    #[test]
    fn write_rows_decodes_one_row_per_image() {
        let b = body(
            EventType::WriteRowsV1,
            &[row_image(7, Some("tea")), row_image(8, Some("chai"))],
        );
        let e = RowsEvent::parse(&registry(76), 6, EventType::WriteRowsV1, &b).unwrap();

        assert_eq!(e.table_id, 76);
        assert_eq!(e.flags, 1);
        assert_eq!(e.column_count, 2);
        assert_eq!(e.column_bitmap_before, [0b11]);
        assert!(e.column_bitmap_after.is_none());
        assert_eq!(
            e.rows,
            vec![
                vec![Value::Int(7), Value::String("tea".into())],
                vec![Value::Int(8), Value::String("chai".into())],
            ]
        );
    }

    #[test]
    fn update_rows_emits_before_after_pairs() {
        let b = body(
            EventType::UpdateRowsV1,
            &[
                row_image(7, Some("tea")),
                row_image(7, Some("oolong")),
                row_image(8, Some("chai")),
                row_image(8, Some("masala chai")),
            ],
        );
        let e = RowsEvent::parse(&registry(76), 6, EventType::UpdateRowsV1, &b).unwrap();

        assert_eq!(e.column_bitmap_after.as_deref(), Some(&[0b11u8][..]));
        assert_eq!(e.rows.len(), 4);
        assert_eq!(e.rows.len() % 2, 0);
        assert_eq!(e.rows[0][1], Value::String("tea".into()));
        assert_eq!(e.rows[1][1], Value::String("oolong".into()));
        assert_eq!(e.rows[3][1], Value::String("masala chai".into()));
    }

    #[test]
    fn null_bits_skip_value_bytes() {
        let b = body(EventType::DeleteRowsV1, &[row_image(9, None)]);
        let e = RowsEvent::parse(&registry(76), 6, EventType::DeleteRowsV1, &b).unwrap();
        assert_eq!(e.rows, vec![vec![Value::Int(9), Value::Null]]);
    }

    #[test]
    fn unknown_table_id_is_an_error() {
        let b = body(EventType::WriteRowsV1, &[row_image(7, Some("tea"))]);
        let err = RowsEvent::parse(&registry(99), 6, EventType::WriteRowsV1, &b).unwrap_err();
        assert!(matches!(err, BinlogError::InvalidTableId(76)), "{err}");
    }

    #[test]
    fn truncated_row_image_is_an_error() {
        let mut b = body(EventType::WriteRowsV1, &[row_image(7, Some("tea"))]);
        b.truncate(b.len() - 2);
        assert!(RowsEvent::parse(&registry(76), 6, EventType::WriteRowsV1, &b).is_err());
    }
}
