//! MySQL packet payloads: handshake parsing, response classification, and
//! command builders.
//!
//! Command builders return buffers with [`PACKET_HEADER_LEN`] reserved
//! bytes at the front so [`write_packet`](super::framing::write_packet) can
//! fill the frame header in place.

use bytes::BufMut;

use crate::error::{BinlogError, Result};
use crate::position::Position;
use crate::protocol::codec::{get_length_encoded_int, get_u16_le, get_u32_le};
use crate::protocol::framing::PACKET_HEADER_LEN;

/// First byte of an OK response; also prefixes every streamed binlog event.
pub const OK_HEADER: u8 = 0x00;
/// First byte of an ERR response.
pub const ERR_HEADER: u8 = 0xFF;
/// First byte of an EOF packet (when the payload is at most 5 bytes).
pub const EOF_HEADER: u8 = 0xFE;
/// First byte of a LOCAL INFILE request, which this crate never issues.
pub const LOCAL_INFILE_HEADER: u8 = 0xFB;
/// Prefix on streamed events when the semi-sync extension is active.
pub const SEMI_SYNC_INDICATOR: u8 = 0xEF;

pub const COM_QUERY: u8 = 0x03;
pub const COM_BINLOG_DUMP: u8 = 0x12;
pub const COM_REGISTER_SLAVE: u8 = 0x15;

/// Dump flag: block at the end of the log instead of returning EOF.
pub const BINLOG_DUMP_NEVER_STOP: u16 = 0x00;

// Capability flags (the subset this crate negotiates).
pub const CLIENT_LONG_PASSWORD: u32 = 0x0000_0001;
pub const CLIENT_LONG_FLAG: u32 = 0x0000_0004;
pub const CLIENT_CONNECT_WITH_DB: u32 = 0x0000_0008;
pub const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;
pub const CLIENT_TRANSACTIONS: u32 = 0x0000_2000;
pub const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;

/// utf8mb4 general collation, sent as the client charset.
pub const DEFAULT_COLLATION_ID: u8 = 33;

/// Oldest protocol version we understand (MySQL 3.22+ sends 10).
pub const MIN_PROTOCOL_VERSION: u8 = 10;

/// Parsed server greeting (the "handshake initialization packet").
#[derive(Debug, Clone)]
pub struct InitialHandshake {
    pub connection_id: u32,
    pub capability: u32,
    pub status: u16,
    /// 20-byte auth challenge; old servers send only the first 8 bytes.
    pub salt: Vec<u8>,
}

/// Parses the server greeting.
///
/// Layout: protocol version (1), null-terminated server version,
/// connection id (4), salt part 1 (8), filler (1), lower capability flags
/// (2), then optionally: charset (1), status (2), upper capability flags
/// (2), auth-data length (1), 10 reserved bytes, salt part 2 (12).
pub fn parse_initial_handshake(b: &[u8]) -> Result<InitialHandshake> {
    if b.is_empty() {
        return Err(BinlogError::Handshake("empty handshake packet".into()));
    }
    if b[0] == ERR_HEADER {
        return Err(BinlogError::Handshake(parse_err_packet_body(b, 0)));
    }
    if b[0] < MIN_PROTOCOL_VERSION {
        return Err(BinlogError::Handshake(format!(
            "invalid protocol version {}, must be >= {MIN_PROTOCOL_VERSION}",
            b[0]
        )));
    }

    // Skip protocol version and the null-terminated server version string.
    let version_end = b[1..]
        .iter()
        .position(|&c| c == 0)
        .ok_or_else(|| BinlogError::Handshake("unterminated server version".into()))?;
    let mut i = 1 + version_end + 1;

    if b.len() < i + 4 + 8 + 1 + 2 {
        return Err(BinlogError::Handshake("handshake packet too short".into()));
    }

    let connection_id = get_u32_le(&b[i..]);
    i += 4;

    let mut salt = b[i..i + 8].to_vec();
    i += 8;

    // Filler null byte.
    i += 1;

    let mut capability = u32::from(get_u16_le(&b[i..]));
    i += 2;

    let mut status = 0u16;
    if b.len() > i {
        // Skip server charset.
        i += 1;

        status = get_u16_le(&b[i..]);
        i += 2;

        capability |= u32::from(get_u16_le(&b[i..])) << 16;
        i += 2;

        // Skip auth-data length and 10 reserved bytes.
        i += 1 + 10;

        if b.len() < i + 12 {
            return Err(BinlogError::Handshake("handshake salt truncated".into()));
        }
        salt.extend_from_slice(&b[i..i + 12]);
    }

    Ok(InitialHandshake {
        connection_id,
        capability,
        status,
        salt,
    })
}

/// Builds the handshake response ("auth packet") payload.
///
/// Capabilities are the intersection of what we support with what the
/// server offered, plus `CONNECT_WITH_DB` when a default schema is given.
/// Returns the negotiated capabilities along with the framed buffer.
pub fn make_auth_handshake(
    server_capability: u32,
    user: &str,
    scramble: &[u8],
    db: &str,
) -> (Vec<u8>, u32) {
    let mut capability = CLIENT_PROTOCOL_41
        | CLIENT_SECURE_CONNECTION
        | CLIENT_LONG_PASSWORD
        | CLIENT_TRANSACTIONS
        | CLIENT_LONG_FLAG;
    capability &= server_capability;
    if !db.is_empty() {
        capability |= CLIENT_CONNECT_WITH_DB;
    }

    let mut b = Vec::with_capacity(PACKET_HEADER_LEN + 32 + 23 + user.len() + scramble.len() + db.len());
    b.resize(PACKET_HEADER_LEN, 0);

    // Client capability flags (4 bytes)
    b.put_u32_le(capability);

    // Max packet size (4 bytes, unused)
    b.put_u32_le(0);

    // Client charset (1 byte)
    b.put_u8(DEFAULT_COLLATION_ID);

    // Filler (23 bytes, all zero)
    b.extend_from_slice(&[0u8; 23]);

    // Username (null-terminated)
    b.extend_from_slice(user.as_bytes());
    b.put_u8(0);

    // Auth token (length-prefixed; empty password yields length 0)
    b.put_u8(scramble.len() as u8);
    b.extend_from_slice(scramble);

    // Default schema (null-terminated, only when requested)
    if !db.is_empty() {
        b.extend_from_slice(db.as_bytes());
        b.put_u8(0);
    }

    (b, capability)
}

/// Builds a command packet carrying a single string argument.
pub fn make_command_with_arg(command: u8, arg: &str) -> Vec<u8> {
    let mut b = Vec::with_capacity(PACKET_HEADER_LEN + 1 + arg.len());
    b.resize(PACKET_HEADER_LEN, 0);
    b.put_u8(command);
    b.extend_from_slice(arg.as_bytes());
    b
}

/// Builds `COM_REGISTER_SLAVE`: follower id, then length-prefixed hostname,
/// user and password, the follower's port, a zero replication rank, and the
/// master id.
pub fn make_register_follower(
    hostname: &str,
    port: u16,
    user: &str,
    password: &str,
    follower_id: u32,
    master_id: u32,
) -> Vec<u8> {
    let mut b = Vec::with_capacity(
        PACKET_HEADER_LEN + 1 + 4 + 1 + hostname.len() + 1 + user.len() + 1 + password.len() + 2 + 4 + 4,
    );
    b.resize(PACKET_HEADER_LEN, 0);

    b.put_u8(COM_REGISTER_SLAVE);
    b.put_u32_le(follower_id);

    // The follower's own hostname, not the primary's.
    b.put_u8(hostname.len() as u8);
    b.extend_from_slice(hostname.as_bytes());

    b.put_u8(user.len() as u8);
    b.extend_from_slice(user.as_bytes());

    b.put_u8(password.len() as u8);
    b.extend_from_slice(password.as_bytes());

    b.put_u16_le(port);

    // Replication rank (unused)
    b.put_u32_le(0);

    b.put_u32_le(master_id);
    b
}

/// Builds `COM_BINLOG_DUMP`: start offset, dump flags, follower id, and the
/// binlog file name (not null-terminated).
pub fn make_binlog_dump(pos: &Position, follower_id: u32) -> Vec<u8> {
    let mut b = Vec::with_capacity(PACKET_HEADER_LEN + 1 + 4 + 2 + 4 + pos.name.len());
    b.resize(PACKET_HEADER_LEN, 0);

    b.put_u8(COM_BINLOG_DUMP);
    b.put_u32_le(pos.pos);
    b.put_u16_le(BINLOG_DUMP_NEVER_STOP);
    b.put_u32_le(follower_id);
    b.extend_from_slice(pos.name.as_bytes());
    b
}

/// Builds a semi-sync acknowledgement: indicator byte, 8-byte little-endian
/// offset, file name.
pub fn make_semi_sync_ack(pos: &Position) -> Vec<u8> {
    let mut b = Vec::with_capacity(PACKET_HEADER_LEN + 1 + 8 + pos.name.len());
    b.resize(PACKET_HEADER_LEN, 0);

    b.put_u8(SEMI_SYNC_INDICATOR);
    b.put_u64_le(u64::from(pos.pos));
    b.extend_from_slice(pos.name.as_bytes());
    b
}

/// An EOF packet starts with `0xFE` but is capped at 5 bytes; longer
/// payloads beginning with `0xFE` are length-encoded row data.
pub fn is_eof_packet(b: &[u8]) -> bool {
    !b.is_empty() && b[0] == EOF_HEADER && b.len() <= 5
}

/// Fields of a decoded OK packet.
#[derive(Debug, Clone, Default)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status: u16,
}

/// Decodes an OK packet body (first byte already verified as `0x00`).
pub fn parse_ok_packet(b: &[u8], capability: u32) -> Result<OkPacket> {
    let mut i = 1;

    let affected = get_length_encoded_int(&b[i..])?;
    i += affected.consumed;

    let insert_id = get_length_encoded_int(&b[i..])?;
    i += insert_id.consumed;

    let mut status = 0;
    if capability & (CLIENT_PROTOCOL_41 | CLIENT_TRANSACTIONS) != 0 {
        if b.len() < i + 2 {
            return Err(BinlogError::Packet("ok packet truncated".into()));
        }
        status = get_u16_le(&b[i..]);
    }

    // The human-readable info tail is ignored.
    Ok(OkPacket {
        affected_rows: affected.value,
        last_insert_id: insert_id.value,
        status,
    })
}

/// Decodes an ERR packet into `code`, optional SQL state, and message.
///
/// Layout after the `0xFF` marker: 2-byte error code, then (protocol 4.1)
/// a `#` marker and 5-byte SQL state, then the message as the remainder.
pub fn parse_err_packet_body(b: &[u8], capability: u32) -> String {
    if b.len() < 3 {
        return "truncated error packet".to_string();
    }
    let code = get_u16_le(&b[1..]);
    let mut i = 3;

    let mut sql_state = None;
    if capability & CLIENT_PROTOCOL_41 != 0 && b.len() > i && b[i] == b'#' {
        if b.len() >= i + 6 {
            sql_state = Some(String::from_utf8_lossy(&b[i + 1..i + 6]).to_string());
        }
        i += 6;
    }

    let message = String::from_utf8_lossy(&b[i.min(b.len())..]).to_string();
    match sql_state {
        Some(state) => format!("ERROR {code} ({state}): {message}"),
        None => format!("ERROR {code}: {message}"),
    }
}
