//! MySQL client/server wire protocol.
//!
//! This module provides low-level primitives for:
//! - Byte-level codecs shared by the protocol and the binlog ([`codec`])
//! - Reading and writing framed packets ([`framing`])
//! - Packet payloads: handshake, OK/ERR/EOF, commands ([`packets`])
//!
//! # Wire Protocol Overview
//!
//! Every unit on the wire is a packet:
//! - 3 bytes: payload length (little-endian)
//! - 1 byte: sequence number
//! - N bytes: payload
//!
//! Payloads of 16 MiB - 1 bytes continue in the next packet. Both sides
//! keep a sequence counter that resets at each new command and otherwise
//! increments per packet - including across the tens of thousands of
//! events of a binlog dump, where it simply wraps.

pub mod codec;
pub mod column;
pub mod framing;
pub mod packets;

pub use framing::{MAX_PAYLOAD_LEN, PACKET_HEADER_LEN, read_packet, write_packet};
pub use packets::{
    InitialHandshake, OkPacket, is_eof_packet, parse_err_packet_body, parse_initial_handshake,
    parse_ok_packet,
};
