//! MySQL packet framing.
//!
//! Every unit on the wire is a packet: a 3-byte little-endian payload
//! length, a 1-byte sequence number, then the payload. Payloads of
//! [`MAX_PAYLOAD_LEN`] bytes signal that the logical payload continues in
//! the next packet; the reader reassembles fragments until it sees one
//! below the boundary.
//!
//! The sequence counter belongs to the session, not to this module: both
//! sides increment it per fragment and reset it in lockstep at each new
//! command. During a binlog dump it is never reset and simply wraps.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{BinlogError, Result};

/// Largest payload a single packet can carry (2^24 - 1).
pub const MAX_PAYLOAD_LEN: usize = 0xFF_FFFF;

/// Space callers must reserve at the front of a write buffer; the packet
/// header is filled in place.
pub const PACKET_HEADER_LEN: usize = 4;

/// Reads one logical packet, reassembling 16 MiB fragments.
///
/// Each fragment's sequence byte must equal `*seq`, which is incremented
/// per fragment (not per logical packet). A zero payload length and a
/// sequence mismatch both fail with [`BinlogError::Framing`].
pub async fn read_packet<R: AsyncRead + Unpin>(rd: &mut R, seq: &mut u8) -> Result<Vec<u8>> {
    let mut payload = Vec::new();

    loop {
        let mut header = [0u8; PACKET_HEADER_LEN];
        rd.read_exact(&mut header).await?;

        let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
        if len == 0 {
            return Err(BinlogError::Framing("invalid payload length 0".into()));
        }

        let sequence = header[3];
        if sequence != *seq {
            return Err(BinlogError::Framing(format!(
                "out-of-order packet: sequence {sequence} != {}",
                *seq
            )));
        }
        *seq = seq.wrapping_add(1);

        let start = payload.len();
        payload.resize(start + len, 0);
        rd.read_exact(&mut payload[start..]).await?;

        if len < MAX_PAYLOAD_LEN {
            return Ok(payload);
        }
    }
}

/// Writes one logical packet.
///
/// `buf` must start with [`PACKET_HEADER_LEN`] reserved bytes; the payload
/// body begins at offset 4. Payloads of 16 MiB or more are split into
/// maximum-size fragments, each with its own in-place header and sequence.
pub async fn write_packet<W: AsyncWrite + Unpin>(
    wr: &mut W,
    buf: &mut [u8],
    seq: &mut u8,
) -> Result<()> {
    debug_assert!(buf.len() >= PACKET_HEADER_LEN);

    let mut data = buf;
    let mut payload_len = data.len() - PACKET_HEADER_LEN;

    while payload_len >= MAX_PAYLOAD_LEN {
        data[0] = 0xFF;
        data[1] = 0xFF;
        data[2] = 0xFF;
        data[3] = *seq;
        wr.write_all(&data[..PACKET_HEADER_LEN + MAX_PAYLOAD_LEN])
            .await?;
        *seq = seq.wrapping_add(1);

        payload_len -= MAX_PAYLOAD_LEN;
        // The last 4 already-written payload bytes become the next header.
        let rest = std::mem::take(&mut data);
        data = &mut rest[MAX_PAYLOAD_LEN..];
    }

    data[0] = payload_len as u8;
    data[1] = (payload_len >> 8) as u8;
    data[2] = (payload_len >> 16) as u8;
    data[3] = *seq;
    wr.write_all(data).await?;
    *seq = seq.wrapping_add(1);

    wr.flush().await?;
    Ok(())
}
