//! A single authenticated connection to a MySQL server.
//!
//! The session owns the socket and the packet sequence counter, performs
//! the initial handshake and native-password authentication, and runs text
//! commands (`COM_QUERY`) for the handful of bootstrap queries a follower
//! needs. Everything else - registration, the dump command, the event
//! stream - is driven through the packet-level methods by the client layer.

mod result;

pub use result::{Field, QueryResult, SqlValue};

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::auth::scramble41;
use crate::error::{BinlogError, Result};
use crate::protocol::codec::{get_length_encoded_int, get_u16_le};
use crate::protocol::framing;
use crate::protocol::packets::{
    self, CLIENT_PROTOCOL_41, ERR_HEADER, LOCAL_INFILE_HEADER, OK_HEADER, OkPacket,
};
use result::parse_text_row;

const INITIAL_PACKET_BUFFER_SIZE: usize = 4 * 1024;

/// Session over a TCP socket, the only flavor used outside of tests.
pub type TcpSession = Session<BufReader<TcpStream>>;

/// An authenticated MySQL client session.
pub struct Session<S> {
    stream: S,
    seq: u8,
    capability: u32,
    status: u16,
    connection_id: u32,
    salt: Vec<u8>,
}

impl Session<BufReader<TcpStream>> {
    /// Dials `host:port` within `connect_timeout`, then performs the
    /// handshake and authenticates with `mysql_native_password`.
    ///
    /// `db` selects a default schema when non-empty; the follower passes
    /// an empty string.
    pub async fn connect(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        db: &str,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let tcp = timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| BinlogError::Io(format!("connect to {host}:{port} timed out")))??;
        tcp.set_nodelay(true)?;

        let stream = BufReader::with_capacity(INITIAL_PACKET_BUFFER_SIZE, tcp);
        let mut session = Session::from_stream(stream);
        session.handshake(user, password, db).await?;
        debug!(connection_id = session.connection_id, "session established");
        Ok(session)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Wraps an already-connected stream; the caller still runs
    /// [`handshake`](Self::handshake).
    pub fn from_stream(stream: S) -> Self {
        Session {
            stream,
            seq: 0,
            capability: 0,
            status: 0,
            connection_id: 0,
            salt: Vec::new(),
        }
    }

    /// Remote capability flags after negotiation.
    pub fn capability(&self) -> u32 {
        self.capability
    }

    /// Last status flags reported by the server.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Connection id assigned by the server during the handshake.
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Runs the connection handshake: parse the server greeting, send the
    /// auth response, await OK.
    pub async fn handshake(&mut self, user: &str, password: &str, db: &str) -> Result<()> {
        let greeting = self.read_packet().await?;
        let hs = packets::parse_initial_handshake(&greeting)?;
        self.connection_id = hs.connection_id;
        self.status = hs.status;
        self.salt = hs.salt;

        let token = scramble41(&self.salt, password.as_bytes());
        let (mut auth, capability) = packets::make_auth_handshake(hs.capability, user, &token, db);
        self.capability = capability;
        self.write_packet(&mut auth).await?;

        self.read_ok_packet().await.map_err(|e| match e {
            BinlogError::Command(msg) => BinlogError::Auth(msg),
            other => other,
        })?;
        Ok(())
    }

    /// Runs a text command (`COM_QUERY`) and reads its full reply.
    pub async fn execute(&mut self, query: &str) -> Result<QueryResult> {
        self.reset_sequence();
        let mut cmd = packets::make_command_with_arg(packets::COM_QUERY, query);
        self.write_packet(&mut cmd).await?;
        self.read_result().await
    }

    /// Resets the sequence counter; required before every new command.
    pub(crate) fn reset_sequence(&mut self) {
        self.seq = 0;
    }

    /// Resets the sequence counter and writes a prebuilt command packet.
    pub(crate) async fn send_command(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reset_sequence();
        self.write_packet(buf).await
    }

    pub(crate) async fn read_packet(&mut self) -> Result<Vec<u8>> {
        framing::read_packet(&mut self.stream, &mut self.seq).await
    }

    pub(crate) async fn write_packet(&mut self, buf: &mut [u8]) -> Result<()> {
        framing::write_packet(&mut self.stream, buf, &mut self.seq).await
    }

    /// Reads one packet and requires it to be OK; ERR packets are decoded
    /// and surfaced as [`BinlogError::Command`].
    pub(crate) async fn read_ok_packet(&mut self) -> Result<OkPacket> {
        let b = self.read_packet().await?;
        match b[0] {
            OK_HEADER => {
                let ok = packets::parse_ok_packet(&b, self.capability)?;
                self.status = ok.status;
                Ok(ok)
            }
            ERR_HEADER => Err(BinlogError::Command(packets::parse_err_packet_body(
                &b,
                self.capability,
            ))),
            _ => Err(BinlogError::Packet("invalid ok packet".into())),
        }
    }

    /// Decodes a server error packet with this session's capabilities.
    pub(crate) fn decode_err_packet(&self, b: &[u8]) -> BinlogError {
        BinlogError::Command(packets::parse_err_packet_body(b, self.capability))
    }

    async fn read_result(&mut self) -> Result<QueryResult> {
        let b = self.read_packet().await?;
        match b[0] {
            OK_HEADER => {
                let ok = packets::parse_ok_packet(&b, self.capability)?;
                self.status = ok.status;
                Ok(QueryResult {
                    status: ok.status,
                    affected_rows: ok.affected_rows,
                    last_insert_id: ok.last_insert_id,
                    ..Default::default()
                })
            }
            ERR_HEADER => Err(self.decode_err_packet(&b)),
            LOCAL_INFILE_HEADER => Err(BinlogError::Packet(
                "unexpected LOCAL INFILE request".into(),
            )),
            _ => self.read_resultset(&b).await,
        }
    }

    async fn read_resultset(&mut self, first: &[u8]) -> Result<QueryResult> {
        let count = get_length_encoded_int(first)?;
        if count.consumed != first.len() {
            return Err(BinlogError::Packet("malformed column count packet".into()));
        }
        let column_count = count.value as usize;

        let mut result = QueryResult::default();
        result.fields.reserve(column_count);

        // Column definitions, terminated by EOF.
        loop {
            let b = self.read_packet().await?;
            if packets::is_eof_packet(&b) {
                self.note_eof_status(&b, &mut result);
                if result.fields.len() != column_count {
                    return Err(BinlogError::Packet(format!(
                        "expected {column_count} columns, got {}",
                        result.fields.len()
                    )));
                }
                break;
            }
            result.fields.push(Field::parse(&b)?);
        }

        // Rows, terminated by EOF.
        loop {
            let b = self.read_packet().await?;
            if packets::is_eof_packet(&b) {
                self.note_eof_status(&b, &mut result);
                break;
            }
            if b[0] == ERR_HEADER {
                return Err(self.decode_err_packet(&b));
            }
            let row = parse_text_row(&b, &result.fields)?;
            result.rows.push(row);
        }

        Ok(result)
    }

    fn note_eof_status(&mut self, b: &[u8], result: &mut QueryResult) {
        // EOF carries warnings (2) + status (2) in protocol 4.1.
        if self.capability & CLIENT_PROTOCOL_41 != 0 && b.len() >= 5 {
            result.status = get_u16_le(&b[3..]);
            self.status = result.status;
        }
    }
}
