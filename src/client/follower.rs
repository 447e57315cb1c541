//! The replication follower: session lifecycle plus the ingest task that
//! pumps the binlog dump into an [`EventStream`].

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::config::FollowerConfig;
use crate::error::{BinlogError, Result};
use crate::event::decoder::EventDecoder;
use crate::event::Event;
use crate::position::Position;
use crate::protocol::packets::{self, ERR_HEADER, OK_HEADER, SEMI_SYNC_INDICATOR};
use crate::session::{Session, TcpSession};

use super::stream::{EventStream, StreamSender};

/// Impersonates a replication secondary ("slave") to a MySQL primary and
/// streams its binlog.
///
/// Lifecycle: [`register`](Self::register), optionally
/// [`leader_position`](Self::leader_position), then
/// [`start_sync`](Self::start_sync) to obtain an [`EventStream`].
/// [`close`](Self::close) stops the ingest task; a new `register` is
/// required before syncing again.
pub struct Follower {
    cfg: FollowerConfig,
    host: String,
    port: u16,
    user: String,
    password: String,
    session: Option<TcpSession>,
    running: bool,
    next_position: Arc<Mutex<Position>>,
    stop_tx: Option<watch::Sender<bool>>,
    join: Option<JoinHandle<()>>,
}

impl Follower {
    /// Creates a follower with default tunables.
    ///
    /// `follower_id` must be unique among all followers of the same
    /// primary; colliding ids make the primary drop one of the sessions.
    pub fn new(follower_id: u32) -> Follower {
        Follower::with_config(FollowerConfig::new(follower_id))
    }

    pub fn with_config(cfg: FollowerConfig) -> Follower {
        Follower {
            cfg,
            host: String::new(),
            port: 0,
            user: String::new(),
            password: String::new(),
            session: None,
            running: false,
            next_position: Arc::new(Mutex::new(Position::default())),
            stop_tx: None,
            join: None,
        }
    }

    /// The hostname reported to the primary during registration.
    pub fn hostname(&self) -> String {
        match &self.cfg.hostname {
            Some(h) => h.clone(),
            None => std::env::var("HOSTNAME").unwrap_or_default(),
        }
    }

    /// The stream position after the last successfully decoded event;
    /// callers checkpoint this to resume after [`close`](Self::close) or a
    /// stream error.
    pub fn next_position(&self) -> Position {
        self.next_position.lock().expect("position lock").clone()
    }

    /// Closes any existing replication session, opens a new one, disables
    /// binlog checksums when the primary has them on, and registers this
    /// follower.
    pub async fn register(
        &mut self,
        host: &str,
        port: u16,
        user: &str,
        password: &str,
    ) -> Result<()> {
        self.close().await;

        self.host = host.to_string();
        self.port = port;
        self.user = user.to_string();
        self.password = password.to_string();

        let result = self.register_inner().await;
        if result.is_err() {
            self.close().await;
        }
        result
    }

    async fn register_inner(&mut self) -> Result<()> {
        let mut session = Session::connect(
            &self.host,
            self.port,
            &self.user,
            &self.password,
            "",
            self.cfg.connect_timeout,
        )
        .await?;

        // This implementation does not verify event checksums, so have the
        // primary stop sending them. 5.6.1+ primaries that ignore the
        // directive are handled by the decoder's trailer stripping.
        let result = session
            .execute("SHOW GLOBAL VARIABLES LIKE 'BINLOG_CHECKSUM'")
            .await?;
        if !result.rows.is_empty() && !result.string(0, 1)?.is_empty() {
            session.execute("SET @master_binlog_checksum='NONE'").await?;
        }

        let mut cmd = packets::make_register_follower(
            &self.hostname(),
            self.port,
            &self.user,
            &self.password,
            self.cfg.follower_id,
            self.cfg.master_id,
        );
        session.send_command(&mut cmd).await?;
        session.read_ok_packet().await?;

        debug!(follower_id = self.cfg.follower_id, "registered with primary");
        self.session = Some(session);
        Ok(())
    }

    /// Asks the primary for its current binlog file and write offset
    /// (`SHOW MASTER STATUS`).
    pub async fn leader_position(&mut self) -> Result<Position> {
        let session = self.usable_session()?;
        let result = session.execute("SHOW MASTER STATUS").await?;
        let name = result.string(0, 0)?;
        let pos = result.u64(0, 1)? as u32;
        Ok(Position::new(name, pos))
    }

    /// Issues `COM_BINLOG_DUMP` from `pos` (clamped past the binlog magic
    /// header) and spawns the ingest task. The returned stream yields
    /// events until a terminal error or [`close`](Self::close).
    pub async fn start_sync(&mut self, pos: Position) -> Result<EventStream> {
        let pos = pos.clamped();
        let follower_id = self.cfg.follower_id;
        let session = self.usable_session()?;

        let mut cmd = packets::make_binlog_dump(&pos, follower_id);
        session.send_command(&mut cmd).await?;

        debug!(%pos, "binlog dump started");
        *self.next_position.lock().expect("position lock") = pos;

        let (sender, stream) = EventStream::channel(self.cfg.event_buffer, self.cfg.error_buffer);
        let (stop_tx, stop_rx) = watch::channel(false);

        let worker = IngestWorker {
            session: self.session.take().expect("session checked above"),
            decoder: EventDecoder::new(),
            sender,
            stop_rx,
            semi_sync: self.cfg.semi_sync,
            next_position: Arc::clone(&self.next_position),
        };
        self.join = Some(tokio::spawn(worker.run()));
        self.stop_tx = Some(stop_tx);
        self.running = true;

        Ok(stream)
    }

    /// Signals the ingest task to stop, waits for it to exit, and drops
    /// the connection.
    pub async fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
        self.session = None;
        self.running = false;
    }

    fn usable_session(&mut self) -> Result<&mut TcpSession> {
        if self.running {
            return Err(BinlogError::Internal(
                "sync is running, close the follower first".into(),
            ));
        }
        self.session
            .as_mut()
            .ok_or_else(|| BinlogError::Internal("follower is not registered".into()))
    }
}

/// Owns the session and decoder for the duration of one dump.
struct IngestWorker {
    session: TcpSession,
    decoder: EventDecoder,
    sender: StreamSender,
    stop_rx: watch::Receiver<bool>,
    semi_sync: bool,
    next_position: Arc<Mutex<Position>>,
}

impl IngestWorker {
    async fn run(mut self) {
        if let Err(e) = self.ingest_loop().await {
            if !matches!(e, BinlogError::StreamClosed) {
                error!("binlog ingest terminated: {e}");
            }
            let _ = self.sender.errors.try_send(e);
        }
    }

    async fn ingest_loop(&mut self) -> Result<()> {
        loop {
            let packet = tokio::select! {
                _ = self.stop_rx.changed() => return Err(BinlogError::StreamClosed),
                packet = self.session.read_packet() => packet?,
            };

            match packet[0] {
                OK_HEADER => self.handle_event(packet).await?,
                ERR_HEADER => return Err(self.session.decode_err_packet(&packet)),
                other => {
                    return Err(BinlogError::Packet(format!(
                        "invalid stream header {other:#04x}"
                    )));
                }
            }
        }
    }

    async fn handle_event(&mut self, packet: Vec<u8>) -> Result<()> {
        // The dump stream prepends every event with an OK byte.
        let mut offset = 1;

        let mut need_ack = false;
        if self.semi_sync && packet.get(offset) == Some(&SEMI_SYNC_INDICATOR) {
            need_ack = packet.get(offset + 1) == Some(&0x01);
            offset += 2;
        }

        let container = self.decoder.parse(Bytes::from(packet).slice(offset..))?;

        let ack_position = {
            let mut pos = self.next_position.lock().expect("position lock");
            pos.pos = container.header.log_pos;
            if let Event::Rotate(rotate) = &container.event {
                pos.name = rotate.next_file.clone();
                pos.pos = rotate.next_position as u32;
                debug!(next = %*pos, "binlog rotated");
            }
            pos.clone()
        };
        trace!(pos = %ack_position, "event decoded");

        tokio::select! {
            sent = self.sender.events.send(container) => {
                if sent.is_err() {
                    // Consumer dropped the stream.
                    return Err(BinlogError::StreamClosed);
                }
            }
            _ = self.stop_rx.changed() => return Err(BinlogError::StreamClosed),
        }

        if need_ack {
            self.reply_semi_sync_ack(&ack_position).await?;
        }
        Ok(())
    }

    async fn reply_semi_sync_ack(&mut self, pos: &Position) -> Result<()> {
        let mut ack = packets::make_semi_sync_ack(pos);
        self.session.send_command(&mut ack).await?;
        self.session.read_ok_packet().await?;
        Ok(())
    }
}
