//! The bounded hand-off between the ingest task and the consumer.

use tokio::sync::mpsc;

use crate::error::{BinlogError, Result};
use crate::event::EventContainer;

/// Producer half held by the ingest task.
pub(crate) struct StreamSender {
    pub(crate) events: mpsc::Sender<EventContainer>,
    pub(crate) errors: mpsc::Sender<BinlogError>,
}

/// Consumer handle for a running binlog dump.
///
/// Events arrive on a bounded channel, so a slow consumer blocks the
/// ingest task, which stops reading the socket - the primary sees ordinary
/// replication lag. A separate small channel carries the single terminal
/// error; once one has been observed, every later [`next`](Self::next)
/// returns [`BinlogError::StreamClosed`].
#[derive(Debug)]
pub struct EventStream {
    events: mpsc::Receiver<EventContainer>,
    errors: mpsc::Receiver<BinlogError>,
    error_tx: mpsc::Sender<BinlogError>,
    failed: bool,
}

impl EventStream {
    pub(crate) fn channel(event_buffer: usize, error_buffer: usize) -> (StreamSender, EventStream) {
        let (event_tx, event_rx) = mpsc::channel(event_buffer.max(1));
        let (error_tx, error_rx) = mpsc::channel(error_buffer.max(1));
        (
            StreamSender {
                events: event_tx,
                errors: error_tx.clone(),
            },
            EventStream {
                events: event_rx,
                errors: error_rx,
                error_tx,
                failed: false,
            },
        )
    }

    /// Waits for the next event or the terminal error, whichever comes
    /// first.
    pub async fn next(&mut self) -> Result<EventContainer> {
        if self.failed {
            return Err(BinlogError::StreamClosed);
        }

        tokio::select! {
            ev = self.events.recv() => match ev {
                Some(ev) => Ok(ev),
                // Ingest task is gone; the terminal error explains why.
                None => {
                    self.failed = true;
                    match self.errors.try_recv() {
                        Ok(e) => Err(e),
                        Err(_) => Err(BinlogError::StreamClosed),
                    }
                }
            },
            Some(e) = self.errors.recv() => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Marks the stream closed from the consumer side. Posting is
    /// non-blocking; if an error is already queued this is a no-op.
    pub fn close(&mut self) {
        let _ = self.error_tx.try_send(BinlogError::StreamClosed);
    }
}
