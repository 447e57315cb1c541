use std::time::Duration;

/// Tunables for a [`Follower`](crate::Follower).
///
/// The follower id must be unique among all followers of the same primary;
/// if two followers register with the same id, the primary drops one of the
/// conflicting sessions.
#[derive(Debug, Clone)]
pub struct FollowerConfig {
    /// Server id this follower registers as. Must be unique per primary.
    pub follower_id: u32,

    /// Hostname reported in `COM_REGISTER_SLAVE`. When `None`, the value of
    /// `$HOSTNAME` is used if set, otherwise an empty string (the primary
    /// accepts an anonymous registration).
    pub hostname: Option<String>,

    /// Master id reported in `COM_REGISTER_SLAVE`; conventionally 0.
    pub master_id: u32,

    /// Whether to watch for the semi-sync indicator on streamed events and
    /// acknowledge positions when the primary asks for it.
    pub semi_sync: bool,

    /// TCP connect deadline.
    pub connect_timeout: Duration,

    /// Bounded buffer size (#events) between the ingest task and consumer.
    pub event_buffer: usize,

    /// Bounded buffer size for the terminal error channel.
    pub error_buffer: usize,
}

impl FollowerConfig {
    pub fn new(follower_id: u32) -> Self {
        FollowerConfig {
            follower_id,
            ..Default::default()
        }
    }
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            follower_id: 0,
            hostname: None,
            master_id: 0,
            semi_sync: false,
            connect_timeout: Duration::from_secs(10),
            event_buffer: 1024,
            error_buffer: 4,
        }
    }
}
