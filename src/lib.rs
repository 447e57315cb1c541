//! # binlog-follower
//!
//! A Tokio-based MySQL replication follower: it impersonates a secondary
//! server, streams the primary's binary log, and hands back committed
//! changes as parsed events.
//!
//! ## Features
//!
//! - **Async/await** - built on Tokio for non-blocking I/O
//! - **Native auth** - `mysql_native_password` challenge-response
//! - **Stateful decoding** - format-description tracking, table-map
//!   registry, row images decoded per column type and metadata
//! - **Semi-sync** - acknowledges positions when the primary asks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use binlog_follower::{Event, Follower};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut follower = Follower::new(1077);
//! follower.register("127.0.0.1", 3306, "repl", "secret").await?;
//!
//! let pos = follower.leader_position().await?;
//! let mut stream = follower.start_sync(pos).await?;
//!
//! loop {
//!     let container = stream.next().await?;
//!     match container.event {
//!         Event::Rows(rows) => println!("{} row image(s)", rows.rows.len()),
//!         Event::Query(q) => println!("query: {}", q.query),
//!         Event::Xid(x) => println!("commit, xid {}", x.xid),
//!         _ => {}
//!     }
//!     // Checkpoint follower.next_position() at commit boundaries.
//! }
//! # }
//! ```
//!
//! ## Scope
//!
//! The caller owns checkpoints; the crate keeps no persistent state and
//! does not retry. TLS, GTID-based dumps, rows v2 and non-native auth
//! plugins are out of scope; unknown event types pass through undecoded.

#![warn(
    clippy::all,
    clippy::perf,
    clippy::style,
    clippy::correctness,
    clippy::suspicious
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod position;
pub mod protocol;
pub mod session;

pub use client::{EventStream, Follower};
pub use config::FollowerConfig;
pub use error::{BinlogError, Result};
pub use event::{Event, EventContainer, EventHeader, EventType, Value};
pub use position::Position;
