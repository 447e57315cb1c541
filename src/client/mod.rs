//! The replication client: follower lifecycle and event delivery.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    EventStream    ┌─────────────────┐
//! │                 │◄─────────────────│                 │
//! │  Your App       │   EventContainer  │  Ingest Task    │
//! │                 │                   │ (Session +      │
//! │                 │    close()        │  EventDecoder)  │
//! └─────────────────┘──────────────────►└────────┬────────┘
//!                                                │
//!                                                │ TCP
//!                                                ▼
//!                                       ┌─────────────────┐
//!                                       │  MySQL primary  │
//!                                       │  (binlog dump)  │
//!                                       └─────────────────┘
//! ```
//!
//! The ingest task exclusively owns the session and decoder once the dump
//! starts; the consumer only touches the [`EventStream`]. Events are
//! delivered in wire order with no reordering or coalescing, and the
//! bounded channel makes a slow consumer surface to the primary as
//! ordinary replication lag.

mod follower;
mod stream;

pub use follower::Follower;
pub use stream::EventStream;
