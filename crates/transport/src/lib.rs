//! Transport boundary for the Strata remote client
//!
//! A session talks to each cluster member through one [`Channel`]: a
//! synchronous, ordered request/response link. This crate defines
//!
//! - [`Op`]: the command identifiers of the remote protocol
//! - [`Request`] / [`Response`] / [`Reply`]: the messages exchanged
//! - [`Channel`]: the trait a physical transport implements, plus typed
//!   helpers on `dyn Channel` for every round trip the client performs
//! - [`testing`]: an in-memory cluster member with fault injection
//!
//! Byte-level framing and socket management live behind the trait and are
//! not part of this crate.

#![warn(missing_docs)]

pub mod channel;
pub mod protocol;
pub mod testing;

pub use channel::{Channel, ChannelRef};
pub use protocol::{Op, Prepared, Reply, Request, Response, ResultHeader, UpdateOutcome};
