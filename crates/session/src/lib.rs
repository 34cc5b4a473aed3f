//! Session layer for the Strata remote client
//!
//! This crate owns everything shared by the commands of one session:
//! - [`ClientConfig`]: client settings loaded from `strata-remote.toml`
//! - [`RemoteSession`]: the shared handle, its lock and out-of-band cancel
//! - [`SessionState`]: channel list, id allocation, reconnect epoch and
//!   autocommit bookkeeping
//! - Failover: [`SessionState::visit_channels`] drops servers that fail at
//!   the transport level and continues on the survivors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
mod failover;
pub mod session;
pub mod state;

pub use config::{ClientConfig, CONFIG_FILE_NAME};
pub use session::{RemoteSession, SessionGuard};
pub use state::SessionState;
