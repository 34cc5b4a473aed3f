//! # Strata Remote Executor
//!
//! Client-side lifecycle of SQL commands against a single server or a
//! replicated cluster.
//!
//! - [`RemoteCommand`]: prepare, execute, describe, close and cancel
//! - [`Parameter`]: positional parameters with their declared metadata
//! - [`RemoteResult`]: a result cursor streamed from one server
//! - [`CancelHandle`]: cancel a running command from another thread
//!
//! ## Quick Start
//!
//! ```text
//! use strata_remote_executor::RemoteCommand;
//! use strata_remote_session::{ClientConfig, RemoteSession};
//!
//! let session = RemoteSession::connect(channels, ClientConfig::default())?;
//! let mut insert = RemoteCommand::prepare(&session, "INSERT INTO T VALUES(?)")?;
//! insert.set_parameter(0, 42)?;
//! let updated = insert.execute_update()?;
//!
//! let mut select = RemoteCommand::prepare(&session, "SELECT * FROM T")?;
//! let mut result = select.execute_query(0, false)?;
//! while let Some(row) = result.next_row()? {
//!     println!("{:?}", row);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod parameter;
pub mod result;

#[cfg(test)]
mod tests;

pub use command::{CancelHandle, RemoteCommand};
pub use parameter::Parameter;
pub use result::RemoteResult;
