//! StrataDB Remote - cluster-aware SQL client
//!
//! A session talks to one server or to every member of a replicated
//! cluster. Commands are prepared on every member; read-only queries are
//! answered by the first reachable member, everything else runs on all of
//! them. Members that fail at the transport level are dropped from the
//! session and never asked again.
//!
//! # Quick Start
//!
//! ```ignore
//! use stratadb_remote::{ClientConfig, RemoteCommand, RemoteSession};
//!
//! let session = RemoteSession::connect(channels, ClientConfig::default())?;
//!
//! let mut insert = RemoteCommand::prepare(&session, "INSERT INTO T VALUES(?, ?)")?;
//! insert.set_parameter(0, 1)?;
//! insert.set_parameter(1, "first")?;
//! insert.execute_update()?;
//!
//! let mut select = RemoteCommand::prepare(&session, "SELECT * FROM T")?;
//! let rows = select.execute_query(0, false)?.collect_rows()?;
//! ```
//!
//! # Architecture
//!
//! - `strata-remote-core`: values, ids, metadata, errors
//! - `strata-remote-transport`: protocol vocabulary and the [`Channel`] trait
//! - `strata-remote-session`: [`RemoteSession`], configuration, failover
//! - `strata-remote-executor`: [`RemoteCommand`] and [`RemoteResult`]
//!
//! Channel implementations are supplied by the caller. The [`testing`]
//! module provides an in-memory cluster.

pub use strata_remote_core::{
    ColumnMeta, DataType, Error, ErrorKind, Nullability, ObjectId, ParamMeta, Result, Value,
};
pub use strata_remote_executor::{CancelHandle, Parameter, RemoteCommand, RemoteResult};
pub use strata_remote_session::{ClientConfig, RemoteSession, CONFIG_FILE_NAME};
pub use strata_remote_transport::{testing, Channel, ChannelRef, Op, Reply, Request, Response};
