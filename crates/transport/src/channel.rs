//! Channel trait
//!
//! A [`Channel`] is the client's link to a single server endpoint. The
//! session holds one per cluster member, shared as `Arc<dyn Channel>`.
//!
//! # Thread Safety
//!
//! Channels must be `Send + Sync`. The session serializes its own use of a
//! channel, but result cursors and out-of-band cancel reach a channel
//! without the session lock, so an implementation must keep each round
//! trip atomic with respect to other callers.
//!
//! # Errors
//!
//! An I/O failure must be reported as [`Error::Transport`]: that is the only
//! kind the session's failover loop recovers from by dropping the channel.
//! Errors raised by the server itself are reported as [`Error::Server`] and
//! pass through to the caller unchanged.

use std::fmt;
use std::sync::Arc;

use strata_remote_core::{Error, ObjectId, Result, Value};

use crate::protocol::{Prepared, Reply, Request, Response, ResultHeader, UpdateOutcome};

/// Synchronous request/response link to one server.
pub trait Channel: Send + Sync + fmt::Debug {
    /// Endpoint name, for logging and error messages.
    fn endpoint(&self) -> &str;

    /// Send a request and wait for the reply.
    fn call(&self, request: Request) -> Result<Reply>;

    /// Send a request without waiting for a reply.
    fn send(&self, request: Request) -> Result<()>;

    /// Ask the server to abort `statement_id` in session `session_id`.
    ///
    /// Must not go through the main request stream, which may be blocked
    /// on the very statement being cancelled.
    fn cancel(&self, session_id: &str, statement_id: ObjectId) -> Result<()>;
}

/// A channel shared between the session and open results.
pub type ChannelRef = Arc<dyn Channel>;

impl dyn Channel {
    /// Prepare `sql` as `statement_id`.
    pub fn prepare(
        &self,
        statement_id: ObjectId,
        sql: &str,
        read_params: bool,
    ) -> Result<Reply<Prepared>> {
        self.call(Request::Prepare {
            statement_id,
            sql: sql.to_string(),
            read_params,
        })?
        .try_map(|body| match body {
            Response::Prepared(prepared) => Ok(prepared),
            other => Err(Error::unexpected("Prepared", other.name())),
        })
    }

    /// Execute a prepared query, opening cursor `object_id`.
    pub fn execute_query(
        &self,
        statement_id: ObjectId,
        object_id: ObjectId,
        max_rows: i32,
        fetch_size: i32,
        params: Vec<Value>,
    ) -> Result<Reply<ResultHeader>> {
        self.call(Request::ExecuteQuery {
            statement_id,
            object_id,
            max_rows,
            fetch_size,
            params,
        })?
        .try_map(expect_result_header)
    }

    /// Execute a prepared update.
    pub fn execute_update(
        &self,
        statement_id: ObjectId,
        params: Vec<Value>,
    ) -> Result<Reply<UpdateOutcome>> {
        self.call(Request::ExecuteUpdate {
            statement_id,
            params,
        })?
        .try_map(|body| match body {
            Response::Updated(outcome) => Ok(outcome),
            other => Err(Error::unexpected("Updated", other.name())),
        })
    }

    /// Describe the columns of a prepared query as an empty cursor.
    pub fn get_meta_data(
        &self,
        statement_id: ObjectId,
        object_id: ObjectId,
    ) -> Result<Reply<ResultHeader>> {
        self.call(Request::GetMetaData {
            statement_id,
            object_id,
        })?
        .try_map(expect_result_header)
    }

    /// Fetch the next `count` rows of cursor `object_id`.
    pub fn fetch_rows(&self, object_id: ObjectId, count: i32) -> Result<Reply<Vec<Vec<Value>>>> {
        self.call(Request::FetchRows { object_id, count })?
            .try_map(|body| match body {
                Response::Rows(rows) => Ok(rows),
                other => Err(Error::unexpected("Rows", other.name())),
            })
    }

    /// Commit the current transaction.
    pub fn commit(&self) -> Result<Reply<()>> {
        self.call(Request::Commit)?.try_map(expect_done)
    }

    /// Switch server-side autocommit.
    pub fn set_auto_commit(&self, auto_commit: bool) -> Result<Reply<()>> {
        self.call(Request::SetAutoCommit { auto_commit })?
            .try_map(expect_done)
    }

    /// Read the statements that recreate this session's state.
    pub fn read_session_state(&self) -> Result<Reply<Vec<String>>> {
        self.call(Request::ReadSessionState)?
            .try_map(|body| match body {
                Response::SessionState(statements) => Ok(statements),
                other => Err(Error::unexpected("SessionState", other.name())),
            })
    }

    /// Release a prepared statement. Fire and forget.
    pub fn close_statement(&self, statement_id: ObjectId) -> Result<()> {
        self.send(Request::CloseStatement { statement_id })
    }

    /// Release a cursor. Fire and forget.
    pub fn close_result(&self, object_id: ObjectId) -> Result<()> {
        self.send(Request::CloseResult { object_id })
    }

    /// End the server session. Fire and forget.
    pub fn close_session(&self) -> Result<()> {
        self.send(Request::CloseSession)
    }
}

fn expect_result_header(body: Response) -> Result<ResultHeader> {
    match body {
        Response::ResultOpened(header) => Ok(header),
        other => Err(Error::unexpected("ResultOpened", other.name())),
    }
}

fn expect_done(body: Response) -> Result<()> {
    match body {
        Response::Done => Ok(()),
        other => Err(Error::unexpected("Done", other.name())),
    }
}
