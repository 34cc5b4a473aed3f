//! Protocol vocabulary
//!
//! The client drives every server with the same small set of operations.
//! Each [`Request`] maps to exactly one [`Op`]; the numeric codes are the
//! command identifiers a wire transport writes first in every frame.

use serde::{Deserialize, Serialize};
use strata_remote_core::{ColumnMeta, ObjectId, ParamMeta, Value};

/// Remote protocol command identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    /// Prepare a statement, flags only
    SessionPrepare,
    /// End the session on the server
    SessionClose,
    /// Execute a prepared query and open a cursor
    CommandExecuteQuery,
    /// Execute a prepared update
    CommandExecuteUpdate,
    /// Release a prepared statement
    CommandClose,
    /// Fetch the next batch of a cursor
    ResultFetchRows,
    /// Release a cursor
    ResultClose,
    /// Commit the current transaction
    CommandCommit,
    /// Describe the columns of a prepared query
    CommandGetMetaData,
    /// Prepare a statement and return parameter metadata
    SessionPrepareReadParams,
    /// Out-of-band cancel of a running statement
    SessionCancelStatement,
    /// Switch server-side autocommit
    SessionSetAutoCommit,
    /// Read the statements that recreate the session state
    SessionReadState,
}

impl Op {
    /// Numeric command identifier.
    pub const fn code(self) -> i32 {
        match self {
            Op::SessionPrepare => 0,
            Op::SessionClose => 1,
            Op::CommandExecuteQuery => 2,
            Op::CommandExecuteUpdate => 3,
            Op::CommandClose => 4,
            Op::ResultFetchRows => 5,
            Op::ResultClose => 7,
            Op::CommandCommit => 8,
            Op::CommandGetMetaData => 10,
            Op::SessionPrepareReadParams => 11,
            Op::SessionCancelStatement => 13,
            Op::SessionSetAutoCommit => 15,
            Op::SessionReadState => 18,
        }
    }

    /// Name used in trace output.
    pub const fn name(self) -> &'static str {
        match self {
            Op::SessionPrepare => "SESSION_PREPARE",
            Op::SessionClose => "SESSION_CLOSE",
            Op::CommandExecuteQuery => "COMMAND_EXECUTE_QUERY",
            Op::CommandExecuteUpdate => "COMMAND_EXECUTE_UPDATE",
            Op::CommandClose => "COMMAND_CLOSE",
            Op::ResultFetchRows => "RESULT_FETCH_ROWS",
            Op::ResultClose => "RESULT_CLOSE",
            Op::CommandCommit => "COMMAND_COMMIT",
            Op::CommandGetMetaData => "COMMAND_GET_META_DATA",
            Op::SessionPrepareReadParams => "SESSION_PREPARE_READ_PARAMS",
            Op::SessionCancelStatement => "SESSION_CANCEL_STATEMENT",
            Op::SessionSetAutoCommit => "SESSION_SET_AUTOCOMMIT",
            Op::SessionReadState => "SESSION_READ_STATE",
        }
    }

    /// Look up an op by its numeric identifier.
    pub fn from_code(code: i32) -> Option<Op> {
        ALL_OPS.iter().copied().find(|op| op.code() == code)
    }
}

const ALL_OPS: [Op; 13] = [
    Op::SessionPrepare,
    Op::SessionClose,
    Op::CommandExecuteQuery,
    Op::CommandExecuteUpdate,
    Op::CommandClose,
    Op::ResultFetchRows,
    Op::ResultClose,
    Op::CommandCommit,
    Op::CommandGetMetaData,
    Op::SessionPrepareReadParams,
    Op::SessionCancelStatement,
    Op::SessionSetAutoCommit,
    Op::SessionReadState,
];

/// A request sent to one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Prepare `sql` under `statement_id`
    Prepare {
        /// Client-assigned statement id
        statement_id: ObjectId,
        /// SQL text
        sql: String,
        /// Also return parameter metadata
        read_params: bool,
    },
    /// Execute a prepared query
    ExecuteQuery {
        /// Prepared statement id
        statement_id: ObjectId,
        /// Id for the result cursor
        object_id: ObjectId,
        /// Row limit, 0 for none
        max_rows: i32,
        /// Rows per batch
        fetch_size: i32,
        /// Bound parameter values in positional order
        params: Vec<Value>,
    },
    /// Execute a prepared update
    ExecuteUpdate {
        /// Prepared statement id
        statement_id: ObjectId,
        /// Bound parameter values in positional order
        params: Vec<Value>,
    },
    /// Describe the result columns of a prepared query
    GetMetaData {
        /// Prepared statement id
        statement_id: ObjectId,
        /// Id for the (empty) result cursor
        object_id: ObjectId,
    },
    /// Release a prepared statement
    CloseStatement {
        /// Prepared statement id
        statement_id: ObjectId,
    },
    /// Fetch the next batch of a cursor
    FetchRows {
        /// Cursor id
        object_id: ObjectId,
        /// Rows to fetch
        count: i32,
    },
    /// Release a cursor
    CloseResult {
        /// Cursor id
        object_id: ObjectId,
    },
    /// Commit the current transaction
    Commit,
    /// Switch server-side autocommit
    SetAutoCommit {
        /// New autocommit mode
        auto_commit: bool,
    },
    /// Read the session state statements
    ReadSessionState,
    /// End the session
    CloseSession,
}

impl Request {
    /// The protocol operation this request performs.
    pub fn op(&self) -> Op {
        match self {
            Request::Prepare { read_params: true, .. } => Op::SessionPrepareReadParams,
            Request::Prepare { .. } => Op::SessionPrepare,
            Request::ExecuteQuery { .. } => Op::CommandExecuteQuery,
            Request::ExecuteUpdate { .. } => Op::CommandExecuteUpdate,
            Request::GetMetaData { .. } => Op::CommandGetMetaData,
            Request::CloseStatement { .. } => Op::CommandClose,
            Request::FetchRows { .. } => Op::ResultFetchRows,
            Request::CloseResult { .. } => Op::ResultClose,
            Request::Commit => Op::CommandCommit,
            Request::SetAutoCommit { .. } => Op::SessionSetAutoCommit,
            Request::ReadSessionState => Op::SessionReadState,
            Request::CloseSession => Op::SessionClose,
        }
    }
}

/// Answer to a prepare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prepared {
    /// Statement returns rows
    pub is_query: bool,
    /// Statement has no side effects and is deterministic
    pub read_only: bool,
    /// Parameter metadata, empty unless requested
    pub params: Vec<ParamMeta>,
}

/// Header of a newly opened result cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultHeader {
    /// Column descriptors
    pub columns: Vec<ColumnMeta>,
    /// Total rows in the result
    pub row_count: i64,
    /// First batch of rows, sent inline
    pub rows: Vec<Vec<Value>>,
}

/// Answer to an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Affected rows
    pub update_count: i64,
    /// Server-side autocommit mode after the statement
    pub auto_commit: bool,
}

/// A response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Statement prepared
    Prepared(Prepared),
    /// Cursor opened
    ResultOpened(ResultHeader),
    /// Update executed
    Updated(UpdateOutcome),
    /// Batch of rows
    Rows(Vec<Vec<Value>>),
    /// Session state statements
    SessionState(Vec<String>),
    /// Acknowledgement without payload
    Done,
}

impl Response {
    /// Variant name, for protocol error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Response::Prepared(_) => "Prepared",
            Response::ResultOpened(_) => "ResultOpened",
            Response::Updated(_) => "Updated",
            Response::Rows(_) => "Rows",
            Response::SessionState(_) => "SessionState",
            Response::Done => "Done",
        }
    }
}

/// A response plus the status bits that accompany every answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T = Response> {
    /// Response payload
    pub body: T,
    /// Server signalled that session state changed and must be re-read
    pub state_changed: bool,
}

impl<T> Reply<T> {
    /// A plain OK reply.
    pub fn ok(body: T) -> Self {
        Reply {
            body,
            state_changed: false,
        }
    }

    /// A reply flagged as having changed session state.
    pub fn with_state_change(body: T) -> Self {
        Reply {
            body,
            state_changed: true,
        }
    }

    /// Transform the payload, keeping the status bits.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Reply<U>, E> {
        Ok(Reply {
            body: f(self.body)?,
            state_changed: self.state_changed,
        })
    }
}
