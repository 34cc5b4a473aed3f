//! Simulated cluster member
//!
//! [`MemoryServer`] answers protocol requests from a catalog of statement
//! behaviours. It keeps just enough server-side state to make client bugs
//! visible: an object cache with the same eviction window a real server
//! uses, open cursors, autocommit and commit counters, and a journal of
//! every request it processed.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use strata_remote_core::{
    ColumnMeta, Error, ObjectId, ParamMeta, Result, Value, SERVER_CACHED_OBJECTS,
};
use tracing::warn;

use crate::protocol::{Op, Prepared, Reply, Request, Response, ResultHeader, UpdateOutcome};

/// How the server treats one SQL text.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementBehavior {
    /// Statement returns rows
    pub is_query: bool,
    /// Statement may be answered by a single member
    pub read_only: bool,
    /// Declared parameters
    pub params: Vec<ParamMeta>,
    /// Result columns (queries only)
    pub columns: Vec<ColumnMeta>,
    /// Result rows (queries only)
    pub rows: Vec<Vec<Value>>,
    /// Affected rows (updates only)
    pub update_count: i64,
    /// Executing the statement changes session state
    pub changes_session_state: bool,
}

impl StatementBehavior {
    /// A deterministic, side-effect free query.
    pub fn query(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        StatementBehavior {
            is_query: true,
            read_only: true,
            params: Vec::new(),
            columns,
            rows,
            update_count: 0,
            changes_session_state: false,
        }
    }

    /// An update affecting `update_count` rows.
    pub fn update(update_count: i64) -> Self {
        StatementBehavior {
            is_query: false,
            read_only: false,
            params: Vec::new(),
            columns: Vec::new(),
            rows: Vec::new(),
            update_count,
            changes_session_state: false,
        }
    }

    /// Mark the query as having side effects or non-deterministic output.
    pub fn not_read_only(mut self) -> Self {
        self.read_only = false;
        self
    }

    /// Declare parameters.
    pub fn with_params(mut self, params: Vec<ParamMeta>) -> Self {
        self.params = params;
        self
    }

    /// Signal a session state change whenever the statement executes.
    pub fn changing_session_state(mut self) -> Self {
        self.changes_session_state = true;
        self
    }
}

#[derive(Debug)]
struct Cursor {
    remaining: VecDeque<Vec<Value>>,
}

#[derive(Debug)]
struct ServerInner {
    catalog: HashMap<String, StatementBehavior>,
    statements: BTreeMap<ObjectId, String>,
    cursors: BTreeMap<ObjectId, Cursor>,
    last_id: Option<ObjectId>,
    cache_window: u32,
    journal: Vec<Request>,
    journaling: bool,
    op_counts: HashMap<Op, usize>,
    crash_on: Option<(Op, usize)>,
    down: bool,
    rejected: usize,
    auto_commit: bool,
    commits: usize,
    applied_updates: usize,
    session_state: Vec<String>,
    session_closed: bool,
    cancelled: Vec<ObjectId>,
}

/// In-memory stand-in for one server endpoint.
#[derive(Debug)]
pub struct MemoryServer {
    name: String,
    inner: Mutex<ServerInner>,
}

impl MemoryServer {
    /// Create a server with the default object cache window.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_cache_window(name, SERVER_CACHED_OBJECTS)
    }

    /// Create a server that retains only the `window` most recent object ids.
    pub fn with_cache_window(name: impl Into<String>, window: u32) -> Arc<Self> {
        Arc::new(MemoryServer {
            name: name.into(),
            inner: Mutex::new(ServerInner {
                catalog: HashMap::new(),
                statements: BTreeMap::new(),
                cursors: BTreeMap::new(),
                last_id: None,
                cache_window: window,
                journal: Vec::new(),
                journaling: true,
                op_counts: HashMap::new(),
                crash_on: None,
                down: false,
                rejected: 0,
                auto_commit: true,
                commits: 0,
                applied_updates: 0,
                session_state: Vec::new(),
                session_closed: false,
                cancelled: Vec::new(),
            }),
        })
    }

    /// Server name, also used as the channel endpoint.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register how `sql` behaves.
    pub fn define(&self, sql: impl Into<String>, behavior: StatementBehavior) {
        self.inner.lock().catalog.insert(sql.into(), behavior);
    }

    /// Set the statements returned for a session state read.
    pub fn set_session_state(&self, statements: Vec<String>) {
        self.inner.lock().session_state = statements;
    }

    /// Crash when the `occurrence`-th (1-based) request of `op` arrives.
    ///
    /// The crashing request is not applied and the server stays down.
    pub fn crash_on(&self, op: Op, occurrence: usize) {
        self.inner.lock().crash_on = Some((op, occurrence.max(1)));
    }

    /// Take the server down immediately.
    pub fn go_down(&self) {
        self.inner.lock().down = true;
    }

    /// Returns true once the server has crashed or been taken down.
    pub fn is_down(&self) -> bool {
        self.inner.lock().down
    }

    /// Requests that arrived after the server went down.
    pub fn rejected(&self) -> usize {
        self.inner.lock().rejected
    }

    /// Turn request recording on or off. Off drops what was recorded.
    /// Op counters are unaffected.
    pub fn set_journaling(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        inner.journaling = enabled;
        if !enabled {
            inner.journal = Vec::new();
        }
    }

    /// Every request processed while journaling, in arrival order.
    pub fn journal(&self) -> Vec<Request> {
        self.inner.lock().journal.clone()
    }

    /// Number of processed requests of `op`.
    pub fn count(&self, op: Op) -> usize {
        self.inner.lock().op_counts.get(&op).copied().unwrap_or(0)
    }

    /// Prepare requests of either flavour.
    pub fn prepares(&self) -> usize {
        self.count(Op::SessionPrepare) + self.count(Op::SessionPrepareReadParams)
    }

    /// Cursors opened and not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.inner.lock().cursors.len()
    }

    /// Whether `id` is still in the server's object cache as a statement.
    pub fn has_statement(&self, id: ObjectId) -> bool {
        self.inner.lock().statements.contains_key(&id)
    }

    /// Current server-side autocommit mode.
    pub fn auto_commit(&self) -> bool {
        self.inner.lock().auto_commit
    }

    /// Commits received.
    pub fn commits(&self) -> usize {
        self.inner.lock().commits
    }

    /// Updates applied.
    pub fn applied_updates(&self) -> usize {
        self.inner.lock().applied_updates
    }

    /// Whether the client closed its session on this server.
    pub fn session_closed(&self) -> bool {
        self.inner.lock().session_closed
    }

    /// Statement ids named by cancel requests.
    pub fn cancelled(&self) -> Vec<ObjectId> {
        self.inner.lock().cancelled.clone()
    }

    /// Record an out-of-band cancel.
    pub fn cancel(&self, statement_id: ObjectId) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.down {
            return Err(self.broken());
        }
        inner.cancelled.push(statement_id);
        Ok(())
    }

    /// Process one request.
    pub fn handle(&self, request: Request) -> Result<Reply> {
        let mut inner = self.inner.lock();
        if inner.down {
            inner.rejected += 1;
            return Err(self.broken());
        }

        let op = request.op();
        let seen = inner.op_counts.get(&op).copied().unwrap_or(0) + 1;
        if inner.crash_on == Some((op, seen)) {
            inner.down = true;
            warn!(
                target: "strata::remote::testing",
                server = %self.name,
                op = op.name(),
                occurrence = seen,
                "Simulated server crash"
            );
            return Err(self.broken());
        }
        inner.op_counts.insert(op, seen);
        if inner.journaling {
            inner.journal.push(request.clone());
        }

        match request {
            Request::Prepare {
                statement_id,
                sql,
                read_params,
            } => {
                let behavior = inner.behavior_for(&sql)?;
                inner.remember(statement_id);
                inner.statements.insert(statement_id, sql);
                Ok(Reply::ok(Response::Prepared(Prepared {
                    is_query: behavior.is_query,
                    read_only: behavior.read_only,
                    params: if read_params {
                        behavior.params
                    } else {
                        Vec::new()
                    },
                })))
            }
            Request::ExecuteQuery {
                statement_id,
                object_id,
                max_rows,
                fetch_size,
                params,
            } => {
                let behavior = inner.statement(statement_id)?;
                if !behavior.is_query {
                    return Err(server_error(90002, "Method is only allowed for a query"));
                }
                check_params(&behavior, &params)?;
                let mut rows: VecDeque<Vec<Value>> = behavior.rows.into_iter().collect();
                if max_rows > 0 {
                    rows.truncate(max_rows as usize);
                }
                let row_count = rows.len() as i64;
                let first = take_batch(&mut rows, fetch_size);
                inner.remember(object_id);
                inner.cursors.insert(object_id, Cursor { remaining: rows });
                let header = ResultHeader {
                    columns: behavior.columns,
                    row_count,
                    rows: first,
                };
                Ok(reply(Response::ResultOpened(header), behavior.changes_session_state))
            }
            Request::ExecuteUpdate {
                statement_id,
                params,
            } => {
                let behavior = inner.statement(statement_id)?;
                if behavior.is_query {
                    return Err(server_error(90001, "Method is not allowed for a query"));
                }
                check_params(&behavior, &params)?;
                inner.applied_updates += 1;
                let outcome = UpdateOutcome {
                    update_count: behavior.update_count,
                    auto_commit: inner.auto_commit,
                };
                Ok(reply(Response::Updated(outcome), behavior.changes_session_state))
            }
            Request::GetMetaData {
                statement_id,
                object_id,
            } => {
                let behavior = inner.statement(statement_id)?;
                inner.remember(object_id);
                inner.cursors.insert(
                    object_id,
                    Cursor {
                        remaining: VecDeque::new(),
                    },
                );
                Ok(Reply::ok(Response::ResultOpened(ResultHeader {
                    columns: behavior.columns,
                    row_count: 0,
                    rows: Vec::new(),
                })))
            }
            Request::CloseStatement { statement_id } => {
                inner.statements.remove(&statement_id);
                Ok(Reply::ok(Response::Done))
            }
            Request::FetchRows { object_id, count } => {
                let cursor = inner
                    .cursors
                    .get_mut(&object_id)
                    .ok_or_else(|| Error::object_closed(object_id))?;
                let rows = take_batch(&mut cursor.remaining, count);
                Ok(Reply::ok(Response::Rows(rows)))
            }
            Request::CloseResult { object_id } => {
                inner.cursors.remove(&object_id);
                Ok(Reply::ok(Response::Done))
            }
            Request::Commit => {
                inner.commits += 1;
                Ok(Reply::ok(Response::Done))
            }
            Request::SetAutoCommit { auto_commit } => {
                inner.auto_commit = auto_commit;
                Ok(Reply::ok(Response::Done))
            }
            Request::ReadSessionState => Ok(Reply::ok(Response::SessionState(
                inner.session_state.clone(),
            ))),
            Request::CloseSession => {
                inner.session_closed = true;
                inner.statements.clear();
                inner.cursors.clear();
                Ok(Reply::ok(Response::Done))
            }
        }
    }

    fn broken(&self) -> Error {
        Error::transport(
            self.name.clone(),
            io::Error::new(io::ErrorKind::BrokenPipe, "connection reset by peer"),
        )
    }
}

impl ServerInner {
    fn behavior_for(&self, sql: &str) -> Result<StatementBehavior> {
        self.catalog
            .get(sql)
            .cloned()
            .ok_or_else(|| Error::Server {
                code: 42000,
                sql_state: "42000".to_string(),
                message: format!("Syntax error in SQL statement \"{}\"", sql),
            })
    }

    fn statement(&self, id: ObjectId) -> Result<StatementBehavior> {
        let sql = self
            .statements
            .get(&id)
            .ok_or_else(|| Error::object_closed(id))?;
        self.behavior_for(sql)
    }

    /// Track the newest id seen and evict everything that fell out of the window.
    fn remember(&mut self, id: ObjectId) {
        let last = match self.last_id {
            Some(last) if last >= id => last,
            _ => id,
        };
        self.last_id = Some(last);
        let window = self.cache_window;
        self.statements
            .retain(|key, _| !key.is_outside_window(last, window));
        self.cursors
            .retain(|key, _| !key.is_outside_window(last, window));
    }
}

fn take_batch(rows: &mut VecDeque<Vec<Value>>, count: i32) -> Vec<Vec<Value>> {
    let n = (count.max(0) as usize).min(rows.len());
    rows.drain(..n).collect()
}

fn check_params(behavior: &StatementBehavior, params: &[Value]) -> Result<()> {
    if params.len() != behavior.params.len() {
        return Err(server_error(
            90012,
            &format!("Parameter #{} is not set", params.len() + 1),
        ));
    }
    Ok(())
}

fn server_error(code: i32, message: &str) -> Error {
    Error::Server {
        code,
        sql_state: code.to_string(),
        message: message.to_string(),
    }
}

fn reply(body: Response, state_changed: bool) -> Reply {
    if state_changed {
        Reply::with_state_change(body)
    } else {
        Reply::ok(body)
    }
}
