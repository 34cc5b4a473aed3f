//! Client-side SQL command
//!
//! A [`RemoteCommand`] is one SQL text prepared on every server of a
//! session. Each execute runs under the session lock and walks the live
//! channels in order:
//!
//! - read-only queries stop at the first server that answers
//! - other queries and all updates run on every server; the last answer wins
//! - a server that fails at the transport level is dropped from the session
//!
//! Before each per-server attempt the command checks that its statement id is
//! still valid. A reconnect since the last prepare, or an id that has fallen
//! out of the server's object cache window, triggers a silent re-prepare.
//!
//! # Lock ordering
//!
//! Commands take the session lock for prepare, execute, metadata and close.
//! Dropping a command closes it, so never drop one while holding
//! [`RemoteSession::lock`] on the same thread.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use strata_remote_core::{Error, ObjectId, Result, Value, UNBOUNDED_FETCH};
use strata_remote_session::{RemoteSession, SessionState};
use strata_remote_transport::{Op, Prepared, UpdateOutcome};
use tracing::error;

use crate::parameter::Parameter;
use crate::result::RemoteResult;

/// A prepared statement bound to a session.
#[derive(Debug)]
pub struct RemoteCommand {
    sql: String,
    session: Option<Arc<RemoteSession>>,
    /// Shared with [`CancelHandle`]s.
    statement_id: Arc<AtomicI32>,
    created_epoch: u64,
    is_query: bool,
    read_only: bool,
    fetch_size: i32,
    parameters: Vec<Parameter>,
}

impl RemoteCommand {
    /// Prepare `sql` on every server of `session`.
    ///
    /// # Errors
    ///
    /// - `Error::SessionClosed` if the session is closed
    /// - `Error::Server` if a server rejects the statement
    /// - `Error::NoReachableServer` if every server fails
    pub fn prepare(session: &Arc<RemoteSession>, sql: &str) -> Result<Self> {
        let fetch_size = session.config().wire_fetch_size();
        Self::prepare_with_fetch_size(session, sql, fetch_size)
    }

    /// Prepare with an explicit fetch size for non-scrollable queries.
    pub fn prepare_with_fetch_size(
        session: &Arc<RemoteSession>,
        sql: &str,
        fetch_size: i32,
    ) -> Result<Self> {
        let mut command = RemoteCommand {
            sql: sql.to_string(),
            session: None,
            statement_id: Arc::new(AtomicI32::new(ObjectId::STALE.as_i32())),
            created_epoch: 0,
            is_query: false,
            read_only: false,
            fetch_size: fetch_size.max(1),
            parameters: Vec::new(),
        };
        {
            let mut state = session.lock();
            state.check_open()?;
            command.prepare_locked(&mut state, true)?;
        }
        // Attached only once prepared, so a failed prepare has nothing to close.
        command.session = Some(Arc::clone(session));
        Ok(command)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Current statement id.
    pub fn statement_id(&self) -> ObjectId {
        ObjectId::new(self.statement_id.load(Ordering::Acquire))
    }

    /// Reconnect epoch of the last prepare.
    pub fn created_epoch(&self) -> u64 {
        self.created_epoch
    }

    /// Returns true if the statement returns rows.
    pub fn is_query(&self) -> bool {
        self.is_query
    }

    /// Returns true if one server's answer is enough.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns true once the command has been closed.
    pub fn is_closed(&self) -> bool {
        self.session.is_none()
    }

    /// Positional parameters.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// Bind `value` to the parameter at 0-based `index`.
    pub fn set_parameter(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::StatementClosed);
        }
        let count = self.parameters.len();
        let parameter = self
            .parameters
            .get_mut(index)
            .ok_or(Error::InvalidParameterIndex { index, count })?;
        parameter.set_value(value.into());
        Ok(())
    }

    /// Unbind every parameter.
    pub fn clear_parameters(&mut self) {
        for parameter in &mut self.parameters {
            parameter.clear();
        }
    }

    fn check_parameters(&self) -> Result<()> {
        self.parameters.iter().try_for_each(Parameter::check_set)
    }

    fn bound_values(&self) -> Vec<Value> {
        self.parameters
            .iter()
            .map(|p| p.value().cloned().unwrap_or(Value::Null))
            .collect()
    }

    // =========================================================================
    // Prepare
    // =========================================================================

    fn set_statement_id(&self, id: ObjectId) {
        self.statement_id.store(id.as_i32(), Ordering::Release);
    }

    /// Prepare on every live channel under a fresh id.
    ///
    /// The initial prepare also reads parameter metadata and rebuilds the
    /// parameter list; a re-prepare keeps parameters and bound values.
    fn prepare_locked(&mut self, state: &mut SessionState, initial: bool) -> Result<()> {
        let id = state.allocate_id();
        self.set_statement_id(id);
        self.created_epoch = state.reconnect_epoch();

        let op = if initial {
            Op::SessionPrepareReadParams
        } else {
            Op::SessionPrepare
        };
        let sql = self.sql.as_str();
        let mut answer: Option<Prepared> = None;
        state.visit_channels(|state, channel| {
            state.trace_operation(op, id);
            answer = Some(state.observe(channel.prepare(id, sql, initial)?));
            Ok(ControlFlow::Continue(()))
        })?;

        let prepared = answer.ok_or(Error::NoReachableServer { failures: 0 })?;
        self.is_query = prepared.is_query;
        self.read_only = prepared.read_only;
        if initial {
            self.parameters = prepared
                .params
                .into_iter()
                .enumerate()
                .map(|(index, meta)| Parameter::new(index, meta))
                .collect();
        }
        Ok(())
    }

    /// Re-prepare if the id is stale. Called before every per-channel attempt.
    fn prepare_if_required(&mut self, state: &mut SessionState) -> Result<()> {
        if state.reconnect_epoch() != self.created_epoch {
            self.set_statement_id(ObjectId::STALE);
        }
        state.check_open()?;
        if self
            .statement_id()
            .is_outside_window(state.current_id(), state.cache_window())
        {
            self.prepare_locked(state, false)?;
        }
        Ok(())
    }

    fn attached_session(&self) -> Result<Arc<RemoteSession>> {
        self.session
            .as_ref()
            .map(Arc::clone)
            .ok_or(Error::StatementClosed)
    }

    // =========================================================================
    // Execute
    // =========================================================================

    /// Run the query and return its result.
    ///
    /// `max_rows` of 0 means no limit. Clustered sessions and scrollable
    /// results transfer every row with the first reply.
    ///
    /// # Errors
    ///
    /// - `Error::StatementClosed` or `Error::ParameterNotSet` before any I/O
    /// - `Error::NoReachableServer` if every server fails
    /// - `Error::Server` passed through from the server
    pub fn execute_query(&mut self, max_rows: i32, scrollable: bool) -> Result<RemoteResult> {
        let session = self.attached_session()?;
        self.check_parameters()?;

        let mut state = session.lock();
        state.check_open()?;
        let object_id = state.allocate_id();
        let mut slot: Option<RemoteResult> = None;

        let outcome = self.query_all(&mut state, object_id, max_rows, scrollable, &mut slot);
        if let Err(e) = outcome {
            if let Some(mut result) = slot.take() {
                result.close();
            }
            return Err(e);
        }
        slot.ok_or(Error::NoReachableServer { failures: 0 })
    }

    fn query_all(
        &mut self,
        state: &mut SessionState,
        object_id: ObjectId,
        max_rows: i32,
        scrollable: bool,
        slot: &mut Option<RemoteResult>,
    ) -> Result<()> {
        state.visit_channels(|state, channel| {
            self.prepare_if_required(state)?;
            if !state.is_live(channel) {
                return Ok(ControlFlow::Continue(()));
            }
            let id = self.statement_id();
            let fetch = if state.is_clustered() || scrollable {
                UNBOUNDED_FETCH
            } else {
                self.fetch_size
            };
            state.trace_operation(Op::CommandExecuteQuery, id);
            let reply = channel.execute_query(id, object_id, max_rows, fetch, self.bound_values())?;
            let header = state.observe(reply);

            if let Some(mut superseded) = slot.take() {
                superseded.close();
            }
            *slot = Some(RemoteResult::open(Arc::clone(channel), object_id, header, fetch));

            if self.read_only {
                Ok(ControlFlow::Break(()))
            } else {
                Ok(ControlFlow::Continue(()))
            }
        })?;
        state.reconcile_cluster_autocommit()?;
        state.resync_session_state_if_changed()
    }

    /// Run the update on every server and return the affected row count.
    ///
    /// The count and autocommit flag come from the last server that answered.
    /// If a server fails after others applied the update, the survivors keep
    /// it; the cluster is then inconsistent and no error is raised.
    ///
    /// # Errors
    ///
    /// Same as [`execute_query`](Self::execute_query).
    pub fn execute_update(&mut self) -> Result<i64> {
        let session = self.attached_session()?;
        self.check_parameters()?;

        let mut state = session.lock();
        state.check_open()?;

        let mut last: Option<UpdateOutcome> = None;
        state.visit_channels(|state, channel| {
            self.prepare_if_required(state)?;
            if !state.is_live(channel) {
                return Ok(ControlFlow::Continue(()));
            }
            let id = self.statement_id();
            state.trace_operation(Op::CommandExecuteUpdate, id);
            let reply = channel.execute_update(id, self.bound_values())?;
            last = Some(state.observe(reply));
            Ok(ControlFlow::Continue(()))
        })?;

        let outcome = last.ok_or(Error::NoReachableServer { failures: 0 })?;
        state.set_autocommit_from_server(outcome.auto_commit)?;
        state.reconcile_cluster_autocommit()?;
        state.resync_session_state_if_changed()?;
        Ok(outcome.update_count)
    }

    /// Column descriptors of the query as an empty result.
    ///
    /// Returns `Ok(None)` without I/O for statements that are not queries.
    pub fn get_meta_data(&mut self) -> Result<Option<RemoteResult>> {
        let session = self.attached_session()?;
        if !self.is_query {
            return Ok(None);
        }

        let mut state = session.lock();
        state.check_open()?;
        let object_id = state.allocate_id();

        let mut result: Option<RemoteResult> = None;
        state.visit_channels(|state, channel| {
            self.prepare_if_required(state)?;
            if !state.is_live(channel) {
                return Ok(ControlFlow::Continue(()));
            }
            let id = self.statement_id();
            state.trace_operation(Op::CommandGetMetaData, id);
            let header = state.observe(channel.get_meta_data(id, object_id)?);
            result = Some(RemoteResult::open(Arc::clone(channel), object_id, header, UNBOUNDED_FETCH));
            Ok(ControlFlow::Break(()))
        })?;
        state.reconcile_cluster_autocommit()?;
        Ok(result)
    }

    // =========================================================================
    // Close and cancel
    // =========================================================================

    /// Release the statement on every server and drop bound values.
    ///
    /// Idempotent. Server failures are logged, never returned. Once the
    /// session itself is closed this does nothing; later use of the command
    /// reports `Error::SessionClosed`.
    pub fn close(&mut self) {
        let Some(session) = self.session.as_ref().map(Arc::clone) else {
            return;
        };
        if session.is_closed() {
            return;
        }
        self.session = None;
        {
            let state = session.lock();
            let id = self.statement_id();
            state.trace_operation(Op::CommandClose, id);
            for channel in state.channels() {
                if let Err(e) = channel.close_statement(id) {
                    error!(
                        target: "strata::remote",
                        session = %session.id(),
                        endpoint = channel.endpoint(),
                        id = id.as_i32(),
                        error = %e,
                        "Failed to close statement"
                    );
                }
            }
        }
        self.clear_parameters();
        self.parameters.clear();
    }

    /// Ask every server to cancel the running statement.
    ///
    /// Returns immediately; an in-flight execute on another thread is not
    /// unblocked by this call. Use [`cancel_handle`](Self::cancel_handle)
    /// to cancel from another thread.
    pub fn cancel(&self) {
        if let Some(session) = &self.session {
            session.cancel_statement(self.statement_id());
        }
    }

    /// A handle that can cancel this command from another thread.
    pub fn cancel_handle(&self) -> Result<CancelHandle> {
        let session = self.attached_session()?;
        Ok(CancelHandle {
            session,
            statement_id: Arc::clone(&self.statement_id),
        })
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)?;
        if self.parameters.is_empty() {
            return Ok(());
        }
        f.write_str(" {")?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match parameter.value() {
                Some(value) => write!(f, "{}: {}", i + 1, value.to_trace_sql())?,
                None => write!(f, "{}: ?", i + 1)?,
            }
        }
        f.write_str("}")
    }
}

impl Drop for RemoteCommand {
    fn drop(&mut self) {
        self.close();
    }
}

/// Cancels a command's current statement from any thread.
///
/// Follows re-prepares: the id sent is the one the command holds at the
/// time of the call.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    session: Arc<RemoteSession>,
    statement_id: Arc<AtomicI32>,
}

impl CancelHandle {
    /// Send the cancel request to every server. Does not wait.
    pub fn cancel(&self) {
        let id = ObjectId::new(self.statement_id.load(Ordering::Acquire));
        self.session.cancel_statement(id);
    }
}
