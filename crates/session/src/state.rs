//! Session state owned under the session lock
//!
//! [`SessionState`] is everything a session-affecting operation may read or
//! mutate: the live channel list, the id allocator, the reconnect epoch and
//! the autocommit/session-state bookkeeping. It is only reachable through
//! [`RemoteSession::lock`](crate::RemoteSession::lock), so holding a
//! `&mut SessionState` *is* exclusive ownership of the session.

use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::RwLock;
use strata_remote_core::{Error, ObjectId, Result};
use strata_remote_transport::{ChannelRef, Op, Reply};
use tracing::{debug, info};

use crate::config::ClientConfig;

/// Mutable session state, guarded by the session mutex.
#[derive(Debug)]
pub struct SessionState {
    pub(crate) session_id: String,
    pub(crate) channels: Vec<ChannelRef>,
    /// Snapshot of `channels` readable without the session lock, for cancel.
    pub(crate) cancel_targets: Arc<RwLock<Vec<ChannelRef>>>,
    next_id: ObjectId,
    reconnect_epoch: u64,
    cache_window: u32,
    auto_commit: bool,
    state_changed: bool,
    session_state: Vec<String>,
    closed: bool,
}

impl SessionState {
    pub(crate) fn new(
        session_id: String,
        channels: Vec<ChannelRef>,
        cancel_targets: Arc<RwLock<Vec<ChannelRef>>>,
        config: &ClientConfig,
    ) -> Self {
        SessionState {
            session_id,
            channels,
            cancel_targets,
            next_id: ObjectId::new(0),
            reconnect_epoch: 0,
            cache_window: config.server_cached_objects,
            auto_commit: config.auto_commit,
            state_changed: false,
            session_state: Vec::new(),
            closed: false,
        }
    }

    // =========================================================================
    // Ids and staleness
    // =========================================================================

    /// Hand out the next object id.
    pub fn allocate_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    /// High-water mark: the id the next allocation will return.
    pub fn current_id(&self) -> ObjectId {
        self.next_id
    }

    /// Number of forced reconnects so far.
    pub fn reconnect_epoch(&self) -> u64 {
        self.reconnect_epoch
    }

    /// Object ids the server is assumed to retain.
    pub fn cache_window(&self) -> u32 {
        self.cache_window
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Session id, as used for out-of-band cancel.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Live channels in visiting order.
    pub fn channels(&self) -> &[ChannelRef] {
        &self.channels
    }

    /// Live channel count.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// True while `channel` is still in the live list.
    pub fn is_live(&self, channel: &ChannelRef) -> bool {
        self.position_of(channel).is_some()
    }

    pub(crate) fn position_of(&self, channel: &ChannelRef) -> Option<usize> {
        self.channels.iter().position(|c| Arc::ptr_eq(c, channel))
    }

    /// True while more than one channel is live.
    pub fn is_clustered(&self) -> bool {
        self.channels.len() > 1
    }

    /// True once the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Fail unless the session is open and has at least one channel.
    pub fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        if self.channels.is_empty() {
            return Err(Error::NoReachableServer { failures: 0 });
        }
        Ok(())
    }

    pub(crate) fn replace_channels(&mut self, channels: Vec<ChannelRef>) {
        self.channels = channels;
        self.reconnect_epoch += 1;
        self.sync_cancel_targets();
    }

    pub(crate) fn sync_cancel_targets(&self) {
        *self.cancel_targets.write() = self.channels.clone();
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
        self.channels.clear();
        self.sync_cancel_targets();
    }

    // =========================================================================
    // Status bits and tracing
    // =========================================================================

    /// Unwrap a reply, remembering whether it flagged a session state change.
    pub fn observe<T>(&mut self, reply: Reply<T>) -> T {
        if reply.state_changed {
            self.state_changed = true;
        }
        reply.body
    }

    /// Log a protocol operation.
    pub fn trace_operation(&self, op: Op, id: ObjectId) {
        debug!(
            target: "strata::remote",
            session = %self.session_id,
            op = op.name(),
            id = id.as_i32(),
            "operation"
        );
    }

    // =========================================================================
    // Autocommit and session state
    // =========================================================================

    /// Client-side autocommit mode.
    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub(crate) fn set_auto_commit_local(&mut self, auto_commit: bool) {
        self.auto_commit = auto_commit;
    }

    /// Cached statements that recreate the session state.
    pub fn session_state(&self) -> &[String] {
        &self.session_state
    }

    /// Whether a reply has flagged a state change not yet re-read.
    pub fn session_state_changed(&self) -> bool {
        self.state_changed
    }

    /// Send the autocommit mode to every server.
    pub fn set_auto_commit_send(&mut self, auto_commit: bool) -> Result<()> {
        self.visit_channels(|state, channel| {
            state.trace_operation(Op::SessionSetAutoCommit, ObjectId::new(i32::from(auto_commit)));
            let reply = channel.set_auto_commit(auto_commit)?;
            state.observe(reply);
            Ok(ControlFlow::Continue(()))
        })
    }

    /// In a cluster the client drives commits, so server-side autocommit is off.
    pub(crate) fn disable_server_auto_commit_if_clustered(&mut self) -> Result<()> {
        if self.auto_commit && self.is_clustered() {
            self.set_auto_commit_send(false)?;
        }
        Ok(())
    }

    /// Adopt the autocommit mode reported by the server after an update.
    ///
    /// Clustered servers always run with autocommit off, so only an explicit
    /// `true` (the user ran `SET AUTOCOMMIT TRUE`) is meaningful: the client
    /// takes it over and switches the servers back off.
    pub fn set_autocommit_from_server(&mut self, auto_commit: bool) -> Result<()> {
        if self.is_clustered() {
            if auto_commit {
                self.set_auto_commit_send(false)?;
                self.auto_commit = true;
            }
        } else {
            self.auto_commit = auto_commit;
        }
        Ok(())
    }

    /// Commit on every member when autocommit is on and the session is clustered.
    pub fn reconcile_cluster_autocommit(&mut self) -> Result<()> {
        if !(self.auto_commit && self.is_clustered()) {
            return Ok(());
        }
        self.commit_all()
    }

    /// Commit on every live channel.
    pub fn commit_all(&mut self) -> Result<()> {
        self.visit_channels(|state, channel| {
            state.trace_operation(Op::CommandCommit, ObjectId::new(0));
            let reply = channel.commit()?;
            state.observe(reply);
            Ok(ControlFlow::Continue(()))
        })
    }

    /// Re-read the session state statements if a reply flagged a change.
    pub fn resync_session_state_if_changed(&mut self) -> Result<()> {
        if !self.state_changed {
            return Ok(());
        }
        self.state_changed = false;

        let mut statements = None;
        self.visit_channels(|state, channel| {
            state.trace_operation(Op::SessionReadState, ObjectId::new(0));
            statements = Some(channel.read_session_state()?.body);
            Ok(ControlFlow::Break(()))
        })?;

        if let Some(statements) = statements {
            info!(
                target: "strata::remote",
                session = %self.session_id,
                statements = statements.len(),
                "Session state re-read"
            );
            self.session_state = statements;
        }
        Ok(())
    }
}
