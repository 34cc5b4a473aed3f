//! Remote session handle
//!
//! A [`RemoteSession`] owns the connections to one server or to every member
//! of a replicated cluster. Commands share it through an `Arc` and serialize
//! their protocol exchanges on the session lock.
//!
//! # Thread Safety
//!
//! All session-affecting work happens under [`RemoteSession::lock`]. The only
//! exception is [`RemoteSession::cancel_statement`], which must work while
//! another thread is blocked inside an execute holding that lock. It reads a
//! separate snapshot of the channel list instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use strata_remote_core::{Error, ObjectId, Result};
use strata_remote_transport::ChannelRef;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::state::SessionState;

/// Exclusive access to a session's state.
pub type SessionGuard<'a> = MutexGuard<'a, SessionState>;

/// A client session spanning one or more servers.
#[derive(Debug)]
pub struct RemoteSession {
    id: String,
    config: ClientConfig,
    state: Mutex<SessionState>,
    cancel_targets: Arc<RwLock<Vec<ChannelRef>>>,
    closed: AtomicBool,
}

impl RemoteSession {
    /// Open a session over `channels`, listed in server order.
    ///
    /// With more than one channel the session is clustered; if autocommit is
    /// requested it is switched off on the servers and emulated by the client.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if `config` is invalid or no channel is given
    /// - `Error::NoReachableServer` if every server fails while autocommit is
    ///   being switched off
    pub fn connect(channels: Vec<ChannelRef>, config: ClientConfig) -> Result<Arc<Self>> {
        config.validate()?;
        if channels.is_empty() {
            return Err(Error::Config(
                "a session needs at least one server".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let cancel_targets = Arc::new(RwLock::new(channels.clone()));
        let mut state = SessionState::new(id.clone(), channels, Arc::clone(&cancel_targets), &config);
        state.disable_server_auto_commit_if_clustered()?;

        info!(
            target: "strata::remote",
            session = %id,
            servers = state.channel_count(),
            clustered = state.is_clustered(),
            auto_commit = state.auto_commit(),
            "Session opened"
        );

        Ok(Arc::new(RemoteSession {
            id,
            config,
            state: Mutex::new(state),
            cancel_targets,
            closed: AtomicBool::new(false),
        }))
    }

    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Configuration the session was opened with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Acquire the session lock.
    pub fn lock(&self) -> SessionGuard<'_> {
        self.state.lock()
    }

    /// Returns true once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// True while more than one server is live.
    pub fn is_clustered(&self) -> bool {
        self.lock().is_clustered()
    }

    /// Live server count.
    pub fn server_count(&self) -> usize {
        self.lock().channel_count()
    }

    /// Client-side autocommit mode.
    pub fn auto_commit(&self) -> bool {
        self.lock().auto_commit()
    }

    /// Change the autocommit mode.
    ///
    /// A clustered session keeps server-side autocommit off and commits on
    /// every member itself, so only the local flag changes there.
    pub fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        let mut state = self.lock();
        state.check_open()?;
        if !state.is_clustered() {
            state.set_auto_commit_send(auto_commit)?;
        }
        state.set_auto_commit_local(auto_commit);
        Ok(())
    }

    /// Commit on every live server.
    pub fn commit(&self) -> Result<()> {
        let mut state = self.lock();
        state.check_open()?;
        state.commit_all()
    }

    /// Last session state read from the servers.
    pub fn session_state(&self) -> Vec<String> {
        self.lock().session_state().to_vec()
    }

    /// Replace the channel list after a forced reconnect.
    ///
    /// The reconnect epoch advances, so every command re-prepares before its
    /// next use.
    pub fn reconnect(&self, channels: Vec<ChannelRef>) -> Result<()> {
        if channels.is_empty() {
            return Err(Error::Config(
                "a session needs at least one server".to_string(),
            ));
        }
        let mut state = self.lock();
        if state.is_closed() {
            return Err(Error::SessionClosed);
        }
        state.replace_channels(channels);
        state.disable_server_auto_commit_if_clustered()?;
        info!(
            target: "strata::remote",
            session = %self.id,
            servers = state.channel_count(),
            epoch = state.reconnect_epoch(),
            "Session reconnected"
        );
        Ok(())
    }

    /// Ask every server to cancel `statement_id`.
    ///
    /// Does not take the session lock. Failures are logged and ignored.
    pub fn cancel_statement(&self, statement_id: ObjectId) {
        let targets = self.cancel_targets.read().clone();
        for channel in targets {
            if let Err(e) = channel.cancel(&self.id, statement_id) {
                debug!(
                    target: "strata::remote",
                    session = %self.id,
                    endpoint = channel.endpoint(),
                    statement = statement_id.as_i32(),
                    error = %e,
                    "Cancel failed"
                );
            }
        }
    }

    /// Close the session on every server. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut state = self.lock();
        for channel in state.channels() {
            if let Err(e) = channel.close_session() {
                error!(
                    target: "strata::remote",
                    session = %self.id,
                    endpoint = channel.endpoint(),
                    error = %e,
                    "Failed to close session on server"
                );
            }
        }
        state.mark_closed();
        info!(target: "strata::remote", session = %self.id, "Session closed");
    }
}
