//! Channel failover primitive
//!
//! Every multi-channel operation (prepare, execute, commit, ...) is a fold
//! over the live channel list. A visitor is called with the session state
//! and the channel to use. A transport error drops that channel from the
//! session; order is preserved and a removed channel is never seen again.
//!
//! A visitor may do nested work first (a re-prepare is itself a fold) that
//! removes any channel, including the one being visited. The fold tracks
//! channels by identity rather than position, so the next step is always
//! the first live channel not yet visited. A visitor that has done nested
//! work checks [`SessionState::is_live`] before using its channel.

use std::ops::ControlFlow;
use std::sync::Arc;

use strata_remote_core::{Error, Result};
use strata_remote_transport::ChannelRef;
use tracing::{info, warn};

use crate::state::SessionState;

impl SessionState {
    /// Visit live channels in order until the visitor breaks or the list ends.
    ///
    /// - `Ok(Continue)` moves to the next channel.
    /// - `Ok(Break)` stops the fold successfully.
    /// - A transport error removes the channel and moves on.
    /// - Any other error aborts the fold and is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoReachableServer`] once the last channel is removed.
    pub fn visit_channels<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(&mut SessionState, &ChannelRef) -> Result<ControlFlow<()>>,
    {
        let mut visited: Vec<ChannelRef> = Vec::with_capacity(self.channels.len());
        let mut failures = 0;
        while let Some(target) = self.next_unvisited(&visited) {
            visited.push(Arc::clone(&target));
            match visit(self, &target) {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break,
                Err(err) if err.is_transport() => {
                    failures += 1;
                    match self.position_of(&target) {
                        Some(index) => self.remove_channel(index, &err, failures)?,
                        None if self.channels.is_empty() => {
                            return Err(Error::NoReachableServer { failures })
                        }
                        None => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn next_unvisited(&self, visited: &[ChannelRef]) -> Option<ChannelRef> {
        self.channels
            .iter()
            .find(|channel| !visited.iter().any(|seen| Arc::ptr_eq(seen, *channel)))
            .cloned()
    }

    /// Drop the channel at `index` after `err`.
    ///
    /// `failures` is the number of channels lost so far in the current call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoReachableServer`] if no channel remains.
    pub fn remove_channel(&mut self, index: usize, err: &Error, failures: usize) -> Result<()> {
        if index >= self.channels.len() {
            return Ok(());
        }
        let channel = self.channels.remove(index);
        self.sync_cancel_targets();
        warn!(
            target: "strata::remote",
            session = %self.session_id,
            endpoint = channel.endpoint(),
            remaining = self.channels.len(),
            failures,
            error = %err,
            "Removing server because of exception"
        );

        match self.channels.len() {
            0 => Err(Error::NoReachableServer { failures }),
            1 => {
                info!(
                    target: "strata::remote",
                    session = %self.session_id,
                    endpoint = self.channels[0].endpoint(),
                    "Cluster reduced to a single server"
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use parking_lot::RwLock;
    use proptest::prelude::*;
    use std::sync::Arc;
    use strata_remote_core::ObjectId;
    use strata_remote_transport::testing::MemoryCluster;
    use strata_remote_transport::Op;

    fn state_for(cluster: &MemoryCluster) -> SessionState {
        let channels = cluster.channels();
        let targets = Arc::new(RwLock::new(channels.clone()));
        SessionState::new("test".into(), channels, targets, &ClientConfig::default())
    }

    /// Commit on every channel, recording the endpoints that answered.
    fn commit_all(state: &mut SessionState) -> Result<Vec<String>> {
        let mut answered = Vec::new();
        state.visit_channels(|_, channel| {
            channel.commit()?;
            answered.push(channel.endpoint().to_string());
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(answered)
    }

    #[test]
    fn test_failed_channel_removed_and_order_kept() {
        let cluster = MemoryCluster::new(4);
        cluster.server(1).go_down();
        let mut state = state_for(&cluster);

        let answered = commit_all(&mut state).unwrap();

        assert_eq!(answered, vec!["node-0", "node-2", "node-3"]);
        let remaining: Vec<&str> = state.channels().iter().map(|c| c.endpoint()).collect();
        assert_eq!(remaining, vec!["node-0", "node-2", "node-3"]);
        assert_eq!(state.cancel_targets.read().len(), 3);
    }

    #[test]
    fn test_removed_channel_not_revisited_by_later_calls() {
        let cluster = MemoryCluster::new(2);
        cluster.server(0).go_down();
        let mut state = state_for(&cluster);

        commit_all(&mut state).unwrap();
        commit_all(&mut state).unwrap();

        // Only the first call reached the dead server.
        assert_eq!(cluster.server(0).rejected(), 1);
        assert_eq!(cluster.server(1).commits(), 2);
    }

    #[test]
    fn test_all_channels_failing_is_no_reachable_server() {
        let cluster = MemoryCluster::new(3);
        for server in cluster.servers() {
            server.go_down();
        }
        let mut state = state_for(&cluster);

        let err = commit_all(&mut state).unwrap_err();
        assert!(matches!(err, Error::NoReachableServer { failures: 3 }));
        assert_eq!(state.channel_count(), 0);
    }

    #[test]
    fn test_nested_removal_of_earlier_channel_skips_nobody() {
        let cluster = MemoryCluster::new(3);
        // node-0 has already been visited when the nested commit kills it
        cluster.server(0).crash_on(Op::CommandCommit, 1);
        let mut state = state_for(&cluster);

        let mut answered = Vec::new();
        state
            .visit_channels(|state, channel| {
                if channel.endpoint() == "node-1" {
                    state.commit_all()?;
                }
                if !state.is_live(channel) {
                    return Ok(ControlFlow::Continue(()));
                }
                channel.read_session_state()?;
                answered.push(channel.endpoint().to_string());
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();

        assert_eq!(answered, vec!["node-0", "node-1", "node-2"]);
        assert_eq!(state.channel_count(), 2);
        assert_eq!(cluster.server(2).count(Op::SessionReadState), 1);
    }

    #[test]
    fn test_nested_removal_of_visited_channel_moves_on() {
        let cluster = MemoryCluster::new(3);
        cluster.server(1).crash_on(Op::CommandCommit, 1);
        let mut state = state_for(&cluster);

        let mut answered = Vec::new();
        state
            .visit_channels(|state, channel| {
                if channel.endpoint() == "node-1" {
                    state.commit_all()?;
                }
                if !state.is_live(channel) {
                    return Ok(ControlFlow::Continue(()));
                }
                answered.push(channel.endpoint().to_string());
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();

        assert_eq!(answered, vec!["node-0", "node-2"]);
        assert_eq!(cluster.server(1).rejected(), 0);
    }

    #[test]
    fn test_break_stops_after_first_success() {
        let cluster = MemoryCluster::new(3);
        let mut state = state_for(&cluster);
        let mut visited = 0;
        state
            .visit_channels(|_, channel| {
                channel.commit()?;
                visited += 1;
                Ok(ControlFlow::Break(()))
            })
            .unwrap();
        assert_eq!(visited, 1);
        assert_eq!(cluster.server(1).commits(), 0);
    }

    #[test]
    fn test_server_error_aborts_without_removal() {
        let cluster = MemoryCluster::new(2);
        let mut state = state_for(&cluster);
        let err = state
            .visit_channels(|_, channel| {
                // Nothing is prepared under this id, so the server refuses.
                channel.execute_update(ObjectId::new(99), vec![])?;
                Ok(ControlFlow::Continue(()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Server { .. }));
        assert_eq!(state.channel_count(), 2);
        assert_eq!(cluster.server(1).count(Op::CommandExecuteUpdate), 0);
    }

    proptest! {
        #[test]
        fn prop_survivors_keep_relative_order(down in proptest::collection::vec(any::<bool>(), 1..8)) {
            let cluster = MemoryCluster::new(down.len());
            for (server, is_down) in cluster.servers().iter().zip(&down) {
                if *is_down {
                    server.go_down();
                }
            }
            let expected: Vec<String> = cluster
                .servers()
                .iter()
                .zip(&down)
                .filter(|(_, is_down)| !**is_down)
                .map(|(server, _)| server.name().to_string())
                .collect();

            let mut state = state_for(&cluster);
            match commit_all(&mut state) {
                Ok(answered) => {
                    prop_assert_eq!(&answered, &expected);
                    let remaining: Vec<String> =
                        state.channels().iter().map(|c| c.endpoint().to_string()).collect();
                    prop_assert_eq!(remaining, expected);
                }
                Err(err) => {
                    prop_assert!(expected.is_empty());
                    let all_down = matches!(err, Error::NoReachableServer { .. });
                    prop_assert!(all_down);
                }
            }
            for server in cluster.servers() {
                prop_assert!(server.rejected() <= 1);
            }
        }
    }
}
