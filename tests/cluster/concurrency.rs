//! One session shared between threads.

use crate::common::*;
use std::sync::Arc;
use std::thread;
use stratadb_remote::{Op, RemoteCommand};

#[test]
fn commands_on_many_threads_share_one_session() {
    let cluster = create_cluster(2);
    let session = create_session(&cluster);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let mut deposit = RemoteCommand::prepare(&session, DEPOSIT).unwrap();
                for _ in 0..10 {
                    deposit.set_parameter(0, 1).unwrap();
                    deposit.set_parameter(1, t).unwrap();
                    deposit.execute_update().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for server in cluster.servers() {
        assert_eq!(server.applied_updates(), 40);
        assert_eq!(server.count(Op::SessionPrepareReadParams), 4);
        assert_eq!(server.count(Op::CommandClose), 4);
    }
}

#[test]
fn cancel_does_not_wait_for_session_lock() {
    let cluster = create_cluster(2);
    let session = create_session(&cluster);
    let command = RemoteCommand::prepare(&session, BALANCES).unwrap();
    let handle = command.cancel_handle().unwrap();
    let id = command.statement_id();

    // Simulate an execute in flight on this thread.
    let guard = session.lock();
    thread::spawn(move || handle.cancel()).join().unwrap();
    drop(guard);

    for server in cluster.servers() {
        assert_eq!(server.cancelled(), vec![id]);
    }
}

#[test]
fn cancel_skips_removed_members() {
    let cluster = create_cluster(3);
    let session = create_session(&cluster);
    let mut balances = RemoteCommand::prepare(&session, BALANCES).unwrap();
    cluster.server(0).go_down();
    balances.execute_query(0, false).unwrap();

    balances.cancel();

    assert!(cluster.server(0).cancelled().is_empty());
    assert_eq!(cluster.server(1).cancelled().len(), 1);
    assert_eq!(cluster.server(2).cancelled().len(), 1);
}
