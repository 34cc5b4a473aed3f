//! Member failures seen through the public API.

use crate::common::*;
use proptest::prelude::*;
use stratadb_remote::{Error, ErrorKind, Op, RemoteCommand};

#[test]
fn crashed_member_is_dropped_and_work_continues() {
    let cluster = create_cluster(3);
    let session = create_session(&cluster);
    let mut deposit = RemoteCommand::prepare(&session, DEPOSIT).unwrap();
    deposit.set_parameter(0, 10).unwrap();
    deposit.set_parameter(1, 1).unwrap();

    cluster.server(0).crash_on(Op::CommandExecuteUpdate, 2);
    deposit.execute_update().unwrap();
    deposit.execute_update().unwrap();
    deposit.execute_update().unwrap();

    assert_eq!(session.server_count(), 2);
    assert_eq!(cluster.server(0).applied_updates(), 1);
    assert_eq!(cluster.server(1).applied_updates(), 3);
    assert_eq!(cluster.server(0).rejected(), 0);
}

#[test]
fn losing_every_member_is_unavailable() {
    let cluster = create_cluster(2);
    let session = create_session(&cluster);
    let mut balances = RemoteCommand::prepare(&session, BALANCES).unwrap();
    cluster.server(0).go_down();
    cluster.server(1).go_down();

    let err = balances.execute_query(0, false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(matches!(err, Error::NoReachableServer { failures: 2 }));
    // Nothing left to talk to; later calls fail without touching the servers.
    let err = RemoteCommand::prepare(&session, BALANCES).unwrap_err();
    assert!(matches!(err, Error::NoReachableServer { failures: 0 }));
    assert_eq!(cluster.server(0).rejected(), 1);
}

#[test]
fn cluster_degrades_to_single_server_mode() {
    let cluster = create_cluster(2);
    let session = create_session(&cluster);
    let mut now = RemoteCommand::prepare(&session, NOW).unwrap();
    cluster.server(1).go_down();

    now.execute_query(0, false).unwrap();
    assert!(!session.is_clustered());

    // Single-server mode: no client-driven commits any more.
    let commits = cluster.server(0).commits();
    now.execute_query(0, false).unwrap();
    assert_eq!(cluster.server(0).commits(), commits);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Members that crash during an update never see later requests, the
    /// survivors all apply it, and the call fails only if nobody survived.
    #[test]
    fn update_applies_on_exactly_the_survivors(crashes in proptest::collection::vec(any::<bool>(), 1..6)) {
        let cluster = create_cluster(crashes.len());
        let session = create_session(&cluster);
        let mut deposit = RemoteCommand::prepare(&session, DEPOSIT).unwrap();
        deposit.set_parameter(0, 1).unwrap();
        deposit.set_parameter(1, 1).unwrap();
        for (server, crash) in cluster.servers().iter().zip(&crashes) {
            if *crash {
                server.crash_on(Op::CommandExecuteUpdate, 1);
            }
        }

        let survivors = crashes.iter().filter(|c| !**c).count();
        let outcome = deposit.execute_update();

        prop_assert_eq!(outcome.is_ok(), survivors > 0);
        prop_assert_eq!(session.server_count(), survivors);
        for (server, crash) in cluster.servers().iter().zip(&crashes) {
            prop_assert_eq!(server.applied_updates(), usize::from(!*crash));
            prop_assert_eq!(server.rejected(), 0);
        }
    }
}
