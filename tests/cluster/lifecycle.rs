//! Command lifecycle through the facade crate.

use crate::common::*;
use stratadb_remote::{ClientConfig, Error, Op, RemoteCommand, RemoteSession, Value};

#[test]
fn single_server_round_trip() {
    let cluster = create_cluster(1);
    let config = ClientConfig {
        fetch_size: 8,
        ..ClientConfig::default()
    };
    let session = RemoteSession::connect(cluster.channels(), config).unwrap();

    let mut create = RemoteCommand::prepare(&session, CREATE).unwrap();
    assert_eq!(create.execute_update().unwrap(), 0);

    let mut deposit = RemoteCommand::prepare(&session, DEPOSIT).unwrap();
    deposit.set_parameter(0, 50).unwrap();
    deposit.set_parameter(1, 3).unwrap();
    assert_eq!(deposit.execute_update().unwrap(), 1);
    assert_eq!(deposit.to_string(), format!("{} {{1: 50, 2: 3}}", DEPOSIT));

    let mut balances = RemoteCommand::prepare(&session, BALANCES).unwrap();
    let mut result = balances.execute_query(0, false).unwrap();
    let rows = result.collect_rows().unwrap();
    assert_eq!(rows.len(), 20);
    assert_eq!(rows[2], vec![Value::Int(3), Value::Int(300)]);

    let server = cluster.server(0);
    // 8 inline, then 8 + 4
    assert_eq!(server.count(Op::ResultFetchRows), 2);
    assert_eq!(server.open_cursors(), 0);
    assert_eq!(server.commits(), 0);
}

#[test]
fn cluster_round_trip() {
    let cluster = create_cluster(3);
    let session = create_session(&cluster);
    assert!(session.is_clustered());

    let mut deposit = RemoteCommand::prepare(&session, DEPOSIT).unwrap();
    for id in 1..=4 {
        deposit.set_parameter(0, 10).unwrap();
        deposit.set_parameter(1, id).unwrap();
        deposit.execute_update().unwrap();
    }

    let mut balances = RemoteCommand::prepare(&session, BALANCES).unwrap();
    let rows = balances.execute_query(0, false).unwrap().collect_rows().unwrap();
    assert_eq!(rows.len(), 20);

    for server in cluster.servers() {
        assert_eq!(server.applied_updates(), 4);
        // One commit per update plus one for the query.
        assert_eq!(server.commits(), 5);
        assert!(!server.auto_commit());
    }
    assert_eq!(cluster.server(0).count(Op::CommandExecuteQuery), 1);
    assert_eq!(cluster.server(2).count(Op::CommandExecuteQuery), 0);
}

#[test]
fn non_deterministic_query_runs_on_every_member() {
    let cluster = create_cluster(2);
    let session = create_session(&cluster);
    let mut now = RemoteCommand::prepare(&session, NOW).unwrap();

    let result = now.execute_query(0, false).unwrap();

    assert_eq!(result.endpoint(), "node-1");
    for server in cluster.servers() {
        assert_eq!(server.count(Op::CommandExecuteQuery), 1);
        assert_eq!(server.open_cursors(), 0);
    }
}

#[test]
fn session_close_ends_everything() {
    let cluster = create_cluster(2);
    let session = create_session(&cluster);
    let mut balances = RemoteCommand::prepare(&session, BALANCES).unwrap();

    session.close();
    session.close();

    assert!(matches!(
        balances.execute_query(0, false),
        Err(Error::SessionClosed)
    ));
    balances.close();
    for server in cluster.servers() {
        assert!(server.session_closed());
        assert_eq!(server.count(Op::SessionClose), 1);
        assert_eq!(server.count(Op::CommandClose), 0);
    }
}

#[test]
fn reconnect_reprepares_transparently() {
    let cluster = create_cluster(2);
    let session = create_session(&cluster);
    let mut balances = RemoteCommand::prepare(&session, BALANCES).unwrap();

    // A fresh cluster stands in for the reconnected servers.
    let replacement = create_cluster(2);
    session.reconnect(replacement.channels()).unwrap();
    let rows = balances.execute_query(5, false).unwrap().collect_rows().unwrap();

    assert_eq!(rows.len(), 5);
    assert_eq!(replacement.server(0).count(Op::SessionPrepare), 1);
    assert_eq!(replacement.server(1).count(Op::SessionPrepare), 1);
    assert_eq!(cluster.server(0).count(Op::CommandExecuteQuery), 0);
}

#[test]
fn config_file_defaults_match_client_defaults() {
    let config = ClientConfig::from_toml_str(ClientConfig::default_toml()).unwrap();
    assert_eq!(config, ClientConfig::default());
}
