//! Scenario tests for the executor crate, run against in-memory clusters.

use std::sync::Arc;

use strata_remote_core::{ColumnMeta, DataType, ParamMeta, Value};
use strata_remote_session::{ClientConfig, RemoteSession};
use strata_remote_transport::testing::{MemoryCluster, StatementBehavior};


pub(crate) const SELECT_ALL: &str = "SELECT ID, NAME FROM USERS";
pub(crate) const SELECT_RANDOM: &str = "SELECT ID FROM USERS ORDER BY RAND()";
pub(crate) const SELECT_BY_ID: &str = "SELECT NAME FROM USERS WHERE ID = ?";
pub(crate) const INSERT: &str = "INSERT INTO USERS VALUES(?, ?)";
pub(crate) const DELETE_ALL: &str = "DELETE FROM USERS";
pub(crate) const SET_SCHEMA: &str = "SET SCHEMA APP";

/// Send logs to the test harness output. Safe to call more than once.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub(crate) fn user_rows(n: i64) -> Vec<Vec<Value>> {
    (1..=n)
        .map(|i| vec![Value::Int(i), Value::String(format!("user-{}", i))])
        .collect()
}

/// Define the statements every scenario uses on every member.
pub(crate) fn define_catalog(cluster: &MemoryCluster) {
    let columns = vec![
        ColumnMeta::new("ID", DataType::Int),
        ColumnMeta::new("NAME", DataType::Varchar),
    ];
    cluster.define(SELECT_ALL, StatementBehavior::query(columns, user_rows(5)));
    cluster.define(
        SELECT_RANDOM,
        StatementBehavior::query(
            vec![ColumnMeta::new("ID", DataType::Int)],
            vec![vec![Value::Int(3)], vec![Value::Int(1)]],
        )
        .not_read_only(),
    );
    cluster.define(
        SELECT_BY_ID,
        StatementBehavior::query(
            vec![ColumnMeta::new("NAME", DataType::Varchar)],
            vec![vec![Value::String("user-1".into())]],
        )
        .with_params(vec![ParamMeta::of(DataType::Int)]),
    );
    cluster.define(
        INSERT,
        StatementBehavior::update(1).with_params(vec![
            ParamMeta::of(DataType::Int),
            ParamMeta::of(DataType::Varchar),
        ]),
    );
    cluster.define(DELETE_ALL, StatementBehavior::update(5));
    cluster.define(
        SET_SCHEMA,
        StatementBehavior::update(0).changing_session_state(),
    );
}

/// A cluster of `members` servers with the catalog defined, and a session on it.
pub(crate) fn connect(members: usize) -> (MemoryCluster, Arc<RemoteSession>) {
    connect_with(MemoryCluster::new(members), ClientConfig::default())
}

pub(crate) fn connect_with(
    cluster: MemoryCluster,
    config: ClientConfig,
) -> (MemoryCluster, Arc<RemoteSession>) {
    init_tracing();
    define_catalog(&cluster);
    let session = RemoteSession::connect(cluster.channels(), config).unwrap();
    (cluster, session)
}
