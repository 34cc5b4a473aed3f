//! Common test utilities for cluster tests

use std::sync::Arc;
use stratadb_remote::testing::{MemoryCluster, StatementBehavior};
use stratadb_remote::{ClientConfig, ColumnMeta, DataType, ParamMeta, RemoteSession, Value};

pub const CREATE: &str = "CREATE TABLE ACCOUNTS(ID INT, BALANCE BIGINT)";
pub const DEPOSIT: &str = "UPDATE ACCOUNTS SET BALANCE = BALANCE + ? WHERE ID = ?";
pub const BALANCES: &str = "SELECT ID, BALANCE FROM ACCOUNTS";
pub const NOW: &str = "SELECT CURRENT_TIMESTAMP()";

/// Install a test-writer subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Create a cluster of `members` servers with the account catalog.
pub fn create_cluster(members: usize) -> MemoryCluster {
    init_tracing();
    let cluster = MemoryCluster::new(members);
    cluster.define(CREATE, StatementBehavior::update(0));
    cluster.define(
        DEPOSIT,
        StatementBehavior::update(1).with_params(vec![
            ParamMeta::of(DataType::BigInt),
            ParamMeta::of(DataType::Int),
        ]),
    );
    cluster.define(
        BALANCES,
        StatementBehavior::query(
            vec![
                ColumnMeta::new("ID", DataType::Int),
                ColumnMeta::new("BALANCE", DataType::BigInt),
            ],
            (1..=20).map(|i| vec![Value::Int(i), Value::Int(i * 100)]).collect(),
        ),
    );
    cluster.define(
        NOW,
        StatementBehavior::query(
            vec![ColumnMeta::new("NOW", DataType::Timestamp)],
            vec![vec![Value::String("2026-10-19 12:00:00".into())]],
        )
        .not_read_only(),
    );
    cluster
}

/// Connect a session with the default configuration.
pub fn create_session(cluster: &MemoryCluster) -> Arc<RemoteSession> {
    RemoteSession::connect(cluster.channels(), ClientConfig::default()).unwrap()
}
