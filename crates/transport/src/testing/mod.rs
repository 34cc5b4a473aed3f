//! Testing utilities for the remote client
//!
//! This module provides an in-memory cluster for exercising the session and
//! command layers without sockets:
//!
//! - **MemoryServer**: one simulated cluster member with fault injection
//! - **MemoryChannel**: a [`Channel`] backed by a `MemoryServer`
//! - **MemoryCluster**: N servers sharing one statement catalog
//!
//! # Example
//!
//! ```ignore
//! use strata_remote_transport::testing::{MemoryCluster, StatementBehavior};
//!
//! let cluster = MemoryCluster::new(3);
//! cluster.define("UPDATE T SET X = 1", StatementBehavior::update(1));
//! cluster.server(1).crash_on(Op::CommandExecuteUpdate, 1);
//! let session = RemoteSession::connect(cluster.channels(), ClientConfig::default())?;
//! ```

mod server;

pub use server::{MemoryServer, StatementBehavior};

use std::sync::Arc;

use strata_remote_core::{ObjectId, Result};

use crate::channel::{Channel, ChannelRef};
use crate::protocol::{Reply, Request};

/// A channel delivering requests straight to a [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    server: Arc<MemoryServer>,
}

impl MemoryChannel {
    /// Connect to `server`.
    pub fn new(server: Arc<MemoryServer>) -> Self {
        MemoryChannel { server }
    }

    /// The server behind this channel.
    pub fn server(&self) -> &Arc<MemoryServer> {
        &self.server
    }
}

impl Channel for MemoryChannel {
    fn endpoint(&self) -> &str {
        self.server.name()
    }

    fn call(&self, request: Request) -> Result<Reply> {
        self.server.handle(request)
    }

    fn send(&self, request: Request) -> Result<()> {
        self.server.handle(request).map(|_| ())
    }

    fn cancel(&self, _session_id: &str, statement_id: ObjectId) -> Result<()> {
        self.server.cancel(statement_id)
    }
}

/// A set of servers forming one replicated cluster.
#[derive(Debug, Clone)]
pub struct MemoryCluster {
    servers: Vec<Arc<MemoryServer>>,
}

impl MemoryCluster {
    /// Create `members` servers named `node-0`, `node-1`, ...
    pub fn new(members: usize) -> Self {
        MemoryCluster {
            servers: (0..members)
                .map(|i| MemoryServer::new(format!("node-{}", i)))
                .collect(),
        }
    }

    /// Create servers that retain only `window` object ids each.
    pub fn with_cache_window(members: usize, window: u32) -> Self {
        MemoryCluster {
            servers: (0..members)
                .map(|i| MemoryServer::with_cache_window(format!("node-{}", i), window))
                .collect(),
        }
    }

    /// Register `sql` on every member.
    pub fn define(&self, sql: &str, behavior: StatementBehavior) {
        for server in &self.servers {
            server.define(sql, behavior.clone());
        }
    }

    /// Turn request recording on or off on every member.
    pub fn set_journaling(&self, enabled: bool) {
        for server in &self.servers {
            server.set_journaling(enabled);
        }
    }

    /// Member `index`.
    pub fn server(&self, index: usize) -> &Arc<MemoryServer> {
        &self.servers[index]
    }

    /// All members, in order.
    pub fn servers(&self) -> &[Arc<MemoryServer>] {
        &self.servers
    }

    /// Fresh channels to every member, in order.
    pub fn channels(&self) -> Vec<ChannelRef> {
        self.servers
            .iter()
            .map(|server| Arc::new(MemoryChannel::new(Arc::clone(server))) as ChannelRef)
            .collect()
    }
}
