//! Cluster Client Tests
//!
//! End-to-end tests through the public API of `stratadb-remote`:
//! - Command lifecycle on single servers and clusters
//! - Member failures during prepare, execute and commit
//! - Sharing one session between threads, out-of-band cancel

mod common;

mod concurrency;
mod failover;
mod lifecycle;
