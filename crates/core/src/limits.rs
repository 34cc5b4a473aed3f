//! Protocol defaults
//!
//! These values mirror what a server is configured with out of the box.
//! The client may override the fetch size and cache window through
//! `ClientConfig`, but must never exceed what the server actually retains.

/// Number of most recent object ids a server keeps metadata for.
///
/// A prepared statement whose id falls out of this window (relative to the
/// session's high-water id) may have been evicted and must be re-prepared.
pub const SERVER_CACHED_OBJECTS: u32 = 64;

/// Rows transferred per round trip for a non-scrollable, non-clustered query.
pub const DEFAULT_FETCH_SIZE: u32 = 100;

/// Fetch size meaning "send every row in one batch".
///
/// Used for clustered sessions and scrollable cursors, where the result must
/// not depend on a server-side cursor that could be lost on failover.
pub const UNBOUNDED_FETCH: i32 = i32::MAX;
