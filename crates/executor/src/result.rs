//! Client-side result cursor
//!
//! A [`RemoteResult`] is bound to the channel and object id it was opened
//! on. The first batch of rows arrives with the execute reply; later batches
//! are pulled with `RESULT_FETCH_ROWS`. The server cursor is released as soon
//! as the last row has been received, or on [`RemoteResult::close`].

use std::collections::VecDeque;

use strata_remote_core::{ColumnMeta, Error, ObjectId, Result, Value};
use strata_remote_transport::{ChannelRef, ResultHeader};
use tracing::{debug, error};

/// Rows of one executed query, streamed from a single server.
#[derive(Debug)]
pub struct RemoteResult {
    channel: ChannelRef,
    object_id: ObjectId,
    columns: Vec<ColumnMeta>,
    row_count: i64,
    fetch_size: i32,
    buffer: VecDeque<Vec<Value>>,
    received: i64,
    remote_open: bool,
    closed: bool,
}

impl RemoteResult {
    /// Wrap a freshly opened cursor.
    pub fn open(
        channel: ChannelRef,
        object_id: ObjectId,
        header: ResultHeader,
        fetch_size: i32,
    ) -> Self {
        let ResultHeader {
            columns,
            row_count,
            rows,
        } = header;
        let received = rows.len() as i64;
        let mut result = RemoteResult {
            channel,
            object_id,
            columns,
            row_count,
            fetch_size: fetch_size.max(1),
            buffer: rows.into(),
            received,
            remote_open: true,
            closed: false,
        };
        if result.fully_received() {
            result.release_remote();
        }
        result
    }

    /// Column descriptors.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Total rows in the result.
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// Cursor id on the server.
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// Endpoint of the server holding the cursor.
    pub fn endpoint(&self) -> &str {
        self.channel.endpoint()
    }

    /// Rows per fetch round trip.
    pub fn fetch_size(&self) -> i32 {
        self.fetch_size
    }

    /// Returns true once the result has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Next row, fetching another batch from the server if needed.
    ///
    /// # Errors
    ///
    /// - the server's "object closed" error if the result was closed
    /// - `Error::Transport` if the channel broke; the result stays usable
    ///   for the rows already buffered
    pub fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if self.closed {
            return Err(Error::object_closed(self.object_id));
        }
        if self.buffer.is_empty() && !self.fully_received() {
            self.fetch_batch()?;
        }
        Ok(self.buffer.pop_front())
    }

    /// Drain every remaining row.
    pub fn collect_rows(&mut self) -> Result<Vec<Vec<Value>>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Release the result locally and on the server. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.buffer.clear();
        self.release_remote();
    }

    fn fully_received(&self) -> bool {
        self.received >= self.row_count
    }

    fn fetch_batch(&mut self) -> Result<()> {
        let remaining = self.row_count - self.received;
        let count = i64::from(self.fetch_size).min(remaining) as i32;
        debug!(
            target: "strata::remote",
            endpoint = self.channel.endpoint(),
            op = "RESULT_FETCH_ROWS",
            id = self.object_id.as_i32(),
            count,
            "operation"
        );
        let rows = self.channel.fetch_rows(self.object_id, count)?.body;
        if rows.is_empty() {
            return Err(Error::Protocol(format!(
                "cursor {} ended after {} of {} rows",
                self.object_id, self.received, self.row_count
            )));
        }
        self.received += rows.len() as i64;
        self.buffer.extend(rows);
        if self.fully_received() {
            self.release_remote();
        }
        Ok(())
    }

    fn release_remote(&mut self) {
        if !self.remote_open {
            return;
        }
        self.remote_open = false;
        debug!(
            target: "strata::remote",
            endpoint = self.channel.endpoint(),
            op = "RESULT_CLOSE",
            id = self.object_id.as_i32(),
            "operation"
        );
        if let Err(e) = self.channel.close_result(self.object_id) {
            error!(
                target: "strata::remote",
                endpoint = self.channel.endpoint(),
                id = self.object_id.as_i32(),
                error = %e,
                "Failed to close result"
            );
        }
    }
}

impl Drop for RemoteResult {
    fn drop(&mut self) {
        self.close();
    }
}
