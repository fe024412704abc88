//! Command executor capability.
//!
//! A [`CommandExecutor`] performs one command round trip: given a database
//! name and a command document it returns the server's response document.
//! The connection implements it; cursors consume it without owning the
//! connection.

use crate::error::ClientError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Future returned by [`CommandExecutor::run_command`].
pub type ExecutorFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ClientError>> + Send + 'a>>;

/// One-round-trip command execution capability.
pub trait CommandExecutor: Send + Sync {
    /// Runs `command` against `database` and resolves with the response
    /// document.
    fn run_command(&self, database: &str, command: Value) -> ExecutorFuture<'_>;
}
