//! Database-scoped handle.

use crate::client::Client;
use crate::cursor::CommandCursor;
use crate::error::ClientError;
use serde_json::{json, Value};

/// Lightweight handle scoping commands to one database.
///
/// Constructing one performs no I/O; operations fail with
/// [`ClientError::NotConnected`] if the client has no live connection.
#[derive(Clone)]
pub struct Database {
    name: String,
    client: Client,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish()
    }
}

impl Database {
    pub(crate) fn new(name: String, client: Client) -> Self {
        Self { name, client }
    }

    /// The database name this handle is scoped to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs a command against this database.
    pub async fn run_command(&self, command: Value) -> Result<Value, ClientError> {
        self.client.run_command(&self.name, command).await
    }

    /// Opens a cursor over this database's collection listing.
    ///
    /// The `listCollections` command runs lazily on the cursor's first
    /// `next` call.
    pub fn list_collections(&self, filter: Option<Value>) -> Result<CommandCursor, ClientError> {
        let executor = self.client.cluster()?;
        let mut command = json!({ "listCollections": 1 });
        if let Some(filter) = filter {
            command["filter"] = filter;
        }
        Ok(CommandCursor::new(executor, &self.name, command))
    }
}
