//! High-level client API.

use crate::connection::Connection;
use crate::database::Database;
use crate::error::ClientError;
use crate::options::{ClientOptions, ADMIN_DB};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Client state behind the facade. The cluster handle is written only by
/// a successful `connect` and invalidated only by `close`.
struct ClientState {
    cluster: Option<Arc<Connection>>,
    read_loop: Option<JoinHandle<()>>,
    default_db: String,
    build_info: Option<Value>,
}

/// High-level client for docdb.
///
/// Cheap to clone; clones share the same connection state.
#[derive(Clone)]
pub struct Client {
    state: Arc<Mutex<ClientState>>,
}

impl Client {
    /// Creates a new, unconnected client.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ClientState {
                cluster: None,
                read_loop: None,
                default_db: ADMIN_DB.to_string(),
                build_info: None,
            })),
        }
    }

    /// Connects using a `docdb://` connection string.
    pub async fn connect_uri(&self, uri: &str) -> Result<Database, ClientError> {
        let options = uri
            .parse::<ClientOptions>()
            .map_err(ClientError::into_connection_failed)?;
        self.connect(options).await
    }

    /// Opens a connection, authenticates, fetches server build info, and
    /// returns a handle to the default database.
    ///
    /// Any sub-step failure surfaces as
    /// [`ClientError::ConnectionFailed`] and no partial connection is
    /// retained. An existing connection is replaced only once the new
    /// one is fully established, so a failed reconnect leaves the
    /// client on its previous connection.
    pub async fn connect(&self, options: ClientOptions) -> Result<Database, ClientError> {
        let default_db = options.default_db.clone();
        let connection = Arc::new(Connection::new(options));

        if let Err(e) = connection.connect().await {
            connection.close().await;
            return Err(e.into_connection_failed());
        }

        let read_loop = tokio::spawn({
            let connection = connection.clone();
            async move {
                if let Err(e) = connection.read_loop().await {
                    tracing::debug!("read loop exited: {e}");
                }
            }
        });

        let build_info = match connection.request(ADMIN_DB, json!({"buildInfo": 1})).await {
            Ok(info) => info,
            Err(e) => {
                read_loop.abort();
                connection.close().await;
                return Err(e.into_connection_failed());
            }
        };
        tracing::debug!(
            "connected to server version {}",
            build_info
                .get("version")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown")
        );

        let (old_cluster, old_read_loop) = {
            let mut state = self.state.lock().unwrap();
            let previous = (state.cluster.take(), state.read_loop.take());
            state.cluster = Some(connection);
            state.read_loop = Some(read_loop);
            state.default_db = default_db.clone();
            state.build_info = Some(build_info);
            previous
        };

        // Tear down the replaced connection, dispatch task first so it
        // releases the reader.
        if let Some(handle) = old_read_loop {
            handle.abort();
        }
        if let Some(old) = old_cluster {
            old.close().await;
        }

        Ok(self.database(default_db))
    }

    /// Returns the live cluster handle.
    pub fn cluster(&self) -> Result<Arc<Connection>, ClientError> {
        self.state
            .lock()
            .unwrap()
            .cluster
            .clone()
            .ok_or(ClientError::NotConnected)
    }

    /// Returns whether a connection is currently live.
    pub fn is_connected(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .cluster
            .as_ref()
            .is_some_and(|c| c.is_connected())
    }

    /// Runs one command against the named database.
    pub async fn run_command(&self, database: &str, command: Value) -> Result<Value, ClientError> {
        let cluster = self.cluster()?;
        cluster.request(database, command).await
    }

    /// Lists databases via the administrative `listDatabases` command,
    /// merging `filter` options into the command document. Returns the
    /// reply's `databases` array verbatim.
    pub async fn list_databases(&self, filter: Option<Value>) -> Result<Vec<Value>, ClientError> {
        let mut command = json!({ "listDatabases": 1 });
        if let Some(Value::Object(options)) = filter {
            for (key, value) in options {
                command[key] = value;
            }
        }

        let reply = self.run_command(ADMIN_DB, command).await?;
        Ok(reply
            .get("databases")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Returns a handle scoped to the named database. Performs no I/O.
    pub fn database(&self, name: impl Into<String>) -> Database {
        Database::new(name.into(), self.clone())
    }

    /// Returns a handle to the default database (the connection string's
    /// database, or `admin`).
    pub fn default_database(&self) -> Database {
        let name = self.state.lock().unwrap().default_db.clone();
        self.database(name)
    }

    /// Returns the build information document cached at connect time.
    pub fn build_info(&self) -> Option<Value> {
        self.state.lock().unwrap().build_info.clone()
    }

    /// Closes the connection, if any. Idempotent.
    pub async fn close(&self) {
        let (cluster, read_loop) = {
            let mut state = self.state.lock().unwrap();
            state.build_info = None;
            (state.cluster.take(), state.read_loop.take())
        };

        // Stop the dispatch task first so it releases the reader.
        if let Some(handle) = read_loop {
            handle.abort();
        }
        if let Some(connection) = cluster {
            connection.close().await;
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
