//! Connection management.

use crate::auth;
use crate::error::ClientError;
use crate::executor::{CommandExecutor, ExecutorFuture};
use crate::options::{ClientOptions, ADMIN_DB};
use docdb_protocol::{encode_message, Decoder, OpCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};

/// Driver identification sent in the handshake.
const DRIVER_NAME: &str = "docdb-rust";
const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client metadata reported by the `hello` command.
#[derive(Debug, Serialize)]
struct ClientMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    application: Option<ApplicationMetadata>,
    driver: DriverMetadata,
    os: OsMetadata,
    /// Per-connection instance id.
    instance: String,
}

#[derive(Debug, Serialize)]
struct ApplicationMetadata {
    name: String,
}

#[derive(Debug, Serialize)]
struct DriverMetadata {
    name: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct OsMetadata {
    #[serde(rename = "type")]
    os_type: String,
    architecture: String,
}

impl ClientMetadata {
    fn new(app_name: Option<&str>) -> Self {
        Self {
            application: app_name.map(|name| ApplicationMetadata {
                name: name.to_string(),
            }),
            driver: DriverMetadata {
                name: DRIVER_NAME.to_string(),
                version: DRIVER_VERSION.to_string(),
            },
            os: OsMetadata {
                os_type: std::env::consts::OS.to_string(),
                architecture: std::env::consts::ARCH.to_string(),
            },
            instance: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// A connection to a docdb server.
///
/// Doubles as the cluster handle: topology metadata beyond the cached
/// `hello` reply is out of scope for a single-node client.
pub struct Connection {
    options: ClientOptions,
    /// Write half of the stream (for sending commands).
    writer: Mutex<Option<OwnedWriteHalf>>,
    /// Read half of the stream (for receiving replies).
    reader: Mutex<Option<OwnedReadHalf>>,
    /// Decoder for parsing replies.
    decoder: Mutex<Decoder>,
    /// Pending requests waiting for replies, keyed by request id.
    pending: Mutex<HashMap<u32, oneshot::Sender<Value>>>,
    /// Next request id.
    next_id: AtomicU32,
    /// Is the connection established?
    connected: AtomicBool,
    /// Reply to the handshake `hello` command.
    hello_reply: std::sync::Mutex<Option<Value>>,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            decoder: Mutex::new(Decoder::new()),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            connected: AtomicBool::new(false),
            hello_reply: std::sync::Mutex::new(None),
        }
    }

    /// Connects to the server and performs the handshake.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let (host, port) = self.options.address();
        tracing::debug!("connecting to {}:{}", host, port);

        let stream = tokio::time::timeout(
            self.options.connect_timeout,
            TcpStream::connect((host.as_str(), port)),
        )
        .await
        .map_err(|_| ClientError::Timeout)?
        .map_err(ClientError::Io)?;

        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);
        *self.reader.lock().await = Some(read_half);
        self.decoder.lock().await.clear();

        tracing::debug!("TCP connected, starting handshake");
        self.handshake().await?;
        tracing::debug!("handshake complete");

        // Mark as connected only after a successful handshake
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Performs the `hello` handshake and optional authentication.
    ///
    /// Replies are read directly from the stream since the read loop is
    /// not running yet.
    async fn handshake(&self) -> Result<(), ClientError> {
        let metadata = ClientMetadata::new(self.options.app_name.as_deref());
        let hello = json!({
            "hello": 1,
            "client": serde_json::to_value(&metadata)?,
        });

        let reply = self.run_command_direct(ADMIN_DB, hello).await?;
        tracing::debug!("hello reply received");
        *self.hello_reply.lock().unwrap() = Some(reply);

        if let Some(credentials) = self.options.credentials.clone() {
            tracing::debug!("authenticating as {}", credentials.username);
            let digest =
                auth::password_digest(&credentials.username, &credentials.password).await?;
            let command = json!({
                "authenticate": 1,
                "user": credentials.username,
                "digest": digest,
            });
            self.run_command_direct(ADMIN_DB, command).await?;
            tracing::debug!("authentication successful");
        }

        Ok(())
    }

    /// Returns the cached `hello` reply, if connected.
    pub fn hello_response(&self) -> Option<Value> {
        self.hello_reply.lock().unwrap().clone()
    }

    /// Frames and writes one command under the given request id.
    async fn send_command(
        &self,
        id: u32,
        database: &str,
        command: Value,
    ) -> Result<(), ClientError> {
        let mut command = command;
        if let Value::Object(ref mut doc) = command {
            doc.insert("$db".to_string(), json!(database));
        }

        let encoded = encode_message(id, 0, OpCode::Msg, &command)?;

        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(ClientError::NotConnected)?;
        writer.write_all(&encoded).await.map_err(ClientError::Io)?;
        tracing::debug!("sent request id={} ({} bytes)", id, encoded.len());
        Ok(())
    }

    /// Sends a command and reads its reply directly from the stream.
    ///
    /// Used during the handshake, before the read loop is running.
    async fn run_command_direct(
        &self,
        database: &str,
        command: Value,
    ) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.send_command(id, database, command).await?;
        let reply = self.read_single_reply(id).await?;
        check_server_error(reply)
    }

    /// Reads replies until one correlates to `request_id`, with timeout.
    async fn read_single_reply(&self, request_id: u32) -> Result<Value, ClientError> {
        tokio::time::timeout(self.options.request_timeout, async {
            let mut buf = vec![0u8; self.options.read_buffer_size];

            loop {
                let n = {
                    let mut reader_guard = self.reader.lock().await;
                    let reader = reader_guard.as_mut().ok_or(ClientError::NotConnected)?;
                    reader.read(&mut buf).await.map_err(ClientError::Io)?
                };

                if n == 0 {
                    return Err(ClientError::ConnectionClosed);
                }

                let mut decoder = self.decoder.lock().await;
                decoder.extend(&buf[..n]);
                while let Some(message) = decoder.decode_message()? {
                    if message.header.response_to == request_id {
                        return Ok(message.body);
                    }
                    tracing::warn!(
                        "discarding reply to unknown request id={}",
                        message.header.response_to
                    );
                }
            }
        })
        .await
        .map_err(|_| ClientError::Timeout)?
    }

    /// Sends a command and waits for its reply via the read loop.
    pub async fn request(&self, database: &str, command: Value) -> Result<Value, ClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Register the pending entry before writing so a fast reply cannot
        // slip past the read loop.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.send_command(id, database, command).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let reply = match tokio::time::timeout(self.options.request_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(ClientError::Timeout);
            }
        };

        check_server_error(reply)
    }

    /// Number of requests still waiting for a reply.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Reads and dispatches replies (run this in a background task).
    pub async fn read_loop(&self) -> Result<(), ClientError> {
        tracing::debug!("read loop started");
        let mut buf = vec![0u8; self.options.read_buffer_size];

        loop {
            let n = {
                let mut reader_guard = self.reader.lock().await;
                let reader = reader_guard.as_mut().ok_or(ClientError::NotConnected)?;
                reader.read(&mut buf).await.map_err(ClientError::Io)?
            };

            if n == 0 {
                tracing::debug!("read loop: connection closed");
                self.connected.store(false, Ordering::SeqCst);
                self.pending.lock().await.clear();
                return Err(ClientError::ConnectionClosed);
            }

            let mut messages = Vec::new();
            {
                let mut decoder = self.decoder.lock().await;
                decoder.extend(&buf[..n]);
                while let Some(message) = decoder.decode_message()? {
                    messages.push(message);
                }
            }

            for message in messages {
                let id = message.header.response_to;
                if let Some(tx) = self.pending.lock().await.remove(&id) {
                    let _ = tx.send(message.body);
                } else {
                    tracing::warn!("read loop: no pending request for id={}", id);
                }
            }
        }
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Closes the connection. Idempotent.
    pub async fn close(&self) {
        tracing::debug!("closing connection");
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        let _ = self.reader.lock().await.take();
        self.pending.lock().await.clear();
        *self.hello_reply.lock().unwrap() = None;
    }
}

impl CommandExecutor for Connection {
    fn run_command(&self, database: &str, command: Value) -> ExecutorFuture<'_> {
        let database = database.to_string();
        Box::pin(async move { self.request(&database, command).await })
    }
}

/// Surfaces `{ok: 0, code, errmsg}` replies as [`ClientError::Server`].
fn check_server_error(reply: Value) -> Result<Value, ClientError> {
    let ok = reply.get("ok").and_then(Value::as_f64).unwrap_or(1.0);
    if ok == 0.0 {
        let code = reply.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = reply
            .get("errmsg")
            .and_then(Value::as_str)
            .unwrap_or("unknown server error")
            .to_string();
        return Err(ClientError::Server { code, message });
    }
    Ok(reply)
}
