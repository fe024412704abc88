//! Command cursors: pull-based iteration over server result sets.
//!
//! A cursor starts `Fresh` with the originating command, turns `Active`
//! once the first reply seeds it with a cursor id, namespace, and first
//! batch, and ends `Exhausted` when the buffer is drained and the server
//! reports id zero. Follow-up batches are fetched with `getMore` round
//! trips through the borrowed [`CommandExecutor`].

use crate::error::ClientError;
use crate::executor::CommandExecutor;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;

/// Parsed `<database>.<collection>` origin of a cursor's results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    /// Splits at the first dot; the collection part may itself contain
    /// dots.
    fn parse(ns: &str) -> Result<Self, ClientError> {
        let (database, collection) = ns.split_once('.').ok_or_else(|| {
            ClientError::InvalidCursorResponse(format!(
                "namespace {ns:?} is not of the form <database>.<collection>"
            ))
        })?;
        if database.is_empty() || collection.is_empty() {
            return Err(ClientError::InvalidCursorResponse(format!(
                "namespace {ns:?} has an empty component"
            )));
        }
        Ok(Self {
            database: database.to_string(),
            collection: collection.to_string(),
        })
    }
}

/// Cursor lifecycle. Illegal combinations (a cursor id without a
/// namespace, a buffer before the first round trip) are unrepresentable.
enum CursorState {
    /// No round trip has happened yet.
    Fresh { database: String, command: Value },
    /// At least one batch fetched; `id` zero means no further batches.
    Active {
        id: i64,
        ns: Namespace,
        buffer: VecDeque<Value>,
    },
    /// Buffer drained and id zero; every `next` returns the sentinel.
    Exhausted,
}

/// Asynchronous pull cursor over a multi-batch result set.
///
/// `next` calls must be awaited one at a time; `&mut self` enforces that.
/// The cursor borrows its executor and must not outlive the connection's
/// validity.
pub struct CommandCursor {
    executor: Arc<dyn CommandExecutor>,
    state: CursorState,
}

impl CommandCursor {
    /// Creates a cursor that will run `command` against `database` on the
    /// first `next` call.
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        database: impl Into<String>,
        command: Value,
    ) -> Self {
        Self {
            executor,
            state: CursorState::Fresh {
                database: database.into(),
                command,
            },
        }
    }

    /// Creates an already-active cursor from a reply's
    /// `{id, ns, firstBatch}` cursor document.
    pub fn from_cursor_document(
        executor: Arc<dyn CommandExecutor>,
        cursor_doc: &Value,
    ) -> Result<Self, ClientError> {
        let mut cursor = Self {
            executor,
            state: CursorState::Exhausted,
        };
        cursor.seed(cursor_doc)?;
        Ok(cursor)
    }

    /// Returns the next document, or `None` when the current batch is
    /// spent.
    ///
    /// `None` with [`is_exhausted`](Self::is_exhausted) false means the
    /// last `getMore` returned an empty batch for a still-open cursor;
    /// calling `next` again issues another round trip. A failed round
    /// trip leaves the cursor state untouched, so the call may be
    /// retried.
    pub async fn next(&mut self) -> Result<Option<Value>, ClientError> {
        if matches!(self.state, CursorState::Fresh { .. }) {
            self.execute_initial().await?;
        }

        match &mut self.state {
            CursorState::Exhausted => return Ok(None),
            CursorState::Active { id, buffer, .. } => {
                if let Some(doc) = buffer.pop_front() {
                    return Ok(Some(doc));
                }
                if *id == 0 {
                    self.state = CursorState::Exhausted;
                    return Ok(None);
                }
            }
            CursorState::Fresh { .. } => unreachable!("initial fetch just ran"),
        }

        self.get_more().await
    }

    /// Whether the cursor has reached its terminal state.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, CursorState::Exhausted)
    }

    /// Calls `f` with a zero-based index and each document, in FIFO order.
    pub async fn for_each<F>(&mut self, mut f: F) -> Result<(), ClientError>
    where
        F: FnMut(usize, &Value),
    {
        let mut index = 0;
        loop {
            match self.next().await? {
                Some(doc) => {
                    f(index, &doc);
                    index += 1;
                }
                None if self.is_exhausted() => return Ok(()),
                // Empty intermediate batch; keep pulling.
                None => {}
            }
        }
    }

    /// Drives the cursor to exhaustion, mapping each document into an
    /// ordered list.
    pub async fn map<T, F>(&mut self, mut f: F) -> Result<Vec<T>, ClientError>
    where
        F: FnMut(usize, Value) -> T,
    {
        let mut out = Vec::new();
        loop {
            match self.next().await? {
                Some(doc) => {
                    let index = out.len();
                    out.push(f(index, doc));
                }
                None if self.is_exhausted() => return Ok(out),
                None => {}
            }
        }
    }

    /// Collects all remaining documents in FIFO order.
    pub async fn to_array(&mut self) -> Result<Vec<Value>, ClientError> {
        self.map(|_, doc| doc).await
    }

    /// Performs the initial round trip. On failure the cursor stays
    /// `Fresh`.
    async fn execute_initial(&mut self) -> Result<(), ClientError> {
        let (database, command) = match &self.state {
            CursorState::Fresh { database, command } => (database.clone(), command.clone()),
            _ => return Ok(()),
        };

        let reply = self.executor.run_command(&database, command).await?;
        let cursor_doc = reply.get("cursor").ok_or_else(|| {
            ClientError::InvalidCursorResponse("reply has no cursor document".to_string())
        })?;
        self.seed(cursor_doc)
    }

    /// Populates state from an initial `{id, ns, firstBatch}` document.
    fn seed(&mut self, cursor_doc: &Value) -> Result<(), ClientError> {
        let id = coerce_cursor_id(cursor_doc.get("id").ok_or_else(|| {
            ClientError::InvalidCursorResponse("cursor document has no id".to_string())
        })?)?;
        let ns = cursor_doc.get("ns").and_then(Value::as_str).ok_or_else(|| {
            ClientError::InvalidCursorResponse("cursor document has no namespace".to_string())
        })?;
        let ns = Namespace::parse(ns)?;
        let buffer = batch_field(cursor_doc, "firstBatch");

        self.state = if id == 0 && buffer.is_empty() {
            CursorState::Exhausted
        } else {
            CursorState::Active { id, ns, buffer }
        };
        Ok(())
    }

    /// Issues one `getMore` round trip and pops the oldest document of
    /// the new batch. State is only mutated after the round trip
    /// succeeds.
    async fn get_more(&mut self) -> Result<Option<Value>, ClientError> {
        let (id, ns) = match &self.state {
            CursorState::Active { id, ns, .. } => (*id, ns.clone()),
            _ => unreachable!("get_more is only reached from Active"),
        };

        let command = json!({
            "getMore": id,
            "collection": ns.collection,
        });
        let reply = self.executor.run_command(&ns.database, command).await?;

        let cursor_doc = reply.get("cursor").ok_or_else(|| {
            ClientError::InvalidCursorResponse("getMore reply has no cursor document".to_string())
        })?;
        let new_id = coerce_cursor_id(cursor_doc.get("id").ok_or_else(|| {
            ClientError::InvalidCursorResponse("getMore cursor document has no id".to_string())
        })?)?;
        let batch = batch_field(cursor_doc, "nextBatch");

        let doc = match &mut self.state {
            CursorState::Active { id, buffer, .. } => {
                *id = new_id;
                *buffer = batch;
                buffer.pop_front()
            }
            _ => unreachable!(),
        };
        if doc.is_none() && new_id == 0 {
            self.state = CursorState::Exhausted;
        }
        Ok(doc)
    }
}

/// Reads a batch array field; a missing or non-array field is an empty
/// batch.
fn batch_field(cursor_doc: &Value, field: &str) -> VecDeque<Value> {
    cursor_doc
        .get(field)
        .and_then(Value::as_array)
        .map(|docs| docs.iter().cloned().collect())
        .unwrap_or_default()
}

/// Coerces a wire cursor id to i64. The wire value may be a 64-bit JSON
/// number or a decimal string.
fn coerce_cursor_id(value: &Value) -> Result<i64, ClientError> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| {
            ClientError::InvalidCursorResponse(format!("cursor id {n} is not a 64-bit integer"))
        }),
        Value::String(s) => s.parse::<i64>().map_err(|_| {
            ClientError::InvalidCursorResponse(format!(
                "cursor id {s:?} is not a decimal 64-bit integer"
            ))
        }),
        other => Err(ClientError::InvalidCursorResponse(format!(
            "cursor id has unsupported type: {other}"
        ))),
    }
}
