//! Batch transport client.
//!
//! Reads whole `FORMAT JSON` responses. Besides direct writes it supports a
//! two-step async mode: [`BatchClient::submit`] queues a statement and hands
//! back a [`Submitted`] handle, [`BatchClient::execute_pending`] sends every
//! queued statement concurrently and resolves the handles.
//!
//! The queue belongs to the client, and clients are shared per connection
//! identity. When two callers submit and then execute at the same time,
//! either one may drain the other's statement. Every handle still receives
//! its own result, but a caller cannot assume its statement ran inside its
//! own `execute_pending` call.
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use url::Url;

use crate::error::{Error, Result};

use super::endpoint::Endpoint;
use super::row::{parse_json_body, Row};

const FORMAT: &str = "JSON";

struct PendingStatement {
    sql: String,
    database: String,
    reply: oneshot::Sender<Result<Vec<Row>>>,
}

/// Result of a statement queued with [`BatchClient::submit`].
pub struct Submitted {
    sql: String,
    reply: oneshot::Receiver<Result<Vec<Row>>>,
}

impl Submitted {
    /// Waits for the statement to run. Fails if the client was dropped with
    /// the statement still queued.
    pub async fn rows(self) -> Result<Vec<Row>> {
        let sql = self.sql;
        self.reply.await.map_err(|_| Error::NotExecuted(sql))?
    }
}

pub struct BatchClient {
    endpoint: Endpoint,
    database: Mutex<String>,
    pending: Mutex<Vec<PendingStatement>>,
}

impl BatchClient {
    pub fn new(base: Url, username: &str, password: &str, database: &str, read_only: bool) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new(base, username, password, read_only)?,
            database: Mutex::new(database.to_string()),
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn base_url(&self) -> &Url {
        self.endpoint.base()
    }

    /// Select the database used by statements sent from now on.
    pub fn use_database(&self, database: &str) {
        let mut current = self.database.lock();
        if *current != database {
            *current = database.to_string();
        }
    }

    pub fn database(&self) -> String {
        self.database.lock().clone()
    }

    pub async fn ping(&self) -> Result<()> {
        self.endpoint.ping().await
    }

    /// Run one statement and read the whole response.
    pub async fn write(&self, sql: &str) -> Result<Vec<Row>> {
        let database = self.database();
        run(&self.endpoint, sql, &database).await
    }

    /// Queue a statement for the next [`BatchClient::execute_pending`].
    pub fn submit(&self, sql: &str) -> Submitted {
        let (reply, receiver) = oneshot::channel();
        self.pending.lock().push(PendingStatement {
            sql: sql.to_string(),
            database: self.database(),
            reply,
        });
        Submitted {
            sql: sql.to_string(),
            reply: receiver,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drain the queue and run its statements concurrently. Per-statement
    /// failures go to their handles; the return value is how many ran.
    pub async fn execute_pending(&self) -> usize {
        let drained = std::mem::take(&mut *self.pending.lock());
        let count = drained.len();
        if count == 0 {
            return 0;
        }
        tracing::debug!(count, "executing pending statements");

        join_all(drained.into_iter().map(|pending| async move {
            let result = run(&self.endpoint, &pending.sql, &pending.database).await;
            // Receiver dropped means nobody is waiting for this result.
            let _ = pending.reply.send(result);
        }))
        .await;
        count
    }
}

async fn run(endpoint: &Endpoint, sql: &str, database: &str) -> Result<Vec<Row>> {
    let response = endpoint.send(sql, database, FORMAT).await?;
    let body = response.text().await?;
    parse_json_body(&body)
}

impl std::fmt::Debug for BatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchClient")
            .field("base", self.endpoint.base())
            .field("database", &self.database())
            .field("pending", &self.pending_len())
            .finish()
    }
}
