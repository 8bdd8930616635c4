//! Streaming transport client: `JSONEachRow` output decoded row by row as
//! the response body arrives.
use futures::{Stream, TryStreamExt};
use url::Url;

use crate::error::Result;

use super::endpoint::Endpoint;
use super::row::{decode_rows, Row};

const FORMAT: &str = "JSONEachRow";

pub struct StreamingClient {
    endpoint: Endpoint,
    database: String,
}

impl StreamingClient {
    pub fn connect(base: Url, username: &str, password: &str, database: &str, read_only: bool) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new(base, username, password, read_only)?,
            database: database.to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        self.endpoint.base()
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Rows of `sql` as they are decoded. Server errors surface before the
    /// first row; a malformed line ends the stream with an error.
    pub async fn stream(&self, sql: &str) -> Result<impl Stream<Item = Result<Row>>> {
        let response = self.endpoint.send(sql, &self.database, FORMAT).await?;
        Ok(decode_rows(Box::pin(response.bytes_stream())))
    }

    pub async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.stream(sql).await?.try_collect().await
    }
}

impl std::fmt::Debug for StreamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingClient")
            .field("base", self.endpoint.base())
            .field("database", &self.database)
            .finish()
    }
}
