use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::escape::Escaper;
use crate::query::{InsertValues, Query, QueryGrammar};
use crate::schema::{SchemaBuilder, SchemaGrammar};
use crate::sequence::{BatchNumbering, DayRangeGenerator, IdentifierGenerator, RowCountNumbering, RowCounter};
use crate::statement::Statement;
use crate::value::{Record, Value};

use super::registry::ClientRegistry;
use super::row::{first_value, value_as_u64, Row};
use super::transport::Transport;

/// Turns builder operations into SQL and sends it over the configured
/// transport.
///
/// Cheap to build: the transport client is looked up in the registry on the
/// first statement and shared with every other connection of the same
/// identity.
pub struct Connection {
    config: ConnectionConfig,
    registry: Arc<ClientRegistry>,
    query_grammar: QueryGrammar,
    schema_grammar: SchemaGrammar,
    escaper: Arc<dyn Escaper>,
    ids: Arc<dyn IdentifierGenerator>,
    numbering: Arc<dyn BatchNumbering>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_registry(config, Arc::new(ClientRegistry::new()))
    }

    pub fn with_registry(config: ConnectionConfig, registry: Arc<ClientRegistry>) -> Self {
        let escaper = config.escaping.escaper();
        Self {
            query_grammar: QueryGrammar::new(config.prefix.clone()),
            schema_grammar: SchemaGrammar::new(config.database.clone(), config.prefix.clone(), Arc::clone(&escaper)),
            escaper,
            ids: Arc::new(DayRangeGenerator),
            numbering: Arc::new(RowCountNumbering::default()),
            registry,
            config,
        }
    }

    pub fn with_escaper(mut self, escaper: Arc<dyn Escaper>) -> Self {
        self.schema_grammar = SchemaGrammar::new(
            self.config.database.clone(),
            self.config.prefix.clone(),
            Arc::clone(&escaper),
        );
        self.escaper = escaper;
        self
    }

    pub fn with_identifier_generator(mut self, ids: Arc<dyn IdentifierGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_batch_numbering(mut self, numbering: Arc<dyn BatchNumbering>) -> Self {
        self.numbering = numbering;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn query_grammar(&self) -> &QueryGrammar {
        &self.query_grammar
    }

    pub fn schema_grammar(&self) -> &SchemaGrammar {
        &self.schema_grammar
    }

    pub fn escaper(&self) -> &dyn Escaper {
        self.escaper.as_ref()
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> Result<Arc<Transport>> {
        self.registry.get_or_connect(&self.config)
    }

    pub fn schema(&self) -> SchemaBuilder<'_> {
        SchemaBuilder::new(self)
    }

    /// Final SQL text with every parameter inlined as a literal.
    pub fn render(&self, statement: &Statement) -> String {
        statement.render(self.escaper.as_ref())
    }

    pub async fn run(&self, statement: &Statement) -> Result<Vec<Row>> {
        tracing::trace!(template = %statement.template(), "rendering statement");
        self.run_sql(&self.render(statement)).await
    }

    /// Send finished SQL text. Empty text is not sent.
    pub async fn run_sql(&self, sql: &str) -> Result<Vec<Row>> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Ok(vec![]);
        }
        let transport = self.transport()?;
        let start = Instant::now();

        let result = match transport.as_ref() {
            Transport::Streaming(client) => client.query(sql).await,
            Transport::Batch(client) => {
                client.use_database(&self.config.database);
                client.ping().await?;
                if self.config.async_mode {
                    let submitted = client.submit(sql);
                    client.execute_pending().await;
                    submitted.rows().await
                } else {
                    client.write(sql).await
                }
            }
        };

        match &result {
            Ok(rows) => tracing::debug!(
                sql,
                rows = rows.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "statement executed"
            ),
            Err(e) => tracing::warn!(sql, error = %e, "statement failed"),
        }
        result
    }

    pub async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        let statement = self.query_grammar.compile_select(query)?;
        self.run(&statement).await
    }

    /// Run raw SQL with `?` placeholders bound positionally.
    pub async fn select_raw(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>> {
        let mut statement = Statement::new();
        statement.push_raw(sql, bindings)?;
        self.run(&statement).await
    }

    /// Run SQL for its side effect. Always `true` once the store accepted it.
    pub async fn statement(&self, sql: &str) -> Result<bool> {
        self.run_sql(sql).await?;
        Ok(true)
    }

    /// Run SQL and hand back whatever rows the store answered with.
    pub async fn affecting_statement(&self, sql: &str) -> Result<Vec<Row>> {
        self.run_sql(sql).await
    }

    /// Insert one record or a batch. Batch rows have their keys sorted and
    /// are numbered before compiling; an empty input sends nothing.
    pub async fn insert(&self, query: &Query, values: impl Into<InsertValues>) -> Result<bool> {
        let values = values.into();
        let sort = matches!(values, InsertValues::Many(_));
        let mut records = values.into_batch();
        if records.is_empty() {
            return Ok(true);
        }
        if sort {
            records.iter_mut().for_each(Record::sort_keys);
        }
        self.numbering.assign(query, &mut records, self).await?;

        let statement = self.query_grammar.compile_insert(query, records);
        self.statement(&self.render(&statement)).await
    }

    /// Insert one record and return a generated id. When `sequence` names a
    /// column, the id is written into that column first.
    pub async fn insert_get_id(&self, query: &Query, mut record: Record, sequence: Option<&str>) -> Result<u64> {
        let id = self.ids.next_id();
        if let Some(column) = sequence {
            record.put_first(column, Value::UInt(id));
        }
        let statement = self.query_grammar.compile_insert_get_id(query, record);
        self.run(&statement).await?;
        Ok(id)
    }

    pub async fn update(&self, query: &Query, values: &Record) -> Result<Vec<Row>> {
        let statement = self.query_grammar.compile_update(query, values)?;
        self.run(&statement).await
    }

    pub async fn delete(&self, query: &Query) -> Result<Vec<Row>> {
        let statement = self.query_grammar.compile_delete(query)?;
        self.run(&statement).await
    }

    pub async fn truncate(&self, query: &Query) -> Result<()> {
        let statement = self.query_grammar.compile_truncate(query);
        self.run(&statement).await?;
        Ok(())
    }

    pub async fn count(&self, query: &Query) -> Result<u64> {
        let statement = self.query_grammar.compile_count(query)?;
        let rows = self.run(&statement).await?;
        let value = first_value(&rows)
            .ok_or_else(|| Error::MalformedResponse("count query returned no rows".into()))?;
        value_as_u64(value)
            .ok_or_else(|| Error::MalformedResponse(format!("count is not an unsigned integer: {}", value)))
    }
}

#[async_trait]
impl RowCounter for Connection {
    async fn count(&self, query: &Query) -> Result<u64> {
        Connection::count(self, query).await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connection", &self.config.display_string())
            .field("async", &self.config.async_mode)
            .field("prefix", &self.config.prefix)
            .finish()
    }
}
