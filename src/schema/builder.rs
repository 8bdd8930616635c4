use crate::db::{value_as_bool, value_as_u64, Connection, Row};
use crate::error::Result;

use super::blueprint::{Blueprint, ColumnDefinition, IndexDefinition};

#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub schema: String,
    pub size: Option<u64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_kind: Option<String>,
    pub default_expression: Option<String>,
    pub comment: Option<String>,
}

fn text(row: &Row, key: &str) -> String {
    match row.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn optional_text(row: &Row, key: &str) -> Option<String> {
    Some(text(row, key)).filter(|s| !s.is_empty())
}

/// Runs the schema grammar's DDL and introspection against a connection.
pub struct SchemaBuilder<'a> {
    connection: &'a Connection,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    pub async fn has_table(&self, table: &str) -> Result<bool> {
        let sql = self.connection.schema_grammar().compile_table_exists(table);
        let rows = self.connection.run_sql(&sql).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("exists"))
            .and_then(value_as_bool)
            .unwrap_or(false))
    }

    pub async fn get_tables(&self) -> Result<Vec<TableInfo>> {
        let sql = self.connection.schema_grammar().compile_tables();
        let rows = self.connection.run_sql(&sql).await?;
        Ok(rows
            .iter()
            .map(|row| TableInfo {
                name: text(row, "name"),
                schema: text(row, "schema"),
                size: row.get("size").and_then(value_as_u64),
                comment: optional_text(row, "comments"),
            })
            .collect())
    }

    pub async fn get_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let sql = self.connection.schema_grammar().compile_columns(table);
        let rows = self.connection.run_sql(&sql).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let data_type = text(row, "type");
                ColumnInfo {
                    name: text(row, "name"),
                    nullable: data_type.starts_with("Nullable("),
                    data_type,
                    default_kind: optional_text(row, "default_kind"),
                    default_expression: optional_text(row, "default_expression"),
                    comment: optional_text(row, "comment"),
                }
            })
            .collect())
    }

    /// Create the table, then its indexes, one statement each.
    pub async fn create(&self, blueprint: &Blueprint) -> Result<()> {
        let statements = self.connection.schema_grammar().compile_create_statements(blueprint);
        self.run_all(&statements).await
    }

    /// Add the blueprint's columns and indexes to an existing table.
    pub async fn table(&self, blueprint: &Blueprint) -> Result<()> {
        let statements = self.connection.schema_grammar().compile_alter_statements(blueprint);
        self.run_all(&statements).await
    }

    pub async fn add_column(&self, table: &str, column: &ColumnDefinition) -> Result<()> {
        let sql = self
            .connection
            .schema_grammar()
            .compile_add(&Blueprint::new(table), column);
        self.connection.statement(&sql).await?;
        Ok(())
    }

    pub async fn create_index(&self, table: &str, index: &IndexDefinition) -> Result<()> {
        let sql = self
            .connection
            .schema_grammar()
            .compile_index(&Blueprint::new(table), index);
        self.connection.statement(&sql).await?;
        Ok(())
    }

    pub async fn drop(&self, table: &str) -> Result<()> {
        let sql = self.connection.schema_grammar().compile_drop_table(table);
        self.connection.statement(&sql).await?;
        Ok(())
    }

    pub async fn drop_if_exists(&self, table: &str) -> Result<()> {
        let sql = self.connection.schema_grammar().compile_drop_table_if_exists(table);
        self.connection.statement(&sql).await?;
        Ok(())
    }

    /// Drop every table of the configured database that carries the
    /// connection's table prefix. The store takes one statement per request,
    /// so each drop is sent separately.
    pub async fn drop_all_tables(&self) -> Result<usize> {
        let prefix = self.connection.config().prefix.clone();
        let grammar = self.connection.schema_grammar();
        let mut dropped = 0;
        for table in self.get_tables().await? {
            // Listed names already carry the prefix; the grammar adds it back.
            let Some(name) = table.name.strip_prefix(prefix.as_str()) else {
                continue;
            };
            self.connection
                .statement(&grammar.compile_drop_table_if_exists(name))
                .await?;
            dropped += 1;
        }
        tracing::info!(count = dropped, "dropped all tables");
        Ok(dropped)
    }

    async fn run_all(&self, statements: &[String]) -> Result<()> {
        for sql in statements {
            self.connection.statement(sql).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, TransportMode};
    use crate::schema::blueprint::ColumnType;
    use wiremock::matchers::{body_string, body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connection(server: &MockServer, prefix: &str) -> Connection {
        let address = server.address();
        Connection::new(ConnectionConfig {
            host: address.ip().to_string(),
            port: address.port(),
            mode: TransportMode::Streaming,
            database: "analytics".into(),
            prefix: prefix.into(),
            ..ConnectionConfig::default()
        })
    }

    #[tokio::test]
    async fn test_has_table() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("name = 'users'"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"exists\":true}\n"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("name = 'missing'"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"exists\":false}\n"))
            .mount(&server)
            .await;

        let conn = connection(&server, "");
        assert!(conn.schema().has_table("users").await.unwrap());
        assert!(!conn.schema().has_table("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_tables_and_columns() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("FROM system.tables"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"name\":\"users\",\"schema\":\"analytics\",\"size\":\"1024\",\"comments\":\"\"}\n",
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("FROM system.columns"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"name\":\"id\",\"type\":\"UInt64\",\"default_kind\":\"\",\"default_expression\":\"\",\"comment\":\"\"}\n\
                 {\"name\":\"nick\",\"type\":\"Nullable(String)\",\"default_kind\":\"DEFAULT\",\"default_expression\":\"'x'\",\"comment\":\"\"}\n",
            ))
            .mount(&server)
            .await;

        let conn = connection(&server, "");
        let tables = conn.schema().get_tables().await.unwrap();
        assert_eq!(
            tables,
            vec![TableInfo {
                name: "users".into(),
                schema: "analytics".into(),
                size: Some(1024),
                comment: None,
            }]
        );

        let columns = conn.schema().get_columns("users").await.unwrap();
        assert_eq!(columns.len(), 2);
        assert!(!columns[0].nullable);
        assert!(columns[1].nullable);
        assert_eq!(columns[1].default_expression.as_deref(), Some("'x'"));
    }

    #[tokio::test]
    async fn test_create_sends_table_then_indexes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("create table if not exists \"users\""))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string("create index \"users_name\" on \"users\" (\"name\")"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let conn = connection(&server, "");
        let mut bp = Blueprint::new("users");
        bp.id();
        bp.string("name");
        bp.index("users_name", vec!["name"], None);
        conn.schema().create(&bp).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_column_and_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string("alter table \"app_t\" add column \"n\" Nullable(Int16)"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string("create index \"t_n\" on \"app_t\" using minmax (\"n\")"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let conn = connection(&server, "app_");
        let mut column = ColumnDefinition::new("n", ColumnType::SmallInteger);
        column.nullable();
        conn.schema().add_column("t", &column).await.unwrap();
        let index = IndexDefinition {
            name: "t_n".into(),
            columns: vec!["n".into()],
            algorithm: Some("minmax".into()),
        };
        conn.schema().create_index("t", &index).await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_all_tables_one_statement_each() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("FROM system.tables"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"name\":\"app_a\",\"schema\":\"analytics\",\"size\":null,\"comments\":\"\"}\n\
                 {\"name\":\"app_b\",\"schema\":\"analytics\",\"size\":null,\"comments\":\"\"}\n\
                 {\"name\":\"foreign\",\"schema\":\"analytics\",\"size\":null,\"comments\":\"\"}\n",
            ))
            .mount(&server)
            .await;
        for table in ["app_a", "app_b"] {
            Mock::given(method("POST"))
                .and(body_string(format!("drop table if exists \"{}\"", table)))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&server)
                .await;
        }

        let conn = connection(&server, "app_");
        assert_eq!(conn.schema().drop_all_tables().await.unwrap(), 2);
    }
}
