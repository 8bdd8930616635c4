/// Blueprint → ClickHouse DDL compiler.
///
/// Every method is a pure function of its input, apart from the database
/// name read by the introspection queries.
use std::sync::Arc;

use crate::escape::Escaper;
use crate::identifier::Wrapper;

use super::blueprint::{Blueprint, ColumnDefinition, IndexDefinition};
use super::types::map_type;

const ENGINE: &str = "MergeTree()";
const INDEX_GRANULARITY: u32 = 8192;

/// Injected ahead of the declared columns when the first one is not `id`.
const SYNTHETIC_KEY_COLUMNS: &str = "id UInt64 not null, timestamp DateTime64(3)";

#[derive(Clone)]
pub struct SchemaGrammar {
    wrapper: Wrapper,
    database: String,
    escaper: Arc<dyn Escaper>,
}

impl SchemaGrammar {
    pub fn new(database: impl Into<String>, table_prefix: impl Into<String>, escaper: Arc<dyn Escaper>) -> Self {
        Self {
            wrapper: Wrapper::new(table_prefix),
            database: database.into(),
            escaper,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// `create table if not exists …` on a MergeTree ordered by the first
    /// column when it is `id`, otherwise by an injected `id`.
    pub fn compile_create(&self, blueprint: &Blueprint) -> String {
        let table = self.wrapper.wrap_table(&blueprint.table);
        let columns = self.column_definitions(blueprint);

        let (columns, order_key) = match blueprint.columns.first() {
            Some(first) if first.name == "id" => {
                (columns.join(", "), self.wrapper.wrap(&first.name))
            }
            _ => {
                let mut all = vec![SYNTHETIC_KEY_COLUMNS.to_string()];
                all.extend(columns);
                (all.join(", "), "id".to_string())
            }
        };

        format!(
            "create table if not exists {} ({}) ENGINE = {} ORDER BY ({}) SETTINGS index_granularity = {}",
            table, columns, ENGINE, order_key, INDEX_GRANULARITY
        )
    }

    /// Create statement followed by one statement per index.
    pub fn compile_create_statements(&self, blueprint: &Blueprint) -> Vec<String> {
        let mut statements = vec![self.compile_create(blueprint)];
        statements.extend(self.compile_indexes(blueprint));
        statements
    }

    /// One `add column` per declared column, then the indexes.
    pub fn compile_alter_statements(&self, blueprint: &Blueprint) -> Vec<String> {
        let mut statements: Vec<String> = blueprint
            .columns
            .iter()
            .map(|c| self.compile_add(blueprint, c))
            .collect();
        statements.extend(self.compile_indexes(blueprint));
        statements
    }

    fn compile_indexes(&self, blueprint: &Blueprint) -> Vec<String> {
        blueprint
            .indexes
            .iter()
            .map(|i| self.compile_index(blueprint, i))
            .collect()
    }

    pub fn column_definitions(&self, blueprint: &Blueprint) -> Vec<String> {
        blueprint
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect()
    }

    /// `"name" Type` or `"name" Nullable(Type)`. Neither branch emits a
    /// `null` keyword of its own.
    fn column_definition(&self, column: &ColumnDefinition) -> String {
        let native = map_type(column, self.escaper.as_ref());
        let ty = if column.nullable {
            format!("Nullable({})", native)
        } else {
            native
        };
        let mut sql = format!("{} {}", self.wrapper.wrap(&column.name), ty);
        if let Some(default) = &column.default {
            sql.push_str(&format!(" DEFAULT {}", self.escaper.quote(default)));
        }
        sql
    }

    pub fn compile_add(&self, blueprint: &Blueprint, column: &ColumnDefinition) -> String {
        format!(
            "alter table {} add column {}",
            self.wrapper.wrap_table(&blueprint.table),
            self.column_definition(column)
        )
    }

    pub fn compile_index(&self, blueprint: &Blueprint, index: &IndexDefinition) -> String {
        let using = index
            .algorithm
            .as_ref()
            .map(|a| format!(" using {}", a))
            .unwrap_or_default();
        format!(
            "create index {} on {}{} ({})",
            self.wrapper.wrap(&index.name),
            self.wrapper.wrap_table(&blueprint.table),
            using,
            self.wrapper.columnize(index.columns.iter().map(String::as_str))
        )
    }

    pub fn compile_drop_table(&self, table: &str) -> String {
        format!("drop table {}", self.wrapper.wrap_table(table))
    }

    pub fn compile_drop_table_if_exists(&self, table: &str) -> String {
        format!("drop table if exists {}", self.wrapper.wrap_table(table))
    }

    /// One `drop table if exists` per table, concatenated.
    pub fn compile_drop_all_tables<S: AsRef<str>>(&self, tables: &[S]) -> String {
        tables
            .iter()
            .map(|t| format!("{};", self.compile_drop_table_if_exists(t.as_ref())))
            .collect()
    }

    pub fn compile_table_exists(&self, table: &str) -> String {
        format!(
            "SELECT COALESCE((SELECT true AS \"exists\" FROM system.tables WHERE database = {} AND name = {} LIMIT 1), false) AS \"exists\"",
            self.escaper.quote_str(&self.database),
            self.escaper.quote_str(&self.prefixed(table))
        )
    }

    pub fn compile_tables(&self) -> String {
        format!(
            "SELECT name, database AS schema, total_bytes AS size, comment AS comments FROM system.tables WHERE database = {}",
            self.escaper.quote_str(&self.database)
        )
    }

    pub fn compile_columns(&self, table: &str) -> String {
        format!(
            "SELECT name, type, default_kind, default_expression, comment FROM system.columns WHERE database = {} AND table = {} ORDER BY position",
            self.escaper.quote_str(&self.database),
            self.escaper.quote_str(&self.prefixed(table))
        )
    }

    fn prefixed(&self, table: &str) -> String {
        format!("{}{}", self.wrapper.prefix(), table)
    }
}
