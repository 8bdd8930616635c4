/// Schema side of the dialect layer:
///
/// ```text
/// Blueprint        (blueprint.rs)
///       ↓
/// Schema grammar   (grammar.rs, types.rs) → DDL text
///       ↓
/// Schema builder   (builder.rs) → db::Connection
/// ```
pub mod blueprint;
pub mod builder;
pub mod grammar;
pub mod types;

pub use blueprint::{Blueprint, ColumnDefinition, ColumnType, IndexDefinition};
pub use builder::{ColumnInfo, SchemaBuilder, TableInfo};
pub use grammar::SchemaGrammar;
