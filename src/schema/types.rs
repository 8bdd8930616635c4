//! Abstract column type → native type name.
//!
//! Nullability is not handled here; the schema grammar wraps the mapped
//! name in `Nullable(...)` itself.
use crate::escape::Escaper;

use super::blueprint::{ColumnDefinition, ColumnType};

pub fn map_type(column: &ColumnDefinition, escaper: &dyn Escaper) -> String {
    native_type(&column.kind, escaper)
}

pub fn native_type(kind: &ColumnType, escaper: &dyn Escaper) -> String {
    match kind {
        ColumnType::String | ColumnType::Text => "String".to_string(),
        ColumnType::Integer | ColumnType::BigInteger | ColumnType::BigIntegerUnsigned => {
            "UInt64".to_string()
        }
        ColumnType::SmallInteger => "Int16".to_string(),
        ColumnType::TinyInteger => "Int8".to_string(),
        ColumnType::Boolean => "Bool".to_string(),
        ColumnType::Float => "Float32".to_string(),
        ColumnType::Double => "Float64".to_string(),
        ColumnType::Date => "Date".to_string(),
        ColumnType::DateTime => "DateTime".to_string(),
        ColumnType::Timestamp => "DateTime64(3)".to_string(),
        ColumnType::Uuid => "UUID".to_string(),
        ColumnType::Enum(allowed) => {
            let pairs: Vec<String> = allowed
                .iter()
                .enumerate()
                .map(|(i, value)| format!("{} = {}", escaper.quote_str(value), i + 1))
                .collect();
            format!("Enum({})", pairs.join(", "))
        }
    }
}
