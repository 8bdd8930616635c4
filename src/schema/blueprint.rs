use crate::value::Value;

/// Abstract column type, mapped to a native type by [`super::types::map_type`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    String,
    Text,
    Integer,
    BigInteger,
    BigIntegerUnsigned,
    SmallInteger,
    TinyInteger,
    Boolean,
    Float,
    Double,
    Date,
    DateTime,
    Timestamp,
    Uuid,
    /// Allowed values in declaration order.
    Enum(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub kind: ColumnType,
    pub nullable: bool,
    pub default: Option<Value>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            default: None,
        }
    }

    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    pub fn default(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    /// Rendered as `using <algorithm>` when present.
    pub algorithm: Option<String>,
}

/// Table description prior to DDL compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<IndexDefinition>,
}

impl Blueprint {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(&mut self, name: &str, kind: ColumnType) -> &mut ColumnDefinition {
        self.columns.push(ColumnDefinition::new(name, kind));
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    pub fn id(&mut self) -> &mut ColumnDefinition {
        self.column("id", ColumnType::BigIntegerUnsigned)
    }

    pub fn string(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::String)
    }

    pub fn text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Text)
    }

    pub fn integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Integer)
    }

    pub fn big_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::BigInteger)
    }

    pub fn small_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::SmallInteger)
    }

    pub fn boolean(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Boolean)
    }

    pub fn double(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Double)
    }

    pub fn timestamp(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Timestamp)
    }

    pub fn uuid(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Uuid)
    }

    pub fn enumeration<S: Into<String>>(&mut self, name: &str, allowed: Vec<S>) -> &mut ColumnDefinition {
        self.column(
            name,
            ColumnType::Enum(allowed.into_iter().map(Into::into).collect()),
        )
    }

    pub fn index<S: Into<String>>(&mut self, name: &str, columns: Vec<S>, algorithm: Option<&str>) {
        self.indexes.push(IndexDefinition {
            name: name.to_string(),
            columns: columns.into_iter().map(Into::into).collect(),
            algorithm: algorithm.map(str::to_string),
        });
    }
}
