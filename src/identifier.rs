use std::sync::OnceLock;

use regex::Regex;

/// Splits `name as alias`, case-insensitively, on the first ` as `.
pub(crate) fn split_alias(value: &str) -> Option<(&str, &str)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)\s+as\s+").expect("static regex"));
    let m = re.find(value)?;
    Some((&value[..m.start()], &value[m.end()..]))
}

/// A value ending in `)` is a function call and is not quoted.
pub(crate) fn is_expression(value: &str) -> bool {
    value.trim_end().ends_with(')')
}

/// Identifier quoting shared by the query and schema grammars.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wrapper {
    prefix: String,
}

impl Wrapper {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Quote one identifier segment.
    pub fn wrap_segment(&self, segment: &str) -> String {
        if segment == "*" {
            return segment.to_string();
        }
        format!("\"{}\"", segment.replace('"', "\"\""))
    }

    /// Quote a column reference, which may be `table.column` or `column as alias`.
    pub fn wrap(&self, value: &str) -> String {
        if is_expression(value) {
            return value.to_string();
        }
        if let Some((base, alias)) = split_alias(value) {
            return format!("{} as {}", self.wrap(base), self.wrap_segment(alias));
        }
        value
            .split('.')
            .map(|s| self.wrap_segment(s))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quote a table name with the prefix applied to the table segment.
    pub fn wrap_table(&self, table: &str) -> String {
        if is_expression(table) {
            return format!("{}{}", self.prefix, table);
        }
        if let Some((base, alias)) = split_alias(table) {
            return format!("{} as {}", self.wrap_table(base), self.wrap_segment(alias));
        }
        match table.rsplit_once('.') {
            Some((database, name)) => format!(
                "{}.{}",
                self.wrap(database),
                self.wrap_segment(&format!("{}{}", self.prefix, name))
            ),
            None => self.wrap_segment(&format!("{}{}", self.prefix, table)),
        }
    }

    pub fn columnize<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> String {
        columns
            .into_iter()
            .map(|c| self.wrap(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
