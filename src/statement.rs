//! Statement text under construction.
//!
//! The grammars never write a literal into SQL text directly. They append
//! text and parameter segments, and [`Statement::render`] turns the whole
//! thing into final SQL in a single pass, each parameter going through the
//! [`Escaper`] exactly once, left to right.
use crate::error::{Error, Result};
use crate::escape::Escaper;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Param(Value),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    segments: Vec<Segment>,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(sql: impl Into<String>) -> Self {
        let mut stmt = Self::new();
        stmt.push_str(&sql.into());
        stmt
    }

    pub fn push_str(&mut self, sql: &str) {
        if sql.is_empty() {
            return;
        }
        match self.segments.last_mut() {
            Some(Segment::Text(last)) => last.push_str(sql),
            _ => self.segments.push(Segment::Text(sql.to_string())),
        }
    }

    pub fn push_param(&mut self, value: Value) {
        self.segments.push(Segment::Param(value));
    }

    /// Append a raw fragment whose `?` placeholders are filled by `bindings`
    /// in order. A `?` inside a single-quoted literal is left alone.
    pub fn push_raw(&mut self, sql: &str, bindings: &[Value]) -> Result<()> {
        let pieces = split_placeholders(sql);
        let placeholders = pieces.len() - 1;
        if placeholders != bindings.len() {
            return Err(Error::PlaceholderMismatch {
                sql: sql.to_string(),
                placeholders,
                bindings: bindings.len(),
            });
        }

        let mut bindings = bindings.iter();
        for (i, piece) in pieces.iter().enumerate() {
            if i > 0 {
                if let Some(value) = bindings.next() {
                    self.push_param(value.clone());
                }
            }
            self.push_str(piece);
        }
        Ok(())
    }

    pub fn append(&mut self, other: Statement) {
        for segment in other.segments {
            match segment {
                Segment::Text(s) => self.push_str(&s),
                Segment::Param(v) => self.push_param(v),
            }
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn params(&self) -> impl Iterator<Item = &Value> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(v) => Some(v),
            Segment::Text(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// SQL text with every parameter inlined as a literal.
    pub fn render(&self, escaper: &dyn Escaper) -> String {
        let mut sql = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(s) => sql.push_str(s),
                Segment::Param(v) => sql.push_str(&escaper.quote(v)),
            }
        }
        sql
    }

    /// SQL text with `?` in place of each parameter. For logs.
    pub fn template(&self) -> String {
        let mut sql = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(s) => sql.push_str(s),
                Segment::Param(_) => sql.push('?'),
            }
        }
        sql
    }
}

/// Split `sql` around placeholders. Returns placeholders + 1 pieces.
/// `?` inside string literals, quoted identifiers and `--` comments is text.
fn split_placeholders(sql: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut in_comment = false;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
            continue;
        }
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                // A doubled quote stays inside.
                if chars.peek().map(|&(_, next)| next) == Some(q) {
                    chars.next();
                } else {
                    quote = None;
                }
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '-' if chars.peek().map(|&(_, next)| next) == Some('-') => {
                chars.next();
                in_comment = true;
            }
            '?' => {
                pieces.push(&sql[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&sql[start..]);
    pieces
}
