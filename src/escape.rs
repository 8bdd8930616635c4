//! Literal escaping.
//!
//! The store's wire protocols cannot bind parameters server-side for every
//! statement shape, so every value that reaches SQL text goes through an
//! [`Escaper`] first.
use std::sync::{Arc, OnceLock};

use chrono::Timelike;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Turns a host value into a SQL literal that cannot terminate early.
///
/// Implementations must be pure and satisfy
/// `unquote(&quote_str(s)) == Some(s)` for every string `s`.
pub trait Escaper: Send + Sync {
    /// Quote a string as a single-quoted literal.
    fn quote_str(&self, value: &str) -> String;

    /// Reverse of [`Escaper::quote_str`]. `None` if `literal` is not a
    /// literal this escaper could have produced.
    fn unquote(&self, literal: &str) -> Option<String>;

    /// Render any value as a literal.
    fn quote(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) => quote_float(*f),
            Value::String(s) => self.quote_str(s),
            Value::DateTime(dt) => {
                let text = if dt.nanosecond() == 0 {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
                };
                self.quote_str(&text)
            }
            Value::Array(items) => {
                let items: Vec<String> = items.iter().map(|v| self.quote(v)).collect();
                format!("[{}]", items.join(", "))
            }
        }
    }
}

fn quote_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        f.to_string()
    }
}

/// Which escaper a connection uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeStrategy {
    /// The store's own backslash escape sequences.
    #[default]
    Native,
    /// Manual quote doubling, for environments where the native routine is unavailable.
    Doubling,
}

impl EscapeStrategy {
    pub fn escaper(self) -> Arc<dyn Escaper> {
        match self {
            EscapeStrategy::Native => Arc::new(NativeEscaper),
            EscapeStrategy::Doubling => Arc::new(DoublingEscaper),
        }
    }
}

/// Backslash escaping as understood by the store's string literal parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEscaper;

impl Escaper for NativeEscaper {
    fn quote_str(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for ch in value.chars() {
            match ch {
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\0' => out.push_str("\\0"),
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    fn unquote(&self, literal: &str) -> Option<String> {
        let inner = strip_delimiters(literal)?;
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next()? {
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    '0' => out.push('\0'),
                    c @ ('\\' | '\'') => out.push(c),
                    _ => return None,
                },
                '\'' => return None,
                c => out.push(c),
            }
        }
        Some(out)
    }
}

/// Doubles quotes and backslashes. The store reads `''` as `'` and `\\`
/// as `\`, so a trailing backslash can never escape the closing quote.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoublingEscaper;

fn special_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"['\\]").expect("static regex"))
}

impl Escaper for DoublingEscaper {
    fn quote_str(&self, value: &str) -> String {
        format!("'{}'", special_chars().replace_all(value, "${0}${0}"))
    }

    fn unquote(&self, literal: &str) -> Option<String> {
        let inner = strip_delimiters(literal)?;
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch == '\'' || ch == '\\' {
                if chars.next()? != ch {
                    return None;
                }
            }
            out.push(ch);
        }
        Some(out)
    }
}

fn strip_delimiters(literal: &str) -> Option<&str> {
    if literal.len() < 2 {
        return None;
    }
    literal.strip_prefix('\'')?.strip_suffix('\'')
}
