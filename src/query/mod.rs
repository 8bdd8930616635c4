/// Query side of the dialect layer:
///
/// ```text
/// Query descriptor  (types.rs)
///       ↓
/// Query grammar     (grammar.rs) → Statement → db::Connection
/// ```
pub mod grammar;
pub mod types;

pub use grammar::QueryGrammar;
pub use types::*;
