pub mod config;
pub mod db;
pub mod error;
pub mod escape;
mod identifier;
pub mod query;
pub mod schema;
pub mod sequence;
pub mod statement;
pub mod value;

pub use config::{ConnectionConfig, TransportMode};
pub use db::Connection;
pub use error::{Error, Result};
pub use value::{Record, Value};
