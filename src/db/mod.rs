mod batch;
mod connection;
mod endpoint;
mod registry;
mod row;
mod stream;
mod transport;

pub use batch::*;
pub use connection::*;
pub use registry::*;
pub use row::*;
pub use stream::*;
pub use transport::*;
