pub mod connection;
pub mod dialect;
pub mod query;
pub mod request;
pub mod schema;

pub use connection::*;
pub use dialect::*;
pub use query::*;
pub use request::*;
pub use schema::*;
