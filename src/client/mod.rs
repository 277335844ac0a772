//! Client side: the HTTP API binding and the optimistic todo board built on it.

pub mod api;
pub mod board;

pub use api::{ClientError, Created, HttpTodoApi, TodoApi, DEFAULT_BASE_URL};
pub use board::TodoBoard;
