pub mod cli;
pub mod client;
pub mod config;
pub mod logging;
pub mod models;
pub mod server;
pub mod storage;
pub mod todo_manager;
