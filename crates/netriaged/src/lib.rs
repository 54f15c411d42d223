//! netriage daemon library - exposes modules for testing.

pub mod assist;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod findings;
pub mod history;
pub mod intent;
pub mod raw_log;
pub mod routes;
pub mod server;
pub mod session;
pub mod trusted;
