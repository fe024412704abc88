//! # docdb-client
//!
//! Client library for docdb.
//!
//! This crate provides:
//! - Async TCP connection management with request/reply correlation
//! - Command cursors that transparently issue `getMore` round trips
//! - A high-level client facade (connect, commands, database handles)
//! - Connection string parsing

pub mod auth;
pub mod client;
pub mod connection;
pub mod cursor;
pub mod database;
pub mod error;
pub mod executor;
pub mod options;

pub use client::Client;
pub use connection::Connection;
pub use cursor::{CommandCursor, Namespace};
pub use database::Database;
pub use error::ClientError;
pub use executor::{CommandExecutor, ExecutorFuture};
pub use options::{ClientOptions, Credentials, ADMIN_DB};
