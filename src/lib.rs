pub mod broadcast;
pub mod cli;
pub mod cli_handlers;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod server;
pub mod snapshot;
pub mod standby;
pub mod store;

#[cfg(test)]
pub mod test_utils;
