#![doc = include_str!("../README.md")]

pub mod cli;
pub mod logging;
pub mod metrics_server;
pub mod server;
pub mod tls;
