#![doc = include_str!("../README.md")]

pub mod batcher;
pub mod collector;
pub mod config;
pub mod delimiter;
pub mod error;
pub mod parser;

// --- 주요 타입 re-export ---

pub use batcher::Batcher;
pub use collector::{TcpCollector, UdpCollector};
pub use config::{BatcherConfig, TcpCollectorConfig, UdpCollectorConfig};
pub use delimiter::{Delimiter, Framing, FramingError};
pub use error::IngestPipelineError;
pub use parser::{LogFormat, RecordParser};
