#![doc = include_str!("../README.md")]

pub mod docid;
pub mod engine;
pub mod error;
pub mod index;
mod search;
pub mod shard;

pub use docid::DocId;
pub use engine::{Engine, EngineOptions};
pub use error::EngineError;
pub use index::{Index, IndexableEvent};
pub use shard::{Shard, MAX_SEARCH_HITS};
