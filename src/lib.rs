//! pcapql - query archived packet captures with PQL.
//!
//! Captures are stored as numbered segment files. An index pass records,
//! for every packet, a protocol bitmask, its IPv4 addresses and ports in a
//! per-segment SQLite file. Queries use those indexes to pick candidate
//! packets, then decode the candidates and evaluate the full filter.
//!
//! # Example
//!
//! ```no_run
//! use pcapql::{EngineConfig, IndexBuilder, QueryEngine};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::new("segments", "index");
//!     IndexBuilder::new(&config)?.build_all()?;
//!
//!     let engine = QueryEngine::new(config)?;
//!     let result = engine.run("select count() as PKT_TOTAL from a where ip.dst == 192.168.1.0/24;")?;
//!     println!("{:?}", result.rows);
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod search;

pub use config::EngineConfig;
pub use error::{Error, ParseError, Result, StoreError};
pub use index::{BuildReport, IndexBuilder, IndexStore};
pub use search::{QueryEngine, QueryResult};
