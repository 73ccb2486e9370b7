//! Query execution against indexed segments.
//!
//! ```rust,no_run
//! use pcapql::{EngineConfig, QueryEngine};
//!
//! let engine = QueryEngine::new(EngineConfig::new("segments", "index")).unwrap();
//! let result = engine
//!     .run("select ip.src, count() from a where tcp.dport == 443 group by ip.src;")
//!     .unwrap();
//! for row in &result.rows {
//!     println!("{row:?}");
//! }
//! ```

mod engine;
mod pointer;
mod result;

pub use engine::{QueryEngine, WILDCARD_COLUMNS};
pub use pointer::PacketPointer;
pub use result::{ColumnDescriptor, DisplayType, QueryResult, NO_ERRORS};
