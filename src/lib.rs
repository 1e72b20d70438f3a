//! Resolves user selectors (ids, ranges, sub-file picks, hashes, magnets,
//! torrents, URLs, free text) against a remote download-task service.

pub mod core;
pub mod plugins;

pub use crate::core::engine::{QueryEngine, QueryOutcome};
pub use crate::core::error::{QueryError, Result};
pub use crate::core::memory::MemoryTaskService;
pub use crate::plugins::http::driver::HttpTaskService;
pub use crate::plugins::registry::{ProcessorRegistry, TaskService};
