pub mod base;
pub mod engine;
pub mod error;
pub mod expand;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod memory;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod query;
pub mod torrent;
