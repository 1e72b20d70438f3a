pub mod bt;
pub mod http;
pub mod registry;
pub mod task;
