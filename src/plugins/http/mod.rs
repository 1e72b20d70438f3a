pub mod cli;
pub mod driver;
pub mod expand;
pub mod resolver;
