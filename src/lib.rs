pub mod cli;
pub mod compute;
pub mod config;
pub mod error;
pub mod models;
pub mod processors;
pub mod readers;
pub mod utils;

pub use error::{Result, StatsError};
