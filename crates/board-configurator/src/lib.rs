pub mod config;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod header;
pub mod log_sanitize;
pub mod menu;
pub mod merge;
pub mod process;
pub mod provision;
pub mod records;
pub mod session;
pub mod state;
pub mod workspace;

pub use error::{Error, Result};
