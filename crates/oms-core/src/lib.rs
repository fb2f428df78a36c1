pub mod config;
pub mod keys;
pub mod types;

pub use config::OmsConfig;
pub use types::*;
