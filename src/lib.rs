pub mod config;
pub mod protocol;
pub mod sandbox;
pub mod security;
pub mod terminal;

pub use config::Config;
pub use protocol::*;
