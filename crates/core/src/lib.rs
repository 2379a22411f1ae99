// DHFWK Core - Task lifecycle, registries & ports
// NO infrastructure dependencies (adapters live in infra-system / api-rpc)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
