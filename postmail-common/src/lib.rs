pub mod config;
pub mod logging;
pub mod traits;

pub use tracing;
