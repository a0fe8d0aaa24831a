//! Configuration shared by the sender core and its transports.
//!
//! - [`timeouts`]: per-command timeouts applied by network transports

pub mod timeouts;

pub use timeouts::ClientTimeouts;
