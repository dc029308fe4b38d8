//! Formrelay Library
//!
//! Single-file form upload relay that streams submissions to a remote media host.
//!
//! # Features
//!
//! - **Single pipeline**: one form field in, one remote upload out, one redirect back
//! - **No local persistence**: uploads are buffered in memory and streamed onward
//! - **Backpressure**: the bridge feeds the remote sink through a bounded channel
//! - **Exactly-once settlement**: one outcome per upload, even with a misbehaving transport
//!
//! # Example
//!
//! ```no_run
//! use formrelay::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let server = Server::bind(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod remote;
pub mod router;
pub mod server;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
