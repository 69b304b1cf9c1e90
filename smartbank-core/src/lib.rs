//! Smart Bank Core - data model, error taxonomy and seams
//!
//! This crate defines everything the client orchestrator and the CLI share:
//! the account and session types, the unified error type with its single
//! message-extraction policy, configuration, logging, and the traits behind
//! which the ledger service and the persisted session record live.

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use rust_decimal::Decimal;
pub use tokio;
pub use tracing;
