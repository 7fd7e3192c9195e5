//! Infrastructure layer for the proof-request protocol
//!
//! Contains:
//! - Error taxonomy for handshake failures
//! - Consumed-nonce registry (replay protection)
//! - Metadata validator (origin, freshness, replay)
//! - Collaborator traits (ledger, registry, proving backend, wallet)

mod error;
mod metadata;
mod nonce_registry;
mod traits;

pub use error::*;
pub use metadata::{FreshnessWindow, MetadataValidator};
pub use nonce_registry::{NonceRegistry, NonceStats};
pub use traits::*;
