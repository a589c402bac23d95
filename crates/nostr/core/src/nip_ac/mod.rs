//! NIP-AC: Agent Credit (`kind:39240..39245`).
//!
//! Core event surface:
//! - `39240` Credit Intent
//! - `39241` Credit Offer
//! - `39242` Credit Envelope (addressable authority state)
//! - `39243` Credit Spend Authorization
//! - `39244` Credit Settlement Receipt
//! - `39245` Credit Default Notice

pub mod default_notice;
pub mod envelope;
pub mod intent;
pub mod offer;
pub mod reputation;
pub mod scope_hash;
pub mod settlement;
pub mod spend;

pub use default_notice::*;
pub use envelope::*;
pub use intent::*;
pub use offer::*;
pub use reputation::*;
pub use scope_hash::*;
pub use settlement::*;
pub use spend::*;
