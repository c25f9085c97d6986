//! The engine's collaborator seams.
//!
//! Components depend on these traits rather than concrete
//! implementations: the chain adapter, system clock, HTTP fetcher and
//! file store each implement one, and tests substitute in-memory fakes.

mod chain;
mod clock;
mod fetch;
mod signer;
mod store;

pub use chain::*;
pub use clock::*;
pub use fetch::*;
pub use signer::*;
pub use store::*;
