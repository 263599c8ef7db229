//! GitHub credential handling.
//!
//! The store persists one token, the lifecycle manager decides when it changes,
//! and the detector spots run failures that call for a new one.

pub mod detector;
pub mod lifecycle;
pub mod store;

pub use detector::{requires_authorization, should_prompt_reauthorization};
pub use lifecycle::{CallbackOutcome, CredentialManager, Location, MemoryLocation};
pub use store::{CredentialStore, FileStore, MemoryStore};
