//! Application layer - Use cases and orchestration.
//!
//! Services here depend on domain ports (traits) rather than concrete
//! providers; everything is wired once in the binaries.

pub mod services;

pub use services::{ChatAnswer, ChatService, DocumentService, RagService};
