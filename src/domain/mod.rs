//! Records, vectors, chunking, and the ports the rest of the crate plugs
//! providers into.

pub mod entities;
pub mod errors;
pub mod ports;

pub use entities::*;
pub use errors::{DomainError, Result};
