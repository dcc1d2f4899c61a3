use std::path::Path;

use crate::domain::errors::DomainError;

/// Turns a stored document into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path, declared_mime: Option<&str>) -> Result<String, DomainError>;
}
