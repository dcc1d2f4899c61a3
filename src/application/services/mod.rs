mod chat;
mod document;
mod rag;

pub use chat::{ChatAnswer, ChatService};
pub use document::DocumentService;
pub use rag::RagService;
