mod flat_index;
mod persisted;

pub use flat_index::{FlatIndex, Neighbor};
pub use persisted::PersistedVectorStore;
