pub mod memory;
pub mod traits;

pub use memory::InMemorySyncStore;
pub use traits::SyncStore;
