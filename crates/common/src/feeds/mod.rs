pub mod memory;
pub mod provider;

pub use memory::MemoryFeedStore;
pub use provider::{FeedStore, FeedStoreError, FeedUpdate};
