//! Substrate adapters

pub mod memory;

pub use memory::{MemoryConversation, MemoryNetwork, MemorySubscription};
