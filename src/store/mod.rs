// Public API
pub use errors::StoreError;
pub use keys::{Key, Namespace};
pub use kv::{AtomicWrite, Entry, InMemoryKvStore, KeyValueStore, Mutation, Version};
pub use postgres::PostgresKvStore;

// Internal modules
mod errors;
mod keys;
mod kv;
mod postgres;
