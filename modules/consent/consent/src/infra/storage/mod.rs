//! [`LocalStore`](crate::domain::ports::LocalStore) backends.

mod file;
mod memory;

pub use file::{FileLocalStore, StoreError};
pub use memory::InMemoryLocalStore;
