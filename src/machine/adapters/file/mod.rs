//! Filesystem-backed adapters.

mod store;

pub use store::FileStore;
