//! Persistence layer: storage errors, persisted entities, the document-store
//! adapter trait, and its backends.

pub mod memory;
pub mod models;
#[cfg(feature = "mongo-store")]
pub mod mongodb;
pub mod storage;
pub mod store;
pub mod watch;
