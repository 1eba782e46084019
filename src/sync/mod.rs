//! Price-store synchronization engine

mod engine;

pub use engine::{SyncEngine, SyncReport};
