//! Domain layer: ports the cache core depends on

pub mod ports;

pub use ports::{PriceStore, StoredPrice};
