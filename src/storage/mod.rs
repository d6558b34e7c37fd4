pub mod cache;

pub use cache::{CacheEntry, CacheStats, TtlCache};
