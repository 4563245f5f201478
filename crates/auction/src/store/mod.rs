//! Storage backends for the auction bid ledger

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;

pub use memory::InMemoryAuctionStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresAuctionStore;
pub use traits::{AuctionStore, SelectionOutcome};
