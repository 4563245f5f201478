//! Listing and reservation stores for OpenSwap
//!
//! A listing offers an underlying reservation for exchange. The listing
//! deliberately does not carry an owner column; ownership is always derived
//! through the reservation it is built on (see [`owner::owner_of`]).

pub mod error;
pub mod owner;
pub mod store;
pub mod types;

pub use error::{ListingError, Result};
pub use owner::owner_of;
pub use store::traits::{ListingStore, ReservationStore};
pub use types::{Listing, ListingStatus, ListingTerms, Reservation, ReservationStatus};
