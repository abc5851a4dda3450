//! Train seat availability lookups, run as request-queue jobs.

pub mod catalog;
pub mod lookup;

pub use catalog::{SeatCatalog, SeatRecord, SeatStatus};
pub use lookup::{SeatAvailability, SeatLookupJob, SeatQuery};
