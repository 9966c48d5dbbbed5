//!  Storage is organized through [activity_store::JsonlActivityStore].
//!  The basic idea is:
//!   - There is a single append-only log file inside the data directory.
//!   - Every sampling tick appends one JSON line with a store-assigned id.
//!   - Records are never updated or deleted; queries scan and filter the log.

pub mod activity_store;
pub mod entities;
