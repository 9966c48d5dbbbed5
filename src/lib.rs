//! Samples which application and window hold input focus, classifies each
//! observation into a coarse productivity category with keyword rules, and
//! answers time-per-application queries over the recorded activity log.
//!

pub mod cli;
pub mod error;
pub mod store;
pub mod tracker;
pub mod utils;
pub mod window_api;
