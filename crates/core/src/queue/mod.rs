//! Admission queue polling.
//!
//! The queue client polls the wait endpoint until the backend admits the
//! caller, keeping the first absolute position it was assigned as an anchor so
//! that later polls report a stable relative position.

mod client;
mod types;

pub use client::QueueClient;
pub use types::{QueueOutcome, QueuePoll, QueuePosition};
