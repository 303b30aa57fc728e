//! Wireless Sensor Tag integration module
//!
//! - `client`: Tag list HTTP client
//! - `poller`: Background poll loop feeding the Reconciler

pub mod client;
pub mod poller;

pub use client::TagListClient;
pub use poller::Poller;
