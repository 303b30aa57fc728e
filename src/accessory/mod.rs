//! Accessory cache and host capability interface
//!
//! - `host`: Traits the home-automation host implements
//! - `reconciler`: Device record → accessory reconciliation

pub mod host;
pub mod reconciler;

pub use host::{AccessoryHost, AccessoryId};
pub use reconciler::{ReconcileOutcome, Reconciler};
