//! Charge tag aggregate
//!
//! RFID / identity credentials and their per-station access grants.

pub mod model;
pub mod repository;

pub use model::{AccessGrant, AuthStatus, ChargeTag, Lookup, Resolution, INVALID_ID};
pub use repository::{AccessGrantRepository, ChargeTagRepository};
