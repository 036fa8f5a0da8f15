//! Station aggregate
//!
//! A registered charging station: credentials plus the metadata it reports
//! in BootNotification.

pub mod model;
pub mod repository;

pub use model::{BootInfo, Station};
pub use repository::StationRepository;
