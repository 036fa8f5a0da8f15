//! OCPP 1.6 protocol adapter

mod adapter;

pub use adapter::V16AdapterFactory;
