//! OCPP 2.0.1 protocol adapter

mod adapter;

pub use adapter::V201AdapterFactory;
