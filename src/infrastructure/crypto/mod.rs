//! Credential primitives used by station authentication

pub mod password;
pub mod thumbprint;

pub use password::{is_bcrypt_hash, verify_password};
pub use thumbprint::{certificate_thumbprint, thumbprints_match};
