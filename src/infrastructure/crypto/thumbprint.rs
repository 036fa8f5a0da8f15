//! Client certificate thumbprints
//!
//! A TLS-terminating proxy forwards the client certificate in a header,
//! either as PEM or as base64 DER. The thumbprint is the SHA-256 of the DER
//! bytes in lowercase hex.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::support::errors::InfraError;

fn der_bytes(forwarded: &str) -> Result<Vec<u8>, InfraError> {
    // Proxies may fold the PEM onto a single line
    let body: String = forwarded
        .replace("-----BEGIN CERTIFICATE-----", "")
        .replace("-----END CERTIFICATE-----", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    STANDARD
        .decode(body.as_bytes())
        .map_err(|e| InfraError::Crypto(format!("client certificate is not base64: {}", e)))
}

pub fn certificate_thumbprint(forwarded: &str) -> Result<String, InfraError> {
    let der = der_bytes(forwarded)?;
    let mut hasher = Sha256::new();
    hasher.update(&der);
    Ok(hex::encode(hasher.finalize()))
}

/// Case-insensitive comparison, tolerating `:` separators.
pub fn thumbprints_match(a: &str, b: &str) -> bool {
    let normalize = |s: &str| s.replace(':', "").trim().to_ascii_lowercase();
    normalize(a) == normalize(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pem_and_der_forms_agree() {
        let der = STANDARD.encode(b"certificate bytes");
        let pem = format!(
            "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
            der
        );
        let a = certificate_thumbprint(&der).unwrap();
        let b = certificate_thumbprint(&pem).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn comparison_ignores_case_and_colons() {
        assert!(thumbprints_match("AB:CD:ef", "abcdEF"));
        assert!(!thumbprints_match("abcd", "abce"));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(certificate_thumbprint("%%%").is_err());
    }
}
