//! Password verification

use bcrypt::verify;

/// Stored values starting with `$2` are bcrypt hashes.
pub fn is_bcrypt_hash(stored: &str) -> bool {
    stored.starts_with("$2")
}

/// Check a presented password against the stored value, which is either a
/// bcrypt hash or plain text.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, bcrypt::BcryptError> {
    if is_bcrypt_hash(stored) {
        verify(password, stored)
    } else {
        Ok(password == stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcrypt_and_plain_values() {
        let hashed = bcrypt::hash("s3cret", 4).unwrap();
        assert!(is_bcrypt_hash(&hashed));
        assert!(verify_password("s3cret", &hashed).unwrap());
        assert!(!verify_password("wrong", &hashed).unwrap());

        assert!(verify_password("plain", "plain").unwrap());
        assert!(!verify_password("Plain", "plain").unwrap());
    }
}
