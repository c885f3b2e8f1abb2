use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hashing(argon2::password_hash::Error),
}

/// Hashes `password` with a fresh random salt into a PHC string.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hashing)
}

/// False on mismatch and on a hash that does not parse.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_password_only() {
        let hash = hash_password("blabla").expect("hash succeeds");
        assert!(verify_password(&hash, "blabla"));
        assert!(!verify_password(&hash, "blablabla"));
    }

    #[test]
    fn salts_every_hash() {
        let first = hash_password("blabla").expect("hash succeeds");
        let second = hash_password("blabla").expect("hash succeeds");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("not-a-phc-string", "blabla"));
        assert!(!verify_password("", ""));
    }
}
