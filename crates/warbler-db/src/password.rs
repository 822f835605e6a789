use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand_core::OsRng;
use tracing::warn;

use crate::error::{DbError, Result};

/// Hash a password with Argon2id and a fresh random salt (PHC string format).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DbError::Password(e.to_string()))
}

/// Check `password` against a stored PHC hash. A malformed stored hash never
/// matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Unparseable password hash in users table: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("HASHED_PASSWORD").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert_ne!(hash, "HASHED_PASSWORD");
        assert!(verify_password("HASHED_PASSWORD", &hash));
        assert!(!verify_password("HASHED_PASSWORD2", &hash));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_password("superHash").unwrap(), hash_password("superHash").unwrap());
    }

    #[test]
    fn garbage_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
