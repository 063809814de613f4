//! Password utilities

use argon2::Argon2;
use argon2::password_hash::Error;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;

/// Generate a new random secret
pub fn generate() -> String {
    SaltString::generate(&mut OsRng).to_string()
}

/// Hash a given password
///
/// Every hash gets its own salt, so hashing the same password twice gives different hashes
pub fn hash(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);

    let hashed_password = Argon2::default().hash_password(password.as_bytes(), &salt)?;

    Ok(hashed_password.to_string())
}

/// Verify a given password against a given hash
///
/// A stored hash that can not be parsed never verifies
pub fn verify(hashed_password: &str, password: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hashed_password) else {
        tracing::error!("Stored password hash could not be parsed");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hashed_password = hash("secret1").unwrap();

        assert_ne!("secret1", hashed_password);
        assert!(verify(&hashed_password, "secret1"));
        assert!(!verify(&hashed_password, "secret2"));
    }

    #[test]
    fn test_hash_is_salted() {
        assert_ne!(hash("secret1").unwrap(), hash("secret1").unwrap());
    }

    #[test]
    fn test_verify_garbage_hash() {
        assert!(!verify("not-a-hash", "secret1"));
    }
}
