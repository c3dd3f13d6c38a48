//! Password checks: Argon2id verification and the registration length
//! policy.

use std::borrow::Cow;

use argon2::password_hash::{Error as HashError, PasswordHash};
use argon2::{Argon2, PasswordVerifier};

use crate::error::AuthError;

/// Bytes fed to Argon2: `pepper || password`.
fn with_pepper<'a>(password: &'a str, pepper: Option<&str>) -> Cow<'a, [u8]> {
    match pepper {
        Some(p) => Cow::Owned([p.as_bytes(), password.as_bytes()].concat()),
        None => Cow::Borrowed(password.as_bytes()),
    }
}

/// Check `password` against a stored PHC string. A mismatch is
/// `Ok(false)`; only an unreadable hash is an error.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let stored =
        PasswordHash::new(hash).map_err(|e| AuthError::Crypto(format!("stored hash: {e}")))?;

    match Argon2::default().verify_password(&with_pepper(password, pepper), &stored) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("argon2: {e}"))),
    }
}

/// Reject passwords shorter than `min_length` characters.
pub fn check_policy(password: &str, min_length: usize) -> Result<(), AuthError> {
    if password.chars().count() < min_length {
        return Err(AuthError::WeakPassword { min: min_length });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::PasswordHasher;
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;

    fn hash_password(password: &str) -> String {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .expect("hashing failed")
            .to_string()
    }

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("hunter22");
        assert!(verify_password("hunter22", &hash, None).unwrap());
        assert!(!verify_password("wrong", &hash, None).unwrap());
    }

    #[test]
    fn pepper_is_prepended() {
        let hash = hash_password("pepper!hunter22");
        assert!(verify_password("hunter22", &hash, Some("pepper!")).unwrap());
        assert!(!verify_password("hunter22", &hash, None).unwrap());
    }

    #[test]
    fn malformed_hash_returns_error() {
        assert!(matches!(
            verify_password("pw", "not-a-hash", None),
            Err(AuthError::Crypto(_))
        ));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(check_policy("short", 8).is_err());
        assert!(check_policy("long-enough", 8).is_ok());
        // Counted in characters, not bytes.
        assert!(check_policy("çççççççç", 8).is_ok());
    }
}
