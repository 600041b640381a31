//! Argon2 password hashing for accounts created through the API.

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use rand_core::OsRng;

/// Produce an argon2 PHC string, e.g. `$argon2id$v=19$…`.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHash, PasswordVerifier};

  use super::*;

  #[test]
  fn hashes_verify() {
    let hash = hash_password("123456").unwrap();
    assert!(hash.starts_with("$argon2"));
    let parsed = PasswordHash::new(&hash).unwrap();
    assert!(Argon2::default().verify_password(b"123456", &parsed).is_ok());
    assert!(Argon2::default().verify_password(b"654321", &parsed).is_err());
  }
}
