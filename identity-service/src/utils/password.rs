use crate::models::PasswordType;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use subtle::ConstantTimeEq;

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Hash a password using Argon2
///
/// Uses Argon2id variant with secure default parameters.
/// Salt is automatically generated and included in the hash.
pub fn hash_password(password: &Password) -> Result<String, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(password_hash)
}

/// Produce the stored form of a password for an organization's policy.
pub fn seal_password(password: &Password, password_type: PasswordType) -> anyhow::Result<String> {
    match password_type {
        PasswordType::Plain => Ok(password.as_str().to_string()),
        PasswordType::Argon2 => hash_password(password),
    }
}

/// Check a submitted password against its stored form.
///
/// Plain passwords are compared in constant time; a stored value that does
/// not parse as an Argon2 hash never matches.
pub fn verify_password(password: &Password, stored: &str, password_type: PasswordType) -> bool {
    match password_type {
        PasswordType::Plain => password.as_str().as_bytes().ct_eq(stored.as_bytes()).into(),
        PasswordType::Argon2 => match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_str().as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password is not a valid argon2 hash");
                false
            }
        },
    }
}
