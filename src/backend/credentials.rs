use crate::error::BlogError;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

const NAME_MAX_LEN: usize = 64;
const PASSWORD_MIN_LEN: usize = 6;

/// Checks registration input and returns the trimmed user name.
pub fn validate_credentials(name: &str, password: &str) -> Result<String, BlogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BlogError::validation("Please enter a username."));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(BlogError::validation(format!(
            "Username must be at most {} characters.",
            NAME_MAX_LEN
        )));
    }
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(BlogError::validation(format!(
            "Password should be at least {} characters.",
            PASSWORD_MIN_LEN
        )));
    }
    Ok(name.to_owned())
}

/// Returns an argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, BlogError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("verify_password: stored hash is unreadable: {}", e);
            false
        }
    }
}
