use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

lazy_static! {
    // Stands in for the stored hash when the email is unknown.
    static ref DUMMY_HASH: Option<String> = hash_password("blogcraft-timing-guard").ok();
}

fn argon2_error(context: &'static str, e: argon2::password_hash::Error) -> anyhow::Error {
    error!(error = %e, context, "argon2 failure");
    anyhow::anyhow!("{context}: {e}")
}

/// Salted Argon2id hash in PHC string form.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| argon2_error("hash password", e))
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| argon2_error("parse stored hash", e))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Checks a login attempt against the account's stored hash. With no
/// account the password is still run through Argon2 and the check fails,
/// so both outcomes cost the same.
pub fn check_credentials(plain: &str, stored: Option<&str>) -> anyhow::Result<bool> {
    match stored {
        Some(hash) => verify_password(plain, hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(plain, dummy);
            }
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("secret1").expect("hash");
        let b = hash_password("secret1").expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(err.to_string().starts_with("parse stored hash"));
    }

    #[test]
    fn credentials_without_an_account_never_match() {
        assert!(!check_credentials("blogcraft-timing-guard", None).expect("no error"));
        let hash = hash_password("secret1").expect("hash");
        assert!(check_credentials("secret1", Some(&hash)).expect("verify"));
        assert!(!check_credentials("secret2", Some(&hash)).expect("verify"));
    }
}
