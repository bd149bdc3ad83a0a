// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Password hashing with Argon2id.
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$m=19456,t=2,p=1$...`).
//! The cost parameters are fixed; verification reads them back from the
//! stored string, so older hashes keep verifying if the constants change.

use anyhow::Context;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::OnceLock;

/// Memory cost in KiB.
const MEMORY_COST_KIB: u32 = 19_456;
/// Number of passes.
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

fn hasher() -> anyhow::Result<Argon2<'static>> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| anyhow::anyhow!("invalid Argon2 parameters: {e}"))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password with a fresh random salt.
pub fn hash_password(plaintext: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash.
///
/// A malformed digest is a mismatch, not an error.
pub fn verify_password(plaintext: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

/// Spend one verification's worth of time without a real digest.
///
/// Used when no account (or no password) exists for an email, so that
/// response time does not reveal which case occurred.
pub fn burn_verification(plaintext: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    if let Some(digest) = DUMMY.get_or_init(|| hash_password("dummy-password").ok()) {
        let _ = verify_password(plaintext, digest);
    }
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_async(plaintext: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plaintext))
        .await
        .context("password hashing task failed")?
}

/// [`verify_password`] on the blocking pool. `None` digest burns time and fails.
pub async fn verify_password_async(
    plaintext: String,
    digest: Option<String>,
) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || match digest {
        Some(digest) => verify_password(&plaintext, &digest),
        None => {
            burn_verification(&plaintext);
            false
        }
    })
    .await
    .context("password verification task failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        for plaintext in ["pw1", "correct horse battery staple", "пароль", ""] {
            let digest = hash_password(plaintext).unwrap();
            assert!(verify_password(plaintext, &digest), "{plaintext:?}");
        }
    }

    #[test]
    fn test_wrong_password_rejected() {
        let digest = hash_password("pw1").unwrap();
        assert!(!verify_password("pw2", &digest));
        assert!(!verify_password("PW1", &digest));
    }

    #[test]
    fn test_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fixed_cost_parameters() {
        let digest = hash_password("pw").unwrap();
        assert!(digest.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"), "{digest}");
    }

    #[test]
    fn test_malformed_digest_is_mismatch() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "not-a-hash"));
        assert!(!verify_password("pw", "$2a$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW"));
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let digest = hash_password_async("pw".to_string()).await.unwrap();
        assert!(verify_password_async("pw".to_string(), Some(digest.clone()))
            .await
            .unwrap());
        assert!(!verify_password_async("nope".to_string(), Some(digest))
            .await
            .unwrap());
        assert!(!verify_password_async("pw".to_string(), None).await.unwrap());
    }
}
