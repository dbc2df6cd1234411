use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::PasswordConfig;

/// Argon2id hashing with cost parameters fixed at startup.
///
/// Both operations run on the blocking pool; the plaintext is moved into the
/// task and dropped when it finishes.
#[derive(Clone)]
pub struct Passwords {
    params: Params,
}

impl Passwords {
    pub fn new(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash_password_blocking(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Constant-time check. The cost parameters are read from `hash`, so
    /// hashes made under an older configuration still verify.
    pub fn verify_password_blocking(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    pub async fn hash_password(&self, plain: String) -> anyhow::Result<String> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.hash_password_blocking(&plain))
            .await
            .context("hash task join")?
    }

    pub async fn verify_password(&self, plain: String, hash: String) -> anyhow::Result<bool> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.verify_password_blocking(&plain, &hash))
            .await
            .context("verify task join")?
    }
}

#[cfg(test)]
pub(crate) fn cheap_config() -> PasswordConfig {
    PasswordConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passwords() -> Passwords {
        Passwords::new(&cheap_config()).expect("valid params")
    }

    #[tokio::test]
    async fn hash_and_verify_roundtrip() {
        let pw = passwords();
        let password = "Secur3P@ssw0rd!";
        let hash = pw.hash_password(password.into()).await.expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains(password));
        assert!(pw
            .verify_password(password.into(), hash)
            .await
            .expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let pw = passwords();
        let hash = pw
            .hash_password_blocking("correct-horse-battery-staple")
            .expect("hashing should succeed");
        assert!(!pw
            .verify_password_blocking("wrong-password", &hash)
            .expect("verify should not error"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let pw = passwords();
        let a = pw.hash_password_blocking("s3cret!").unwrap();
        let b = pw.hash_password_blocking("s3cret!").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = passwords()
            .verify_password_blocking("anything", "not-a-valid-hash")
            .unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn old_cost_hashes_still_verify() {
        let old = passwords();
        let hash = old.hash_password_blocking("s3cret!").unwrap();
        let newer = Passwords::new(&PasswordConfig {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(newer.verify_password_blocking("s3cret!", &hash).unwrap());
    }

    #[test]
    fn rejects_invalid_params() {
        let cfg = PasswordConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(Passwords::new(&cfg).is_err());
    }
}
