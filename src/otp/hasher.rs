//! Argon2id hashing of one-time codes
//!
//! Hashing is CPU-bound, so the async entry points run on the blocking pool.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};

use super::error::OtpError;

/// Argon2 cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodeHasher {
    params: Params,
}

impl CodeHasher {
    pub fn new(params: HashParams) -> Result<Self, OtpError> {
        let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
            .map_err(|e| OtpError::Hashing(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// PHC string with a fresh random salt
    pub fn hash_blocking(&self, code: &str) -> Result<String, OtpError> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(self.argon2().hash_password(code.as_bytes(), &salt)?.to_string())
    }

    /// Parameters are read back from the PHC string, so hashes made with
    /// older cost settings still verify.
    pub fn verify_blocking(&self, code: &str, phc: &str) -> Result<bool, OtpError> {
        let parsed = PasswordHash::new(phc)?;
        match self.argon2().verify_password(code.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn hash(&self, code: String) -> Result<String, OtpError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&code))
            .await
            .map_err(|e| OtpError::Hashing(e.to_string()))?
    }

    pub async fn verify(&self, code: String, phc: String) -> Result<bool, OtpError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify_blocking(&code, &phc))
            .await
            .map_err(|e| OtpError::Hashing(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> CodeHasher {
        CodeHasher::new(HashParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_hash_is_salted_phc() {
        let hasher = fast();
        let a = hasher.hash_blocking("123456").unwrap();
        let b = hasher.hash_blocking("123456").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert!(!a.contains("123456"));
        assert_ne!(a, b, "fresh salt per hash");
    }

    #[test]
    fn test_verify() {
        let hasher = fast();
        let phc = hasher.hash_blocking("042917").unwrap();
        assert!(hasher.verify_blocking("042917", &phc).unwrap());
        assert!(!hasher.verify_blocking("042918", &phc).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            fast().verify_blocking("123456", "not-a-phc"),
            Err(OtpError::Hashing(_))
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(
            CodeHasher::new(HashParams {
                memory_kib: 1,
                iterations: 0,
                parallelism: 1,
            })
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_async_roundtrip() {
        let hasher = fast();
        let phc = hasher.hash("777000".into()).await.unwrap();
        assert!(hasher.verify("777000".into(), phc).await.unwrap());
    }
}
