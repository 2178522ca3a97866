//! Session tokens and password hashing.

use anyhow::{anyhow, Result};
use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct SessionTokenValue(pub String);

impl SessionTokenValue {
    pub fn generate() -> SessionTokenValue {
        let rng = rand::rng();
        let random_string: String = rng
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        SessionTokenValue(random_string)
    }
}

mod piazza_argon2 {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{
            rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        },
        Argon2,
    };

    pub fn hash(plain: &[u8]) -> Result<String> {
        let argon2 = Argon2::default();
        let salt = SaltString::generate(&mut OsRng);
        let hash_string = argon2
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string();
        Ok(hash_string)
    }

    pub fn verify<T: AsRef<str>>(plain_pw: &[u8], target_hash: T) -> Result<bool> {
        let argon2 = Argon2::default();
        let password_hash =
            PasswordHash::new(target_hash.as_ref()).map_err(|err| anyhow!("{}", err))?;
        Ok(argon2.verify_password(plain_pw, &password_hash).is_ok())
    }
}

// Cheap stand-in hasher so test fixtures don't pay argon2's cost.
// The `$fast$` prefix keeps its hashes distinguishable from argon2's.
#[cfg(feature = "test-fast-hasher")]
mod fast_insecure {
    use sha2::{Digest, Sha256};

    pub const PREFIX: &str = "$fast$";

    pub fn hash(plain: &[u8]) -> String {
        format!("{}{:x}", PREFIX, Sha256::digest(plain))
    }

    pub fn verify(plain: &[u8], target_hash: &str) -> bool {
        hash(plain) == target_hash
    }
}

/// Hash a password for storage, using the hasher active in this build.
pub fn hash_password(plain: &str) -> Result<String> {
    #[cfg(feature = "test-fast-hasher")]
    {
        Ok(fast_insecure::hash(plain.as_bytes()))
    }
    #[cfg(not(feature = "test-fast-hasher"))]
    {
        piazza_argon2::hash(plain.as_bytes())
    }
}

/// Verify a password against a stored hash. Dispatches on the hash
/// format so databases written by either build keep working.
pub fn verify_password(plain: &str, stored_hash: &str) -> Result<bool> {
    #[cfg(feature = "test-fast-hasher")]
    if stored_hash.starts_with(fast_insecure::PREFIX) {
        return Ok(fast_insecure::verify(plain.as_bytes(), stored_hash));
    }
    if stored_hash.starts_with("$argon2") {
        return piazza_argon2::verify(plain.as_bytes(), stored_hash);
    }
    Err(anyhow!("Unrecognized password hash format"))
}
