use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, Rng};
use std::fmt;

/// Number of digits in a confirmation code.
pub const CODE_LENGTH: usize = 6;

/// Newtype for a plaintext confirmation code to prevent accidental logging
#[derive(Clone)]
pub struct ChallengeCode(String);

impl ChallengeCode {
    pub fn new(code: String) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// The plaintext code only ever goes to the delivery channel, never to logs.
impl fmt::Debug for ChallengeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChallengeCode(\"******\")")
    }
}

/// Generate a random numeric confirmation code
///
/// Draws digits from the OS entropy source, not a seeded PRNG.
pub fn generate_code() -> ChallengeCode {
    let mut rng = OsRng;
    let code: String = (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    ChallengeCode::new(code)
}

/// Hash a confirmation code using Argon2
///
/// Uses Argon2id variant with secure default parameters.
/// Salt is automatically generated and included in the hash.
pub fn hash_code(code: &ChallengeCode) -> Result<String, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let code_hash = argon2
        .hash_password(code.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash confirmation code: {}", e))?
        .to_string();

    Ok(code_hash)
}

/// Verify a confirmation code against a stored hash
///
/// Returns Ok(()) if the code matches, Err otherwise.
/// Uses constant-time comparison to prevent timing attacks.
pub fn verify_code(code: &ChallengeCode, code_hash: &str) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(code_hash)
        .map_err(|e| anyhow::anyhow!("Invalid code hash format: {}", e))?;

    Argon2::default()
        .verify_password(code.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Code verification failed"))
}
