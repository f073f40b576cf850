//! Password hashing and temporary password generation
//!
//! Hashes are Argon2id PHC strings with a random salt per hash.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{
        rand_core::{OsRng, RngCore},
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2,
};

/// Shortest password accepted from users
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const TEMPORARY_PASSWORD_LENGTH: usize = 12;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"@$!%*?&";

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// `Ok(false)` on mismatch, `Err` only when `hash` is not a valid PHC string
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

/// Reason a user-chosen password is rejected, if any
pub fn password_policy_violation(password: &str) -> Option<String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Some(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    None
}

/// Uniform index in `0..bound` from the OS RNG, rejecting the biased tail
fn random_index(rng: &mut OsRng, bound: usize) -> usize {
    let bound = bound as u32;
    let zone = u32::MAX - (u32::MAX % bound);
    loop {
        let value = rng.next_u32();
        if value < zone {
            return (value % bound) as usize;
        }
    }
}

fn pick(rng: &mut OsRng, set: &[u8]) -> u8 {
    set[random_index(rng, set.len())]
}

/// A 12-character password with at least one uppercase letter, lowercase
/// letter, digit and symbol from `@$!%*?&`, in random order.
pub fn generate_temporary_password() -> String {
    let mut rng = OsRng;
    let all: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS].concat();

    let mut chars = vec![
        pick(&mut rng, UPPERCASE),
        pick(&mut rng, LOWERCASE),
        pick(&mut rng, DIGITS),
        pick(&mut rng, SYMBOLS),
    ];
    while chars.len() < TEMPORARY_PASSWORD_LENGTH {
        chars.push(pick(&mut rng, &all));
    }

    // Fisher-Yates
    for i in (1..chars.len()).rev() {
        let j = random_index(&mut rng, i + 1);
        chars.swap(i, j);
    }

    chars.into_iter().map(char::from).collect()
}
