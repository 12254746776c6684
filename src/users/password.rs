use constant_time_eq::constant_time_eq;
use pbkdf2::pbkdf2_hmac;
use rand::{distributions::Alphanumeric, Rng};
use sha2::Sha256;

pub const SALT_LEN: usize = 10;
pub const PBKDF2_ROUNDS: u32 = 10_000;
/// Raw digest size in bytes; the stored form is twice as long in hex.
pub const DIGEST_LEN: usize = 50;

/// Random per-user salt, alphanumeric.
pub fn generate_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}

/// PBKDF2-HMAC-SHA256 of `plain` under `salt`, hex encoded.
pub fn hash_password(plain: &str, salt: &str) -> String {
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(plain.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut digest);
    hex::encode(digest)
}

/// Recomputes the digest for `candidate` and compares it with `stored` in constant time.
pub fn verify_password(stored: &str, candidate: &str, salt: &str) -> bool {
    let computed = hash_password(candidate, salt);
    let (stored, computed) = (stored.as_bytes(), computed.as_bytes());
    if stored.len() != computed.len() {
        return false;
    }
    constant_time_eq(stored, computed)
}

/// Spends the same work as a verification so a missing account answers as slowly as a present one.
pub fn burn_verification(candidate: &str) {
    std::hint::black_box(hash_password(candidate, ""));
}
