use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// PBKDF2 rounds applied to account passwords
pub const PASSWORD_HASH_ITERATIONS: u32 = 100_000;

const HASH_LEN: usize = 32;
const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Generate a random per-account salt (hex encoded)
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    hex::encode(salt)
}

/// Derive the stored password hash from the password and salt
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        PASSWORD_HASH_ITERATIONS,
        &mut out,
    );
    hex::encode(out)
}

/// Verify a password against a stored hash and salt in constant time
pub fn verify_password(password: &str, hash: &str, salt: &str) -> bool {
    let expected = match hex::decode(hash) {
        Ok(bytes) if bytes.len() == HASH_LEN => bytes,
        _ => return false,
    };

    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        PASSWORD_HASH_ITERATIONS,
        &mut out,
    );
    out.ct_eq(expected.as_slice()).into()
}

/// Generate a 6-digit numeric code (100000..=999999) for verification and PINs
pub fn generate_numeric_code() -> String {
    OsRng.gen_range(100_000u32..1_000_000).to_string()
}

/// Constant-time comparison of user-entered codes
pub fn codes_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.trim().as_bytes()).into()
}

/// Random 128-bit identifier (hex encoded)
pub fn generate_id() -> String {
    let mut buffer = [0u8; 16];
    OsRng.fill_bytes(&mut buffer);
    hex::encode(buffer)
}

/// Derive a 256-bit encryption key from a passphrase and raw salt
pub fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, &mut key);
    key
}

/// Random bytes for salts and nonces
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    OsRng.fill_bytes(&mut out);
    out
}

/// AEAD encrypt (AES-256-GCM) returning nonce || ciphertext || tag
pub fn aead_encrypt(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, String> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce_bytes: [u8; NONCE_LEN] = random_bytes();
    let mut ct = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: plaintext, aad })
        .map_err(|_| "encrypt failed".to_string())?;

    let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
    out.extend_from_slice(&nonce_bytes);
    out.append(&mut ct);
    Ok(out)
}

/// AEAD decrypt for blobs produced by [`aead_encrypt`]
pub fn aead_decrypt(key: &[u8; 32], blob: &[u8], aad: &[u8]) -> Result<Vec<u8>, String> {
    if blob.len() < NONCE_LEN {
        return Err("cipher blob too short".to_string());
    }
    let (nonce, ct) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ct, aad })
        .map_err(|_| "decrypt failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trips_with_same_salt() {
        let salt = generate_salt();
        let hash = hash_password("Secret123!", &salt);
        assert!(verify_password("Secret123!", &hash, &salt));
        assert!(!verify_password("secret123!", &hash, &salt));
    }

    #[test]
    fn different_salts_give_different_hashes() {
        let a = hash_password("Secret123!", &generate_salt());
        let b = hash_password("Secret123!", &generate_salt());
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("Secret123!", "zz", "salt"));
        assert!(!verify_password("Secret123!", "", "salt"));
    }

    #[test]
    fn numeric_codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_numeric_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn code_comparison_ignores_surrounding_whitespace() {
        assert!(codes_match("123456", " 123456\n"));
        assert!(!codes_match("123456", "123457"));
        assert!(!codes_match("123456", "12345"));
    }

    #[test]
    fn aead_round_trip_needs_matching_key_and_aad() {
        let salt: [u8; 16] = random_bytes();
        let key = derive_key("correct horse battery", &salt, 1_000);
        let blob = aead_encrypt(&key, b"smtp secret", b"ctx").unwrap();

        assert_eq!(aead_decrypt(&key, &blob, b"ctx").unwrap(), b"smtp secret");
        assert!(aead_decrypt(&key, &blob, b"other").is_err());

        let wrong = derive_key("wrong horse battery", &salt, 1_000);
        assert!(aead_decrypt(&wrong, &blob, b"ctx").is_err());
        assert!(aead_decrypt(&key, &blob[..4], b"ctx").is_err());
    }
}
