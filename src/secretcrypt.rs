//! Encryption/decryption using scrypt + XSalsa20Poly1305
//!
//! This module implements secret-based encryption using:
//! - scrypt for key derivation from the secret
//! - NaCl secretbox (XSalsa20Poly1305) for authenticated encryption
//!
//! The binary format is:
//! - salt: 8 bytes
//! - nonce: 24 bytes
//! - length: 8 bytes (big-endian signed int64)
//! - sealed box: variable length (includes 16-byte Poly1305 MAC)

use crate::error::{ErrorCategory, ErrorKind, Result, VaultvarError};
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use rand::RngCore;
use rand::rngs::OsRng;
use scrypt::{Params, scrypt};
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 8;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 24;

/// Length of derived key in bytes
const KEY_LEN: usize = 32;

/// Length of the sealed box length field in bytes
const LENGTH_LEN: usize = 8;

/// scrypt log2(N) parameter (CPU/memory cost, N = 32768)
const SCRYPT_LOG_N: u8 = 15;

/// scrypt r parameter (block size)
const SCRYPT_R: u32 = 8;

/// scrypt p parameter (parallelization)
const SCRYPT_P: u32 = 1;

/// Derive a 32-byte key from a secret and salt using scrypt
fn derive_key(secret: &[u8], salt: &[u8; SALT_LEN]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN).map_err(|e| {
        VaultvarError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::ScryptFailure,
            format!("failed to create scrypt params: {}", e),
        )
    })?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt(secret, salt, &params, &mut *key).map_err(|e| {
        VaultvarError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::ScryptFailure,
            format!("scrypt key derivation failed: {}", e),
        )
    })?;

    Ok(key)
}

/// Encrypt plaintext with a secret using random salt and nonce
///
/// Returns the binary format: salt(8) + nonce(24) + length(8) + sealedbox(variable)
pub fn encrypt(secret: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    encrypt_deterministic(secret, plaintext, &salt, &nonce)
}

/// Encrypt plaintext with a secret using provided salt and nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random salt/nonce.
pub fn encrypt_deterministic(
    secret: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let key = derive_key(secret, salt)?;
    let cipher = XSalsa20Poly1305::new(&(*key).into());

    let sealed_box = cipher
        .encrypt(&Nonce::from(*nonce), plaintext)
        .map_err(|e| {
            VaultvarError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::SecretboxFailure,
                format!("encryption failed: {}", e),
            )
        })?;

    let sealed_box_len = sealed_box.len() as i64;
    let mut output = Vec::with_capacity(SALT_LEN + NONCE_LEN + LENGTH_LEN + sealed_box.len());
    output.extend_from_slice(salt);
    output.extend_from_slice(nonce);
    output.extend_from_slice(&sealed_box_len.to_be_bytes());
    output.extend_from_slice(&sealed_box);

    Ok(output)
}

/// Sequential reader over the binary format.
struct Fields<'a> {
    input: &'a [u8],
}

impl<'a> Fields<'a> {
    fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        if self.input.len() < N {
            return Err(VaultvarError::with_kind(
                ErrorCategory::User,
                ErrorKind::TruncatedInput,
                format!("input likely truncated while reading {}", what),
            ));
        }
        let (head, rest) = self.input.split_at(N);
        self.input = rest;
        let mut out = [0u8; N];
        out.copy_from_slice(head);
        Ok(out)
    }
}

/// Decrypt ciphertext with a secret
pub fn decrypt(secret: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let mut fields = Fields { input: ciphertext };
    let salt: [u8; SALT_LEN] = fields.take("salt")?;
    let nonce: [u8; NONCE_LEN] = fields.take("nonce")?;
    let length: [u8; LENGTH_LEN] = fields.take("sealed box length")?;
    let sealed_box_len = i64::from_be_bytes(length);

    if sealed_box_len < 0 {
        return Err(VaultvarError::with_kind(
            ErrorCategory::User,
            ErrorKind::BinaryFormat,
            "negative sealed box length (when interpreted as a big-endian i64)",
        ));
    }

    // Valid input can fail this on platforms with a small usize.
    let sealed_box_len = usize::try_from(sealed_box_len).map_err(|e| {
        VaultvarError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::BinaryFormat,
            "sealed box length exceeds this system's address space",
            e,
        )
    })?;

    let sealed_box = fields.input;
    if sealed_box_len > sealed_box.len() {
        return Err(VaultvarError::with_kind(
            ErrorCategory::User,
            ErrorKind::TruncatedInput,
            "truncated or corrupt input; claimed length greater than available input",
        ));
    }
    if sealed_box_len < sealed_box.len() {
        return Err(VaultvarError::with_kind(
            ErrorCategory::User,
            ErrorKind::TrailingData,
            "invalid input: unexpected data after sealed box",
        ));
    }

    let key = derive_key(secret, &salt)?;
    let cipher = XSalsa20Poly1305::new(&(*key).into());
    cipher
        .decrypt(&Nonce::from(nonce), sealed_box)
        .map_err(|_| {
            VaultvarError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "corrupt input, tampered-with data, or bad secret",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_plaintext() {
        let ciphertext = encrypt(b"test", b"hello").unwrap();
        let decrypted = decrypt(b"test", &ciphertext).unwrap();

        assert_eq!(b"hello", &decrypted[..]);
    }

    #[test]
    fn test_empty_plaintext() {
        let ciphertext = encrypt(b"test", b"").unwrap();
        assert_eq!(ciphertext.len(), SALT_LEN + NONCE_LEN + LENGTH_LEN + 16);
        assert_eq!(decrypt(b"test", &ciphertext).unwrap(), b"");
    }

    #[test]
    fn test_random_salt_and_nonce() {
        let ct1 = encrypt(b"test", b"hello world").unwrap();
        let ct2 = encrypt(b"test", b"hello world").unwrap();

        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_wrong_secret() {
        let ciphertext = encrypt(b"correct", b"secret data").unwrap();
        let err = decrypt(b"wrong", &ciphertext).expect_err("expected authentication failure");

        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_truncated_salt() {
        let err = decrypt(b"test", &[1, 2, 3]).unwrap_err();

        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert!(err.to_string().contains("while reading salt"));
    }

    #[test]
    fn test_truncated_nonce() {
        let err = decrypt(b"test", &vec![0u8; SALT_LEN + 3]).unwrap_err();

        assert!(err.to_string().contains("while reading nonce"));
    }

    #[test]
    fn test_negative_length() {
        let mut ciphertext = vec![0u8; SALT_LEN + NONCE_LEN + LENGTH_LEN];
        ciphertext[SALT_LEN + NONCE_LEN..].copy_from_slice(&(-1i64).to_be_bytes());

        let err = decrypt(b"test", &ciphertext).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
    }

    #[test]
    fn test_length_exceeds_available() {
        let mut ciphertext = encrypt(b"test", b"hello").unwrap();
        ciphertext[SALT_LEN + NONCE_LEN..SALT_LEN + NONCE_LEN + LENGTH_LEN]
            .copy_from_slice(&1_000_000i64.to_be_bytes());

        let err = decrypt(b"test", &ciphertext).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
    }

    #[test]
    fn test_trailing_data() {
        let mut ciphertext = encrypt(b"test", b"hello").unwrap();
        ciphertext.push(0xFF);

        let err = decrypt(b"test", &ciphertext).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TrailingData));
    }

    #[test]
    fn test_known_ciphertext() {
        let salt = [0x42u8; SALT_LEN];
        let nonce = [0x24u8; NONCE_LEN];

        let ciphertext = encrypt_deterministic(b"test", b"test payload", &salt, &nonce).unwrap();

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42,
            0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24,
            0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24,
            0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1c,
            0x44, 0x87, 0xfe, 0xcd, 0x6f, 0xcf, 0x10, 0x75,
            0x7b, 0x4c, 0xb9, 0xc6, 0x59, 0xda, 0x83, 0x61,
            0x28, 0xfc, 0xf4, 0x30, 0x39, 0x85, 0x4a, 0x66,
            0xcf, 0xb5, 0xcf, 0xd4,
        ];

        assert_eq!(ciphertext, expected);
        assert_eq!(decrypt(b"test", &ciphertext).unwrap(), b"test payload");
    }
}
