//! The seal/unseal capability
//!
//! Everything above this module treats a cipher block as opaque text.
//! [`SecretboxSealer`] is the production implementation: secretcrypt for
//! the bytes, varmor for the block layout.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultvarError};
use crate::secret::SecretHandle;
use crate::secretcrypt;
use crate::varmor;

pub trait Sealer {
    /// Seals `plaintext`, returning the cipher block as separate lines.
    fn seal(&self, plaintext: &str, secret: &SecretHandle) -> Result<Vec<String>>;

    /// Recovers the plaintext of a cipher block (lines joined by `\n`).
    fn unseal(&self, block: &str, secret: &SecretHandle) -> Result<String>;
}

impl<T: Sealer + ?Sized> Sealer for &T {
    fn seal(&self, plaintext: &str, secret: &SecretHandle) -> Result<Vec<String>> {
        (**self).seal(plaintext, secret)
    }

    fn unseal(&self, block: &str, secret: &SecretHandle) -> Result<String> {
        (**self).unseal(block, secret)
    }
}

/// scrypt + XSalsa20Poly1305, armored as a header line plus base64url lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecretboxSealer;

impl Sealer for SecretboxSealer {
    fn seal(&self, plaintext: &str, secret: &SecretHandle) -> Result<Vec<String>> {
        let ciphertext = secretcrypt::encrypt(secret.expose(), plaintext.as_bytes())
            .map_err(|e| e.with_context("encryption failed"))?;
        Ok(varmor::wrap(&ciphertext))
    }

    fn unseal(&self, block: &str, secret: &SecretHandle) -> Result<String> {
        let ciphertext = varmor::unwrap(block).map_err(|e| e.with_context("failed to unarmor"))?;
        let plaintext = secretcrypt::decrypt(secret.expose(), &ciphertext)
            .map_err(|e| e.with_context("failed to decrypt"))?;
        String::from_utf8(plaintext).map_err(|e| {
            VaultvarError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::BinaryFormat,
                "decrypted value is not valid UTF-8",
                e,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let secret = SecretHandle::new(b"test".to_vec());
        let block = SecretboxSealer.seal("hunter2", &secret).unwrap();

        assert!(block[0].starts_with("$VAULTVAR;1;"));
        assert_eq!(
            SecretboxSealer.unseal(&block.join("\n"), &secret).unwrap(),
            "hunter2"
        );
    }

    #[test]
    fn test_multiline_roundtrip() {
        let secret = SecretHandle::new(b"test".to_vec());
        let plaintext = "line one\nline two\n";
        let block = SecretboxSealer.seal(plaintext, &secret).unwrap();

        assert_eq!(SecretboxSealer.unseal(&block.join("\n"), &secret).unwrap(), plaintext);
    }

    #[test]
    fn test_wrong_secret_keeps_kind() {
        let block = SecretboxSealer
            .seal("hunter2", &SecretHandle::new(b"right".to_vec()))
            .unwrap();
        let err = SecretboxSealer
            .unseal(&block.join("\n"), &SecretHandle::new(b"wrong".to_vec()))
            .unwrap_err();

        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(err.message(), "failed to decrypt");
    }

    #[test]
    fn test_foreign_block() {
        let err = SecretboxSealer
            .unseal("CIPHERBLOCK", &SecretHandle::new(b"x".to_vec()))
            .unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::ArmoringInvalid));
    }
}
