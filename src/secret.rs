//! Secret acquisition
//!
//! Secrets are read fresh for every operation and never cached: a
//! [`SecretHandle`] lives for one request and is wiped when dropped.

use crate::config::ConfigSource;
use crate::error::{ErrorCategory, ErrorKind, Result, VaultvarError};
use std::fmt;
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::Path;
use tracing::debug;
use zeroize::Zeroizing;

/// Secret bytes used to seal and unseal leaves.
///
/// The bytes are wiped from memory on drop and never shown by `Debug`.
pub struct SecretHandle {
    bytes: Zeroizing<Vec<u8>>,
}

impl SecretHandle {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    /// Strips surrounding whitespace and rejects an empty result.
    fn from_raw(raw: Zeroizing<Vec<u8>>, what: &str) -> Result<Self> {
        let trimmed = raw.trim_ascii();
        if trimmed.is_empty() {
            return Err(VaultvarError::with_kind(
                ErrorCategory::User,
                ErrorKind::SecretUnavailable,
                format!("{} is empty", what),
            ));
        }
        Ok(Self::new(trimmed.to_vec()))
    }
}

impl fmt::Debug for SecretHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretHandle(<redacted>)")
    }
}

/// Anything that yields a secret, regardless of configuration.
pub trait SecretReader {
    fn read_secret(&mut self) -> Result<SecretHandle>;
}

impl<T: SecretReader + ?Sized> SecretReader for Box<T> {
    fn read_secret(&mut self) -> Result<SecretHandle> {
        (**self).read_secret()
    }
}

/// Yields the secret named by a configuration key.
pub trait SecretSource {
    /// `name` is a configuration key whose value locates the secret;
    /// `default` is used when the key is not configured.
    fn get_secret(&mut self, name: &str, default: &str) -> Result<SecretHandle>;
}

/// A plain reader ignores the configured location.
impl<T: SecretReader + ?Sized> SecretSource for T {
    fn get_secret(&mut self, _name: &str, _default: &str) -> Result<SecretHandle> {
        self.read_secret()
    }
}

/// Returns a fixed secret (for testing)
pub struct ConstantSecretReader {
    secret: Zeroizing<Vec<u8>>,
}

impl ConstantSecretReader {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret: Zeroizing::new(secret),
        }
    }
}

impl SecretReader for ConstantSecretReader {
    fn read_secret(&mut self) -> Result<SecretHandle> {
        SecretHandle::from_raw(self.secret.clone(), "secret")
    }
}

/// Reads the secret from any io::Read source
pub struct ReaderSecretReader {
    reader: Box<dyn Read>,
}

impl ReaderSecretReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl SecretReader for ReaderSecretReader {
    fn read_secret(&mut self) -> Result<SecretHandle> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            VaultvarError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading secret: {}", e),
                e,
            )
        })?;
        SecretHandle::from_raw(data, "secret input")
    }
}

/// Reads the secret from terminal with no echo
#[derive(Default)]
pub struct TerminalSecretReader;

impl SecretReader for TerminalSecretReader {
    fn read_secret(&mut self) -> Result<SecretHandle> {
        if !io::stdin().is_terminal() {
            return Err(VaultvarError::with_kind(
                ErrorCategory::User,
                ErrorKind::SecretUnavailable,
                "cannot read secret from terminal - stdin is not a terminal",
            ));
        }

        let mut stderr = io::stderr();
        stderr
            .write_all(b"Vault secret: ")
            .and_then(|_| stderr.flush())
            .map_err(|e| {
                VaultvarError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;

        // rpassword returns a String, so wrap it immediately.
        let secret = Zeroizing::new(rpassword::read_password().map_err(|e| {
            VaultvarError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::SecretUnavailable,
                format!("failure reading secret: {}", e),
                e,
            )
        })?);

        SecretHandle::from_raw(Zeroizing::new(secret.as_bytes().to_vec()), "secret")
    }
}

/// Reads a secret file; the file is opened, read and closed in one call.
pub fn read_secret_file(path: &Path) -> Result<SecretHandle> {
    debug!(path = %path.display(), "reading secret file");
    let data = Zeroizing::new(fs::read(path).map_err(|e| {
        VaultvarError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::SecretUnavailable,
            format!("failed to read secret file {}", path.display()),
            e,
        )
    })?);
    SecretHandle::from_raw(data, &format!("secret file {}", path.display()))
}

/// File-backed secrets whose location comes from configuration.
pub struct FileSecretSource<'a> {
    config: &'a dyn ConfigSource,
}

impl<'a> FileSecretSource<'a> {
    pub fn new(config: &'a dyn ConfigSource) -> Self {
        Self { config }
    }
}

impl SecretSource for FileSecretSource<'_> {
    fn get_secret(&mut self, name: &str, default: &str) -> Result<SecretHandle> {
        let location = self.config.value(name).unwrap_or_else(|| default.to_string());
        read_secret_file(Path::new(&location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    #[test]
    fn test_constant_reader() {
        let mut reader = ConstantSecretReader::new(b"test123".to_vec());
        assert_eq!(reader.read_secret().unwrap().expose(), b"test123");
        assert_eq!(reader.read_secret().unwrap().expose(), b"test123");
    }

    #[test]
    fn test_reader_strips_trailing_newline() {
        let data = b"mysecret\n";
        let mut reader = ReaderSecretReader::new(Box::new(&data[..]));
        assert_eq!(reader.read_secret().unwrap().expose(), b"mysecret");
    }

    #[test]
    fn test_reader_rejects_empty() {
        let data = b" \n";
        let mut reader = ReaderSecretReader::new(Box::new(&data[..]));
        let err = reader.read_secret().unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::SecretUnavailable));
    }

    #[test]
    fn test_reader_non_utf8() {
        let data: &[u8] = &[0xff, 0xfe, 0x00, 0x01];
        let mut reader = ReaderSecretReader::new(Box::new(data));
        assert_eq!(reader.read_secret().unwrap().expose(), data);
    }

    #[test]
    fn test_debug_is_redacted() {
        let handle = SecretHandle::new(b"hunter2".to_vec());
        assert!(!format!("{:?}", handle).contains("hunter2"));
    }

    #[test]
    fn test_file_source_uses_configured_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vault-pass");
        fs::write(&path, "  s3cret\n").unwrap();

        let config: Config = format!("vault_path = {:?}\n", path.display().to_string())
            .parse()
            .unwrap();
        let mut source = FileSecretSource::new(&config);

        let secret = source.get_secret("vault_path", "does-not-exist").unwrap();
        assert_eq!(secret.expose(), b"s3cret");
    }

    #[test]
    fn test_file_source_falls_back_to_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fallback");
        fs::write(&path, "fallback-secret").unwrap();

        let config = Config::default();
        let mut source = FileSecretSource::new(&config);

        let secret = source
            .get_secret("vault_path", path.to_str().unwrap())
            .unwrap();
        assert_eq!(secret.expose(), b"fallback-secret");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let config = Config::default();
        let mut source = FileSecretSource::new(&config);

        let err = source
            .get_secret("vault_path", missing.to_str().unwrap())
            .unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::SecretUnavailable));
    }
}
