use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The document's indentation or syntax makes mapping membership ambiguous.
    MalformedDocument,
    /// A sealed leaf could not be unsealed with the provided secret.
    Decryption,
    /// A key path no longer matches the current text.
    PathNotFound,
    /// A key name maps to several leaves and the cursor cannot pick one.
    AmbiguousKey,
    /// The requested leaf is plaintext but the operation needs a sealed one.
    NotSealed,
    /// The requested leaf is already sealed.
    AlreadySealed,
    /// The cipher block is malformed (header, encoding, or unsupported version).
    ArmoringInvalid,
    /// Base64 decoding of the cipher block payload failed.
    ArmoringDecode,
    /// Cipher block claimed to be ours but used a future/unsupported version.
    ArmoringFromFuture,
    /// Length fields or binary layout are invalid.
    BinaryFormat,
    /// Input data ended before the expected component could be read.
    TruncatedInput,
    /// Additional bytes were present after the sealed payload.
    TrailingData,
    /// Authentication failed due to an incorrect secret or tampering
    /// or corruption.
    AuthenticationFailed,
    /// Low-level scrypt key derivation failed.
    ScryptFailure,
    /// NaCl secretbox (XSalsa20Poly1305) failed to seal or open data.
    SecretboxFailure,
    /// The secret could not be obtained from its configured source.
    SecretUnavailable,
    /// The configuration file could not be read or parsed.
    Config,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

/// The leaf an error is about: its key and 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub key: String,
    pub line: usize,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.key, self.line)
    }
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct VaultvarError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    /// The document leaf the failure concerns, when there is one.
    pub origin: Option<Origin>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl VaultvarError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            origin: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            ..Self::new(category, msg)
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::with_kind(category, kind, msg)
        }
    }

    /// A structural problem in the document text, reported against a 1-based line.
    pub fn malformed(line: usize, msg: impl fmt::Display) -> Self {
        Self::with_kind(
            ErrorCategory::User,
            ErrorKind::MalformedDocument,
            format!("malformed document at line {}: {}", line, msg),
        )
    }

    /// The sealed leaf `key` on `line` could not be unsealed.
    pub fn decryption(key: &str, line: usize, source: VaultvarError) -> Self {
        Self {
            origin: Some(Origin {
                key: key.to_string(),
                line,
            }),
            source: Some(Box::new(source)),
            ..Self::with_kind(
                ErrorCategory::User,
                ErrorKind::Decryption,
                format!("failed to decrypt {} at line {}", key, line),
            )
        }
    }

    pub fn path_not_found(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::User, ErrorKind::PathNotFound, msg)
    }

    /// Attaches the leaf this error concerns.
    pub fn at(mut self, key: &str, line: usize) -> Self {
        self.origin = Some(Origin {
            key: key.to_string(),
            line,
        });
        self
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        let origin = self.origin.clone();
        Self {
            category,
            kind,
            origin,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// The message followed by every source message, joined by `": "`.
    pub fn chain(&self) -> String {
        let mut out = self.msg.clone();
        let mut next = self.source_error().map(|e| e as &(dyn StdError + 'static));
        while let Some(err) = next {
            out.push_str(": ");
            out.push_str(&err.to_string());
            next = err.source();
        }
        out
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VaultvarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_preserves_kind_and_origin() {
        let err = VaultvarError::path_not_found("no such key").at("db", 3);
        let wrapped = err.with_context("encrypt failed");

        assert_eq!(wrapped.kind, Some(ErrorKind::PathNotFound));
        assert_eq!(wrapped.category, ErrorCategory::User);
        assert_eq!(
            wrapped.origin,
            Some(Origin {
                key: "db".to_string(),
                line: 3
            })
        );
        assert_eq!(wrapped.chain(), "encrypt failed: no such key");
    }

    #[test]
    fn test_decryption_carries_origin() {
        let inner = VaultvarError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "bad secret",
        );
        let err = VaultvarError::decryption("password", 7, inner);

        assert_eq!(err.kind, Some(ErrorKind::Decryption));
        assert_eq!(err.origin.as_ref().map(|o| o.line), Some(7));
        assert_eq!(err.message(), "failed to decrypt password at line 7");
        assert!(err.source_error().is_some());
    }
}
