//! Versioned armoring of sealed bytes into a cipher block
//!
//! A cipher block is the text that sits under a `!vault |` marker. It is a
//! header line followed by base64url body lines of at most [`LINE_WIDTH`]
//! characters:
//!
//! ```text
//! $VAULTVAR;1;XSALSA20POLY1305
//! 9Ia1qTx0...
//! ```
//!
//! Every line is free of whitespace, so re-indenting the block never
//! changes its meaning.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultvarError};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Magic prefix shared by all block versions
const MAGIC_PREFIX: &str = "$VAULTVAR;";

/// Version 1 header line
const V1_HEADER: &str = "$VAULTVAR;1;XSALSA20POLY1305";

/// Maximum width of a body line
pub const LINE_WIDTH: usize = 80;

/// Wrap bytes in armor, returning the block as separate lines
pub fn wrap(body: &[u8]) -> Vec<String> {
    let encoded = URL_SAFE_NO_PAD.encode(body);
    let mut lines = Vec::with_capacity(2 + encoded.len() / LINE_WIDTH);
    lines.push(V1_HEADER.to_string());
    // base64url output is ASCII, so byte chunks are char boundaries.
    lines.extend(
        encoded
            .as_bytes()
            .chunks(LINE_WIDTH)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned()),
    );
    lines
}

/// Unwrap a cipher block, returning the original bytes
///
/// Leading and trailing whitespace on each line is ignored, as is the
/// layout of the body across lines.
pub fn unwrap(block: &str) -> Result<Vec<u8>> {
    let mut lines = block.lines().map(str::trim).filter(|l| !l.is_empty());

    let header = lines.next().ok_or_else(|| {
        VaultvarError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "empty cipher block; likely truncated",
        )
    })?;

    if header != V1_HEADER {
        let kind = if header.starts_with(MAGIC_PREFIX) {
            ErrorKind::ArmoringFromFuture
        } else {
            ErrorKind::ArmoringInvalid
        };
        let msg = if kind == ErrorKind::ArmoringFromFuture {
            "cipher block claims to be vaultvar, but not a version we support"
        } else {
            "cipher block header unrecognized"
        };
        return Err(VaultvarError::with_kind(ErrorCategory::User, kind, msg));
    }

    let encoded: String = lines.collect();
    URL_SAFE_NO_PAD.decode(encoded.as_bytes()).map_err(|e| {
        VaultvarError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ArmoringDecode,
            format!("base64 decoding failed: {}", e),
            e,
        )
    })
}
