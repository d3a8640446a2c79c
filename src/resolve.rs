//! Leaf selection and unsealing

use serde::Serialize;
use tracing::{debug, trace};

use crate::document::{Document, KeyPath, Leaf};
use crate::error::{Result, VaultvarError};
use crate::seal::Sealer;
use crate::secret::SecretHandle;

/// A selected leaf with its plaintext value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLeaf {
    pub path: KeyPath,
    pub key: String,
    /// Always plaintext, unsealed first if the leaf was sealed.
    pub value: String,
    /// 1-based line of the leaf's key.
    pub line: usize,
}

pub fn sealed_only(leaf: &Leaf<'_>) -> bool {
    leaf.scalar.sealed
}

pub fn unsealed_only(leaf: &Leaf<'_>) -> bool {
    !leaf.scalar.sealed
}

/// Matches the single leaf at `path`.
pub fn at_path(path: &KeyPath) -> impl Fn(&Leaf<'_>) -> bool + '_ {
    move |leaf: &Leaf<'_>| leaf.path == *path
}

/// Returns every leaf accepted by `predicate`, in pre-order.
///
/// Sealed leaves are unsealed with `secret`. The first failure aborts the
/// whole walk; no partial list is returned.
pub fn resolve<S, P>(
    document: &Document,
    secret: &SecretHandle,
    sealer: &S,
    mut predicate: P,
) -> Result<Vec<ResolvedLeaf>>
where
    S: Sealer + ?Sized,
    P: FnMut(&Leaf<'_>) -> bool,
{
    let mut out = Vec::new();
    for leaf in document.leaves().filter(|leaf| predicate(leaf)) {
        let scalar = leaf.scalar;
        let key = leaf.path.key().to_string();
        let value = if scalar.sealed {
            trace!(path = %leaf.path, line = scalar.line, "unsealing leaf");
            sealer
                .unseal(&scalar.value, secret)
                .map_err(|e| VaultvarError::decryption(&key, scalar.line, e))?
        } else {
            scalar.value.clone()
        };
        out.push(ResolvedLeaf {
            path: leaf.path,
            key,
            value,
            line: scalar.line,
        });
    }
    debug!(leaves = out.len(), "resolved leaves");
    Ok(out)
}
