//! Merkle commitment over evidence hashes.
//!
//! The root is a pure function of the evidence *set*: leaves are normalized
//! to lowercase hex, deduplicated, and sorted lexicographically before the
//! tree is built, so commit order never changes the root. Pairs are hashed
//! in sorted order (`sha256(min || max)` over the decoded bytes) and an odd
//! trailing node is paired with itself.

use sha2::{Digest, Sha256};

use crate::error::{OptoutError, Result};

/// Lowercase hex SHA-256 of arbitrary bytes. Shared by evidence capture
/// hashing, idempotency keys, and subject ids.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Normalize one evidence hash: lowercase, must be exactly 64 hex chars.
pub fn normalize_evidence_hash(hash: &str) -> Result<String> {
    let lower = hash.trim().to_lowercase();
    if lower.len() != 64 || !lower.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(OptoutError::InvalidEvidenceHash(hash.to_string()));
    }
    Ok(lower)
}

/// Normalize, deduplicate, and sort an evidence list into canonical leaves.
pub fn canonical_leaves(hashes: &[String]) -> Result<Vec<String>> {
    let mut leaves = hashes
        .iter()
        .map(|h| normalize_evidence_hash(h))
        .collect::<Result<Vec<_>>>()?;
    leaves.sort();
    leaves.dedup();
    Ok(leaves)
}

/// Compute the Merkle root of an evidence set. Fails on an empty set.
pub fn merkle_root(hashes: &[String]) -> Result<String> {
    let leaves = canonical_leaves(hashes)?;
    if leaves.is_empty() {
        return Err(OptoutError::EmptyEvidenceSet);
    }

    let mut level = leaves;
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let a = &pair[0];
            let b = pair.get(1).unwrap_or(a);
            next.push(hash_pair(a, b)?);
        }
        level = next;
    }
    Ok(level.remove(0))
}

/// Hash two hex nodes in sorted order over their decoded bytes.
fn hash_pair(a: &str, b: &str) -> Result<String> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let lo_bytes = hex::decode(lo).map_err(|_| OptoutError::InvalidEvidenceHash(lo.to_string()))?;
    let hi_bytes = hex::decode(hi).map_err(|_| OptoutError::InvalidEvidenceHash(hi.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&lo_bytes);
    hasher.update(&hi_bytes);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn h(data: &str) -> String {
        sha256_hex(data.as_bytes())
    }

    #[test]
    fn empty_set_is_rejected() {
        let err = merkle_root(&[]).unwrap_err();
        assert!(matches!(err, OptoutError::EmptyEvidenceSet));
    }

    #[test]
    fn single_leaf_root_is_the_leaf() {
        let leaf = h("capture-1");
        assert_eq!(merkle_root(&[leaf.clone()]).unwrap(), leaf);
    }

    #[test]
    fn root_is_order_insensitive() {
        let a = h("capture-a");
        let b = h("capture-b");
        let c = h("capture-c");
        let forward = merkle_root(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let backward = merkle_root(&[c, b, a]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn root_ignores_duplicates_and_case() {
        let a = h("capture-a");
        let b = h("capture-b");
        let plain = merkle_root(&[a.clone(), b.clone()]).unwrap();
        let noisy = merkle_root(&[a.to_uppercase(), b.clone(), a.clone()]).unwrap();
        assert_eq!(plain, noisy);
    }

    #[test]
    fn altering_one_hash_changes_the_root() {
        let a = h("capture-a");
        let b = h("capture-b");
        let c = h("capture-c");
        let original = merkle_root(&[a.clone(), b.clone()]).unwrap();
        let tampered = merkle_root(&[a, c]).unwrap();
        assert_ne!(original, tampered);
    }

    #[test]
    fn odd_leaf_count_is_handled() {
        let leaves: Vec<String> = (0..5).map(|i| h(&format!("capture-{i}"))).collect();
        let root = merkle_root(&leaves).unwrap();
        assert_eq!(root.len(), 64);
        // Recommitting yields the identical root.
        assert_eq!(merkle_root(&leaves).unwrap(), root);
    }

    #[test]
    fn malformed_hash_is_rejected() {
        let err = merkle_root(&["zzzz".to_string()]).unwrap_err();
        assert!(matches!(err, OptoutError::InvalidEvidenceHash(_)));
    }

    #[test]
    fn pair_hash_is_symmetric() {
        let a = h("left");
        let b = h("right");
        assert_eq!(hash_pair(&a, &b).unwrap(), hash_pair(&b, &a).unwrap());
    }
}
