use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Constant-time comparison of a presented secret against the expected one.
///
/// Both sides are hashed first, so neither the contents nor the length of the
/// expected key can be probed through response timing.
pub fn constant_time_compare(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided.as_slice().ct_eq(expected.as_slice()).into()
}
