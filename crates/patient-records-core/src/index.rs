//! Bucket index derived from a patient identifier.

/// Number of buckets an identifier can fall into.
pub const BUCKET_COUNT: u32 = 10;

/// Compute the bucket for an identifier.
///
/// Sums the Unicode scalar values of every character and reduces the sum
/// modulo [`BUCKET_COUNT`]. The result is always in `0..=9`. Different
/// identifiers may share a bucket; uniqueness is enforced on the identifier
/// itself, never on the bucket.
pub fn bucket_for(identifier: &str) -> u8 {
    let sum = identifier
        .chars()
        .fold(0u64, |acc, c| acc + u64::from(u32::from(c)));
    (sum % u64::from(BUCKET_COUNT)) as u8
}
