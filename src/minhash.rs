//! MinHash estimation of Jaccard similarity over character shingles.
//!
//! A string is decomposed into the set of its contiguous character substrings
//! of length [`SHINGLE_LEN`]. Each shingle is hashed once with SHA-256; every
//! simulated hash function then XORs that value with its own perturbation and
//! runs the result through a 64-bit bijective mixer, so the simulations behave
//! as independent permutations of the hash space. The signature of a string is
//! the minimum under each simulation, and the fraction of simulations on which
//! two signatures agree estimates the Jaccard similarity of the shingle sets.
//!
//! Everything is deterministic: the perturbations are derived from the
//! simulation index, never from a random source.
//!
//! # Example
//!
//! ```
//! use refscreen::minhash::{MinHasher, similarity};
//!
//! assert_eq!(similarity("Effects of X on Y", "Effects of X on Y"), 1.0);
//!
//! let hasher = MinHasher::new(3, 128);
//! let score = hasher.similarity("abcdef", "abcxyz");
//! assert!(score > 0.0 && score < 1.0);
//! ```

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Length of a shingle, in characters.
pub const SHINGLE_LEN: usize = 3;

/// Number of simulated hash functions.
pub const NUM_PERM: usize = 200;

static DEFAULT_HASHER: LazyLock<MinHasher> =
    LazyLock::new(|| MinHasher::new(SHINGLE_LEN, NUM_PERM));

/// Estimate the Jaccard similarity of the shingle sets of `a` and `b` with the
/// default shingle length and simulation count.
///
/// When either string is too short to produce a shingle, the result is `1.0`
/// for identical strings and `0.0` otherwise.
pub fn similarity(a: &str, b: &str) -> f64 {
    DEFAULT_HASHER.similarity(a, b)
}

/// The set of all contiguous substrings of `len` characters in `text`.
pub fn shingles(text: &str, len: usize) -> HashSet<String> {
    let chars: Vec<char> = text.chars().collect();
    if len == 0 || chars.len() < len {
        return HashSet::new();
    }
    chars.windows(len).map(|w| w.iter().collect()).collect()
}

/// Exact Jaccard similarity of two sets; `0.0` when both are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// A MinHash sketch: one minimum per simulated hash function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHashSignature(Vec<u64>);

impl MinHashSignature {
    /// The per-simulation minima.
    pub fn values(&self) -> &[u64] {
        &self.0
    }

    /// Fraction of simulations on which the two signatures agree.
    ///
    /// Signatures of different lengths share no simulations and estimate `0.0`.
    pub fn estimate(&self, other: &Self) -> f64 {
        if self.0.is_empty() || self.0.len() != other.0.len() {
            return 0.0;
        }
        let equal = self.0.iter().zip(&other.0).filter(|(a, b)| a == b).count();
        equal as f64 / self.0.len() as f64
    }
}

/// Builds MinHash signatures for a fixed shingle length and simulation count.
#[derive(Debug, Clone)]
pub struct MinHasher {
    shingle_len: usize,
    perturbations: Vec<u64>,
}

impl Default for MinHasher {
    fn default() -> Self {
        Self::new(SHINGLE_LEN, NUM_PERM)
    }
}

impl MinHasher {
    /// Create a hasher. A `num_perm` of zero is raised to one.
    #[must_use]
    pub fn new(shingle_len: usize, num_perm: usize) -> Self {
        let perturbations = (0..num_perm.max(1) as u64).map(perturbation).collect();
        Self {
            shingle_len,
            perturbations,
        }
    }

    /// Shingle length in characters.
    pub fn shingle_len(&self) -> usize {
        self.shingle_len
    }

    /// Number of simulated hash functions.
    pub fn num_perm(&self) -> usize {
        self.perturbations.len()
    }

    /// Sketch `text`. Returns `None` when it has no shingles.
    pub fn signature(&self, text: &str) -> Option<MinHashSignature> {
        let hashes: Vec<u64> = shingles(text, self.shingle_len)
            .iter()
            .map(|s| base_hash(s))
            .collect();
        if hashes.is_empty() {
            return None;
        }
        let minima = self
            .perturbations
            .iter()
            .map(|&p| hashes.iter().map(|&h| mix(h ^ p)).min().unwrap_or(u64::MAX))
            .collect();
        Some(MinHashSignature(minima))
    }

    /// Estimated Jaccard similarity of the shingle sets of `a` and `b`.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        match (self.signature(a), self.signature(b)) {
            (Some(sa), Some(sb)) => sa.estimate(&sb),
            _ if a == b => 1.0,
            _ => 0.0,
        }
    }
}

/// First eight bytes of the SHA-256 digest, big-endian.
fn base_hash(shingle: &str) -> u64 {
    let digest = Sha256::digest(shingle.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Per-simulation perturbation, spread over the whole word.
fn perturbation(index: u64) -> u64 {
    mix(index.wrapping_add(1).wrapping_mul(0x9e37_79b9_7f4a_7c15))
}

/// SplitMix64 finalizer; a bijection on `u64`.
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("abc")]
    #[case("Effects of X on Y")]
    #[case("Pharmacokinetics of clonazepam in children with epilepsy")]
    fn test_identical_strings_score_one(#[case] text: &str) {
        assert_eq!(similarity(text, text), 1.0);
    }

    #[rstest]
    #[case("abcdef", "abcxyz")]
    #[case("Effects of X on Y", "Effects of Z on Y")]
    #[case("randomized trial", "a randomised controlled trial")]
    fn test_symmetric(#[case] a: &str, #[case] b: &str) {
        assert_eq!(similarity(a, b), similarity(b, a));
    }

    #[test]
    fn test_deterministic() {
        let first = similarity("abcdef", "abcxyz");
        for _ in 0..5 {
            assert_eq!(similarity("abcdef", "abcxyz").to_bits(), first.to_bits());
        }
        let a = MinHasher::new(3, 200).signature("abcdef");
        let b = MinHasher::new(3, 200).signature("abcdef");
        assert_eq!(a, b);
    }

    // Fixed values; any change to hashing or mixing shifts every stored match.
    #[test]
    fn test_known_answers() {
        assert_eq!(similarity("abcdef", "abcxyz"), 0.15);

        assert_eq!(base_hash("abc"), 0xba78_16bf_8f01_cfea);
        let hasher = MinHasher::new(3, 200);
        let abc = hasher.signature("abc").unwrap();
        assert_eq!(abc.values()[0], 0xbbaa_7f1a_07b2_0659);

        let signature = hasher.signature("abcdef").unwrap();
        assert_eq!(
            &signature.values()[..3],
            &[0x41d2_1a9b_8e5d_1fd0, 0x5466_2d72_4c44_0821, 0x0068_699d_a31f_e4a8]
        );
    }

    #[test]
    fn test_partial_overlap_is_strictly_between_zero_and_one() {
        let score = similarity("abcdef", "abcxyz");
        assert!(score > 0.0, "score was {score}");
        assert!(score < 1.0, "score was {score}");
    }

    #[test]
    fn test_estimate_tracks_exact_jaccard() {
        let a = "Clonazepam pharmacokinetics in paediatric epilepsy patients";
        let b = "Clonazepam pharmacokinetics in adult epilepsy patients";
        let exact = jaccard(&shingles(a, 3), &shingles(b, 3));
        let estimate = MinHasher::new(3, 200).similarity(a, b);
        assert!(
            (exact - estimate).abs() < 0.15,
            "exact {exact} vs estimate {estimate}"
        );
    }

    #[test]
    fn test_disjoint_strings_score_zero() {
        assert_eq!(similarity("aaaa", "bbbb"), 0.0);
    }

    // Strings shorter than a shingle only match themselves.
    #[rstest]
    #[case("ab", "ab", 1.0)]
    #[case("", "", 1.0)]
    #[case("ab", "cd", 0.0)]
    #[case("", "abc", 0.0)]
    #[case("abc", "ab", 0.0)]
    fn test_short_strings(#[case] a: &str, #[case] b: &str, #[case] expected: f64) {
        assert_eq!(similarity(a, b), expected);
    }

    #[test]
    fn test_shingles() {
        let set = shingles("abcd", 3);
        assert_eq!(set.len(), 2);
        assert!(set.contains("abc"));
        assert!(set.contains("bcd"));
        assert!(shingles("ab", 3).is_empty());
        // repeated shingles collapse
        assert_eq!(shingles("aaaaa", 3).len(), 1);
    }

    #[test]
    fn test_shingles_are_character_based() {
        let set = shingles("één", 3);
        assert_eq!(set.len(), 1);
        assert!(set.contains("één"));
    }

    #[test]
    fn test_signature_length_matches_num_perm() {
        let hasher = MinHasher::new(3, 150);
        assert_eq!(hasher.num_perm(), 150);
        let signature = hasher.signature("abcdef").unwrap();
        assert_eq!(signature.values().len(), 150);
        assert!(hasher.signature("ab").is_none());
    }

    #[test]
    fn test_mismatched_signatures_estimate_zero() {
        let a = MinHasher::new(3, 10).signature("abcdef").unwrap();
        let b = MinHasher::new(3, 20).signature("abcdef").unwrap();
        assert_eq!(a.estimate(&b), 0.0);
    }

    #[test]
    fn test_perturbations_are_distinct() {
        let hasher = MinHasher::new(3, 200);
        let unique: HashSet<u64> = hasher.perturbations.iter().copied().collect();
        assert_eq!(unique.len(), 200);
    }
}
