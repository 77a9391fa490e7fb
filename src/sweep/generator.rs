//! Random candidate generator

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::ALPHABET;
use crate::types::Candidate;

/// Samples candidates uniformly, with replacement, from the configured space
pub struct CandidateGenerator {
    min_length: usize,
    max_length: usize,
    suffixes: Vec<String>,
    rng: StdRng,
}

impl CandidateGenerator {
    /// Create a generator seeded from OS entropy.
    ///
    /// Bounds are expected to be validated already (`1 <= min <= max`) and
    /// `suffixes` to be non-empty.
    pub fn new(min_length: usize, max_length: usize, suffixes: Vec<String>) -> Self {
        Self::with_rng(min_length, max_length, suffixes, StdRng::from_entropy())
    }

    /// Create a reproducible generator
    pub fn seeded(min_length: usize, max_length: usize, suffixes: Vec<String>, seed: u64) -> Self {
        Self::with_rng(min_length, max_length, suffixes, StdRng::seed_from_u64(seed))
    }

    fn with_rng(min_length: usize, max_length: usize, suffixes: Vec<String>, rng: StdRng) -> Self {
        Self {
            min_length,
            max_length,
            suffixes,
            rng,
        }
    }

    /// Size of the space being sampled
    pub fn total(&self) -> u64 {
        super::total_space(self.min_length, self.max_length, self.suffixes.len())
    }

    /// Draw a single candidate
    pub fn next_candidate(&mut self) -> Candidate {
        let length = self.rng.gen_range(self.min_length..=self.max_length);
        let name: String = (0..length)
            .map(|_| ALPHABET[self.rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        let suffix = self
            .suffixes
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default();

        Candidate::new(name, suffix)
    }

    /// Generate next batch of candidates
    pub fn generate_batch(&mut self, count: usize) -> Vec<Candidate> {
        (0..count).map(|_| self.next_candidate()).collect()
    }
}

impl Iterator for CandidateGenerator {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_candidate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn suffixes() -> Vec<String> {
        vec![".com".to_string(), ".org".to_string(), ".net".to_string()]
    }

    #[test]
    fn test_generator_total() {
        let gen = CandidateGenerator::new(3, 3, vec![".com".to_string()]);
        assert_eq!(gen.total(), 46_656);
    }

    #[test]
    fn test_batch_shape() {
        let mut gen = CandidateGenerator::seeded(3, 3, vec![".com".to_string()], 7);
        let batch = gen.generate_batch(10);
        assert_eq!(batch.len(), 10);
        for candidate in &batch {
            assert_eq!(candidate.name().len(), 3);
            assert!(candidate.fqdn().ends_with(".com"));
        }
    }

    #[test]
    fn test_names_within_bounds_and_alphabet() {
        let name_re = Regex::new(r"^[a-z0-9]+$").unwrap();
        let allowed = suffixes();
        let mut gen = CandidateGenerator::seeded(1, 5, allowed.clone(), 42);

        for candidate in gen.by_ref().take(2_000) {
            let len = candidate.name().len();
            assert!((1..=5).contains(&len), "length {} out of range", len);
            assert!(name_re.is_match(candidate.name()));
            assert!(allowed.iter().any(|s| s == candidate.suffix()));
        }
    }

    #[test]
    fn test_every_length_and_suffix_drawn() {
        let mut gen = CandidateGenerator::seeded(2, 4, suffixes(), 3);
        let batch = gen.generate_batch(1_000);

        for len in 2..=4 {
            assert!(batch.iter().any(|c| c.name().len() == len));
        }
        for suffix in suffixes() {
            assert!(batch.iter().any(|c| c.suffix() == suffix));
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = CandidateGenerator::seeded(3, 4, suffixes(), 99).generate_batch(20);
        let b = CandidateGenerator::seeded(3, 4, suffixes(), 99).generate_batch(20);
        assert_eq!(a, b);
    }
}
