//! Session id sources.

use rand::Rng;

/// Draws candidate session ids.
pub trait IdGenerator: Send + Sync {
    /// Next candidate id.
    fn next_id(&self) -> u64;
}

/// Uniformly random ids over the full `u64` range.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> u64 {
        rand::rng().random()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_ids_vary() {
        let ids: HashSet<u64> = (0..64).map(|_| RandomIds.next_id()).collect();
        assert!(ids.len() > 60);
    }
}
