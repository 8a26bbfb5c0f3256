//! Deterministic identifiers for elements that have none.

use std::collections::HashSet;

/// Issues identifiers derived from a seed, never repeating one that is
/// already used in the book.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: u64,
    taken: HashSet<String>,
}

impl IdGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            taken: HashSet::new(),
        }
    }

    /// Mark identifiers found in the files as unavailable
    pub fn reserve<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.taken.extend(ids.into_iter().map(Into::into));
    }

    /// Identifier for the `ordinal`-th element of `file`.
    ///
    /// The same seed, file and ordinal give the same identifier unless it
    /// collides with one already taken.
    pub fn generate(&mut self, file: &str, ordinal: usize) -> String {
        let mut attempt: u64 = 0;
        loop {
            let mut hasher = blake3::Hasher::new();
            hasher.update(&self.seed.to_le_bytes());
            hasher.update(file.as_bytes());
            hasher.update(&(ordinal as u64).to_le_bytes());
            hasher.update(&attempt.to_le_bytes());
            let hash = hasher.finalize();

            let mut word = [0u8; 4];
            word.copy_from_slice(&hash.as_bytes()[..4]);
            let candidate = (u32::from_le_bytes(word) & 0x7fff_ffff).to_string();
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            attempt += 1;
        }
    }
}
