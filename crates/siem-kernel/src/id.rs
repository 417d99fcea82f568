use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const ID_LEN: usize = 12;

/// Produces short, URL-safe backlog IDs from a seeded generator.
///
/// Seeding at construction rather than reading system entropy per call keeps
/// a single process's ID stream deterministic and replayable; cross-process
/// uniqueness is not a goal (see `SPEC_FULL.md` §4.A).
pub struct IdGenerator {
    rng: StdRng,
}

impl IdGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeds from the current time, for callers that don't need a
    /// reproducible stream (production `Engine::init`).
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn next_id(&mut self) -> String {
        (0..ID_LEN)
            .map(|_| ALPHABET[self.rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}
