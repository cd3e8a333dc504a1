//! Id generation as an injectable capability.
//!
//! Production code uses [`UlidIds`]; tests use [`SequentialIds`] so that
//! generated ids are reproducible.

use ulid::Ulid;

/// A source of fresh, collision-resistant identifiers.
pub trait IdSource {
    /// Produce a new id carrying `prefix` (e.g. `h`, `p`, `ns`).
    fn next_id(&mut self, prefix: &str) -> String;
}

/// ULID-backed ids: lexicographically sortable timestamp plus randomness.
#[derive(Clone, Copy, Debug, Default)]
pub struct UlidIds;

impl IdSource for UlidIds {
    fn next_id(&mut self, prefix: &str) -> String {
        format!("{}_{}", prefix, Ulid::new().to_string().to_lowercase())
    }
}

/// Deterministic monotonic ids (`prefix_1`, `prefix_2`, ...).
#[derive(Clone, Debug, Default)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting after `last`.
    pub fn starting_after(last: u64) -> Self {
        Self { next: last }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next += 1;
        format!("{}_{}", prefix, self.next)
    }
}

impl<T: IdSource + ?Sized> IdSource for &mut T {
    fn next_id(&mut self, prefix: &str) -> String {
        (**self).next_id(prefix)
    }
}
