//! Session-scoped id allocation for groups and items.

use std::collections::HashSet;

/// Prefix used for search group ids.
pub const GROUP_PREFIX: &str = "groups";
/// Prefix used for search item ids.
pub const ITEM_PREFIX: &str = "items";

const SUFFIX_LEN: usize = 9;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Hands out `<prefix>_<suffix>` ids that are unique for the lifetime of one
/// cohort edit session.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    in_use: HashSet<String>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh id, re-drawing the suffix until it is unused.
    pub fn generate(&mut self, prefix: &str) -> String {
        loop {
            let id = format!("{prefix}_{}", random_suffix());
            if self.in_use.insert(id.clone()) {
                return id;
            }
        }
    }

    /// Mark an externally supplied id (e.g. from a loaded definition) as taken.
    ///
    /// Returns `false` if it was already in use.
    pub fn reserve(&mut self, id: impl Into<String>) -> bool {
        self.in_use.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.in_use.contains(id)
    }

    pub fn len(&self) -> usize {
        self.in_use.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_use.is_empty()
    }

    /// Forget every id, used when a different cohort is loaded.
    pub fn clear(&mut self) {
        self.in_use.clear();
    }
}

fn random_suffix() -> String {
    let mut n = uuid::Uuid::new_v4().as_u128();
    let mut out = String::with_capacity(SUFFIX_LEN);
    for _ in 0..SUFFIX_LEN {
        out.push(ALPHABET[(n % 36) as usize] as char);
        n /= 36;
    }
    out
}
