//! Constraint-alias assignment for Σ-edge checked places.

use ahash::AHashSet;

/// Assigns short alias symbols (`a, b, …, z, a1, b1, …`) to Σ-constraint
/// strings. Single-letter constraints are assigned their own lowercased
/// form directly when free; collisions, and every multi-character
/// constraint, draw from the sequential pool.
pub struct AliasPool {
    used: AHashSet<String>,
    next: usize,
}

impl AliasPool {
    pub fn new() -> Self {
        Self { used: AHashSet::new(), next: 0 }
    }

    fn next_fresh(&mut self) -> String {
        loop {
            let letter = (b'a' + (self.next % 26) as u8) as char;
            let cycle = self.next / 26;
            let candidate = if cycle == 0 { letter.to_string() } else { format!("{letter}{cycle}") };
            self.next += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn assign(&mut self, constraint: &str) -> String {
        if constraint.chars().count() == 1 {
            let lower = constraint.to_lowercase();
            if self.used.insert(lower.clone()) {
                return lower;
            }
        }
        self.next_fresh()
    }
}

impl Default for AliasPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the alias map for an ordered, deduplicated list of Σ-constraint
/// strings: single-character constraints sorted alphabetically first, then
/// multi-character constraints in their first-seen (input) order.
pub fn build_alias_map(mut singles: Vec<String>, multis: Vec<String>) -> ahash::AHashMap<String, String> {
    singles.sort();
    let mut pool = AliasPool::new();
    let mut map = ahash::AHashMap::new();
    for c in singles.into_iter().chain(multis) {
        let alias = pool.assign(&c);
        map.insert(c, alias);
    }
    map
}
