// This module provides arena-based session management for a module
// translation using the bumpalo crate. A Session owns the arena reference and
// tracks translation-wide state with a single lifetime: interned block label
// strings shared between the block splitter and the branch resolver, and
// SessionStats counting translated functions, lowered instructions, and
// permissive elisions. One Session covers one translate() call; nothing in it
// is shared across concurrent translations.

//! Arena-based translation session management.

use bumpalo::Bump;
use std::cell::RefCell;
use std::collections::HashMap;

/// Translation statistics gathered per module.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStats {
    pub functions: usize,
    pub instructions: usize,
    /// Opcodes accepted but intentionally elided (permissive allowlist).
    pub elided: usize,
}

/// Arena-backed per-translation session.
pub struct Session<'arena> {
    arena: &'arena Bump,
    interned: RefCell<HashMap<String, &'arena str>>,
    stats: RefCell<SessionStats>,
}

impl<'arena> Session<'arena> {
    pub fn new(arena: &'arena Bump) -> Session<'arena> {
        Session {
            arena,
            interned: RefCell::new(HashMap::new()),
            stats: RefCell::new(SessionStats::default()),
        }
    }

    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Intern a block label so CFG edges can share one allocation.
    pub fn intern(&self, s: &str) -> &'arena str {
        if let Some(&hit) = self.interned.borrow().get(s) {
            return hit;
        }
        let stored = self.arena.alloc_str(s);
        self.interned.borrow_mut().insert(s.to_string(), stored);
        stored
    }

    pub fn count_function(&self) {
        self.stats.borrow_mut().functions += 1;
    }

    pub fn count_instructions(&self, n: usize) {
        self.stats.borrow_mut().instructions += n;
    }

    pub fn count_elided(&self) {
        self.stats.borrow_mut().elided += 1;
    }

    pub fn stats(&self) -> SessionStats {
        *self.stats.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let arena = Bump::new();
        let session = Session::new(&arena);
        let a = session.intern("loop");
        let b = session.intern("loop");
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn stats_accumulate() {
        let arena = Bump::new();
        let session = Session::new(&arena);
        session.count_function();
        session.count_instructions(3);
        session.count_elided();
        let s = session.stats();
        assert_eq!((s.functions, s.instructions, s.elided), (1, 3, 1));
    }
}
