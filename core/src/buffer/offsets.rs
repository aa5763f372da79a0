//! Memoized prefix sums of step sizes.

use core::cell::Cell;

use crate::step::Step;
use crate::{Rc, Vec};

/// `prefix[i]` is the byte length of steps `0..i`.
///
/// The cache only ever grows by extending from its last entry. Structural
/// edits clear it directly; opcode updates raise the shared `dirty` flag and
/// the next query clears it.
#[derive(Debug, Default)]
pub(crate) struct OffsetCache {
    prefix: Vec<usize>,
    dirty: Rc<Cell<bool>>,
}

impl OffsetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The flag handed to opcode-update handles.
    pub fn dirty_flag(&self) -> Rc<Cell<bool>> {
        self.dirty.clone()
    }

    pub fn invalidate(&mut self) {
        self.prefix.clear();
        self.dirty.set(false);
    }

    /// Byte length of `steps[..end]`. `end` must be at most `steps.len()`.
    pub fn length_to(&mut self, end: usize, steps: &[Step]) -> usize {
        debug_assert!(end <= steps.len());
        if end == 0 {
            return 0;
        }
        if self.dirty.get() {
            tracing::trace!(cached = self.prefix.len(), "offset cache dirty, recomputing");
            self.invalidate();
        }
        if self.prefix.is_empty() {
            self.prefix.push(0);
        }
        while self.prefix.len() <= end {
            let i = self.prefix.len() - 1;
            let next = self.prefix[i] + steps[i].size();
            self.prefix.push(next);
        }
        self.prefix[end]
    }

    /// Number of cached prefixes, including the leading zero.
    #[cfg(test)]
    pub fn cached(&self) -> usize {
        self.prefix.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::OpCode;

    fn steps() -> Vec<Step> {
        vec![
            Step::op(OpCode::Nop),
            Step::i32(OpCode::LdcI4, 1),
            Step::op(OpCode::Ldloc),
            Step::op(OpCode::Ret),
        ]
    }

    #[test]
    fn test_zero_end_computes_nothing() {
        let mut cache = OffsetCache::new();
        assert_eq!(cache.length_to(0, &steps()), 0);
        assert_eq!(cache.cached(), 0);
    }

    #[test]
    fn test_extends_from_last_prefix() {
        let steps = steps();
        let mut cache = OffsetCache::new();

        assert_eq!(cache.length_to(2, &steps), 6);
        assert_eq!(cache.cached(), 3);

        // A smaller query is answered from the cache.
        assert_eq!(cache.length_to(1, &steps), 1);
        assert_eq!(cache.cached(), 3);

        assert_eq!(cache.length_to(4, &steps), 6 + 4 + 1);
        assert_eq!(cache.cached(), 5);
    }

    #[test]
    fn test_dirty_flag_clears_on_next_query() {
        let steps = steps();
        let mut cache = OffsetCache::new();
        cache.length_to(4, &steps);

        cache.dirty_flag().set(true);
        assert_eq!(cache.length_to(1, &steps), 1);
        assert_eq!(cache.cached(), 2);
        assert!(!cache.dirty_flag().get());
    }
}
