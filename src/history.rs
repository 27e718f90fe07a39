
use bitvec::prelude::*;
use std::ops::Range;

use crate::Outcome;

/// A fixed-capacity circular record of branch outcomes.
///
/// Logical position `i` is the slot that the cursor will overwrite after `i`
/// more pushes: position 0 is the oldest outcome still retained, and
/// position `len() - 1` is the newest. Since exactly one bit is pushed per
/// branch, some index always refers to the same *relative* age of an
/// outcome, which is what lets a perceptron weight stay attached to it.
///
/// Copying a register (see [`HistoryRegister::snapshot`]) is how the state
/// of speculative history is checkpointed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HistoryRegister {
    data: BitVec<usize, Lsb0>,
    cursor: usize,
}

// NOTE: Bits are printed from the oldest (leftmost) to the newest (rightmost).
impl std::fmt::Display for HistoryRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let x: String = self.iter()
            .map(|o| if o.is_taken() { '1' } else { '0' })
            .collect();
        write!(f, "{}", x)
    }
}

impl HistoryRegister {
    /// Create a register with the specified length in bits.
    /// All bits in the register are initialized to zero (not-taken).
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "history register must hold at least one bit");
        Self {
            data: bitvec![usize, Lsb0; 0; len],
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize { self.data.len() }

    /// Map a logical position onto a physical bit.
    fn slot(&self, idx: usize) -> usize {
        (idx + self.cursor) % self.len()
    }

    /// Read the outcome at logical position 'idx'.
    pub fn get(&self, idx: usize) -> Outcome {
        assert!(idx < self.len());
        Outcome::from_bool(self.data[self.slot(idx)])
    }

    /// Overwrite the oldest outcome with a new one.
    pub fn push(&mut self, outcome: Outcome) {
        let cursor = self.cursor;
        self.data.set(cursor, outcome.is_taken());
        self.cursor = (cursor + 1) % self.len();
    }

    /// Iterate over all outcomes, from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = Outcome> + '_ {
        (0..self.len()).map(move |idx| self.get(idx))
    }

    /// Return a copy of the whole register.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Replace the state of this register with some earlier snapshot.
    pub fn restore(&mut self, snapshot: &Self) {
        assert_eq!(self.len(), snapshot.len(),
            "snapshot capacity doesn't match this register");
        self.data.copy_from_bitslice(&snapshot.data);
        self.cursor = snapshot.cursor;
    }

    /// Build a new register from a contiguous range of logical positions.
    /// Position 'j' in the result is position 'range.start + j' here.
    pub fn window(&self, range: Range<usize>) -> Self {
        assert!(range.start < range.end && range.end <= self.len(),
            "invalid history window {:?} (length {})", range, self.len());
        let data: BitVec<usize, Lsb0> = range
            .map(|idx| self.get(idx).is_taken())
            .collect();
        Self { data, cursor: 0 }
    }
}
