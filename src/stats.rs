//! Helpers for collecting statistics.

use std::collections::*;
use crate::branch::*;
use bitvec::prelude::*;
use itertools::*;

/// Container for recording simple statistics while evaluating some model.
pub struct BranchStats {
    /// Per-branch statistics (indexed by program counter value).
    pub data: BTreeMap<usize, BranchData>,

    /// Number of correct predictions
    pub global_hits: usize,

    /// Number of times any branch instruction was executed
    pub global_brns: usize,
}
impl BranchStats {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
            global_hits: 0,
            global_brns: 0,
        }
    }

    /// Return the global hit rate.
    pub fn hit_rate(&self) -> f64 {
        self.global_hits as f64 / self.global_brns as f64
    }

    /// Return the global hit count.
    pub fn global_hits(&self) -> usize { self.global_hits }

    /// Return the global miss count.
    pub fn global_miss(&self) -> usize { self.global_brns - self.global_hits }

    /// Return the total branch count.
    pub fn global_brns(&self) -> usize { self.global_brns }

    /// Record a prediction for some branch.
    pub fn update(&mut self, record: &BranchRecord, prediction: Outcome) {
        let hit = prediction == record.outcome;
        self.global_brns += 1;
        if hit { self.global_hits += 1; }

        let data = self.get_mut(record.pc);
        data.occ += 1;
        data.pat.push(record.outcome.into());
        if hit { data.hits += 1; }
    }

    /// Returns a reference to data collected for a particular branch.
    pub fn get(&self, pc: usize) -> Option<&BranchData> {
        self.data.get(&pc)
    }

    /// Returns a mutable reference to data collected for a particular branch.
    /// Creates a new entry if one doesn't already exist.
    pub fn get_mut(&mut self, pc: usize) -> &mut BranchData {
        self.data.entry(pc).or_insert_with(BranchData::new)
    }

    /// Returns the number of unique observed branch instructions.
    pub fn num_unique_branches(&self) -> usize {
        self.data.len()
    }

    /// Returns the number of branches that are always taken
    pub fn num_always_taken(&self) -> usize {
        self.data.values().filter(|entry| entry.is_always_taken()).count()
    }

    /// Returns the number of branches that are never taken
    pub fn num_never_taken(&self) -> usize {
        self.data.values().filter(|entry| entry.is_never_taken()).count()
    }

    /// Returns the 'n' most frequently executed branches.
    pub fn get_common_branches(&self, n: usize) -> Vec<(usize, &BranchData)> {
        self.data.iter()
            .sorted_by_key(|(_, s)| s.occ)
            .rev()
            .take(n)
            .map(|(pc, s)| (*pc, s))
            .collect()
    }

    /// Returns the 'n' most frequently executed branches that were executed
    /// at least 'min_occ' times and predicted with a hit rate at or below
    /// 'max_rate'.
    pub fn get_low_rate_branches(&self, n: usize, min_occ: usize, max_rate: f64)
        -> Vec<(usize, &BranchData)>
    {
        self.data.iter()
            .filter(|(_, s)| s.occ >= min_occ && s.hit_rate() <= max_rate)
            .sorted_by_key(|(_, s)| s.occ)
            .rev()
            .take(n)
            .map(|(pc, s)| (*pc, s))
            .collect()
    }
}

/// Container for per-branch statistics.
pub struct BranchData {
    /// Number of times this branch was encountered.
    pub occ: usize,

    /// Number of correct predictions for this branch.
    pub hits: usize,

    /// Record of all observed outcomes for this branch.
    pub pat: BitVec,
}
impl BranchData {
    pub fn new() -> Self {
        Self {
            occ: 0,
            hits: 0,
            pat: BitVec::new(),
        }
    }

    /// Return the hit rate for this branch.
    pub fn hit_rate(&self) -> f64 {
        self.hits as f64 / self.occ as f64
    }

    pub fn is_always_taken(&self) -> bool {
        self.pat.count_ones() == self.pat.len()
    }

    pub fn is_never_taken(&self) -> bool {
        self.pat.count_zeros() == self.pat.len()
    }

    pub fn times_taken(&self) -> usize {
        self.pat.count_ones()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn per_branch_rates() {
        let mut stats = BranchStats::new();
        let a = BranchRecord::new(0x10, 0x20, BranchKind::DirectBranch, Outcome::T);
        let b = BranchRecord::new(0x30, 0x40, BranchKind::DirectBranch, Outcome::N);
        for _ in 0..4 {
            stats.update(&a, Outcome::T);
        }
        stats.update(&b, Outcome::T);
        stats.update(&b, Outcome::N);

        assert_eq!(stats.global_brns(), 6);
        assert_eq!(stats.global_miss(), 1);
        assert_eq!(stats.num_unique_branches(), 2);
        assert_eq!(stats.num_always_taken(), 1);
        assert_eq!(stats.num_never_taken(), 1);
        assert_eq!(stats.get(0x30).unwrap().hit_rate(), 0.5);
        assert_eq!(stats.get(0x10).unwrap().times_taken(), 4);

        let common: Vec<usize> = stats.get_common_branches(1).iter()
            .map(|(pc, _)| *pc).collect();
        assert_eq!(common, vec![0x10]);
        let low: Vec<usize> = stats.get_low_rate_branches(8, 2, 0.55).iter()
            .map(|(pc, _)| *pc).collect();
        assert_eq!(low, vec![0x30]);
    }
}
