//! Instruction coverage tracking
//!
//! When enabled on an interpreter, records how often each instruction
//! position ran and which way every conditional branch went.

use std::collections::BTreeMap;
use std::fmt;

/// Per-position execution counts for one program
#[derive(Debug, Clone, Default)]
pub struct CoverageTracker {
    hits: Vec<u64>,
    /// position -> (taken, not taken), conditional branches only
    branches: BTreeMap<usize, (u64, u64)>,
}

impl CoverageTracker {
    pub fn new(total_instructions: usize) -> Self {
        Self {
            hits: vec![0; total_instructions],
            branches: BTreeMap::new(),
        }
    }

    /// Grow to cover a program of `total_instructions`
    pub fn ensure_len(&mut self, total_instructions: usize) {
        if self.hits.len() < total_instructions {
            self.hits.resize(total_instructions, 0);
        }
    }

    #[inline]
    pub fn mark_executed(&mut self, pc: usize) {
        if let Some(count) = self.hits.get_mut(pc) {
            *count += 1;
        }
    }

    #[inline]
    pub fn mark_branch(&mut self, pc: usize, taken: bool) {
        let outcome = self.branches.entry(pc).or_insert((0, 0));
        if taken {
            outcome.0 += 1;
        } else {
            outcome.1 += 1;
        }
    }

    pub fn hits(&self, pc: usize) -> u64 {
        self.hits.get(pc).copied().unwrap_or(0)
    }

    pub fn executed_count(&self) -> usize {
        self.hits.iter().filter(|&&n| n > 0).count()
    }

    pub fn instruction_coverage(&self) -> f64 {
        if self.hits.is_empty() {
            return 100.0;
        }
        self.executed_count() as f64 / self.hits.len() as f64 * 100.0
    }

    /// Share of conditional branch outcomes (taken / not taken) observed
    pub fn branch_coverage(&self) -> f64 {
        if self.branches.is_empty() {
            return 100.0;
        }
        let covered: usize = self
            .branches
            .values()
            .map(|&(taken, not_taken)| (taken > 0) as usize + (not_taken > 0) as usize)
            .sum();
        covered as f64 / (self.branches.len() * 2) as f64 * 100.0
    }

    pub fn uncovered(&self) -> Vec<usize> {
        self.hits
            .iter()
            .enumerate()
            .filter(|&(_, &n)| n == 0)
            .map(|(pc, _)| pc)
            .collect()
    }

    /// Most executed positions, busiest first
    pub fn hot_paths(&self, top_n: usize) -> Vec<(usize, u64)> {
        let mut counts: Vec<_> = self
            .hits
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, n)| n > 0)
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts.truncate(top_n);
        counts
    }

    pub fn report(&self) -> CoverageReport {
        CoverageReport {
            total_instructions: self.hits.len(),
            executed_instructions: self.executed_count(),
            instruction_coverage: self.instruction_coverage(),
            branch_coverage: self.branch_coverage(),
            uncovered: self.uncovered(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoverageReport {
    pub total_instructions: usize,
    pub executed_instructions: usize,
    pub instruction_coverage: f64,
    pub branch_coverage: f64,
    pub uncovered: Vec<usize>,
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Coverage Report")?;
        writeln!(f, "===============")?;
        writeln!(
            f,
            "Instructions: {}/{} ({:.1}%)",
            self.executed_instructions, self.total_instructions, self.instruction_coverage
        )?;
        writeln!(f, "Branches: {:.1}%", self.branch_coverage)?;

        match self.uncovered.len() {
            0 => {}
            n if n <= 10 => writeln!(f, "Never executed: {:?}", self.uncovered)?,
            n => writeln!(
                f,
                "Never executed: {} positions (first 10: {:?})",
                n,
                &self.uncovered[..10]
            )?,
        }
        Ok(())
    }
}
