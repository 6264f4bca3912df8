//! Register file and condition flags

use crate::ir::{BranchCond, CmpMode, Register, NUM_REGISTERS};
use std::cmp::Ordering;
use std::fmt;

/// Comparison flags.
///
/// Holds the outcome of the last comparison, so at most one of
/// greater/equal/less is ever set. Before the first comparison all three
/// read false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    last: Option<Ordering>,
}

impl Flags {
    /// Compare `lhs` against `rhs` and latch the outcome.
    pub fn compare(&mut self, lhs: i64, rhs: i64, mode: CmpMode) {
        let ordering = match mode {
            CmpMode::Signed => lhs.cmp(&rhs),
            CmpMode::Unsigned => (lhs as u64).cmp(&(rhs as u64)),
        };
        self.last = Some(ordering);
    }

    pub fn greater(&self) -> bool {
        self.last == Some(Ordering::Greater)
    }

    pub fn equal(&self) -> bool {
        self.last == Some(Ordering::Equal)
    }

    pub fn less(&self) -> bool {
        self.last == Some(Ordering::Less)
    }

    /// Evaluate a branch condition against the current flags
    pub fn holds(&self, cond: BranchCond) -> bool {
        let (gt, eq, lt) = (self.greater(), self.equal(), self.less());
        match cond {
            BranchCond::Always => true,
            BranchCond::Eq => eq && !gt && !lt,
            BranchCond::Gt => gt && !eq,
            BranchCond::Ge => gt || eq,
            BranchCond::Lt => lt && !eq,
            BranchCond::Le => lt || eq,
            BranchCond::Ne => !eq,
        }
    }
}

/// The 32 general purpose registers plus the comparison and error flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    values: [i64; NUM_REGISTERS],
    pub flags: Flags,
    /// Set once an instruction fails; the run stops
    pub error: bool,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            values: [0; NUM_REGISTERS],
            flags: Flags::default(),
            error: false,
        }
    }

    #[inline]
    pub fn get(&self, reg: Register) -> i64 {
        debug_assert!(reg.index() < NUM_REGISTERS);
        self.values[reg.index()]
    }

    #[inline]
    pub fn set(&mut self, reg: Register, value: i64) {
        debug_assert!(reg.index() < NUM_REGISTERS);
        self.values[reg.index()] = value;
    }

    pub fn values(&self) -> &[i64; NUM_REGISTERS] {
        &self.values
    }

    /// Copy of all register values, for a call frame
    pub fn snapshot(&self) -> [i64; NUM_REGISTERS] {
        self.values
    }

    /// Restore every register except `x0` from a snapshot.
    pub fn restore_preserving_x0(&mut self, snapshot: &[i64; NUM_REGISTERS]) {
        self.values[1..].copy_from_slice(&snapshot[1..]);
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Diagnostic dump: error flag, comparison flags, then every register,
/// eight to a row.
impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", self.error as u8)?;
        writeln!(f, "Flags:")?;
        writeln!(f, "Is greater: {}", self.flags.greater() as u8)?;
        writeln!(f, "Is equal: {}", self.flags.equal() as u8)?;
        writeln!(f, "Is less: {}", self.flags.less() as u8)?;
        writeln!(f)?;
        writeln!(f, "Variable values:")?;
        for (i, value) in self.values.iter().enumerate() {
            write!(f, "x{}: {}", i, value)?;
            if i + 1 < NUM_REGISTERS {
                write!(f, ", ")?;
            }
            if (i + 1) % 8 == 0 {
                writeln!(f)?;
            }
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CONDS: [BranchCond; 7] = [
        BranchCond::Always,
        BranchCond::Eq,
        BranchCond::Ne,
        BranchCond::Gt,
        BranchCond::Ge,
        BranchCond::Lt,
        BranchCond::Le,
    ];

    fn exactly_one(flags: &Flags) -> bool {
        [flags.greater(), flags.equal(), flags.less()]
            .iter()
            .filter(|&&f| f)
            .count()
            == 1
    }

    #[test]
    fn test_flags_start_clear() {
        let flags = Flags::default();
        assert!(!flags.greater() && !flags.equal() && !flags.less());
        // Only the conditions that don't need a set flag hold
        let taken: Vec<_> = ALL_CONDS.iter().filter(|c| flags.holds(**c)).collect();
        assert_eq!(taken, vec![&BranchCond::Always, &BranchCond::Ne]);
    }

    #[test]
    fn test_flags_mutually_exclusive() {
        let values = [i64::MIN, -1, 0, 1, 7, i64::MAX];
        let mut flags = Flags::default();
        for &a in &values {
            for &b in &values {
                for mode in [CmpMode::Signed, CmpMode::Unsigned] {
                    flags.compare(a, b, mode);
                    assert!(exactly_one(&flags), "{} vs {} ({:?})", a, b, mode);
                }
            }
        }
    }

    #[test]
    fn test_signed_vs_unsigned() {
        let mut flags = Flags::default();
        flags.compare(-1, 5, CmpMode::Signed);
        assert!(flags.less());
        flags.compare(-1, 5, CmpMode::Unsigned);
        assert!(flags.greater());
    }

    #[test]
    fn test_branch_truth_table() {
        let mut flags = Flags::default();

        flags.compare(1, 1, CmpMode::Signed);
        for (cond, expected) in ALL_CONDS.iter().zip([true, true, false, false, true, false, true]) {
            assert_eq!(flags.holds(*cond), expected, "equal: {:?}", cond);
        }

        flags.compare(2, 1, CmpMode::Signed);
        for (cond, expected) in ALL_CONDS.iter().zip([true, false, true, true, true, false, false]) {
            assert_eq!(flags.holds(*cond), expected, "greater: {:?}", cond);
        }

        flags.compare(0, 1, CmpMode::Signed);
        for (cond, expected) in ALL_CONDS.iter().zip([true, false, true, false, false, true, true]) {
            assert_eq!(flags.holds(*cond), expected, "less: {:?}", cond);
        }
    }

    #[test]
    fn test_restore_keeps_x0() {
        let mut regs = RegisterFile::new();
        for i in 0..NUM_REGISTERS as u8 {
            regs.set(Register::new(i).unwrap(), i as i64);
        }
        let saved = regs.snapshot();
        for i in 0..NUM_REGISTERS as u8 {
            regs.set(Register::new(i).unwrap(), -1);
        }
        regs.restore_preserving_x0(&saved);
        assert_eq!(regs.get(Register::X0), -1);
        assert_eq!(regs.values()[1..], saved[1..]);
    }

    #[test]
    fn test_dump_layout() {
        let mut regs = RegisterFile::new();
        regs.set(Register::new(3).unwrap(), -7);
        regs.flags.compare(1, 2, CmpMode::Signed);
        let dump = regs.to_string();
        let lines: Vec<&str> = dump.lines().collect();

        assert_eq!(lines[0], "Error: 0");
        assert_eq!(lines[1], "Flags:");
        assert_eq!(lines[2], "Is greater: 0");
        assert_eq!(lines[3], "Is equal: 0");
        assert_eq!(lines[4], "Is less: 1");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "Variable values:");
        assert_eq!(
            lines[7],
            "x0: 0, x1: 0, x2: 0, x3: -7, x4: 0, x5: 0, x6: 0, x7: 0, "
        );
        assert_eq!(
            lines[10],
            "x24: 0, x25: 0, x26: 0, x27: 0, x28: 0, x29: 0, x30: 0, x31: 0"
        );
        assert!(dump.ends_with("x31: 0\n\n"));
    }
}
