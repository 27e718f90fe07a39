//! Types for representing branches and branch outcomes.

/// A branch outcome.
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    /// Not taken
    N = 0,
    /// Taken
    T = 1
}

impl Outcome {
    pub fn from_bool(b: bool) -> Self {
        match b {
            true => Self::T,
            false => Self::N,
        }
    }

    /// Returns 'true' if this outcome is 'taken'.
    pub fn is_taken(self) -> bool {
        matches!(self, Self::T)
    }

    /// The outcome implied by the sign of some model output.
    pub fn from_score(score: i64) -> Self {
        Self::from_bool(score >= 0)
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::T => "t",
            Self::N => "n",
        };
        write!(f, "{}", s)
    }
}

impl std::ops::Not for Outcome {
    type Output = Self;
    fn not(self) -> Self {
        match self {
            Self::N => Self::T,
            Self::T => Self::N,
        }
    }
}

impl From<bool> for Outcome {
    fn from(x: bool) -> Self { Self::from_bool(x) }
}
impl From<Outcome> for bool {
    fn from(x: Outcome) -> Self { x.is_taken() }
}

/// Representing different kinds of branch/control-flow instructions.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BranchKind {
    /// A direct conditional branch instruction.
    DirectBranch = BranchFlags::BRN_FLAG,

    /// A direct unconditional jump instruction.
    DirectJump   = BranchFlags::JMP_FLAG,

    /// An indirect unconditional jump instruction.
    IndirectJump = BranchFlags::JMP_FLAG | BranchFlags::IND_FLAG,

    /// A direct procedure call instruction.
    DirectCall   = BranchFlags::CALL_FLAG,

    /// An indirect procedure call instruction.
    IndirectCall = BranchFlags::CALL_FLAG | BranchFlags::IND_FLAG,

    /// A return instruction.
    Return       = BranchFlags::RET_FLAG | BranchFlags::IND_FLAG,
}
impl BranchKind {
    const DIRECT_BRANCH: u32 = BranchFlags::BRN_FLAG;
    const DIRECT_JUMP: u32 = BranchFlags::JMP_FLAG;
    const DIRECT_CALL: u32 = BranchFlags::CALL_FLAG;
    const INDIRECT_CALL: u32 = BranchFlags::CALL_FLAG | BranchFlags::IND_FLAG;
    const INDIRECT_JUMP: u32 = BranchFlags::JMP_FLAG | BranchFlags::IND_FLAG;
    const RETURN: u32 = BranchFlags::RET_FLAG | BranchFlags::IND_FLAG;

    /// Returns 'true' if the direction of this kind of branch must be
    /// predicted (as opposed to always being taken).
    pub fn is_conditional(&self) -> bool {
        matches!(self, Self::DirectBranch)
    }
}

/// Returned when some set of flag bits doesn't describe a [`BranchKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidBranchFlags(pub u32);

impl TryFrom<u32> for BranchKind {
    type Error = InvalidBranchFlags;
    fn try_from(x: u32) -> Result<Self, Self::Error> {
        match x & BranchFlags::KIND_MASK {
            Self::DIRECT_BRANCH => Ok(Self::DirectBranch),
            Self::DIRECT_JUMP   => Ok(Self::DirectJump),
            Self::DIRECT_CALL   => Ok(Self::DirectCall),
            Self::INDIRECT_JUMP => Ok(Self::IndirectJump),
            Self::INDIRECT_CALL => Ok(Self::IndirectCall),
            Self::RETURN        => Ok(Self::Return),
            bits => Err(InvalidBranchFlags(bits)),
        }
    }
}

/// Flag bits describing a recorded branch.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BranchFlags(pub u32);
impl BranchFlags {
    const BRN_FLAG: u32   = (1 << 0);
    const JMP_FLAG: u32   = (1 << 1);
    const CALL_FLAG: u32  = (1 << 2);
    const RET_FLAG: u32   = (1 << 3);
    const IND_FLAG: u32   = (1 << 4);
    const TAKEN_FLAG: u32 = (1 << 5);

    const KIND_MASK: u32  = 0b01_1111;

    pub fn is_brn(&self) -> bool { self.0 & Self::BRN_FLAG != 0 }
    pub fn is_jmp(&self) -> bool { self.0 & Self::JMP_FLAG != 0 }
    pub fn is_call(&self) -> bool { self.0 & Self::CALL_FLAG != 0 }
    pub fn is_ret(&self) -> bool { self.0 & Self::RET_FLAG != 0 }
    pub fn is_direct(&self) -> bool { self.0 & Self::IND_FLAG == 0 }
    pub fn is_indirect(&self) -> bool { self.0 & Self::IND_FLAG != 0 }
    pub fn is_taken(&self) -> bool { self.0 & Self::TAKEN_FLAG != 0 }

    pub fn kind(&self) -> Result<BranchKind, InvalidBranchFlags> {
        BranchKind::try_from(self.0)
    }

    pub fn new(kind: BranchKind, outcome: Outcome) -> Self {
        let tbits = if outcome.is_taken() { Self::TAKEN_FLAG } else { 0 };
        Self(kind as u32 | tbits)
    }
}

/// A record of branch execution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BranchRecord {
    /// The program counter value for this branch
    pub pc: usize,

    /// The target address evaluated for this branch
    pub tgt: usize,

    /// The kind of branch
    pub kind: BranchKind,

    /// The outcome evaluated for this branch
    pub outcome: Outcome,
}
impl BranchRecord {
    pub fn new(pc: usize, tgt: usize, kind: BranchKind, outcome: Outcome)
        -> Self
    {
        Self { pc, tgt, kind, outcome }
    }

    /// Returns 'true' if this is a conditional instruction.
    pub fn is_conditional(&self) -> bool {
        self.kind.is_conditional()
    }

    /// Returns 'true' if this is an unconditional instruction.
    pub fn is_unconditional(&self) -> bool {
        !self.kind.is_conditional()
    }

    /// The flag bits used to represent this record in a trace.
    pub fn flags(&self) -> BranchFlags {
        BranchFlags::new(self.kind, self.outcome)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags_round_trip_kind_and_outcome() {
        let flags = BranchFlags::new(BranchKind::IndirectCall, Outcome::T);
        assert!(flags.is_call() && flags.is_indirect() && flags.is_taken());
        assert_eq!(flags.kind(), Ok(BranchKind::IndirectCall));

        let flags = BranchFlags::new(BranchKind::DirectBranch, Outcome::N);
        assert!(flags.is_brn() && flags.is_direct() && !flags.is_taken());
    }

    #[test]
    fn invalid_flags_are_rejected() {
        // Branch and jump at once
        assert_eq!(BranchKind::try_from(0b11), Err(InvalidBranchFlags(0b11)));
        assert_eq!(BranchKind::try_from(0), Err(InvalidBranchFlags(0)));
    }

    #[test]
    fn outcome_conversions() {
        assert_eq!(Outcome::from(true), Outcome::T);
        assert_eq!(!Outcome::T, Outcome::N);
        assert!(bool::from(Outcome::T));
        assert_eq!(Outcome::from_score(0), Outcome::T);
        assert_eq!(Outcome::from_score(-1), Outcome::N);
    }
}
