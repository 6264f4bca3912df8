//! Program representation for Armlite
//!
//! A program is a forward-only sequence of instructions addressed by
//! position. Execution starts at position 0, the successor of position `i`
//! is `i + 1`, and running past the last instruction ends the run.
//!
//! ```text
//! ┌───────────────┐   ┌───────────────┐        ┌───────────────┐
//! │ 0: mov x1, 5  │ → │ 1: cmp x1, 0  │ → .. → │ n-1: ret      │ → end
//! └───────────────┘   └───────────────┘        └───────────────┘
//!          ▲                    │ beq done
//!          │                    ▼
//!     LabelTable: "done" → position
//! ```

use crate::ir::labels::{LabelError, LabelTable};
use std::fmt;

/// Number of general purpose registers (`x0`..`x31`).
pub const NUM_REGISTERS: usize = 32;

/// Register identifier, always in `0..NUM_REGISTERS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(u8);

impl Register {
    /// The result register. It survives `ret`.
    pub const X0: Register = Register(0);

    pub fn new(index: u8) -> Option<Self> {
        if (index as usize) < NUM_REGISTERS {
            Some(Self(index))
        } else {
            None
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A value operand: either a register read or an immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Register),
    Imm(i64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{}", reg),
            Operand::Imm(imm) => write!(f, "{}", imm),
        }
    }
}

/// Register-writing arithmetic, bitwise and shift operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Eor,
    Orr,
    Asr, // Arithmetic shift right
    Lsl,
    Lsr, // Logical shift right
}

impl AluOp {
    pub fn opcode(self) -> Opcode {
        match self {
            AluOp::Add => Opcode::Add,
            AluOp::Sub => Opcode::Sub,
            AluOp::And => Opcode::And,
            AluOp::Eor => Opcode::Eor,
            AluOp::Orr => Opcode::Orr,
            AluOp::Asr => Opcode::Asr,
            AluOp::Lsl => Opcode::Lsl,
            AluOp::Lsr => Opcode::Lsr,
        }
    }
}

/// Numeric interpretation used by a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpMode {
    Signed,
    Unsigned,
}

/// Branch conditions, evaluated against the comparison flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCond {
    Always,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl BranchCond {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            BranchCond::Always => "b",
            BranchCond::Eq => "beq",
            BranchCond::Ne => "bne",
            BranchCond::Gt => "bgt",
            BranchCond::Ge => "bge",
            BranchCond::Lt => "blt",
            BranchCond::Le => "ble",
        }
    }
}

/// Rendering selected by the second operand of `print`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintBase {
    /// Signed decimal
    Decimal,
    /// `0x` followed by lowercase unsigned hex
    Hex,
    /// `0b` followed by unsigned binary without leading zeros
    Binary,
    /// The value is an address; print the NUL-terminated bytes found there
    Str,
}

impl PrintBase {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'd' => Some(PrintBase::Decimal),
            'x' => Some(PrintBase::Hex),
            'b' => Some(PrintBase::Binary),
            's' => Some(PrintBase::Str),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            PrintBase::Decimal => 'd',
            PrintBase::Hex => 'x',
            PrintBase::Binary => 'b',
            PrintBase::Str => 's',
        }
    }
}

/// Opcode set (closed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Mov,
    Add,
    Sub,
    Cmp,
    CmpU,
    And,
    Eor,
    Orr,
    Asr,
    Lsl,
    Lsr,
    Store,
    Load,
    Put,
    Print,
    Branch,
    Call,
    Ret,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Cmp => "cmp",
            Opcode::CmpU => "cmp_u",
            Opcode::And => "and",
            Opcode::Eor => "eor",
            Opcode::Orr => "orr",
            Opcode::Asr => "asr",
            Opcode::Lsl => "lsl",
            Opcode::Lsr => "lsr",
            Opcode::Store => "store",
            Opcode::Load => "load",
            Opcode::Put => "put",
            Opcode::Print => "print",
            Opcode::Branch => "b",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
        }
    }

    /// Resolve a mnemonic. Branch mnemonics also yield their condition.
    pub fn from_mnemonic(mnemonic: &str) -> Option<(Opcode, BranchCond)> {
        let plain = |op| Some((op, BranchCond::Always));
        match mnemonic {
            "mov" => plain(Opcode::Mov),
            "add" => plain(Opcode::Add),
            "sub" => plain(Opcode::Sub),
            "cmp" => plain(Opcode::Cmp),
            "cmp_u" | "cmpu" => plain(Opcode::CmpU),
            "and" => plain(Opcode::And),
            "eor" => plain(Opcode::Eor),
            "orr" => plain(Opcode::Orr),
            "asr" => plain(Opcode::Asr),
            "lsl" => plain(Opcode::Lsl),
            "lsr" => plain(Opcode::Lsr),
            "store" | "str" => plain(Opcode::Store),
            "load" | "ldr" => plain(Opcode::Load),
            "put" => plain(Opcode::Put),
            "print" => plain(Opcode::Print),
            "call" => plain(Opcode::Call),
            "ret" => plain(Opcode::Ret),
            "b" => plain(Opcode::Branch),
            "beq" | "b.eq" => Some((Opcode::Branch, BranchCond::Eq)),
            "bne" | "b.ne" => Some((Opcode::Branch, BranchCond::Ne)),
            "bgt" | "b.gt" => Some((Opcode::Branch, BranchCond::Gt)),
            "bge" | "b.ge" => Some((Opcode::Branch, BranchCond::Ge)),
            "blt" | "b.lt" => Some((Opcode::Branch, BranchCond::Lt)),
            "ble" | "b.le" => Some((Opcode::Branch, BranchCond::Le)),
            _ => None,
        }
    }
}

/// Decoded instruction. Each variant carries exactly the operands its
/// opcode uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `mov rd, imm`
    Mov { rd: Register, imm: i64 },
    /// `op rd, rn, rm`
    Alu {
        op: AluOp,
        rd: Register,
        rn: Register,
        rm: Operand,
    },
    /// `cmp rn, rm` / `cmp_u rn, rm`
    Cmp {
        mode: CmpMode,
        rn: Register,
        rm: Operand,
    },
    /// `store rs, addr, count`: low `count` bytes of `rs` go to memory
    Store {
        rs: Register,
        addr: Operand,
        count: u8,
    },
    /// `load rd, count, addr`
    Load {
        rd: Register,
        count: u8,
        addr: Operand,
    },
    /// `put "text", addr`: writes the text plus a NUL terminator
    Put { text: String, addr: Operand },
    /// `print value, base`
    Print { value: Operand, base: PrintBase },
    /// `b label` and the conditional forms
    Branch { cond: BranchCond, label: String },
    /// `call label`
    Call { label: String },
    /// `ret`
    Ret,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Mov { .. } => Opcode::Mov,
            Instruction::Alu { op, .. } => op.opcode(),
            Instruction::Cmp {
                mode: CmpMode::Signed,
                ..
            } => Opcode::Cmp,
            Instruction::Cmp {
                mode: CmpMode::Unsigned,
                ..
            } => Opcode::CmpU,
            Instruction::Store { .. } => Opcode::Store,
            Instruction::Load { .. } => Opcode::Load,
            Instruction::Put { .. } => Opcode::Put,
            Instruction::Print { .. } => Opcode::Print,
            Instruction::Branch { .. } => Opcode::Branch,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::Ret => Opcode::Ret,
        }
    }

    /// Label referenced by a branch or call
    pub fn target_label(&self) -> Option<&str> {
        match self {
            Instruction::Branch { label, .. } | Instruction::Call { label } => Some(label),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Mov { rd, imm } => write!(f, "mov {}, {}", rd, imm),
            Instruction::Alu { op, rd, rn, rm } => {
                write!(f, "{} {}, {}, {}", op.opcode().mnemonic(), rd, rn, rm)
            }
            Instruction::Cmp { rn, rm, .. } => {
                write!(f, "{} {}, {}", self.opcode().mnemonic(), rn, rm)
            }
            Instruction::Store { rs, addr, count } => {
                write!(f, "store {}, {}, {}", rs, addr, count)
            }
            Instruction::Load { rd, count, addr } => {
                write!(f, "load {}, {}, {}", rd, count, addr)
            }
            Instruction::Put { text, addr } => {
                write!(f, "put \"{}\", {}", escape(text), addr)
            }
            Instruction::Print { value, base } => {
                write!(f, "print {}, {}", value, base.as_char())
            }
            Instruction::Branch { cond, label } => write!(f, "{} {}", cond.mnemonic(), label),
            Instruction::Call { label } => write!(f, "call {}", label),
            Instruction::Ret => write!(f, "ret"),
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

/// Program representation
///
/// Owns the instruction sequence and the label table. Both can only be
/// changed through `&mut Program`, so they stay fixed while an
/// interpreter borrows the program for a run.
#[derive(Debug, Clone)]
pub struct Program {
    instructions: Vec<Instruction>,
    /// 1-based source line of each instruction (0 when built by hand)
    lines: Vec<usize>,
    labels: LabelTable,
}

impl Program {
    pub fn new() -> Self {
        Self::with_label_buckets(crate::ir::labels::DEFAULT_BUCKETS)
    }

    pub fn with_label_buckets(buckets: usize) -> Self {
        Self {
            instructions: Vec::new(),
            lines: Vec::new(),
            labels: LabelTable::with_buckets(buckets),
        }
    }

    /// Create a program from a list of instructions (no labels)
    pub fn from_instructions(instructions: Vec<Instruction>) -> Self {
        let mut program = Self::new();
        for instr in instructions {
            program.push(instr, 0);
        }
        program
    }

    /// Append an instruction; returns its position
    pub fn push(&mut self, instr: Instruction, line: usize) -> usize {
        self.instructions.push(instr);
        self.lines.push(line);
        self.instructions.len() - 1
    }

    /// Bind `name` to the position of the next instruction pushed.
    pub fn define_label(&mut self, name: impl Into<String>) -> Result<(), LabelError> {
        let target = self.instructions.len();
        self.labels.put(name, target)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    #[inline]
    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Source line of the instruction at `pc`, if known
    pub fn line_of(&self, pc: usize) -> Option<usize> {
        self.lines.get(pc).copied().filter(|&line| line > 0)
    }

    /// Branch/call targets that no label declaration satisfies, in program
    /// order without repeats.
    pub fn undefined_labels(&self) -> Vec<&str> {
        let mut missing: Vec<&str> = Vec::new();
        for label in self.instructions.iter().filter_map(|i| i.target_label()) {
            if !self.labels.contains(label) && !missing.contains(&label) {
                missing.push(label);
            }
        }
        missing
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}
