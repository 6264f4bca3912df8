//! Interpreter
//!
//! Walks a [`Program`] one instruction at a time. Each instruction either
//! falls through, jumps to a resolved label, or halts the machine; any
//! label or memory failure sets the error flag and stops the run.

use super::coverage::CoverageTracker;
use super::memory::{Memory, MemoryError};
use super::stack::CallStack;
use super::state::{Flags, RegisterFile};
use crate::ir::{
    AluOp, BranchCond, Instruction, Operand, PrintBase, Program, Register,
};
use std::io::{self, Stdout, Write};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Why a run ended cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Cursor moved past the last instruction
    EndOfProgram,
    /// `ret` with no pending call frame
    ReturnedFromTop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Running,
    Halted(Halt),
    Faulted,
}

/// Runtime failure. Every variant carries the position of the instruction
/// that failed.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Label not found: {label} (instruction {pc})")]
    UnknownLabel { label: String, pc: usize },
    #[error("Memory fault at instruction {pc}: {source}")]
    MemoryFault {
        pc: usize,
        #[source]
        source: MemoryError,
    },
    #[error("Output failed at instruction {pc}: {source}")]
    Output {
        pc: usize,
        #[source]
        source: io::Error,
    },
}

impl ExecError {
    pub fn pc(&self) -> usize {
        match self {
            ExecError::UnknownLabel { pc, .. }
            | ExecError::MemoryFault { pc, .. }
            | ExecError::Output { pc, .. } => *pc,
        }
    }
}

/// Instruction-local failure, tagged with the position by `step`
enum Fault {
    UnknownLabel(String),
    Memory(MemoryError),
    Output(io::Error),
}

impl Fault {
    fn at(self, pc: usize) -> ExecError {
        match self {
            Fault::UnknownLabel(label) => ExecError::UnknownLabel { label, pc },
            Fault::Memory(source) => ExecError::MemoryFault { pc, source },
            Fault::Output(source) => ExecError::Output { pc, source },
        }
    }
}

impl From<MemoryError> for Fault {
    fn from(err: MemoryError) -> Self {
        Fault::Memory(err)
    }
}

impl From<io::Error> for Fault {
    fn from(err: io::Error) -> Self {
        Fault::Output(err)
    }
}

enum ControlFlow {
    /// Fall through to the next instruction
    Continue,
    /// Jump to an absolute position
    Jump(usize),
    Halt(Halt),
}

/// Interpreter state
pub struct Interpreter<W: Write = Stdout> {
    regs: RegisterFile,
    stack: CallStack,
    memory: Memory,
    /// Sink for `print`
    output: W,
    pc: usize,
    state: MachineState,
    instruction_count: u64,
    coverage: Option<CoverageTracker>,
}

impl Interpreter<Stdout> {
    /// Create an interpreter with `memory_size` bytes of memory, printing
    /// to stdout.
    pub fn new(memory_size: usize) -> Self {
        Self::with_output(memory_size, io::stdout())
    }
}

impl Default for Interpreter<Stdout> {
    fn default() -> Self {
        Self::new(super::memory::DEFAULT_MEMORY_SIZE)
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_output(memory_size: usize, output: W) -> Self {
        Self {
            regs: RegisterFile::new(),
            stack: CallStack::new(),
            memory: Memory::new(memory_size),
            output,
            pc: 0,
            state: MachineState::Running,
            instruction_count: 0,
            coverage: None,
        }
    }

    /// Enable coverage tracking
    pub fn with_coverage(mut self) -> Self {
        self.coverage = Some(CoverageTracker::default());
        self
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Register value by index, `None` for an index outside `0..32`
    pub fn register(&self, index: u8) -> Option<i64> {
        Register::new(index).map(|reg| self.regs.get(reg))
    }

    pub fn flags(&self) -> Flags {
        self.regs.flags
    }

    pub fn had_error(&self) -> bool {
        self.regs.error
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Position of the next instruction to run
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Instructions executed since the start of the current run
    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Deepest call nesting reached during the current run
    pub fn max_call_depth(&self) -> usize {
        self.stack.max_depth()
    }

    pub fn call_depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn coverage(&self) -> Option<&CoverageTracker> {
        self.coverage.as_ref()
    }

    /// Error flag, comparison flags and all registers as text
    pub fn dump_state(&self) -> String {
        self.regs.to_string()
    }

    /// Run `program` from its first instruction until it halts or faults.
    ///
    /// Registers and memory carry over from any previous run; the cursor,
    /// call stack and its depth record, error flag and instruction count
    /// start fresh.
    pub fn execute(&mut self, program: &Program) -> Result<Halt, ExecError> {
        self.pc = 0;
        self.state = MachineState::Running;
        self.instruction_count = 0;
        self.regs.error = false;
        self.stack.reset();

        loop {
            if let MachineState::Halted(halt) = self.step(program)? {
                debug!(
                    ?halt,
                    instructions = self.instruction_count,
                    max_depth = self.stack.max_depth(),
                    "Run finished"
                );
                return Ok(halt);
            }
        }
    }

    /// Execute a single instruction.
    ///
    /// Once the machine has halted or faulted, further calls change nothing
    /// and report the final state.
    pub fn step(&mut self, program: &Program) -> Result<MachineState, ExecError> {
        if self.state != MachineState::Running {
            return Ok(self.state);
        }

        let Some(instr) = program.get(self.pc) else {
            self.halt(Halt::EndOfProgram);
            return Ok(self.state);
        };

        if let Some(ref mut cov) = self.coverage {
            cov.ensure_len(program.len());
            cov.mark_executed(self.pc);
        }
        self.instruction_count += 1;
        trace!(pc = self.pc, %instr, "step");

        match self.execute_instruction(instr, program) {
            Ok(ControlFlow::Continue) => self.pc += 1,
            Ok(ControlFlow::Jump(target)) => self.pc = target,
            Ok(ControlFlow::Halt(halt)) => self.halt(halt),
            Err(fault) => {
                let err = fault.at(self.pc);
                warn!(pc = self.pc, line = ?program.line_of(self.pc), "{}", err);
                self.regs.error = true;
                self.state = MachineState::Faulted;
                self.stack.clear();
                return Err(err);
            }
        }
        Ok(self.state)
    }

    fn halt(&mut self, halt: Halt) {
        if !self.stack.is_empty() {
            debug!(frames = self.stack.depth(), "Discarding pending call frames");
            self.stack.clear();
        }
        self.state = MachineState::Halted(halt);
    }

    #[inline]
    fn fetch(&self, operand: &Operand) -> i64 {
        match *operand {
            Operand::Reg(reg) => self.regs.get(reg),
            Operand::Imm(imm) => imm,
        }
    }

    fn execute_instruction(
        &mut self,
        instr: &Instruction,
        program: &Program,
    ) -> Result<ControlFlow, Fault> {
        match instr {
            Instruction::Mov { rd, imm } => self.regs.set(*rd, *imm),

            Instruction::Alu { op, rd, rn, rm } => {
                let result = alu_op(*op, self.regs.get(*rn), self.fetch(rm));
                self.regs.set(*rd, result);
            }

            Instruction::Cmp { mode, rn, rm } => {
                let lhs = self.regs.get(*rn);
                let rhs = self.fetch(rm);
                self.regs.flags.compare(lhs, rhs, *mode);
            }

            Instruction::Store { rs, addr, count } => {
                let address = self.fetch(addr) as u64;
                let bytes = self.regs.get(*rs).to_le_bytes();
                self.memory.store(&bytes, address, *count as usize)?;
            }

            Instruction::Load { rd, count, addr } => {
                let address = self.fetch(addr) as u64;
                self.regs.set(*rd, 0);
                let mut bytes = [0u8; 8];
                self.memory.load(&mut bytes, address, *count as usize)?;
                self.regs.set(*rd, i64::from_le_bytes(bytes));
            }

            Instruction::Put { text, addr } => {
                let base = self.fetch(addr) as u64;
                // Text ends at its first NUL. Every byte is attempted and the
                // first failure is reported.
                let bytes = text.as_bytes();
                let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let mut first_fault = None;
                for (offset, &byte) in bytes[..len].iter().chain(&[0]).enumerate() {
                    let address = base.wrapping_add(offset as u64);
                    if let Err(err) = self.memory.store(&[byte], address, 1) {
                        first_fault.get_or_insert(err);
                    }
                }
                if let Some(err) = first_fault {
                    return Err(err.into());
                }
            }

            Instruction::Print { value, base } => {
                let value = self.fetch(value);
                self.print(value, *base)?;
            }

            Instruction::Branch { cond, label } => {
                let taken = self.regs.flags.holds(*cond);
                if *cond != BranchCond::Always {
                    if let Some(ref mut cov) = self.coverage {
                        cov.mark_branch(self.pc, taken);
                    }
                }
                if taken {
                    let target = resolve(program, label)?;
                    trace!(%label, target, "branch taken");
                    return Ok(ControlFlow::Jump(target));
                }
            }

            Instruction::Call { label } => {
                self.stack.push(self.regs.snapshot(), self.pc + 1);
                let target = resolve(program, label)?;
                debug!(%label, target, depth = self.stack.depth(), "call");
                return Ok(ControlFlow::Jump(target));
            }

            Instruction::Ret => {
                let Some(frame) = self.stack.pop() else {
                    debug!("ret with empty call stack");
                    return Ok(ControlFlow::Halt(Halt::ReturnedFromTop));
                };
                self.regs.restore_preserving_x0(&frame.registers);
                debug!(resume = frame.resume, depth = self.stack.depth(), "ret");
                return Ok(ControlFlow::Jump(frame.resume));
            }
        }

        Ok(ControlFlow::Continue)
    }

    fn print(&mut self, value: i64, base: PrintBase) -> io::Result<()> {
        match base {
            PrintBase::Decimal => writeln!(self.output, "{}", value),
            PrintBase::Hex => writeln!(self.output, "0x{:x}", value as u64),
            PrintBase::Binary => writeln!(self.output, "0b{:b}", value as u64),
            PrintBase::Str => {
                let start = value as u64;
                let mut text = Vec::new();
                let mut address = start;
                loop {
                    match self.memory.byte(address) {
                        Some(0) => break,
                        Some(byte) => text.push(byte),
                        None => {
                            warn!(
                                address = start,
                                "String ran to the end of memory without a terminator"
                            );
                            break;
                        }
                    }
                    address = address.wrapping_add(1);
                }
                text.push(b'\n');
                self.output.write_all(&text)
            }
        }
    }
}

fn resolve(program: &Program, label: &str) -> Result<usize, Fault> {
    program
        .labels()
        .get(label)
        .map_err(|_| Fault::UnknownLabel(label.to_string()))
}

/// Two's complement ALU; shift amounts are taken modulo 64
#[inline]
fn alu_op(op: AluOp, a: i64, b: i64) -> i64 {
    match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::And => a & b,
        AluOp::Eor => a ^ b,
        AluOp::Orr => a | b,
        AluOp::Asr => a.wrapping_shr(b as u32),
        AluOp::Lsl => a.wrapping_shl(b as u32),
        AluOp::Lsr => (a as u64).wrapping_shr(b as u32) as i64,
    }
}
