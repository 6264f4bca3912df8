//! armlite - a small register machine with an ARM-flavoured assembly
//!
//! Programs are written in a compact text assembly, assembled into a
//! [`Program`] (an instruction sequence plus a chained-hash label table),
//! and executed by an [`Interpreter`] with 32 signed 64-bit registers,
//! three comparison flags, a call stack and a flat byte memory.
//!
//! # Instruction set
//!
//! ```text
//! mov x1, 5              ; load immediate
//! add x3, x1, x2         ; add/sub take a register or immediate
//! and x4, x1, x2         ; and/eor/orr on registers
//! lsl x5, x1, 3          ; asr/lsl/lsr by an immediate
//! cmp x1, 0              ; signed compare (cmp_u for unsigned)
//! beq done               ; b, beq, bne, bgt, bge, blt, ble
//! store x1, 64, 8        ; low 8 bytes of x1 to address 64
//! load x2, 8, 64         ; 8 bytes from address 64 into x2
//! put "hi", 128          ; NUL-terminated string to memory
//! print x3, d            ; d/x/b numbers, s for a string at an address
//! call fn                ; save registers, jump
//! ret                    ; restore all registers but x0, resume
//! ```
//!
//! # Example
//!
//! ```rust
//! use armlite::ir::Assembler;
//! use armlite::interp::{Halt, Interpreter};
//!
//! let program = Assembler::new()
//!     .assemble("mov x1, 5\nmov x2, 3\nadd x3, x1, x2\nprint x3, d\n")
//!     .unwrap();
//!
//! let mut interp = Interpreter::with_output(1024, Vec::new());
//! assert_eq!(interp.execute(&program).unwrap(), Halt::EndOfProgram);
//! assert_eq!(interp.output(), b"8\n");
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod interp;
pub mod ir;

pub use config::ArmliteConfig;
pub use interp::{ExecError, Halt, Interpreter, MachineState};
pub use ir::{AsmError, Assembler, Disassembler, Instruction, LabelTable, Opcode, Program, Register};

use thiserror::Error;

/// Failure of [`run_source`]: either the text did not assemble or the
/// program faulted.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Asm(#[from] AsmError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Execute a program on a fresh interpreter that prints to stdout.
pub fn execute(program: &Program, memory_size: usize) -> Result<Halt, ExecError> {
    Interpreter::new(memory_size).execute(program)
}

/// Assemble and run `source`, returning everything it printed.
///
/// ```rust
/// let out = armlite::run_source("mov x1, 0\nprint x1, x\n").unwrap();
/// assert_eq!(out, "0x0\n");
/// ```
pub fn run_source(source: &str) -> Result<String, RunError> {
    let program = Assembler::new().assemble(source)?;
    let mut interp = Interpreter::with_output(interp::DEFAULT_MEMORY_SIZE, Vec::new());
    interp.execute(&program)?;
    Ok(String::from_utf8_lossy(&interp.into_output()).into_owned())
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
