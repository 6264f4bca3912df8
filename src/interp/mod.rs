//! Interpreter module
//!
//! Executes assembled programs against a register file, a call stack and a
//! flat byte memory.

pub mod coverage;
pub mod dispatch;
pub mod memory;
pub mod stack;
pub mod state;

pub use coverage::{CoverageReport, CoverageTracker};
pub use dispatch::{ExecError, Halt, Interpreter, MachineState};
pub use memory::{Memory, MemoryError, DEFAULT_MEMORY_SIZE};
pub use stack::{CallStack, Frame};
pub use state::{Flags, RegisterFile};
