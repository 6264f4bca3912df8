//! IR (Intermediate Representation) module
//!
//! Defines the instruction set, the label table that resolves branch and
//! call targets, and the assembler/disassembler for the text form.
//!
//! # Label resolution
//!
//! Labels live in a fixed-size chained hash table. A lookup either returns
//! the position bound to exactly that name or [`LabelError::UnknownLabel`];
//! it never hands back a neighbouring entry from the same bucket.

pub mod assembler;
pub mod format;
pub mod labels;

pub use assembler::{parse_immediate, AsmError, Assembler, Disassembler, MAX_TRANSFER_BYTES};
pub use format::*;
pub use labels::{LabelError, LabelTable, DEFAULT_BUCKETS};
