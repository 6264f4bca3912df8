//! Call stack

use crate::ir::NUM_REGISTERS;

/// Saved machine context for one `call`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Register values at the time of the call
    pub registers: [i64; NUM_REGISTERS],
    /// Position of the instruction after the call
    pub resume: usize,
}

/// LIFO sequence of frames, oldest first
#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<Frame>,
    high_water: usize,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, registers: [i64; NUM_REGISTERS], resume: usize) {
        self.frames.push(Frame { registers, resume });
        self.high_water = self.high_water.max(self.frames.len());
    }

    /// Remove the most recent frame, `None` when empty
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Deepest the stack has been since creation or the last reset
    pub fn max_depth(&self) -> usize {
        self.high_water
    }

    /// Discard pending frames without restoring anything.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.high_water = 0;
    }
}
