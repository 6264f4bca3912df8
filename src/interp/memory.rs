//! Flat byte-addressable memory
//!
//! Every access is bounds-checked as a whole range; a rejected access
//! leaves memory untouched.

use thiserror::Error;

/// Default memory size in bytes
pub const DEFAULT_MEMORY_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("Out of bounds access: {count} byte(s) at {address:#x} (memory size {size:#x})")]
    OutOfBounds {
        address: u64,
        count: usize,
        size: usize,
    },
    #[error("Buffer of {len} byte(s) cannot hold a {count} byte transfer")]
    ShortBuffer { len: usize, count: usize },
}

/// Zero-initialised byte array
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    fn range(&self, address: u64, count: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let out_of_bounds = || MemoryError::OutOfBounds {
            address,
            count,
            size: self.bytes.len(),
        };
        let start = usize::try_from(address).map_err(|_| out_of_bounds())?;
        let end = start.checked_add(count).ok_or_else(out_of_bounds)?;
        if end > self.bytes.len() {
            return Err(out_of_bounds());
        }
        Ok(start..end)
    }

    /// Copy the first `count` bytes of `src` to `address`.
    pub fn store(&mut self, src: &[u8], address: u64, count: usize) -> Result<(), MemoryError> {
        if src.len() < count {
            return Err(MemoryError::ShortBuffer {
                len: src.len(),
                count,
            });
        }
        let range = self.range(address, count)?;
        self.bytes[range].copy_from_slice(&src[..count]);
        Ok(())
    }

    /// Copy `count` bytes starting at `address` into the front of `dst`.
    pub fn load(&self, dst: &mut [u8], address: u64, count: usize) -> Result<(), MemoryError> {
        if dst.len() < count {
            return Err(MemoryError::ShortBuffer {
                len: dst.len(),
                count,
            });
        }
        let range = self.range(address, count)?;
        dst[..count].copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    /// Read a single byte, `None` past the end
    #[inline]
    pub fn byte(&self, address: u64) -> Option<u8> {
        usize::try_from(address)
            .ok()
            .and_then(|addr| self.bytes.get(addr).copied())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}
