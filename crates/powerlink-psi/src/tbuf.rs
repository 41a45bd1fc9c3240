// crates/powerlink-psi/src/tbuf.rs
//! Triple buffer: one shared-memory region plus the acknowledge register
//! the remote side watches for "new data" notifications.

use crate::hal::PsiError;
use crate::types::{BufferId, write_u8, write_u16_le, write_u32_le};
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::Cell;
use log::{debug, error};

/// Acknowledge register shared by all triple buffers of one direction.
/// Bit `n` belongs to buffer `n`.
#[derive(Debug, Clone, Default)]
pub struct AckRegister(Rc<Cell<u32>>);

impl AckRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> u32 {
        self.0.get()
    }

    /// Returns whether buffer `id` has an unconsumed acknowledge pending.
    pub fn is_pending(&self, id: BufferId) -> bool {
        self.0.get() & (1 << id.0) != 0
    }

    /// Consumes the acknowledge of buffer `id`. Called by the remote side.
    pub fn clear(&self, id: BufferId) {
        self.0.set(self.0.get() & !(1 << id.0));
    }
}

#[derive(Debug)]
pub struct TripleBuffer {
    id: BufferId,
    data: Vec<u8>,
    ack: AckRegister,
}

impl TripleBuffer {
    /// Creates the buffer. `id` selects the bit in `ack`.
    pub fn create(id: BufferId, ack: AckRegister, size: usize) -> Result<Self, PsiError> {
        if size == 0 || id.index() >= u32::BITS as usize {
            error!("[Tbuf] Unable to create {} with size {}", id, size);
            return Err(PsiError::InvalidBuffer);
        }
        Ok(Self {
            id,
            data: vec![0; size],
            ack,
        })
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), PsiError> {
        write_u8(&mut self.data, offset, value).map_err(|_| self.size_mismatch(offset, 1))
    }

    pub fn write_word(&mut self, offset: usize, value: u16) -> Result<(), PsiError> {
        write_u16_le(&mut self.data, offset, value).map_err(|_| self.size_mismatch(offset, 2))
    }

    pub fn write_dword(&mut self, offset: usize, value: u32) -> Result<(), PsiError> {
        write_u32_le(&mut self.data, offset, value).map_err(|_| self.size_mismatch(offset, 4))
    }

    /// Signals the remote side that the buffer holds new data.
    pub fn set_ack(&mut self) -> Result<(), PsiError> {
        let register = &self.ack.0;
        register.set(register.get() | (1 << self.id.0));
        debug!("[Tbuf] Ack set for {}", self.id);
        Ok(())
    }

    pub fn destroy(self) {
        debug!("[Tbuf] Destroyed {}", self.id);
    }

    fn size_mismatch(&self, offset: usize, width: usize) -> PsiError {
        PsiError::BufferSizeMismatch {
            expected: offset + width,
            actual: self.data.len(),
        }
    }
}
