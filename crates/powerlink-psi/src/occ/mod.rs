// crates/powerlink-psi/src/occ/mod.rs
//! Configuration channel output.
//!
//! Serialises one queued object dictionary write per call into a triple
//! buffer and raises its acknowledge bit.

pub mod object;

pub use object::{ConfChanObject, ObdEvent, ObjectList};

use crate::hal::PsiError;
use crate::tbuf::{AckRegister, TripleBuffer};
use crate::types::{BufferId, SeqNr};
use log::{error, info, trace};

/// Size of the configuration channel buffer.
pub const CC_BUFFER_SIZE: usize = 12;

const SEQNR_OFF: usize = 0;
const OBJ_SUBIDX_OFF: usize = 1;
const OBJ_IDX_OFF: usize = 2;
const PAYLOAD_LOW_OFF: usize = 4;
const PAYLOAD_HIGH_OFF: usize = 8;

pub struct Occ {
    tbuf: TripleBuffer,
    seq: SeqNr,
}

impl Occ {
    pub fn init(id: BufferId, ack: AckRegister, size: usize) -> Result<Self, PsiError> {
        if cfg!(debug_assertions) && size != CC_BUFFER_SIZE {
            error!("[OCC] Buffer {} has {} bytes", id, size);
            return Err(PsiError::BufferSizeMismatch {
                expected: CC_BUFFER_SIZE,
                actual: size,
            });
        }
        let tbuf = TripleBuffer::create(id, ack, size)?;
        info!("[OCC] Initialised on {}", id);
        Ok(Self {
            tbuf,
            seq: SeqNr::First,
        })
    }

    pub fn exit(self) {
        self.tbuf.destroy();
    }

    /// Posts the head object of `list`, if any.
    ///
    /// An object with an unsupported size stays at the head of the list.
    pub fn handle_outgoing(&mut self, list: &mut ObjectList) -> Result<(), PsiError> {
        let Some(object) = list.read_current().copied() else {
            return Ok(());
        };
        self.seq = self.seq.flip();
        self.post_object(&object)?;
        self.tbuf.set_ack()?;
        list.advance();
        trace!(
            "[OCC] Posted {:#06x}/{} with {:?}",
            object.index, object.sub_index, self.seq
        );
        Ok(())
    }

    pub fn seq_nr(&self) -> SeqNr {
        self.seq
    }

    pub fn buffer(&self) -> &TripleBuffer {
        &self.tbuf
    }

    fn post_object(&mut self, object: &ConfChanObject) -> Result<(), PsiError> {
        self.tbuf.write_byte(SEQNR_OFF, self.seq.into())?;
        self.tbuf.write_byte(OBJ_SUBIDX_OFF, object.sub_index)?;
        self.tbuf.write_word(OBJ_IDX_OFF, object.index)?;
        match object.size {
            1 => self.tbuf.write_byte(PAYLOAD_LOW_OFF, object.payload_low as u8),
            2 => self.tbuf.write_word(PAYLOAD_LOW_OFF, object.payload_low as u16),
            4 => self.tbuf.write_dword(PAYLOAD_LOW_OFF, object.payload_low),
            8 => {
                self.tbuf.write_dword(PAYLOAD_LOW_OFF, object.payload_low)?;
                self.tbuf.write_dword(PAYLOAD_HIGH_OFF, object.payload_high)
            }
            size => {
                error!("[OCC] Invalid object size {}", size);
                Err(PsiError::InvalidSizeOfObject(size))
            }
        }
    }
}
