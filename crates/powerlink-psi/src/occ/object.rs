// crates/powerlink-psi/src/occ/object.rs
use crate::hal::PsiError;
use alloc::collections::VecDeque;
use log::{debug, warn};

/// Largest object the configuration channel carries.
pub const CC_MAX_OBJECT_SIZE: usize = 8;

/// One object dictionary write forwarded over the configuration channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfChanObject {
    pub index: u16,
    pub sub_index: u8,
    /// Declared width in bytes.
    pub size: u16,
    pub payload_low: u32,
    pub payload_high: u32,
}

impl ConfChanObject {
    /// Builds an object from the raw little-endian value of a write.
    pub fn from_value(index: u16, sub_index: u8, data: &[u8]) -> Result<Self, PsiError> {
        if data.len() > CC_MAX_OBJECT_SIZE {
            return Err(PsiError::ObjectLengthError(data.len()));
        }
        let mut raw = [0u8; CC_MAX_OBJECT_SIZE];
        raw[..data.len()].copy_from_slice(data);
        let value = u64::from_le_bytes(raw);
        Ok(Self {
            index,
            sub_index,
            size: data.len() as u16,
            payload_low: value as u32,
            payload_high: (value >> 32) as u32,
        })
    }
}

/// Access events reported by the object dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObdEvent {
    CheckExist,
    PreRead,
    PostRead,
    InitWrite,
    PreWrite,
    PostWrite,
    PostDefault,
}

/// FIFO of objects waiting for the configuration channel.
#[derive(Debug, Default)]
pub struct ObjectList {
    objects: VecDeque<ConfChanObject>,
}

impl ObjectList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an object. The list is not bounded.
    pub fn write_object(&mut self, object: ConfChanObject) {
        self.objects.push_back(object);
    }

    /// Returns the head object without removing it.
    pub fn read_current(&self) -> Option<&ConfChanObject> {
        self.objects.front()
    }

    /// Moves the read pointer past the head object.
    pub fn advance(&mut self) {
        self.objects.pop_front();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Object dictionary callback for configuration channel objects.
    ///
    /// Only `PostWrite` enqueues; writes wider than eight bytes are refused
    /// for every event.
    pub fn on_object_access(
        &mut self,
        event: ObdEvent,
        index: u16,
        sub_index: u8,
        data: &[u8],
    ) -> Result<(), PsiError> {
        if data.len() > CC_MAX_OBJECT_SIZE {
            warn!(
                "[OCC] Rejected {} byte write to {:#06x}/{}",
                data.len(),
                index,
                sub_index
            );
            return Err(PsiError::ObjectLengthError(data.len()));
        }
        if event == ObdEvent::PostWrite {
            self.write_object(ConfChanObject::from_value(index, sub_index, data)?);
            debug!("[OCC] Queued {:#06x}/{} ({} pending)", index, sub_index, self.len());
        }
        Ok(())
    }
}
