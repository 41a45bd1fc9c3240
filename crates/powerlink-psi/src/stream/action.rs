// crates/powerlink-psi/src/stream/action.rs
use crate::hal::PsiError;
use crate::types::BufferId;
use alloc::boxed::Box;

/// Selects the list an action is registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Runs before the transfer handler moves the images.
    Pre,
    /// Runs after the transfer, before the synchronous callback.
    Post,
}

/// Per-buffer bookkeeping attached to the stream.
///
/// The stream hands the action the bytes of the buffer it was registered
/// for. Returning an error aborts the remaining actions of the cycle.
pub trait BufferAction {
    fn invoke(&mut self, buffer: &mut [u8]) -> Result<(), PsiError>;
}

impl<F> BufferAction for F
where
    F: FnMut(&mut [u8]) -> Result<(), PsiError>,
{
    fn invoke(&mut self, buffer: &mut [u8]) -> Result<(), PsiError> {
        self(buffer)
    }
}

/// Application callback invoked once per cycle after all post-actions.
pub trait SyncCallback {
    fn on_sync(&mut self) -> Result<(), PsiError>;
}

impl<F> SyncCallback for F
where
    F: FnMut() -> Result<(), PsiError>,
{
    fn on_sync(&mut self) -> Result<(), PsiError> {
        self()
    }
}

/// One slot of an action list.
pub(crate) struct ActionEntry {
    pub(crate) buffer: BufferId,
    pub(crate) action: Box<dyn BufferAction>,
}

/// Fixed-capacity list of actions, filled front to back.
pub(crate) struct ActionList {
    slots: alloc::vec::Vec<Option<ActionEntry>>,
}

impl ActionList {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let mut slots = alloc::vec::Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    /// Stores the entry in the first free slot.
    pub(crate) fn insert(&mut self, entry: ActionEntry) -> Result<(), PsiError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(PsiError::NoFreeActionSlot)?;
        *slot = Some(entry);
        Ok(())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ActionEntry> {
        self.slots.iter_mut().flatten()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }
}
