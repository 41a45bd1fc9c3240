// crates/powerlink-psi/src/types.rs
use crate::hal::PsiError;
use core::convert::TryFrom;
use core::fmt;

// --- Primitive Types ---
// Keeps the buffer layouts readable next to the wire formats.

/// Alias for UNSIGNED32 (32-bit unsigned integer)
pub type UNSIGNED32 = u32;

/// Identifies one triple buffer slot in the stream layout.
///
/// Ids are dense: buffer `n` immediately follows buffer `n - 1` in the
/// shared image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub u8);

impl BufferId {
    /// Returns the id as an index into descriptor and action tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tbuf#{}", self.0)
    }
}

impl From<BufferId> for u8 {
    fn from(id: BufferId) -> Self {
        id.0
    }
}

// --- Layout Constants ---

/// Upper bound of triple buffers a stream can describe. Action lists are
/// sized to the configured buffer count, which may not exceed this value.
pub const MAX_BUFFER_COUNT: usize = 16;

/// Number of logbook transmit channels.
pub const LOG_CHANNEL_COUNT: usize = 1;

/// Number of SSDO channels.
pub const SSDO_CHANNEL_COUNT: usize = 1;

/// Size of an acknowledge register buffer (one bit per triple buffer).
pub const ACK_REGISTER_SIZE: usize = 4;

/// Two-valued token used to detect whether the remote side has consumed
/// the most recent post on a channel.
///
/// A channel is busy while the local and the remote value disagree and free
/// once they match. The wire representation is the raw discriminant; in the
/// status registers `First` is a cleared bit and `Second` a set bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SeqNr {
    #[default]
    First = 0,
    Second = 1,
}

impl SeqNr {
    /// Returns the other sequence value.
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            SeqNr::First => SeqNr::Second,
            SeqNr::Second => SeqNr::First,
        }
    }

    /// Translates a single status register bit into a sequence number.
    /// Returns `None` when `position` lies outside the register.
    pub fn from_bit(register: u32, position: u8) -> Option<Self> {
        let mask = 1u32.checked_shl(position as u32)?;
        Some(if register & mask != 0 {
            SeqNr::Second
        } else {
            SeqNr::First
        })
    }
}

impl TryFrom<u8> for SeqNr {
    type Error = PsiError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SeqNr::First),
            1 => Ok(SeqNr::Second),
            _ => Err(PsiError::InvalidSeqNr(value)),
        }
    }
}

impl From<SeqNr> for u8 {
    fn from(seq: SeqNr) -> Self {
        seq as u8
    }
}

// --- Little-endian field helpers ---
// Every multi-byte field in a shared buffer is little-endian regardless of
// the host. All accessors are bounds checked.

pub(crate) fn read_u8(buf: &[u8], offset: usize) -> Result<u8, PsiError> {
    buf.get(offset).copied().ok_or(PsiError::OutOfBounds)
}

pub(crate) fn read_u16_le(buf: &[u8], offset: usize) -> Result<u16, PsiError> {
    let bytes = buf.get(offset..offset + 2).ok_or(PsiError::OutOfBounds)?;
    Ok(u16::from_le_bytes(bytes.try_into()?))
}

pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32, PsiError> {
    let bytes = buf.get(offset..offset + 4).ok_or(PsiError::OutOfBounds)?;
    Ok(u32::from_le_bytes(bytes.try_into()?))
}

pub(crate) fn write_u8(buf: &mut [u8], offset: usize, value: u8) -> Result<(), PsiError> {
    let slot = buf.get_mut(offset).ok_or(PsiError::OutOfBounds)?;
    *slot = value;
    Ok(())
}

pub(crate) fn write_u16_le(buf: &mut [u8], offset: usize, value: u16) -> Result<(), PsiError> {
    buf.get_mut(offset..offset + 2)
        .ok_or(PsiError::OutOfBounds)?
        .copy_from_slice(&value.to_le_bytes());
    Ok(())
}

pub(crate) fn write_u32_le(buf: &mut [u8], offset: usize, value: u32) -> Result<(), PsiError> {
    buf.get_mut(offset..offset + 4)
        .ok_or(PsiError::OutOfBounds)?
        .copy_from_slice(&value.to_le_bytes());
    Ok(())
}
