// crates/powerlink-psi/src/logbook.rs
//! Logbook transmit channels.
//!
//! Each channel owns one producing buffer and allows at most one
//! outstanding entry. An entry is released when the remote side echoes the
//! sequence number through the status buffer, or dropped when the transmit
//! timeout expires first.

use crate::hal::PsiError;
use crate::log::{LogContext, psi_debug, psi_info, psi_warn};
use crate::status::Status;
use crate::stream::{ActionType, Stream};
use crate::timeout::{TimerState, Timeout};
use crate::types::{
    BufferId, LOG_CHANNEL_COUNT, SeqNr, read_u8, read_u16_le, read_u32_le, write_u8, write_u16_le,
    write_u32_le,
};
use alloc::boxed::Box;
use log::error;

/// Cycles an entry may stay unacknowledged before it is dropped.
pub const LOG_TX_TIMEOUT_CYCLE_COUNT: u16 = 100;

/// Size of a logbook buffer.
pub const LOG_BUFFER_SIZE: usize = 16;

const SEQNR_OFF: usize = 0;
const LEVEL_OFF: usize = 1;
const ENTRY_TYPE_OFF: usize = 2;
const CODE_OFF: usize = 4;
const TIMESTAMP_OFF: usize = 8;
const VALUE_OFF: usize = 12;

/// One diagnostic entry as carried in a logbook buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogEntry {
    pub level: u8,
    pub entry_type: u8,
    pub code: u16,
    pub timestamp: u32,
    pub value: u32,
}

impl LogEntry {
    /// Writes the entry into `buf`, leaving the sequence number untouched.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<(), PsiError> {
        write_u8(buf, LEVEL_OFF, self.level)?;
        write_u8(buf, ENTRY_TYPE_OFF, self.entry_type)?;
        write_u16_le(buf, CODE_OFF, self.code)?;
        write_u32_le(buf, TIMESTAMP_OFF, self.timestamp)?;
        write_u32_le(buf, VALUE_OFF, self.value)
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, PsiError> {
        Ok(Self {
            level: read_u8(buf, LEVEL_OFF)?,
            entry_type: read_u8(buf, ENTRY_TYPE_OFF)?,
            code: read_u16_le(buf, CODE_OFF)?,
            timestamp: read_u32_le(buf, TIMESTAMP_OFF)?,
            value: read_u32_le(buf, VALUE_OFF)?,
        })
    }
}

/// Outcome of [`LogChannel::post_log_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTxStatus {
    Successful,
    /// The previous entry is still outstanding. Retry on a later cycle.
    Busy,
}

pub struct LogChannel {
    chan_id: u8,
    buffer: BufferId,
    seq: SeqNr,
    locked: bool,
    timeout: Timeout,
    status: Status,
    ctx: LogContext,
}

impl LogChannel {
    pub fn create(
        chan_id: u8,
        buffer: BufferId,
        stream: &mut Stream,
        status: &Status,
    ) -> Result<Self, PsiError> {
        if chan_id as usize >= LOG_CHANNEL_COUNT {
            error!("[Logbook] Invalid channel id {}", chan_id);
            return Err(PsiError::InvalidParameter);
        }
        let desc = stream.buffer_param(buffer).ok_or_else(|| {
            error!("[Logbook] {} is not part of the stream", buffer);
            PsiError::InvalidParameter
        })?;
        if desc.size != LOG_BUFFER_SIZE {
            error!("[Logbook] {} has {} bytes", buffer, desc.size);
            return Err(PsiError::BufferSizeMismatch {
                expected: LOG_BUFFER_SIZE,
                actual: desc.size,
            });
        }

        let timeout = Timeout::new(LOG_TX_TIMEOUT_CYCLE_COUNT);
        let ticker = timeout.clone();
        stream.register_action(
            ActionType::Post,
            buffer,
            Box::new(move |_: &mut [u8]| -> Result<(), PsiError> {
                ticker.increment();
                Ok(())
            }),
        )?;

        let ctx = LogContext::new("logbook", chan_id as u32);
        psi_info!(ctx, "Channel created on {}", buffer);
        Ok(Self {
            chan_id,
            buffer,
            seq: SeqNr::Second,
            locked: false,
            timeout,
            status: status.clone(),
            ctx,
        })
    }

    /// Releases the channel and its timeout.
    pub fn destroy(self) {
        self.timeout.stop();
        psi_info!(self.ctx, "Channel destroyed");
    }

    /// Returns the transmit buffer for in-place filling, or `None` while an
    /// entry is outstanding.
    pub fn current_log_buffer<'s>(&self, stream: &'s mut Stream) -> Option<&'s mut [u8]> {
        if self.locked {
            return None;
        }
        stream.buffer_mut(self.buffer)
    }

    /// Stages `entry` for transmission.
    pub fn post_log_entry(
        &mut self,
        stream: &mut Stream,
        entry: &LogEntry,
    ) -> Result<LogTxStatus, PsiError> {
        if self.locked {
            psi_debug!(self.ctx, "Post rejected, channel busy");
            return Ok(LogTxStatus::Busy);
        }
        let buf = stream
            .buffer_mut(self.buffer)
            .ok_or(PsiError::InvalidBuffer)?;
        entry.serialize(buf)?;
        write_u8(buf, SEQNR_OFF, self.seq.into())?;

        self.locked = true;
        self.timeout.start();
        psi_debug!(self.ctx, "Posted entry with {:?}", self.seq);
        Ok(LogTxStatus::Successful)
    }

    /// Releases the outstanding entry once it is acknowledged or timed out.
    /// Called once per cycle.
    pub fn process(&mut self) -> Result<(), PsiError> {
        if !self.locked {
            return Ok(());
        }
        if self.status.log_tx_chan_flag(self.chan_id)? == self.seq {
            self.locked = false;
            self.seq = self.seq.flip();
            self.timeout.stop();
            psi_debug!(self.ctx, "Entry acknowledged, next {:?}", self.seq);
        } else if self.timeout.check_expire() == TimerState::Expired {
            // The entry is dropped, not resent.
            self.seq = self.seq.flip();
            self.locked = false;
            psi_warn!(self.ctx, "Transmit timeout, entry dropped");
        }
        Ok(())
    }

    pub fn chan_id(&self) -> u8 {
        self.chan_id
    }

    pub fn seq_nr(&self) -> SeqNr {
        self.seq
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}
