// crates/powerlink-psi/src/ssdo/mod.rs
//! SSDO channels.
//!
//! A channel pairs two state machines. [`SsdoConsTx`] consumes frames the
//! remote side published and hands them to the local transport.
//! [`SsdoProdRx`] takes frames the transport received and produces them for
//! the remote side, reposting the cached frame until the remote side
//! accepts it. Unlike the logbook nothing is ever dropped.

pub mod cons_tx;
pub mod prod_rx;

pub use cons_tx::{ConsTxState, SsdoConsTx};
pub use prod_rx::{ProdRxState, SsdoProdRx};

use crate::hal::PsiError;
use crate::status::Status;
use crate::stream::Stream;
use crate::types::{BufferId, SSDO_CHANNEL_COUNT, SeqNr, read_u8, read_u16_le, write_u8, write_u16_le};
use log::error;

/// Size of an SSDO channel buffer.
pub const SSDO_BUFFER_SIZE: usize = 256;
/// Maximum payload of one SSDO frame.
pub const SSDO_PAYLOAD_SIZE: usize = 252;
/// Frames the receive FIFO holds before rejecting new ones.
pub const SSDO_RX_FIFO_DEPTH: usize = 4;
/// Cycles to wait before resending after address resolution failed.
pub const SSDO_ARP_RETRY_CYCLE_COUNT: u16 = 50;

const SEQNR_OFF: usize = 0;
const PAYLOAD_LEN_OFF: usize = 2;
const PAYLOAD_OFF: usize = 4;

/// Progress of a transmission handed to [`SsdoTransport::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxProgress {
    Pending,
    Finished,
    /// The destination address could not be resolved.
    ArpFailed,
}

/// The network side of an SSDO channel.
pub trait SsdoTransport {
    /// Starts transmitting `payload` on `channel`.
    fn send(&mut self, channel: u8, payload: &[u8]) -> Result<(), PsiError>;

    /// Polls the transmission started by the last `send`.
    fn poll_tx(&mut self, channel: u8) -> TxProgress;
}

/// Both directions of one SSDO channel.
pub struct SsdoChannel {
    pub tx: SsdoConsTx,
    pub rx: SsdoProdRx,
}

impl SsdoChannel {
    /// Creates the channel on `cons_buffer` (frames from the remote side)
    /// and `prod_buffer` (frames to the remote side).
    pub fn create(
        chan_id: u8,
        cons_buffer: BufferId,
        prod_buffer: BufferId,
        stream: &mut Stream,
        status: &Status,
    ) -> Result<Self, PsiError> {
        if chan_id as usize >= SSDO_CHANNEL_COUNT {
            error!("[SSDO] Invalid channel id {}", chan_id);
            return Err(PsiError::InvalidParameter);
        }
        Ok(Self {
            tx: SsdoConsTx::create(chan_id, cons_buffer, stream, status)?,
            rx: SsdoProdRx::create(chan_id, prod_buffer, stream, status)?,
        })
    }

    /// Runs both state machines once. A failure in one direction does not
    /// hold back the other; the first error is returned.
    pub fn process(
        &mut self,
        stream: &mut Stream,
        transport: &mut dyn SsdoTransport,
    ) -> Result<(), PsiError> {
        let tx = self.tx.process(stream, transport);
        let rx = self.rx.process(stream);
        tx.and(rx)
    }

    pub fn destroy(&mut self) {
        self.tx.destroy();
        self.rx.destroy();
    }
}

fn check_buffer(stream: &Stream, buffer: BufferId) -> Result<(), PsiError> {
    let desc = stream.buffer_param(buffer).ok_or_else(|| {
        error!("[SSDO] {} is not part of the stream", buffer);
        PsiError::InvalidParameter
    })?;
    if desc.size != SSDO_BUFFER_SIZE {
        error!("[SSDO] {} has {} bytes", buffer, desc.size);
        return Err(PsiError::BufferSizeMismatch {
            expected: SSDO_BUFFER_SIZE,
            actual: desc.size,
        });
    }
    Ok(())
}

/// Splits a channel buffer into its sequence number and payload.
pub(crate) fn read_frame(buf: &[u8]) -> Result<(SeqNr, &[u8]), PsiError> {
    let seq = SeqNr::try_from(read_u8(buf, SEQNR_OFF)?)?;
    let len = read_u16_le(buf, PAYLOAD_LEN_OFF)? as usize;
    if len > SSDO_PAYLOAD_SIZE {
        return Err(PsiError::OutOfBounds);
    }
    let payload = buf
        .get(PAYLOAD_OFF..PAYLOAD_OFF + len)
        .ok_or(PsiError::OutOfBounds)?;
    Ok((seq, payload))
}

pub(crate) fn write_frame(buf: &mut [u8], seq: SeqNr, payload: &[u8]) -> Result<(), PsiError> {
    if payload.len() > SSDO_PAYLOAD_SIZE {
        return Err(PsiError::OutOfBounds);
    }
    buf.get_mut(PAYLOAD_OFF..PAYLOAD_OFF + payload.len())
        .ok_or(PsiError::OutOfBounds)?
        .copy_from_slice(payload);
    write_u16_le(buf, PAYLOAD_LEN_OFF, payload.len() as u16)?;
    write_u8(buf, SEQNR_OFF, seq.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_frame_layout() {
        let mut buf = vec![0u8; SSDO_BUFFER_SIZE];
        write_frame(&mut buf, SeqNr::Second, &[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(&buf[..7], &[1, 0, 3, 0, 0xAA, 0xBB, 0xCC]);

        let (seq, payload) = read_frame(&buf).unwrap();
        assert_eq!(seq, SeqNr::Second);
        assert_eq!(payload, &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_frame_rejects_oversized_payload() {
        let mut buf = vec![0u8; SSDO_BUFFER_SIZE];
        let payload = vec![0u8; SSDO_PAYLOAD_SIZE + 1];
        assert_eq!(write_frame(&mut buf, SeqNr::First, &payload), Err(PsiError::OutOfBounds));

        buf[PAYLOAD_LEN_OFF] = 0xFF;
        assert_eq!(read_frame(&buf).err(), Some(PsiError::OutOfBounds));

        buf[SEQNR_OFF] = 7;
        assert_eq!(read_frame(&buf).err(), Some(PsiError::InvalidSeqNr(7)));
    }
}
