// crates/powerlink-psi/src/ssdo/prod_rx.rs
use super::{SSDO_PAYLOAD_SIZE, SSDO_RX_FIFO_DEPTH, check_buffer, write_frame};
use crate::hal::PsiError;
use crate::log::{LogContext, psi_debug, psi_info, psi_trace};
use crate::status::Status;
use crate::stream::Stream;
use crate::types::{BufferId, SeqNr};
use alloc::collections::VecDeque;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProdRxState {
    WaitForFrame,
    RepostFrame,
}

/// Producing receive path: frames from the transport are queued, copied
/// to a retransmission buffer and posted to the remote side.
pub struct SsdoProdRx {
    chan_id: u8,
    buffer: BufferId,
    state: ProdRxState,
    seq: SeqNr,
    /// A posted frame has not been acknowledged yet.
    outstanding: bool,
    fifo: VecDeque<Vec<u8>>,
    retransmit: [u8; SSDO_PAYLOAD_SIZE],
    retransmit_len: usize,
    cache_valid: bool,
    status: Status,
    ctx: LogContext,
}

impl SsdoProdRx {
    pub fn create(
        chan_id: u8,
        buffer: BufferId,
        stream: &mut Stream,
        status: &Status,
    ) -> Result<Self, PsiError> {
        check_buffer(stream, buffer)?;
        let ctx = LogContext::new("ssdo-rx", chan_id as u32);
        psi_info!(ctx, "Producing channel created on {}", buffer);
        Ok(Self {
            chan_id,
            buffer,
            state: ProdRxState::WaitForFrame,
            seq: SeqNr::Second,
            outstanding: false,
            fifo: VecDeque::with_capacity(SSDO_RX_FIFO_DEPTH),
            retransmit: [0; SSDO_PAYLOAD_SIZE],
            retransmit_len: 0,
            cache_valid: false,
            status: status.clone(),
            ctx,
        })
    }

    /// Queues a frame received by the transport.
    pub fn receive_frame(&mut self, payload: &[u8]) -> Result<(), PsiError> {
        if payload.len() > SSDO_PAYLOAD_SIZE {
            return Err(PsiError::OutOfBounds);
        }
        if self.fifo.len() >= SSDO_RX_FIFO_DEPTH {
            return Err(PsiError::FifoFull);
        }
        self.fifo.push_back(payload.to_vec());
        Ok(())
    }

    pub fn state(&self) -> ProdRxState {
        self.state
    }

    pub fn pending_frames(&self) -> usize {
        self.fifo.len()
    }

    /// The frame waiting to be reposted, if any.
    pub fn cached_payload(&self) -> Option<&[u8]> {
        self.cache_valid
            .then(|| &self.retransmit[..self.retransmit_len])
    }

    /// Drops queued and cached frames.
    pub fn destroy(&mut self) {
        self.fifo.clear();
        self.cache_valid = false;
        self.retransmit_len = 0;
        self.set_state(ProdRxState::WaitForFrame);
        psi_info!(self.ctx, "Channel destroyed");
    }

    /// Advances the state machine by one step.
    pub fn process(&mut self, stream: &mut Stream) -> Result<(), PsiError> {
        match self.state {
            ProdRxState::WaitForFrame => {
                let Some(frame) = self.fifo.pop_front() else {
                    return Ok(());
                };
                self.retransmit[..frame.len()].copy_from_slice(&frame);
                self.retransmit_len = frame.len();
                self.cache_valid = true;
                if !self.post(stream)? {
                    psi_debug!(self.ctx, "Remote side busy, frame cached for repost");
                    self.set_state(ProdRxState::RepostFrame);
                }
            }
            ProdRxState::RepostFrame => {
                if self.post(stream)? {
                    self.set_state(ProdRxState::WaitForFrame);
                }
            }
        }
        Ok(())
    }

    /// Offers the cached frame. Returns `false` while the previous frame
    /// is not yet acknowledged.
    fn post(&mut self, stream: &mut Stream) -> Result<bool, PsiError> {
        if self.outstanding {
            if self.status.ssdo_tx_chan_flag(self.chan_id)? != self.seq {
                return Ok(false);
            }
            self.outstanding = false;
            self.seq = self.seq.flip();
        }
        let buf = stream
            .buffer_mut(self.buffer)
            .ok_or(PsiError::InvalidBuffer)?;
        write_frame(buf, self.seq, &self.retransmit[..self.retransmit_len])?;
        self.outstanding = true;
        self.cache_valid = false;
        psi_debug!(self.ctx, "Posted frame with {:?}", self.seq);
        Ok(true)
    }

    fn set_state(&mut self, state: ProdRxState) {
        psi_trace!(self.ctx, "{:?} -> {:?}", self.state, state);
        self.state = state;
    }
}
