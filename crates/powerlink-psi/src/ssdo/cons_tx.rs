// crates/powerlink-psi/src/ssdo/cons_tx.rs
use super::{SSDO_ARP_RETRY_CYCLE_COUNT, SSDO_PAYLOAD_SIZE, SsdoTransport, TxProgress, check_buffer, read_frame};
use crate::hal::PsiError;
use crate::log::{LogContext, psi_debug, psi_info, psi_trace, psi_warn};
use crate::status::Status;
use crate::stream::{ActionType, Stream};
use crate::timeout::{TimerState, Timeout};
use crate::types::{BufferId, SeqNr};
use alloc::boxed::Box;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsTxState {
    WaitForFrame,
    ProcessFrame,
    WaitForTxFinished,
    WaitForNextArpRetry,
    TxFinished,
}

/// Consuming transmit path: frames published by the remote side are
/// transmitted by the local transport and acknowledged afterwards.
pub struct SsdoConsTx {
    chan_id: u8,
    buffer: BufferId,
    state: ConsTxState,
    /// Sequence number of the last acknowledged frame.
    acked_seq: SeqNr,
    pending_seq: SeqNr,
    /// Raw sequence byte of the last frame that failed to parse.
    rejected_seq: Option<u8>,
    frame: [u8; SSDO_PAYLOAD_SIZE],
    frame_len: usize,
    arp_retry: Timeout,
    status: Status,
    ctx: LogContext,
}

impl SsdoConsTx {
    pub fn create(
        chan_id: u8,
        buffer: BufferId,
        stream: &mut Stream,
        status: &Status,
    ) -> Result<Self, PsiError> {
        check_buffer(stream, buffer)?;

        let arp_retry = Timeout::new(SSDO_ARP_RETRY_CYCLE_COUNT);
        let ticker = arp_retry.clone();
        stream.register_action(
            ActionType::Post,
            buffer,
            Box::new(move |_: &mut [u8]| -> Result<(), PsiError> {
                ticker.increment();
                Ok(())
            }),
        )?;

        let ctx = LogContext::new("ssdo-tx", chan_id as u32);
        psi_info!(ctx, "Consuming channel created on {}", buffer);
        Ok(Self {
            chan_id,
            buffer,
            state: ConsTxState::WaitForFrame,
            acked_seq: SeqNr::First,
            pending_seq: SeqNr::First,
            rejected_seq: None,
            frame: [0; SSDO_PAYLOAD_SIZE],
            frame_len: 0,
            arp_retry,
            status: status.clone(),
            ctx,
        })
    }

    pub fn state(&self) -> ConsTxState {
        self.state
    }

    /// State of the address resolution retry timer.
    pub fn arp_retry_state(&self) -> TimerState {
        self.arp_retry.check_expire()
    }

    /// Stops the retry timer and drops a frame still in flight.
    pub fn destroy(&mut self) {
        self.arp_retry.stop();
        self.frame_len = 0;
        self.set_state(ConsTxState::WaitForFrame);
        psi_info!(self.ctx, "Channel destroyed");
    }

    /// Advances the state machine by one step.
    pub fn process(
        &mut self,
        stream: &Stream,
        transport: &mut dyn SsdoTransport,
    ) -> Result<(), PsiError> {
        match self.state {
            ConsTxState::WaitForFrame => {
                let buf = stream.buffer(self.buffer).ok_or(PsiError::InvalidBuffer)?;
                let (seq, payload) = match read_frame(buf) {
                    Ok(frame) => {
                        self.rejected_seq = None;
                        frame
                    }
                    Err(e) => {
                        // Not a new frame. Wait for the remote side to publish a valid one.
                        let raw = buf.first().copied();
                        if raw != self.rejected_seq {
                            psi_warn!(self.ctx, "Ignoring malformed frame: {}", e);
                            self.rejected_seq = raw;
                        }
                        return Ok(());
                    }
                };
                if seq != self.acked_seq {
                    self.frame[..payload.len()].copy_from_slice(payload);
                    self.frame_len = payload.len();
                    self.pending_seq = seq;
                    self.set_state(ConsTxState::ProcessFrame);
                }
            }
            ConsTxState::ProcessFrame => {
                match transport.send(self.chan_id, &self.frame[..self.frame_len]) {
                    Ok(()) => self.set_state(ConsTxState::WaitForTxFinished),
                    Err(e) => psi_warn!(self.ctx, "Send failed, retrying next cycle: {}", e),
                }
            }
            ConsTxState::WaitForTxFinished => match transport.poll_tx(self.chan_id) {
                TxProgress::Pending => {}
                TxProgress::Finished => self.set_state(ConsTxState::TxFinished),
                TxProgress::ArpFailed => {
                    psi_warn!(self.ctx, "Address resolution failed, retry armed");
                    self.arp_retry.start();
                    self.set_state(ConsTxState::WaitForNextArpRetry);
                }
            },
            ConsTxState::WaitForNextArpRetry => {
                if self.arp_retry.check_expire() == TimerState::Expired {
                    self.arp_retry.stop();
                    self.set_state(ConsTxState::ProcessFrame);
                }
            }
            ConsTxState::TxFinished => {
                // Tell the remote side the frame is consumed.
                self.status
                    .set_ssdo_rx_chan_flag(self.chan_id, self.pending_seq)?;
                self.acked_seq = self.pending_seq;
                psi_debug!(self.ctx, "Frame {:?} acknowledged", self.acked_seq);
                self.set_state(ConsTxState::WaitForFrame);
            }
        }
        Ok(())
    }

    fn set_state(&mut self, state: ConsTxState) {
        psi_trace!(self.ctx, "{:?} -> {:?}", self.state, state);
        self.state = state;
    }
}
