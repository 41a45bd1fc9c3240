// crates/powerlink-psi/src/status.rs
//! Status channel: caches the remote busy/free registers after each
//! transfer, publishes the local SSDO receive register and forwards the
//! relative time to the application.

use crate::common::TimeStamp;
use crate::hal::PsiError;
use crate::stream::{ActionType, Stream};
use crate::types::{
    BufferId, LOG_CHANNEL_COUNT, SSDO_CHANNEL_COUNT, SeqNr, read_u8, read_u16_le, read_u32_le,
    write_u16_le,
};
use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::Cell;
use log::{error, info, trace};

/// Size of the consumed status buffer.
pub const STATUS_OUT_SIZE: usize = 12;
/// Size of the produced status buffer.
pub const STATUS_IN_SIZE: usize = 4;

const REL_TIME_LOW_OFF: usize = 0;
const REL_TIME_HIGH_OFF: usize = 4;
const ICC_STATUS_OFF: usize = 8;
const LOG_CONS_STATUS_OFF: usize = 9;
const SSDO_CONS_STATUS_OFF: usize = 10;
const SSDO_PROD_STATUS_OFF: usize = 0;

const ICC_BUSY_FLAG_POS: u8 = 0;

/// Receives the relative time once per cycle, before the transfer.
pub trait TimeSyncHandler {
    fn on_time_sync(&mut self, time: &TimeStamp) -> Result<(), PsiError>;
}

impl<F> TimeSyncHandler for F
where
    F: FnMut(&TimeStamp) -> Result<(), PsiError>,
{
    fn on_time_sync(&mut self, time: &TimeStamp) -> Result<(), PsiError> {
        self(time)
    }
}

#[derive(Debug, Default)]
struct Registers {
    icc: Cell<u8>,
    log_tx: Cell<u8>,
    ssdo_tx: Cell<u16>,
    ssdo_rx: Cell<u16>,
    time: Cell<TimeStamp>,
}

/// Handle to the status registers. Clones observe the same registers.
#[derive(Debug, Clone)]
pub struct Status {
    regs: Rc<Registers>,
}

impl Status {
    /// Binds the status module to its two buffers and registers its actions.
    pub fn init(
        stream: &mut Stream,
        out_id: BufferId,
        in_id: BufferId,
        mut time_sync: Box<dyn TimeSyncHandler>,
    ) -> Result<Self, PsiError> {
        check_buffer(stream, out_id, STATUS_OUT_SIZE)?;
        check_buffer(stream, in_id, STATUS_IN_SIZE)?;

        let regs = Rc::new(Registers::default());

        let sync_regs = regs.clone();
        stream.register_action(
            ActionType::Pre,
            out_id,
            Box::new(move |buf: &mut [u8]| -> Result<(), PsiError> {
                let time = TimeStamp {
                    rel_time_low: read_u32_le(buf, REL_TIME_LOW_OFF)?,
                    rel_time_high: read_u32_le(buf, REL_TIME_HIGH_OFF)?,
                };
                sync_regs.time.set(time);
                time_sync.on_time_sync(&time).map_err(|e| {
                    error!("[Status] Time synchronisation callback failed: {}", e);
                    PsiError::TimeSyncFailed
                })
            }),
        )?;

        let out_regs = regs.clone();
        stream.register_action(
            ActionType::Post,
            out_id,
            Box::new(move |buf: &mut [u8]| -> Result<(), PsiError> {
                out_regs.icc.set(read_u8(buf, ICC_STATUS_OFF)?);
                out_regs.log_tx.set(read_u8(buf, LOG_CONS_STATUS_OFF)?);
                out_regs.ssdo_tx.set(read_u16_le(buf, SSDO_CONS_STATUS_OFF)?);
                Ok(())
            }),
        )?;

        let in_regs = regs.clone();
        stream.register_action(
            ActionType::Post,
            in_id,
            Box::new(move |buf: &mut [u8]| -> Result<(), PsiError> {
                write_u16_le(buf, SSDO_PROD_STATUS_OFF, in_regs.ssdo_rx.get())
            }),
        )?;

        info!("[Status] Initialised on {} (out) and {} (in)", out_id, in_id);
        Ok(Self { regs })
    }

    pub fn exit(&self) {
        info!("[Status] Exit");
    }

    pub fn icc_status(&self) -> SeqNr {
        SeqNr::from_bit(self.regs.icc.get() as u32, ICC_BUSY_FLAG_POS).unwrap_or_default()
    }

    pub fn ssdo_tx_chan_flag(&self, channel: u8) -> Result<SeqNr, PsiError> {
        check_channel(channel, SSDO_CHANNEL_COUNT)?;
        flag(self.regs.ssdo_tx.get() as u32, channel)
    }

    pub fn log_tx_chan_flag(&self, channel: u8) -> Result<SeqNr, PsiError> {
        check_channel(channel, LOG_CHANNEL_COUNT)?;
        flag(self.regs.log_tx.get() as u32, channel)
    }

    pub fn ssdo_rx_chan_flag(&self, channel: u8) -> Result<SeqNr, PsiError> {
        check_channel(channel, SSDO_CHANNEL_COUNT)?;
        flag(self.regs.ssdo_rx.get() as u32, channel)
    }

    /// Sets the local SSDO receive bit published on the next transfer.
    pub fn set_ssdo_rx_chan_flag(&self, channel: u8, seq: SeqNr) -> Result<(), PsiError> {
        check_channel(channel, SSDO_CHANNEL_COUNT)?;
        let mask = 1u16
            .checked_shl(channel as u32)
            .ok_or(PsiError::InvalidParameter)?;
        let reg = self.regs.ssdo_rx.get();
        let reg = match seq {
            SeqNr::First => reg & !mask,
            SeqNr::Second => reg | mask,
        };
        self.regs.ssdo_rx.set(reg);
        trace!("[Status] SSDO rx register now {:#06x}", reg);
        Ok(())
    }

    /// Relative time read by the last pre-action.
    pub fn time_stamp(&self) -> TimeStamp {
        self.regs.time.get()
    }
}

fn check_channel(channel: u8, count: usize) -> Result<(), PsiError> {
    if channel as usize >= count {
        error!("[Status] Channel {} out of range", channel);
        return Err(PsiError::InvalidParameter);
    }
    Ok(())
}

fn flag(register: u32, channel: u8) -> Result<SeqNr, PsiError> {
    SeqNr::from_bit(register, channel).ok_or(PsiError::InvalidParameter)
}

fn check_buffer(stream: &Stream, id: BufferId, size: usize) -> Result<(), PsiError> {
    let desc = stream.buffer_param(id).ok_or_else(|| {
        error!("[Status] {} is not part of the stream", id);
        PsiError::InvalidParameter
    })?;
    if desc.size != size {
        error!(
            "[Status] {} has {} bytes, {} expected",
            id, desc.size, size
        );
        return Err(PsiError::BufferSizeMismatch {
            expected: size,
            actual: desc.size,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{BufferDescriptor, HandlerParam};
    use alloc::vec::Vec;
    use core::cell::RefCell;

    const OUT: BufferId = BufferId(1);
    const IN: BufferId = BufferId(3);

    /// Feeds a fixed consumer image and keeps the last producer image.
    fn stream(consumer: [u8; 16], sent: Rc<RefCell<Vec<u8>>>) -> Stream {
        Stream::new(
            BufferDescriptor::layout(&[4, STATUS_OUT_SIZE, 4, STATUS_IN_SIZE]),
            Box::new(move |param: &mut HandlerParam<'_>| -> Result<(), PsiError> {
                param.consumer.copy_from_slice(&consumer);
                *sent.borrow_mut() = param.producer.to_vec();
                Ok(())
            }),
            BufferId(0),
            BufferId(2),
        )
        .unwrap()
    }

    fn ok_sync() -> Box<dyn TimeSyncHandler> {
        Box::new(|_: &TimeStamp| -> Result<(), PsiError> { Ok(()) })
    }

    #[test]
    fn test_init_checks_buffer_sizes() {
        let mut stream = stream([0; 16], Rc::default());
        let result = Status::init(&mut stream, BufferId(0), IN, ok_sync());
        assert_eq!(
            result.err(),
            Some(PsiError::BufferSizeMismatch {
                expected: STATUS_OUT_SIZE,
                actual: 4
            })
        );
        let result = Status::init(&mut stream, OUT, BufferId(9), ok_sync());
        assert_eq!(result.err(), Some(PsiError::InvalidParameter));
    }

    #[test]
    fn test_post_action_caches_remote_registers() {
        let mut consumer = [0u8; 16];
        consumer[4 + ICC_STATUS_OFF] = 0x01;
        consumer[4 + LOG_CONS_STATUS_OFF] = 0x01;
        consumer[4 + SSDO_CONS_STATUS_OFF] = 0x00;
        let mut stream = stream(consumer, Rc::default());
        let status = Status::init(&mut stream, OUT, IN, ok_sync()).unwrap();

        assert_eq!(status.icc_status(), SeqNr::First);
        stream.process_sync().unwrap();
        // Cached only after the post-actions ran.
        assert_eq!(status.log_tx_chan_flag(0), Ok(SeqNr::First));
        stream.process_post_actions().unwrap();

        assert_eq!(status.icc_status(), SeqNr::Second);
        assert_eq!(status.log_tx_chan_flag(0), Ok(SeqNr::Second));
        assert_eq!(status.ssdo_tx_chan_flag(0), Ok(SeqNr::First));
    }

    #[test]
    fn test_pre_action_forwards_time() {
        let mut consumer = [0u8; 16];
        consumer[4..8].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        consumer[8..12].copy_from_slice(&2u32.to_le_bytes());
        let seen = Rc::new(Cell::new(0u64));
        let sink = seen.clone();

        let mut stream = stream(consumer, Rc::default());
        let status = Status::init(
            &mut stream,
            OUT,
            IN,
            Box::new(move |time: &TimeStamp| -> Result<(), PsiError> {
                sink.set(time.as_u64());
                Ok(())
            }),
        )
        .unwrap();

        // The first cycle still sees the zeroed image.
        stream.process_sync().unwrap();
        assert_eq!(seen.get(), 0);
        stream.process_sync().unwrap();
        assert_eq!(seen.get(), 0x0000_0002_1234_5678);
        assert_eq!(status.time_stamp().rel_time_high, 2);
    }

    #[test]
    fn test_failing_time_sync_aborts_cycle() {
        let transfers = Rc::new(RefCell::new(Vec::new()));
        let mut stream = stream([0; 16], transfers.clone());
        Status::init(
            &mut stream,
            OUT,
            IN,
            Box::new(|_: &TimeStamp| -> Result<(), PsiError> { Err(PsiError::InvalidState) }),
        )
        .unwrap();
        assert_eq!(stream.process_sync(), Err(PsiError::TimeSyncFailed));
        assert!(transfers.borrow().is_empty());
    }

    #[test]
    fn test_ssdo_rx_flag_is_published() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let mut stream = stream([0; 16], sent.clone());
        let status = Status::init(&mut stream, OUT, IN, ok_sync()).unwrap();

        status.set_ssdo_rx_chan_flag(0, SeqNr::Second).unwrap();
        assert_eq!(status.ssdo_rx_chan_flag(0), Ok(SeqNr::Second));
        stream.process_sync().unwrap();
        stream.process_post_actions().unwrap();
        stream.process_sync().unwrap();
        // producer image: ack register (4) then status in
        assert_eq!(sent.borrow()[4..6], [0x01, 0x00]);

        status.set_ssdo_rx_chan_flag(0, SeqNr::First).unwrap();
        assert_eq!(status.ssdo_rx_chan_flag(0), Ok(SeqNr::First));
    }

    #[test]
    fn test_out_of_range_channel_is_rejected() {
        let mut stream = stream([0xFF; 16], Rc::default());
        let status = Status::init(&mut stream, OUT, IN, ok_sync()).unwrap();
        stream.process_sync().unwrap();
        stream.process_post_actions().unwrap();

        for channel in [16, 40, u8::MAX] {
            assert_eq!(status.ssdo_tx_chan_flag(channel), Err(PsiError::InvalidParameter));
            assert_eq!(status.log_tx_chan_flag(channel), Err(PsiError::InvalidParameter));
            assert_eq!(status.ssdo_rx_chan_flag(channel), Err(PsiError::InvalidParameter));
            assert_eq!(
                status.set_ssdo_rx_chan_flag(channel, SeqNr::Second),
                Err(PsiError::InvalidParameter)
            );
        }
        // Register untouched by the rejected writes.
        assert_eq!(status.ssdo_rx_chan_flag(0), Ok(SeqNr::First));
        assert_eq!(status.ssdo_tx_chan_flag(0), Ok(SeqNr::Second));
    }
}
